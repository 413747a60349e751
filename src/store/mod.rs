//! Backing-store client: the tree-store contract and its filesystem
//! implementation.

mod fs;
mod traits;

pub use fs::FsStore;
pub use traits::{
    headers, ByteStream, Ls, LsEntry, PutOptions, StoreError, StoreHeaders, TreeStore,
    DIRECTORY_CONTENT_TYPE,
};
