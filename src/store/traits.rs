//! Tree-store contract: the filesystem-like operations the gateway consumes.
//!
//! Paths are absolute, `/`-separated store paths (e.g. `/buckets/b1/a/b/c`),
//! not OS paths. Metadata travels as a flat bag of lowercased header names.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::collections::HashMap;
use thiserror::Error;

/// Content type the store reports for directories. A `get` or `info` whose
/// `content-type` equals this value refers to a directory, not an object.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/x-json-stream; type=directory";

/// Metadata bag attached to store objects, keyed by lowercased header name.
pub type StoreHeaders = HashMap<String, String>;

/// Body bytes flowing between HTTP and the store, chunk by chunk.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Well-known header names in the store metadata namespace.
pub mod headers {
    /// Object size in bytes (decimal string).
    pub const CONTENT_LENGTH: &str = "content-length";
    /// MIME type of the object; [`super::DIRECTORY_CONTENT_TYPE`] for directories.
    pub const CONTENT_TYPE: &str = "content-type";
    /// Base64-encoded MD5 of the object content.
    pub const CONTENT_MD5: &str = "content-md5";
    /// MD5 the store computed while writing, base64-encoded.
    pub const COMPUTED_MD5: &str = "computed-md5";
    /// Copy count the object is stored at (decimal string).
    pub const DURABILITY_LEVEL: &str = "durability-level";
    /// Requested copy count on upload (decimal string).
    pub const X_DURABILITY_LEVEL: &str = "x-durability-level";
    /// RFC 1123 timestamp of the last write.
    pub const LAST_MODIFIED: &str = "last-modified";
    /// Prefix for user-defined metadata headers.
    pub const USER_META_PREFIX: &str = "m-";
}

/// Errors surfaced by store operations. Each maps to an HTTP-style status
/// through [`StoreError::status`]; 404 is significant to the gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("invalid store path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    /// HTTP-style status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            StoreError::NotFound(_) => 404,
            StoreError::AlreadyExists(_) => 409,
            StoreError::Forbidden(_) => 403,
            StoreError::NotEmpty(_) => 409,
            StoreError::InvalidPath(_) => 400,
            _ => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Options accompanying a streamed upload.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Declared body length, when the client sent one.
    pub content_length: Option<u64>,
    /// Metadata to record on the object: `content-type`, `content-md5`,
    /// `x-durability-level`, and any `m-*` user headers.
    pub headers: StoreHeaders,
}

/// One entry of a single-level directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LsEntry {
    Object {
        name: String,
        /// Store path of the directory that contains this entry.
        parent: String,
        size: u64,
        mtime: DateTime<Utc>,
        durability: Option<i32>,
    },
    Directory {
        name: String,
        parent: String,
        mtime: DateTime<Utc>,
    },
}

impl LsEntry {
    pub fn name(&self) -> &str {
        match self {
            LsEntry::Object { name, .. } | LsEntry::Directory { name, .. } => name,
        }
    }

    pub fn parent(&self) -> &str {
        match self {
            LsEntry::Object { parent, .. } | LsEntry::Directory { parent, .. } => parent,
        }
    }
}

/// A directory listing in flight. Dropping `entries` closes the listing
/// early; the producer stops as soon as it notices.
pub struct Ls {
    /// Total number of entries the store reports for this directory, when
    /// it knows up front. May exceed what the consumer chooses to read.
    pub result_set_size: Option<u64>,
    pub entries: BoxStream<'static, Result<LsEntry, StoreError>>,
}

/// The backing-store client contract.
///
/// Object-safe so handlers can share one `Arc<dyn TreeStore>`. All durable
/// state lives behind this trait; the gateway keeps none.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Metadata for the object or directory at `path`.
    async fn info(&self, path: &str) -> Result<StoreHeaders, StoreError>;

    /// Create a single directory. Succeeds if it already exists.
    async fn mkdir(&self, path: &str) -> Result<(), StoreError>;

    /// Create a directory and any missing ancestors.
    async fn mkdirp(&self, path: &str) -> Result<(), StoreError>;

    /// Stream `body` into the object at `path`, replacing any previous
    /// content. Returns the stored object's metadata, including the MD5
    /// computed server-side under [`headers::COMPUTED_MD5`].
    async fn put(
        &self,
        path: &str,
        body: ByteStream,
        opts: PutOptions,
    ) -> Result<StoreHeaders, StoreError>;

    /// Open the object at `path` for reading: its metadata plus a body
    /// stream. Directories yield their sentinel content type and an empty
    /// stream.
    async fn get(&self, path: &str) -> Result<(StoreHeaders, ByteStream), StoreError>;

    /// Remove the object or empty directory at `path`.
    async fn unlink(&self, path: &str) -> Result<(), StoreError>;

    /// Link `dst` to the object at `src` without copying bytes.
    async fn ln(&self, src: &str, dst: &str) -> Result<(), StoreError>;

    /// List the immediate children of the directory at `path`.
    async fn ls(&self, path: &str) -> Result<Ls, StoreError>;

    /// Identity that owns everything behind this store handle.
    fn user(&self) -> &str;
}
