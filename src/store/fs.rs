//! Filesystem-backed tree store.
//!
//! Store layout:
//! ```text
//! {root}/{bucket}/{key path...}      # object data, one file per object
//! {root}/.canopy-meta/{same path}    # JSON metadata shadow tree
//! ```
//!
//! Object metadata (content type, MD5, durability level, `m-*` user headers)
//! lives in a shadow tree that mirrors the data tree, so directory listings
//! never see it. Writes are crash-only: stream to a temp file in the target
//! directory, fsync, rename.

use super::traits::{
    headers, ByteStream, Ls, LsEntry, PutOptions, StoreError, StoreHeaders, TreeStore,
    DIRECTORY_CONTENT_TYPE,
};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Name of the metadata shadow tree under the store root.
const META_DIR: &str = ".canopy-meta";

/// Prefix for in-flight upload temp files; listings skip these.
const TMP_PREFIX: &str = ".canopy-upload-";

/// ENOTEMPTY raw error code on Linux and macOS.
const ENOTEMPTY: i32 = 39;

/// Durability recorded when an upload carries no level.
const FALLBACK_DURABILITY: i32 = 2;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Sidecar metadata recorded for every stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    /// Base64-encoded MD5 of the content, computed while writing.
    md5: String,
    durability: i32,
    /// User metadata, keyed by the `m-*` suffix.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    user: HashMap<String, String>,
}

/// Tree store over a local directory.
pub struct FsStore {
    root: PathBuf,
    meta_root: PathBuf,
    user: String,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`, owned by `user`.
    pub async fn new(root: PathBuf, user: String) -> Result<Self, StoreError> {
        let meta_root = root.join(META_DIR);
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(&meta_root).await?;
        debug!(root = %root.display(), "filesystem store opened");
        Ok(Self {
            root,
            meta_root,
            user,
        })
    }

    /// Normalize a store path to a relative path under the root, rejecting
    /// traversal and reserved names.
    fn rel(&self, path: &str) -> Result<String, StoreError> {
        let mut segments = Vec::new();
        for seg in path.split('/') {
            match seg {
                "" => continue,
                "." | ".." => return Err(StoreError::InvalidPath(path.to_string())),
                s if s.starts_with(".canopy-") => {
                    return Err(StoreError::InvalidPath(path.to_string()))
                }
                s => segments.push(s),
            }
        }
        Ok(segments.join("/"))
    }

    fn data_path(&self, rel: &str) -> PathBuf {
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }

    fn meta_path(&self, rel: &str) -> PathBuf {
        self.meta_root.join(rel)
    }

    /// Store-path form of a relative path, used in listings and errors.
    fn store_path(rel: &str) -> String {
        format!("/{rel}")
    }

    async fn read_meta(&self, rel: &str) -> Option<ObjectMeta> {
        let bytes = fs::read(self.meta_path(rel)).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn write_meta(&self, rel: &str, meta: &ObjectMeta) -> Result<(), StoreError> {
        let path = self.meta_path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, serde_json::to_vec(meta)?).await?;
        Ok(())
    }

    fn object_headers(rel: &str, len: u64, mtime: DateTime<Utc>, meta: Option<ObjectMeta>) -> StoreHeaders {
        let mut h = StoreHeaders::new();
        h.insert(headers::CONTENT_LENGTH.to_string(), len.to_string());
        h.insert(headers::LAST_MODIFIED.to_string(), http_date(mtime));
        match meta {
            Some(meta) => {
                h.insert(
                    headers::CONTENT_TYPE.to_string(),
                    meta.content_type
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                );
                h.insert(headers::CONTENT_MD5.to_string(), meta.md5);
                h.insert(
                    headers::DURABILITY_LEVEL.to_string(),
                    meta.durability.to_string(),
                );
                for (key, value) in meta.user {
                    h.insert(format!("{}{}", headers::USER_META_PREFIX, key), value);
                }
            }
            None => {
                // Foreign file without a sidecar; report what the stat gives us.
                warn!(path = %Self::store_path(rel), "object has no metadata sidecar");
                h.insert(
                    headers::CONTENT_TYPE.to_string(),
                    "application/octet-stream".to_string(),
                );
            }
        }
        h
    }

    fn dir_headers(mtime: DateTime<Utc>) -> StoreHeaders {
        let mut h = StoreHeaders::new();
        h.insert(
            headers::CONTENT_TYPE.to_string(),
            DIRECTORY_CONTENT_TYPE.to_string(),
        );
        h.insert(headers::LAST_MODIFIED.to_string(), http_date(mtime));
        h
    }

    async fn stat_headers(&self, rel: &str) -> Result<StoreHeaders, StoreError> {
        let md = fs::metadata(self.data_path(rel))
            .await
            .map_err(|e| io_err(&Self::store_path(rel), e))?;
        let mtime = modified(&md);
        if md.is_dir() {
            Ok(Self::dir_headers(mtime))
        } else {
            let meta = self.read_meta(rel).await;
            Ok(Self::object_headers(rel, md.len(), mtime, meta))
        }
    }
}

#[async_trait]
impl TreeStore for FsStore {
    async fn info(&self, path: &str) -> Result<StoreHeaders, StoreError> {
        let rel = self.rel(path)?;
        self.stat_headers(&rel).await
    }

    async fn mkdir(&self, path: &str) -> Result<(), StoreError> {
        let rel = self.rel(path)?;
        let dir = self.data_path(&rel);
        match fs::create_dir(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // A directory already being there is fine; anything else
                // holds the name.
                let md = fs::metadata(&dir).await?;
                if md.is_dir() {
                    Ok(())
                } else {
                    Err(StoreError::AlreadyExists(Self::store_path(&rel)))
                }
            }
            Err(e) => Err(io_err(&Self::store_path(&rel), e)),
        }
    }

    async fn mkdirp(&self, path: &str) -> Result<(), StoreError> {
        let rel = self.rel(path)?;
        fs::create_dir_all(self.data_path(&rel))
            .await
            .map_err(|e| io_err(&Self::store_path(&rel), e))
    }

    async fn put(
        &self,
        path: &str,
        mut body: ByteStream,
        opts: PutOptions,
    ) -> Result<StoreHeaders, StoreError> {
        let rel = self.rel(path)?;
        let data = self.data_path(&rel);
        let parent = data
            .parent()
            .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;

        // The gateway creates parents before uploading; a missing parent
        // here is the caller's 404.
        let parent_md = fs::metadata(parent)
            .await
            .map_err(|e| io_err(&Self::store_path(&rel), e))?;
        if !parent_md.is_dir() {
            return Err(StoreError::NotFound(Self::store_path(&rel)));
        }

        let tmp = parent.join(format!(
            "{}{}-{}",
            TMP_PREFIX,
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let result = write_streamed(&tmp, &mut body).await;
        let (written, digest) = match result {
            Ok(ok) => ok,
            Err(e) => {
                let _ = fs::remove_file(&tmp).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&tmp, &data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_err(&Self::store_path(&rel), e));
        }

        let md5_b64 = base64::engine::general_purpose::STANDARD.encode(digest);
        let durability = opts
            .headers
            .get(headers::X_DURABILITY_LEVEL)
            .and_then(|v| v.parse().ok())
            .unwrap_or(FALLBACK_DURABILITY);
        let meta = ObjectMeta {
            content_type: opts.headers.get(headers::CONTENT_TYPE).cloned(),
            md5: md5_b64.clone(),
            durability,
            user: opts
                .headers
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(headers::USER_META_PREFIX)
                        .map(|suffix| (suffix.to_string(), v.clone()))
                })
                .collect(),
        };
        self.write_meta(&rel, &meta).await?;

        debug!(path = %Self::store_path(&rel), bytes = written, "stored object");

        let mut h = Self::object_headers(&rel, written, Utc::now(), Some(meta));
        h.insert(headers::COMPUTED_MD5.to_string(), md5_b64);
        Ok(h)
    }

    async fn get(&self, path: &str) -> Result<(StoreHeaders, ByteStream), StoreError> {
        let rel = self.rel(path)?;
        let h = self.stat_headers(&rel).await?;
        if h.get(headers::CONTENT_TYPE).map(String::as_str) == Some(DIRECTORY_CONTENT_TYPE) {
            return Ok((h, futures::stream::empty().boxed()));
        }
        let file = fs::File::open(self.data_path(&rel))
            .await
            .map_err(|e| io_err(&Self::store_path(&rel), e))?;
        Ok((h, ReaderStream::new(file).boxed()))
    }

    async fn unlink(&self, path: &str) -> Result<(), StoreError> {
        let rel = self.rel(path)?;
        let data = self.data_path(&rel);
        let md = fs::metadata(&data)
            .await
            .map_err(|e| io_err(&Self::store_path(&rel), e))?;
        if md.is_dir() {
            fs::remove_dir(&data).await.map_err(|e| {
                if e.raw_os_error() == Some(ENOTEMPTY) {
                    StoreError::NotEmpty(Self::store_path(&rel))
                } else {
                    io_err(&Self::store_path(&rel), e)
                }
            })?;
            // Shadow directory may or may not exist; either is fine.
            let _ = fs::remove_dir(self.meta_path(&rel)).await;
        } else {
            fs::remove_file(&data)
                .await
                .map_err(|e| io_err(&Self::store_path(&rel), e))?;
            let _ = fs::remove_file(self.meta_path(&rel)).await;
        }
        Ok(())
    }

    async fn ln(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let src_rel = self.rel(src)?;
        let dst_rel = self.rel(dst)?;
        let src_data = self.data_path(&src_rel);
        let dst_data = self.data_path(&dst_rel);

        let md = fs::metadata(&src_data)
            .await
            .map_err(|e| io_err(&Self::store_path(&src_rel), e))?;
        if md.is_dir() {
            return Err(StoreError::InvalidPath(src.to_string()));
        }

        // Links replace whatever was at the destination.
        let _ = fs::remove_file(&dst_data).await;
        fs::hard_link(&src_data, &dst_data)
            .await
            .map_err(|e| io_err(&Self::store_path(&dst_rel), e))?;

        let dst_meta = self.meta_path(&dst_rel);
        if let Some(parent) = dst_meta.parent() {
            fs::create_dir_all(parent).await?;
        }
        let _ = fs::remove_file(&dst_meta).await;
        if let Err(e) = fs::hard_link(self.meta_path(&src_rel), &dst_meta).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(StoreError::Io(e));
            }
        }
        Ok(())
    }

    async fn ls(&self, path: &str) -> Result<Ls, StoreError> {
        let rel = self.rel(path)?;
        let dir = self.data_path(&rel);
        let parent = Self::store_path(&rel);

        let mut names = Vec::new();
        let mut rd = fs::read_dir(&dir)
            .await
            .map_err(|e| io_err(&parent, e))?;
        while let Some(entry) = rd.next_entry().await.map_err(StoreError::Io)? {
            if let Ok(name) = entry.file_name().into_string() {
                if !name.starts_with(".canopy-") {
                    names.push(name);
                }
            }
        }
        names.sort();
        let result_set_size = names.len() as u64;

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<LsEntry, StoreError>>(64);
        let store_root = self.root.clone();
        let meta_root = self.meta_root.clone();
        tokio::spawn(async move {
            for name in names {
                let full = dir.join(&name);
                let md = match fs::metadata(&full).await {
                    Ok(md) => md,
                    // Entry raced with a delete; skip it.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        let _ = tx.send(Err(StoreError::Io(e))).await;
                        return;
                    }
                };
                let mtime = modified(&md);
                let entry = if md.is_dir() {
                    LsEntry::Directory {
                        name,
                        parent: parent.clone(),
                        mtime,
                    }
                } else {
                    let durability = sidecar_durability(&store_root, &meta_root, &full).await;
                    LsEntry::Object {
                        name,
                        parent: parent.clone(),
                        size: md.len(),
                        mtime,
                        durability,
                    }
                };
                if tx.send(Ok(entry)).await.is_err() {
                    // Receiver dropped: the consumer closed the listing early.
                    return;
                }
            }
        });

        Ok(Ls {
            result_set_size: Some(result_set_size),
            entries: ReceiverStream::new(rx).boxed(),
        })
    }

    fn user(&self) -> &str {
        &self.user
    }
}

/// Stream `body` into a freshly created file, returning the byte count and
/// MD5 digest of everything written.
async fn write_streamed(
    tmp: &Path,
    body: &mut ByteStream,
) -> Result<(u64, [u8; 16]), StoreError> {
    let mut file = fs::File::create(tmp).await?;
    let mut hasher = Md5::new();
    let mut written: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.sync_all().await?;
    Ok((written, hasher.finalize().into()))
}

/// Durability from an object's sidecar, if it has one.
async fn sidecar_durability(root: &Path, meta_root: &Path, data: &Path) -> Option<i32> {
    let rel = data.strip_prefix(root).ok()?;
    let bytes = fs::read(meta_root.join(rel)).await.ok()?;
    let meta: ObjectMeta = serde_json::from_slice(&bytes).ok()?;
    Some(meta.durability)
}

fn io_err(path: &str, e: std::io::Error) -> StoreError {
    match e.kind() {
        std::io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
        std::io::ErrorKind::PermissionDenied => StoreError::Forbidden(path.to_string()),
        _ => StoreError::Io(e),
    }
}

fn modified(md: &std::fs::Metadata) -> DateTime<Utc> {
    md.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

fn http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
