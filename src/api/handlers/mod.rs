//! S3 API request handlers
//!
//! Split into submodules by domain:
//! - `object` — GET, HEAD, PUT (with copy detection), DELETE, fixed ACLs
//! - `bucket` — Bucket CRUD and the prefix/delimiter listing

mod bucket;
mod object;

use super::errors::S3Error;
use crate::config::Config;
use crate::store::TreeStore;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

// Re-export all public handlers and types so callers don't change.
pub use bucket::{
    bucket_get_handler, create_bucket, delete_bucket, head_bucket, list_buckets, BucketGetQuery,
};
pub use object::{
    delete_object, head_object, object_get_handler, object_post_handler, put_object_or_copy,
    ObjectQuery,
};

/// Largest listing the gateway returns when the client caps it, and the
/// floor for the reported `MaxKeys` when it does not.
pub const DEFAULT_MAX_KEYS: u64 = 1000;

/// Read-only translation settings, fixed at startup.
pub struct GatewayOptions {
    /// Store directory whose children are the buckets.
    pub bucket_root: String,
    pub default_durability: i32,
    /// Maximum length of a full store path.
    pub max_path_length: usize,
    pub pretty_print: bool,
    /// Namespace for every response document.
    pub xmlns: String,
    pub class_to_durability: HashMap<String, i32>,
    pub durability_to_class: HashMap<String, String>,
}

impl GatewayOptions {
    pub fn from_config(config: &Config) -> Self {
        let trimmed = config.bucket_path.trim_matches('/');
        let bucket_root = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self {
            bucket_root,
            default_durability: config.default_durability,
            max_path_length: config.max_filename_length,
            pretty_print: config.pretty_print,
            xmlns: format!("http://s3.amazonaws.com/doc/{}/", config.s3_version),
            class_to_durability: config.storage_class_mapping_to_durability.clone(),
            durability_to_class: config.durability_mapping_to_storage_class.clone(),
        }
    }

    /// Store directory backing `bucket`.
    pub fn bucket_dir(&self, bucket: &str) -> String {
        format!("{}/{}", self.bucket_root, bucket)
    }

    /// Store path for an object, validating the key on the way. The length
    /// budget handed to `sanitize` accounts for the root and bucket
    /// segments so the whole path honors `max_path_length`.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<String, S3Error> {
        let budget = self
            .max_path_length
            .saturating_sub(self.bucket_root.len() + bucket.len() + 2);
        let clean = crate::codec::path::sanitize(key, budget)?;
        Ok(crate::codec::path::join_object(
            &self.bucket_root,
            bucket,
            &clean,
        ))
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn TreeStore>,
    pub options: GatewayOptions,
}

impl AppState {
    pub fn owner(&self) -> super::xml::Owner {
        super::xml::Owner::new(self.store.user())
    }
}

// ---------------------------------------------------------------------------
// Shared utility functions used across handler submodules
// ---------------------------------------------------------------------------

fn hval(s: &str) -> HeaderValue {
    HeaderValue::from_bytes(s.as_bytes()).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Build an XML response with correct Content-Type header.
fn xml_response(xml: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        [("Content-Type", "application/xml")],
        xml.into(),
    )
        .into_response()
}

/// Parse the store's RFC 1123 `last-modified` value; absent or malformed
/// stamps fall back to now.
fn parse_store_date(headers: &crate::store::StoreHeaders) -> DateTime<Utc> {
    headers
        .get(crate::store::headers::LAST_MODIFIED)
        .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// True when store metadata describes a directory rather than an object.
fn is_directory(headers: &crate::store::StoreHeaders) -> bool {
    headers
        .get(crate::store::headers::CONTENT_TYPE)
        .map(String::as_str)
        == Some(crate::store::DIRECTORY_CONTENT_TYPE)
}

/// Extract Content-Type header as an owned String.
fn extract_content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
