//! Metadata header projection between the S3 and store namespaces.
//!
//! `x-amz-meta-*` ↔ `m-*`, storage class ↔ durability level, and the
//! base64-MD5 ↔ hex-ETag codec. Header names arrive lowercased from the
//! HTTP layer; suffixes are carried verbatim.

use crate::store::{headers as store_keys, StoreHeaders};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use base64::Engine;
use std::collections::HashMap;

pub const AMZ_META_PREFIX: &str = "x-amz-meta-";
pub const AMZ_STORAGE_CLASS: &str = "x-amz-storage-class";
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";

/// Project client request headers into the store metadata namespace:
/// `x-amz-meta-X` becomes `m-X`, and the requested storage class resolves
/// through `class_to_durability` (falling back to `default_durability`)
/// into `x-durability-level`.
pub fn request_headers_to_store(
    h: &HeaderMap,
    class_to_durability: &HashMap<String, i32>,
    default_durability: i32,
) -> StoreHeaders {
    let mut out = StoreHeaders::new();

    for (name, value) in h {
        if let Some(suffix) = name.as_str().strip_prefix(AMZ_META_PREFIX) {
            if let Ok(v) = value.to_str() {
                out.insert(
                    format!("{}{}", store_keys::USER_META_PREFIX, suffix),
                    v.to_string(),
                );
            }
        }
    }

    let durability = h
        .get(AMZ_STORAGE_CLASS)
        .and_then(|v| v.to_str().ok())
        .and_then(|class| class_to_durability.get(class).copied())
        .unwrap_or(default_durability);
    out.insert(
        store_keys::X_DURABILITY_LEVEL.to_string(),
        durability.to_string(),
    );

    out
}

/// Project store object metadata into S3 response headers: `m-X` becomes
/// `x-amz-meta-X`, the durability level translates to a storage class,
/// `content-length`/`content-type`/`last-modified` propagate, and `ETag`
/// derives from the stored MD5.
pub fn store_headers_to_response(
    h: &StoreHeaders,
    durability_to_class: &HashMap<String, String>,
) -> HeaderMap {
    let mut out = HeaderMap::new();

    if let Some(len) = h.get(store_keys::CONTENT_LENGTH) {
        if len.parse::<u64>().is_ok() {
            out.insert("content-length", hval(len));
        }
    }
    if let Some(ct) = h.get(store_keys::CONTENT_TYPE) {
        out.insert("content-type", hval(ct));
    }
    if let Some(lm) = h.get(store_keys::LAST_MODIFIED) {
        out.insert("last-modified", hval(lm));
    }
    if let Some(md5) = h.get(store_keys::CONTENT_MD5) {
        if let Some(etag) = md5_base64_to_etag(md5) {
            out.insert("etag", hval(&format!("\"{etag}\"")));
        }
    }

    let class = h
        .get(store_keys::DURABILITY_LEVEL)
        .and_then(|level| durability_to_class.get(level))
        .map(String::as_str)
        .unwrap_or(DEFAULT_STORAGE_CLASS);
    out.insert(AMZ_STORAGE_CLASS, hval(class));

    for (key, value) in h {
        if let Some(suffix) = key.strip_prefix(store_keys::USER_META_PREFIX) {
            let name = format!("{AMZ_META_PREFIX}{suffix}");
            if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                out.insert(name, hval(value));
            }
        }
    }

    out
}

/// Storage class for a listing entry's durability level.
pub fn storage_class_for(
    durability: Option<i32>,
    durability_to_class: &HashMap<String, String>,
) -> String {
    durability
        .and_then(|level| durability_to_class.get(&level.to_string()))
        .cloned()
        .unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_string())
}

/// Base64 MD5 (as the store reports it) to the hex digest S3 uses in ETags.
pub fn md5_base64_to_etag(s: &str) -> Option<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(s.trim())
        .ok()?;
    Some(hex::encode(bytes))
}

/// Hex ETag (unquoted) back to the store's base64 MD5 form.
pub fn etag_to_md5_base64(etag: &str) -> Option<String> {
    let bytes = hex::decode(etag.trim_matches('"')).ok()?;
    Some(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn hval(s: &str) -> HeaderValue {
    HeaderValue::from_bytes(s.as_bytes()).unwrap_or_else(|_| HeaderValue::from_static(""))
}
