//! Object-level S3 handlers: GET, HEAD, PUT (with copy detection), DELETE,
//! and the fixed ACL responses.
//!
//! Uploads and downloads are piped: the request body streams into the
//! store's put and the store's get streams into the response, chunk by
//! chunk, with backpressure carried end to end.

use super::{
    extract_content_type, hval, is_directory, parse_store_date, xml_response, AppState, S3Error,
};
use crate::api::extractors::ValidatedPath;
use crate::api::xml::{AccessControlPolicy, CopyObjectResult};
use crate::codec::meta::{
    md5_base64_to_etag, request_headers_to_store, store_headers_to_response,
};
use crate::codec::path::sanitize;
use crate::store::{headers as store_keys, ByteStream, PutOptions, StoreError};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Query parameters for object-level operations
#[derive(Debug, serde::Deserialize, Default)]
pub struct ObjectQuery {
    /// GetAcl / PutAcl (with ?acl)
    pub acl: Option<String>,
    /// Multipart surface; mutations are not implemented
    pub uploads: Option<String>,
    #[serde(rename = "uploadId")]
    pub upload_id: Option<String>,
    #[serde(rename = "partNumber")]
    pub part_number: Option<u32>,
}

impl ObjectQuery {
    fn is_multipart(&self) -> bool {
        self.uploads.is_some() || self.upload_id.is_some() || self.part_number.is_some()
    }
}

/// Return the bucket's store directory, failing with `NoSuchBucket` when it
/// does not exist.
async fn require_bucket(state: &Arc<AppState>, bucket: &str) -> Result<String, S3Error> {
    let dir = state.options.bucket_dir(bucket);
    let headers = state
        .store
        .info(&dir)
        .await
        .map_err(|e| S3Error::bucket_store_error(e, bucket))?;
    if !is_directory(&headers) {
        return Err(S3Error::NoSuchBucket(bucket.to_string()));
    }
    Ok(dir)
}

/// Make sure the parent directory of `object_path` exists, creating the
/// chain below the bucket when needed. The bucket itself must already
/// exist.
async fn ensure_parent(
    state: &Arc<AppState>,
    bucket: &str,
    object_path: &str,
) -> Result<(), S3Error> {
    let parent = match object_path.rfind('/') {
        Some(idx) => &object_path[..idx],
        None => return Err(S3Error::InvalidKey(object_path.to_string())),
    };
    let bucket_dir = state.options.bucket_dir(bucket);

    match state.store.info(parent).await {
        // An object already holding a prefix segment makes the key
        // unmappable.
        Ok(h) if !is_directory(&h) => Err(S3Error::InvalidKey(object_path.to_string())),
        Ok(_) => Ok(()),
        Err(StoreError::NotFound(_)) => {
            if parent == bucket_dir {
                return Err(S3Error::NoSuchBucket(bucket.to_string()));
            }
            match state.store.info(&bucket_dir).await {
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {
                    return Err(S3Error::NoSuchBucket(bucket.to_string()))
                }
                Err(e) => return Err(e.into()),
            }
            // A permission failure here surfaces as AllAccessDisabled.
            state.store.mkdirp(parent).await.map_err(S3Error::from)
        }
        Err(e) => Err(e.into()),
    }
}

/// PUT object handler (internal)
/// Called by put_object_or_copy after dispatch
#[instrument(skip(state, headers, body))]
async fn put_object_inner(
    state: &Arc<AppState>,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    info!("PUT {}/{}", bucket, key);

    let path = state.options.object_path(bucket, key)?;
    ensure_parent(state, bucket, &path).await?;

    let mut store_headers =
        request_headers_to_store(headers, &state.options.class_to_durability, state.options.default_durability);
    if let Some(ct) = extract_content_type(headers) {
        store_headers.insert(store_keys::CONTENT_TYPE.to_string(), ct);
    }
    if let Some(md5) = headers.get("content-md5").and_then(|v| v.to_str().ok()) {
        store_headers.insert(store_keys::CONTENT_MD5.to_string(), md5.to_string());
    }
    let content_length = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    let stream: ByteStream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)))
        .boxed();

    let result = state
        .store
        .put(
            &path,
            stream,
            PutOptions {
                content_length,
                headers: store_headers,
            },
        )
        .await
        .map_err(|e| S3Error::object_store_error(e, key))?;

    let etag = result
        .get(store_keys::COMPUTED_MD5)
        .and_then(|md5| md5_base64_to_etag(md5))
        .map(|hex| format!("\"{hex}\""))
        .ok_or_else(|| S3Error::InternalError("store reported no MD5 for upload".to_string()))?;

    debug!("stored {}/{} etag={}", bucket, key, etag);

    Ok((StatusCode::OK, [("ETag", etag)], "").into_response())
}

/// COPY object handler (internal)
/// Called by put_object_or_copy when x-amz-copy-source is present
#[instrument(skip(state, headers))]
async fn copy_object_inner(
    state: &Arc<AppState>,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
) -> Result<Response, S3Error> {
    let copy_source = headers
        .get("x-amz-copy-source")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| S3Error::InvalidKey("x-amz-copy-source".to_string()))?;

    // Source arrives URL-encoded as /bucket/key or bucket/key.
    let copy_source = urlencoding::decode(copy_source)
        .map_err(|_| S3Error::InvalidKey(copy_source.to_string()))?;
    let budget = state
        .options
        .max_path_length
        .saturating_sub(state.options.bucket_root.len() + 1);
    let source = sanitize(&copy_source, budget)?;
    if !source.contains('/') {
        return Err(S3Error::InvalidKey(source));
    }

    info!("COPY {} -> {}/{}", source, bucket, key);

    let src_path = format!("{}/{}", state.options.bucket_root, source);

    // A missing source is terminal: nothing is written after this 404.
    let src_info = state
        .store
        .info(&src_path)
        .await
        .map_err(|e| S3Error::object_store_error(e, &source))?;
    if is_directory(&src_info) {
        return Err(S3Error::NoSuchKey(source));
    }

    let etag = src_info
        .get(store_keys::CONTENT_MD5)
        .and_then(|md5| md5_base64_to_etag(md5))
        .map(|hex| format!("\"{hex}\""))
        .unwrap_or_default();
    let last_modified = parse_store_date(&src_info);

    let dst_path = state.options.object_path(bucket, key)?;
    ensure_parent(state, bucket, &dst_path).await?;

    state
        .store
        .ln(&src_path, &dst_path)
        .await
        .map_err(|e| S3Error::object_store_error(e, &source))?;

    debug!("linked {} -> {}", src_path, dst_path);

    let result = CopyObjectResult {
        etag,
        last_modified,
    };
    Ok(xml_response(result.to_xml(
        &state.options.xmlns,
        state.options.pretty_print,
    )))
}

/// PUT object handler with copy and ACL dispatch
/// PUT /{bucket}/{key}                     -> PutObject
/// PUT /{bucket}/{key} + x-amz-copy-source -> CopyObject
/// PUT /{bucket}/{key}?acl                 -> PutAcl (no side effect)
#[instrument(skip(state, headers, body))]
pub async fn put_object_or_copy(
    State(state): State<Arc<AppState>>,
    ValidatedPath { bucket, key }: ValidatedPath,
    Query(query): Query<ObjectQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    if query.acl.is_some() {
        info!("PUT acl {}/{} (ignored)", bucket, key);
        return Ok(StatusCode::OK.into_response());
    }
    if query.is_multipart() {
        return Err(S3Error::NotImplemented(
            "Multipart upload is not supported.".to_string(),
        ));
    }

    let metadata_directive = headers
        .get("x-amz-metadata-directive")
        .and_then(|v| v.to_str().ok());
    if headers.contains_key("x-amz-copy-source") || metadata_directive == Some("COPY") {
        copy_object_inner(&state, &bucket, &key, &headers).await
    } else {
        put_object_inner(&state, &bucket, &key, &headers, body).await
    }
}

/// GET object handler with ACL dispatch
/// GET /{bucket}/{key}      -> GetObject (streamed body)
/// GET /{bucket}/{key}?acl  -> GetAcl (fixed policy)
#[instrument(skip(state))]
pub async fn object_get_handler(
    State(state): State<Arc<AppState>>,
    ValidatedPath { bucket, key }: ValidatedPath,
    Query(query): Query<ObjectQuery>,
) -> Result<Response, S3Error> {
    if query.acl.is_some() {
        info!("GET acl {}/{}", bucket, key);
        let policy = AccessControlPolicy {
            owner: state.owner(),
        };
        return Ok(xml_response(policy.to_xml(
            &state.options.xmlns,
            state.options.pretty_print,
        )));
    }
    if query.is_multipart() {
        return Err(S3Error::NotImplemented(
            "Multipart upload is not supported.".to_string(),
        ));
    }

    info!("GET {}/{}", bucket, key);

    require_bucket(&state, &bucket).await?;
    let path = state.options.object_path(&bucket, &key)?;

    let (store_headers, stream) = match state.store.get(&path).await {
        Ok(ok) => ok,
        // Plain 404, no error body, for object reads.
        Err(StoreError::NotFound(_)) => return Ok(StatusCode::NOT_FOUND.into_response()),
        Err(e) => return Err(e.into()),
    };
    if is_directory(&store_headers) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let headers = store_headers_to_response(&store_headers, &state.options.durability_to_class);
    Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}

/// HEAD object handler
/// HEAD /{bucket}/{key}
#[instrument(skip(state))]
pub async fn head_object(
    State(state): State<Arc<AppState>>,
    ValidatedPath { bucket, key }: ValidatedPath,
) -> Result<Response, S3Error> {
    info!("HEAD {}/{}", bucket, key);

    require_bucket(&state, &bucket).await?;
    let path = state.options.object_path(&bucket, &key)?;

    let store_headers = match state.store.info(&path).await {
        Ok(h) => h,
        Err(StoreError::NotFound(_)) => return Ok(StatusCode::NOT_FOUND.into_response()),
        Err(e) => return Err(e.into()),
    };
    if is_directory(&store_headers) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let headers = store_headers_to_response(&store_headers, &state.options.durability_to_class);
    Ok((StatusCode::OK, headers).into_response())
}

/// DELETE object handler
/// DELETE /{bucket}/{key}
#[instrument(skip(state))]
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    ValidatedPath { bucket, key }: ValidatedPath,
    Query(query): Query<ObjectQuery>,
) -> Result<Response, S3Error> {
    if query.is_multipart() {
        return Err(S3Error::NotImplemented(
            "Multipart upload is not supported.".to_string(),
        ));
    }

    info!("DELETE {}/{}", bucket, key);

    let path = state.options.object_path(&bucket, &key)?;
    state
        .store
        .unlink(&path)
        .await
        .map_err(|e| S3Error::object_store_error(e, &key))?;

    debug!("deleted {}/{}", bucket, key);

    let mut headers = HeaderMap::new();
    headers.insert("x-amz-delete-marker", hval("false"));
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}

/// POST /{bucket}/{key} — only multipart operations arrive here, and those
/// are not supported.
#[instrument]
pub async fn object_post_handler(
    ValidatedPath { bucket, key }: ValidatedPath,
) -> Result<Response, S3Error> {
    info!("POST {}/{} rejected", bucket, key);
    Err(S3Error::NotImplemented(
        "Multipart upload is not supported.".to_string(),
    ))
}
