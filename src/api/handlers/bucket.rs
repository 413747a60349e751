//! Bucket-level S3 handlers: CREATE, DELETE, HEAD, LIST, and the
//! prefix/delimiter object listing.

use super::{is_directory, xml_response, AppState, S3Error, DEFAULT_MAX_KEYS};
use crate::api::extractors::ValidatedBucket;
use crate::api::xml::{
    BucketInfo, ListAllMyBucketsResult, ListBucketResult, ListMultipartUploadsResult, ObjectEntry,
};
use crate::codec::meta::storage_class_for;
use crate::codec::path::{relativize, split_prefix};
use crate::store::{LsEntry, StoreError};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Query parameters for bucket-level GET operations
#[derive(Debug, serde::Deserialize, Default)]
pub struct BucketGetQuery {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<u64>,
    /// Accepted for SDK compatibility; listings are unpaged.
    pub marker: Option<String>,
    /// ListMultipartUploads query parameter
    pub uploads: Option<String>,
}

/// Bucket-level GET handler - dispatches on query params
/// GET /{bucket}?uploads   -> ListMultipartUploads (fixed, empty)
/// GET /{bucket}?prefix=…  -> ListObjects
#[instrument(skip(state))]
pub async fn bucket_get_handler(
    State(state): State<Arc<AppState>>,
    ValidatedBucket(bucket): ValidatedBucket,
    Query(query): Query<BucketGetQuery>,
) -> Result<Response, S3Error> {
    if query.uploads.is_some() {
        info!("LIST multipart uploads: {}", bucket);
        let result = ListMultipartUploadsResult { bucket };
        let xml = result.to_xml(&state.options.xmlns, state.options.pretty_print);
        return Ok(xml_response(xml));
    }

    list_objects(&state, bucket, query).await
}

/// ListObjects within a bucket: walk the deepest ancestor directory of the
/// prefix and filter entries on the remaining tail.
async fn list_objects(
    state: &Arc<AppState>,
    bucket: String,
    query: BucketGetQuery,
) -> Result<Response, S3Error> {
    let opts = &state.options;
    let prefix = query.prefix.unwrap_or_default();

    info!("LIST {}/{}*", bucket, prefix);

    if let Some(delimiter) = query.delimiter.as_deref() {
        if delimiter != "/" {
            debug!("ignoring delimiter {:?}; listings always collapse on '/'", delimiter);
        }
    }

    // Consecutive slashes are unrepresentable as store paths; nothing can
    // match such a prefix.
    if prefix.contains("//") {
        let result = ListBucketResult::empty(bucket, prefix, DEFAULT_MAX_KEYS, state.owner());
        return Ok(xml_response(
            result.to_xml(&opts.xmlns, opts.pretty_print),
        ));
    }

    let (subdir, search_prefix) = split_prefix(&prefix);
    let dir = if subdir.is_empty() {
        opts.bucket_dir(&bucket)
    } else {
        format!("{}/{}", opts.bucket_dir(&bucket), subdir)
    };

    let ls = state.store.ls(&dir).await.map_err(list_error)?;
    let mut entries = ls.entries;

    // A client-supplied cap within the default bound stops the walk; a
    // larger value (or none) runs it unbounded.
    let capped = query.max_keys.is_some_and(|m| m <= DEFAULT_MAX_KEYS);
    let cap = query.max_keys.unwrap_or(DEFAULT_MAX_KEYS);

    let mut contents: Vec<ObjectEntry> = Vec::new();
    let mut common_prefixes: Vec<String> = Vec::new();
    let mut truncated = false;

    while let Some(entry) = entries.next().await {
        let entry = entry.map_err(list_error)?;
        // The walk starts in the deepest ancestor directory of the prefix;
        // only the tail below it is left to filter on.
        if !search_prefix.is_empty() && !entry.name().starts_with(search_prefix) {
            continue;
        }
        let rel_key = relativize(&bucket, entry.parent(), entry.name());
        if capped && (contents.len() + common_prefixes.len()) as u64 >= cap {
            truncated = true;
            break;
        }
        match entry {
            LsEntry::Object {
                size,
                mtime,
                durability,
                ..
            } => {
                contents.push(ObjectEntry {
                    key: rel_key,
                    last_modified: mtime,
                    etag: String::new(),
                    size,
                    storage_class: storage_class_for(durability, &opts.durability_to_class),
                });
            }
            LsEntry::Directory { .. } => {
                common_prefixes.push(format!("{rel_key}/"));
            }
        }
    }
    // Dropping the stream detaches the walk; the store drains it.
    drop(entries);

    let emitted = (contents.len() + common_prefixes.len()) as u64;
    let (max_keys, is_truncated) = if capped {
        (cap, truncated)
    } else {
        let reported = cap.max(contents.len() as u64);
        let store_saw_more = search_prefix.is_empty()
            && ls.result_set_size.is_some_and(|total| total > emitted);
        (reported, store_saw_more)
    };

    debug!(
        "listed {}/{}: {} objects, {} prefixes, truncated={}",
        bucket,
        prefix,
        contents.len(),
        common_prefixes.len(),
        is_truncated
    );

    let result = ListBucketResult {
        name: bucket,
        prefix,
        marker: query.marker.unwrap_or_default(),
        max_keys,
        is_truncated,
        contents,
        common_prefixes,
        owner: state.owner(),
    };
    Ok(xml_response(result.to_xml(&opts.xmlns, opts.pretty_print)))
}

/// Listing faults: a missing directory reads as access having been cut
/// off, anything else is internal.
fn list_error(err: StoreError) -> S3Error {
    match err {
        StoreError::NotFound(_) | StoreError::Forbidden(_) => S3Error::AllAccessDisabled,
        other => other.into(),
    }
}

/// CREATE bucket handler
/// PUT /{bucket}
#[instrument(skip(state))]
pub async fn create_bucket(
    State(state): State<Arc<AppState>>,
    ValidatedBucket(bucket): ValidatedBucket,
) -> Result<Response, S3Error> {
    info!("CREATE bucket {}", bucket);

    let dir = state.options.bucket_dir(&bucket);
    state
        .store
        .mkdir(&dir)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists(_) => S3Error::BucketAlreadyExists(bucket.clone()),
            other => other.into(),
        })?;

    Ok((StatusCode::OK, [("Location", format!("/{}", bucket))], "").into_response())
}

/// DELETE bucket handler
/// DELETE /{bucket}
#[instrument(skip(state))]
pub async fn delete_bucket(
    State(state): State<Arc<AppState>>,
    ValidatedBucket(bucket): ValidatedBucket,
) -> Result<Response, S3Error> {
    info!("DELETE bucket {}", bucket);

    let dir = state.options.bucket_dir(&bucket);

    // Bounded probe: one entry is enough to refuse the delete.
    let ls = state
        .store
        .ls(&dir)
        .await
        .map_err(|e| S3Error::bucket_store_error(e, &bucket))?;
    let mut entries = ls.entries;
    match entries.next().await {
        Some(Ok(_)) => return Err(S3Error::BucketNotEmpty(bucket)),
        Some(Err(e)) => return Err(S3Error::bucket_store_error(e, &bucket)),
        None => {}
    }
    drop(entries);

    state
        .store
        .unlink(&dir)
        .await
        .map_err(|e| S3Error::bucket_store_error(e, &bucket))?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// HEAD bucket handler
/// HEAD /{bucket}
#[instrument(skip(state))]
pub async fn head_bucket(
    State(state): State<Arc<AppState>>,
    ValidatedBucket(bucket): ValidatedBucket,
) -> Result<Response, S3Error> {
    info!("HEAD bucket {}", bucket);

    let headers = state
        .store
        .info(&state.options.bucket_dir(&bucket))
        .await
        .map_err(|e| S3Error::bucket_store_error(e, &bucket))?;
    if !is_directory(&headers) {
        return Err(S3Error::NoSuchBucket(bucket));
    }

    Ok(StatusCode::OK.into_response())
}

/// LIST buckets handler
/// GET /
#[instrument(skip(state))]
pub async fn list_buckets(State(state): State<Arc<AppState>>) -> Result<Response, S3Error> {
    info!("LIST buckets");

    // Consume the whole stream; the store pages internally.
    let ls = state.store.ls(&state.options.bucket_root).await?;
    let mut entries = ls.entries;
    let mut buckets = Vec::new();
    while let Some(entry) = entries.next().await {
        if let LsEntry::Directory { name, mtime, .. } = entry? {
            buckets.push(BucketInfo {
                name,
                creation_date: mtime,
            });
        }
    }

    let result = ListAllMyBucketsResult {
        owner: state.owner(),
        buckets,
    };
    let xml = result.to_xml(&state.options.xmlns, state.options.pretty_print);

    Ok(xml_response(xml))
}
