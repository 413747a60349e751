//! Custom Axum extractors for S3 API validation
//!
//! These extractors validate bucket names and normalize object keys before
//! a handler runs, keeping that repetition out of the handlers themselves.

use super::errors::S3Error;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

/// Check a bucket name against the S3 naming rules: 3-63 characters drawn
/// from lowercase letters, digits, dots, and hyphens; starts and ends
/// alphanumeric; no empty dot-separated labels.
pub fn valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if !(3..=63).contains(&bytes.len()) {
        return false;
    }
    if !bytes[0].is_ascii_lowercase() && !bytes[0].is_ascii_digit() {
        return false;
    }
    let last = bytes[bytes.len() - 1];
    if !last.is_ascii_lowercase() && !last.is_ascii_digit() {
        return false;
    }
    if name.contains("..") || name.contains(".-") || name.contains("-.") {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'.' || *b == b'-')
}

/// Validated bucket extractor
///
/// Rejects syntactically invalid bucket names with `InvalidBucketName`
/// before the handler runs.
#[derive(Debug, Clone)]
pub struct ValidatedBucket(pub String);

impl std::ops::Deref for ValidatedBucket {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ValidatedBucket
where
    S: Send + Sync,
{
    type Rejection = S3Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(bucket): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| S3Error::InvalidBucketName(String::new()))?;

        if !valid_bucket_name(&bucket) {
            return Err(S3Error::InvalidBucketName(bucket));
        }

        Ok(ValidatedBucket(bucket))
    }
}

/// Validated bucket and key extractor
///
/// Validates the bucket name and normalizes the key by removing leading
/// slashes; keys never begin with `/` past this point.
#[derive(Debug, Clone)]
pub struct ValidatedPath {
    pub bucket: String,
    pub key: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for ValidatedPath
where
    S: Send + Sync,
{
    type Rejection = S3Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((bucket, key)): Path<(String, String)> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| S3Error::InvalidBucketName(String::new()))?;

        if !valid_bucket_name(&bucket) {
            return Err(S3Error::InvalidBucketName(bucket));
        }

        let key = key.trim_start_matches('/').to_string();

        Ok(ValidatedPath { bucket, key })
    }
}
