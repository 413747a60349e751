//! S3 error types and XML responses

use super::xml::escape_xml;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// S3 API errors
#[derive(Debug, Error)]
pub enum S3Error {
    #[error("NoSuchBucket: The specified bucket does not exist.")]
    NoSuchBucket(String),

    #[error("NoSuchKey: The specified key does not exist.")]
    NoSuchKey(String),

    #[error("BucketAlreadyExists: The requested bucket name is not available.")]
    BucketAlreadyExists(String),

    #[error("BucketNotEmpty: The bucket you tried to delete is not empty.")]
    BucketNotEmpty(String),

    #[error("InvalidBucketName: The specified bucket is not valid.")]
    InvalidBucketName(String),

    #[error("InvalidKey: The specified key cannot be mapped to storage.")]
    InvalidKey(String),

    #[error("KeyTooLong: Your key is too long.")]
    KeyTooLong(String),

    #[error("AllAccessDisabled: All access to this resource has been disabled.")]
    AllAccessDisabled,

    #[error("NotImplemented: {0}")]
    NotImplemented(String),

    #[error("InternalError: We encountered an internal error. Please try again.")]
    InternalError(String),
}

impl S3Error {
    /// Get the S3 error code
    pub fn code(&self) -> &'static str {
        match self {
            S3Error::NoSuchBucket(_) => "NoSuchBucket",
            S3Error::NoSuchKey(_) => "NoSuchKey",
            S3Error::BucketAlreadyExists(_) => "BucketAlreadyExists",
            S3Error::BucketNotEmpty(_) => "BucketNotEmpty",
            S3Error::InvalidBucketName(_) => "InvalidBucketName",
            S3Error::InvalidKey(_) => "InvalidKey",
            S3Error::KeyTooLong(_) => "KeyTooLong",
            S3Error::AllAccessDisabled => "AllAccessDisabled",
            S3Error::NotImplemented(_) => "NotImplemented",
            S3Error::InternalError(_) => "InternalError",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            S3Error::NoSuchBucket(_) => StatusCode::NOT_FOUND,
            S3Error::NoSuchKey(_) => StatusCode::NOT_FOUND,
            S3Error::BucketAlreadyExists(_) => StatusCode::CONFLICT,
            S3Error::BucketNotEmpty(_) => StatusCode::CONFLICT,
            S3Error::InvalidBucketName(_) => StatusCode::BAD_REQUEST,
            S3Error::InvalidKey(_) => StatusCode::BAD_REQUEST,
            S3Error::KeyTooLong(_) => StatusCode::BAD_REQUEST,
            S3Error::AllAccessDisabled => StatusCode::FORBIDDEN,
            S3Error::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            S3Error::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generate XML error response
    pub fn to_xml(&self) -> String {
        let resource = match self {
            S3Error::NoSuchBucket(name)
            | S3Error::BucketAlreadyExists(name)
            | S3Error::BucketNotEmpty(name)
            | S3Error::InvalidBucketName(name) => escape_xml(name),
            S3Error::NoSuchKey(key) | S3Error::InvalidKey(key) | S3Error::KeyTooLong(key) => {
                escape_xml(key)
            }
            _ => String::new(),
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
    <Code>{}</Code>
    <Message>{}</Message>
    <Resource>{}</Resource>
    <RequestId>00000000-0000-0000-0000-000000000000</RequestId>
</Error>"#,
            self.code(),
            self,
            resource
        )
    }

    /// Map a store failure on a bucket-level operation.
    pub fn bucket_store_error(err: crate::store::StoreError, bucket: &str) -> Self {
        use crate::store::StoreError;
        match err {
            StoreError::NotFound(_) => S3Error::NoSuchBucket(bucket.to_string()),
            StoreError::NotEmpty(_) => S3Error::BucketNotEmpty(bucket.to_string()),
            other => other.into(),
        }
    }

    /// Map a store failure on an object-level operation.
    pub fn object_store_error(err: crate::store::StoreError, key: &str) -> Self {
        use crate::store::StoreError;
        match err {
            StoreError::NotFound(_) => S3Error::NoSuchKey(key.to_string()),
            StoreError::InvalidPath(_) => S3Error::InvalidKey(key.to_string()),
            other => other.into(),
        }
    }
}

impl From<crate::codec::path::KeyError> for S3Error {
    fn from(err: crate::codec::path::KeyError) -> Self {
        use crate::codec::path::KeyError;
        match err {
            KeyError::Invalid(key) => S3Error::InvalidKey(key),
            KeyError::TooLong(key) => S3Error::KeyTooLong(key),
        }
    }
}

impl From<crate::store::StoreError> for S3Error {
    fn from(err: crate::store::StoreError) -> Self {
        use crate::store::StoreError;
        match err {
            StoreError::Forbidden(_) => S3Error::AllAccessDisabled,
            // Keep the underlying status in the payload for the log line.
            other => S3Error::InternalError(format!("status {}: {}", other.status(), other)),
        }
    }
}

impl IntoResponse for S3Error {
    fn into_response(self) -> Response {
        if let S3Error::InternalError(ref detail) = self {
            tracing::warn!("internal error surfaced to client: {detail}");
        }
        let status = self.status_code();
        let body = self.to_xml();

        (status, [("Content-Type", "application/xml")], body).into_response()
    }
}
