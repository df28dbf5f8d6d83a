// ABOUTME: Cloud storage error types
// ABOUTME: Classifies S3 SDK failures into retryable and permanent errors

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use estately_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Cloud provider error: {0}")]
    Provider(String),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Presigning failed: {0}")]
    Presign(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CloudResult<T> = Result<T, CloudError>;

impl CloudError {
    pub fn config(msg: impl Into<String>) -> Self {
        CloudError::Configuration(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CloudError::Network(_))
    }

    /// Map an SDK failure for `key`, treating 404 as `NotFound` and
    /// throttling, 5xx and transport failures as retryable
    pub fn from_sdk<E>(err: SdkError<E, HttpResponse>, key: &str) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let status = match &err {
            SdkError::ServiceError(ctx) => Some(ctx.raw().status().as_u16()),
            SdkError::ResponseError(ctx) => Some(ctx.raw().status().as_u16()),
            _ => None,
        };
        let message = format!("{}", DisplayErrorContext(&err));

        match (&err, status) {
            (SdkError::TimeoutError(_) | SdkError::DispatchFailure(_), _) => {
                CloudError::Network(message)
            }
            (_, Some(404)) => CloudError::NotFound(key.to_string()),
            (_, Some(401 | 403)) => CloudError::AccessDenied(message),
            (_, Some(code)) => Self::from_status(code, message),
            _ => CloudError::Provider(message),
        }
    }

    fn from_status(code: u16, message: String) -> Self {
        if code == 429 || code >= 500 {
            CloudError::Network(message)
        } else {
            CloudError::Provider(message)
        }
    }
}

impl From<CloudError> for StorageError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::NotFound(key) => StorageError::ObjectNotFound(key),
            CloudError::Network(msg) => StorageError::Backend(msg),
            other => StorageError::Rejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(CloudError::from_status(503, "unavailable".into()).is_retryable());
        assert!(CloudError::from_status(429, "slow down".into()).is_retryable());
        assert!(!CloudError::from_status(400, "bad request".into()).is_retryable());
    }

    #[test]
    fn test_storage_error_mapping() {
        let missing: StorageError = CloudError::NotFound("k".into()).into();
        assert!(matches!(missing, StorageError::ObjectNotFound(ref k) if k == "k"));

        let flaky: StorageError = CloudError::Network("reset".into()).into();
        assert!(flaky.is_transient());

        let denied: StorageError = CloudError::AccessDenied("nope".into()).into();
        assert!(!denied.is_transient());
    }
}
