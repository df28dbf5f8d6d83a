// ABOUTME: Storage error types
// ABOUTME: Shared by document stores, object stores and their adapters

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("Document already exists: {collection}/{id}")]
    Duplicate { collection: String, id: String },
    #[error("Revision conflict on {collection}/{id}: expected {expected}, found {actual}")]
    Conflict {
        collection: String,
        id: String,
        expected: i64,
        actual: i64,
    },
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    #[error("Object not found: {0}")]
    ObjectNotFound(String),
    /// Temporary backend failure (network, throttling)
    #[error("Backend error: {0}")]
    Backend(String),
    /// The backend refused the request; retrying will not help
    #[error("Request rejected by backend: {0}")]
    Rejected(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StorageError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::ObjectNotFound(_)
        )
    }

    /// Errors worth retrying: timeouts, backend hiccups and pool exhaustion
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Timeout { .. } | StorageError::Backend(_) => true,
            StorageError::Sqlx(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(StorageError::not_found("tasks", "t1").is_not_found());
        assert!(StorageError::ObjectNotFound("k".into()).is_not_found());
        assert!(StorageError::Backend("throttled".into()).is_transient());
        assert!(StorageError::Timeout {
            operation: "get tasks/t1".into(),
            after: Duration::from_millis(5),
        }
        .is_transient());
        assert!(!StorageError::InvalidQuery("bad".into()).is_transient());
        assert!(!StorageError::Rejected("access denied".into()).is_transient());
        assert!(StorageError::Sqlx(sqlx::Error::PoolTimedOut).is_transient());
    }
}
