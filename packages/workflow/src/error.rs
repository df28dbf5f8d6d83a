// ABOUTME: Workflow error taxonomy
// ABOUTME: Separates fatal lookups, transient store failures and rule violations

use estately_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
    /// Network, throttling or timeout; the caller may retry
    #[error("Transient store failure: {0}")]
    Transient(String),
    /// Someone else changed the entity since it was read
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        WorkflowError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn transition(entity: &str, from: impl ToString, to: impl ToString) -> Self {
        WorkflowError::InvalidTransition {
            entity: entity.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, WorkflowError::Transient(_))
    }
}

impl From<StorageError> for WorkflowError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { collection, id } => WorkflowError::NotFound {
                entity: collection,
                id,
            },
            StorageError::Conflict { .. } => WorkflowError::Conflict(err.to_string()),
            e if e.is_transient() => WorkflowError::Transient(e.to_string()),
            e => WorkflowError::Storage(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_storage_error_mapping() {
        let missing: WorkflowError = StorageError::not_found("tasks", "t1").into();
        assert!(matches!(
            missing,
            WorkflowError::NotFound { ref entity, ref id } if entity == "tasks" && id == "t1"
        ));

        let stale: WorkflowError = StorageError::Conflict {
            collection: "form_submissions".into(),
            id: "f1".into(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(stale, WorkflowError::Conflict(_)));

        let slow: WorkflowError = StorageError::Timeout {
            operation: "get tasks/t1".into(),
            after: Duration::from_secs(10),
        }
        .into();
        assert!(slow.is_transient());

        let bad: WorkflowError = StorageError::InvalidQuery("x;".into()).into();
        assert!(matches!(bad, WorkflowError::Storage(_)));
    }
}
