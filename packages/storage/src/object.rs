// ABOUTME: Object store abstraction for uploaded blobs
// ABOUTME: Put/get/delete by key plus metadata and time-limited URLs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::StorageResult;

/// Where a stored blob lives and how to reach it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub content_length: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<ObjectRef>;

    /// Fails with `StorageError::ObjectNotFound` for unknown keys
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Idempotent: deleting a missing key succeeds
    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn head_metadata(&self, key: &str) -> StorageResult<ObjectMetadata>;

    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String>;
}

#[async_trait]
impl<T> ObjectStore for Arc<T>
where
    T: ObjectStore + ?Sized,
{
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<ObjectRef> {
        (**self).put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        (**self).delete(key).await
    }

    async fn head_metadata(&self, key: &str) -> StorageResult<ObjectMetadata> {
        (**self).head_metadata(key).await
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        (**self).signed_url(key, ttl).await
    }
}
