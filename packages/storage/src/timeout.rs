// ABOUTME: Deadline adapters for document and object stores
// ABOUTME: Elapsed calls surface as StorageError::Timeout, which callers treat as transient

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::document::{Document, DocumentStore, Fields};
use crate::error::{StorageError, StorageResult};
use crate::object::{ObjectMetadata, ObjectRef, ObjectStore};
use crate::query::Query;

async fn with_deadline<T, F>(limit: Duration, operation: String, fut: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} timed out after {:?}", operation, limit);
            Err(StorageError::Timeout {
                operation,
                after: limit,
            })
        }
    }
}

pub struct TimeoutDocumentStore<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimeoutDocumentStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for TimeoutDocumentStore<S> {
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> StorageResult<Document> {
        let op = format!("create {}/{}", collection, id);
        with_deadline(self.limit, op, self.inner.create(collection, id, fields)).await
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Document> {
        let op = format!("get {}/{}", collection, id);
        with_deadline(self.limit, op, self.inner.get(collection, id)).await
    }

    async fn list(&self, collection: &str, query: &Query) -> StorageResult<Vec<Document>> {
        let op = format!("list {}", collection);
        with_deadline(self.limit, op, self.inner.list(collection, query)).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
        expected_revision: Option<i64>,
    ) -> StorageResult<Document> {
        let op = format!("update {}/{}", collection, id);
        with_deadline(
            self.limit,
            op,
            self.inner.update(collection, id, patch, expected_revision),
        )
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        let op = format!("delete {}/{}", collection, id);
        with_deadline(self.limit, op, self.inner.delete(collection, id)).await
    }
}

pub struct TimeoutObjectStore<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimeoutObjectStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for TimeoutObjectStore<S> {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<ObjectRef> {
        let op = format!("put object {}", key);
        with_deadline(self.limit, op, self.inner.put(key, data, content_type)).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let op = format!("get object {}", key);
        with_deadline(self.limit, op, self.inner.get(key)).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let op = format!("delete object {}", key);
        with_deadline(self.limit, op, self.inner.delete(key)).await
    }

    async fn head_metadata(&self, key: &str) -> StorageResult<ObjectMetadata> {
        let op = format!("head object {}", key);
        with_deadline(self.limit, op, self.inner.head_metadata(key)).await
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        let op = format!("sign url {}", key);
        with_deadline(self.limit, op, self.inner.signed_url(key, ttl)).await
    }
}
