// ABOUTME: Document store abstraction
// ABOUTME: Collection-scoped CRUD with revision-checked updates

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::StorageResult;
use crate::query::Query;

/// Domain fields of a stored document
pub type Fields = Map<String, Value>;

/// Field names managed by the store rather than the caller
pub const SYSTEM_FIELDS: [&str; 4] = ["id", "revision", "created_at", "updated_at"];

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub collection: String,
    pub fields: Fields,
    /// Incremented on every update; used for compare-and-swap
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Look up a domain or system field by name
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "revision" => Some(Value::from(self.revision)),
            "created_at" => Some(Value::String(self.created_at.to_rfc3339())),
            "updated_at" => Some(Value::String(self.updated_at.to_rfc3339())),
            _ => self.fields.get(name).cloned(),
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> StorageResult<Document>;

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Document>;

    async fn list(&self, collection: &str, query: &Query) -> StorageResult<Vec<Document>>;

    /// Shallow-merge `patch` into the stored fields. When `expected_revision`
    /// is given and no longer matches, fails with `StorageError::Conflict`.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
        expected_revision: Option<i64>,
    ) -> StorageResult<Document>;

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()>;
}

#[async_trait]
impl<T> DocumentStore for Arc<T>
where
    T: DocumentStore + ?Sized,
{
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> StorageResult<Document> {
        (**self).create(collection, id, fields).await
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Document> {
        (**self).get(collection, id).await
    }

    async fn list(&self, collection: &str, query: &Query) -> StorageResult<Vec<Document>> {
        (**self).list(collection, query).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
        expected_revision: Option<i64>,
    ) -> StorageResult<Document> {
        (**self).update(collection, id, patch, expected_revision).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        (**self).delete(collection, id).await
    }
}
