// ABOUTME: In-memory document and object stores
// ABOUTME: Process-local backends used by tests and the CLI's memory object backend

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Document, DocumentStore, Fields, SYSTEM_FIELDS};
use crate::error::{StorageError, StorageResult};
use crate::object::{ObjectMetadata, ObjectRef, ObjectStore};
use crate::query::Query;

#[derive(Default)]
struct Collections {
    next_seq: u64,
    docs: HashMap<String, HashMap<String, (u64, Document)>>,
}

/// Document store held entirely in memory
#[derive(Default)]
pub struct InMemoryDocumentStore {
    inner: RwLock<Collections>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn strip_system_fields(mut fields: Fields) -> Fields {
    for key in SYSTEM_FIELDS {
        fields.remove(key);
    }
    fields
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> StorageResult<Document> {
        debug!("Creating document {}/{}", collection, id);
        let mut inner = self.inner.write().await;
        inner.next_seq += 1;
        let seq = inner.next_seq;

        let docs = inner.docs.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Err(StorageError::Duplicate {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        let now = Utc::now();
        let doc = Document {
            id: id.to_string(),
            collection: collection.to_string(),
            fields: strip_system_fields(fields),
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        docs.insert(id.to_string(), (seq, doc.clone()));
        Ok(doc)
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Document> {
        let inner = self.inner.read().await;
        inner
            .docs
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|(_, doc)| doc.clone())
            .ok_or_else(|| StorageError::not_found(collection, id))
    }

    async fn list(&self, collection: &str, query: &Query) -> StorageResult<Vec<Document>> {
        query.validate()?;
        let inner = self.inner.read().await;
        let mut candidates: Vec<(u64, Document)> = inner
            .docs
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        candidates.sort_by_key(|(seq, _)| *seq);

        Ok(query.apply(candidates.into_iter().map(|(_, doc)| doc).collect()))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
        expected_revision: Option<i64>,
    ) -> StorageResult<Document> {
        debug!("Updating document {}/{}", collection, id);
        let mut inner = self.inner.write().await;
        let (_, doc) = inner
            .docs
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StorageError::not_found(collection, id))?;

        if let Some(expected) = expected_revision {
            if doc.revision != expected {
                return Err(StorageError::Conflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected,
                    actual: doc.revision,
                });
            }
        }

        for (key, value) in strip_system_fields(patch) {
            doc.fields.insert(key, value);
        }
        doc.revision += 1;
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        debug!("Deleting document {}/{}", collection, id);
        let mut inner = self.inner.write().await;
        inner
            .docs
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(collection, id))
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    last_modified: chrono::DateTime<Utc>,
}

/// Object store held entirely in memory; URLs use the `memory://` scheme
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn url_for(key: &str) -> String {
        format!("memory://{}", key)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<ObjectRef> {
        debug!("Storing object {} ({} bytes)", key, data.len());
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(ObjectRef {
            key: key.to_string(),
            url: Self::url_for(key),
        })
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.objects.write().await.remove(key).is_none() {
            debug!("Object {} already absent", key);
        }
        Ok(())
    }

    async fn head_metadata(&self, key: &str) -> StorageResult<ObjectMetadata> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| ObjectMetadata {
                content_type: obj.content_type.clone(),
                content_length: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        if !self.contains(key).await {
            return Err(StorageError::ObjectNotFound(key.to_string()));
        }
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(1));
        let expires = (Utc::now() + ttl).timestamp();
        Ok(format!("{}?expires={}", Self::url_for(key), expires))
    }
}
