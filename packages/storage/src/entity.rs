// ABOUTME: Typed entity codecs over the generic document store
// ABOUTME: One encode/decode pair per entity and a typed CRUD wrapper

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

use estately_core::constants;
use estately_core::types::{
    Agency, Contract, ContractTemplate, DocumentDefinition, DocumentRecord, FormDefinition,
    FormSubmission, Profile, Project, Property, SignRequest, Task,
};
use estately_core::utils::new_id;

use crate::document::{Document, DocumentStore, Fields, SYSTEM_FIELDS};
use crate::error::{StorageError, StorageResult};
use crate::query::Query;

/// A domain type persisted as a document in one collection.
///
/// JSON-valued fields are written as text and read back leniently (see
/// `estately_core::lenient`), so a malformed field decodes to its default
/// instead of failing the whole entity.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Sized {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn revision(&self) -> i64;

    fn decode(doc: &Document) -> StorageResult<Self> {
        let mut map = doc.fields.clone();
        map.insert("id".to_string(), Value::String(doc.id.clone()));
        map.insert("revision".to_string(), Value::from(doc.revision));
        map.insert(
            "created_at".to_string(),
            Value::String(doc.created_at.to_rfc3339()),
        );
        map.insert(
            "updated_at".to_string(),
            Value::String(doc.updated_at.to_rfc3339()),
        );
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    fn encode(&self) -> StorageResult<Fields> {
        match serde_json::to_value(self)? {
            Value::Object(mut map) => {
                for key in SYSTEM_FIELDS {
                    map.remove(key);
                }
                Ok(map)
            }
            other => Err(StorageError::Rejected(format!(
                "{} encoded to a non-object: {}",
                Self::COLLECTION,
                other
            ))),
        }
    }
}

macro_rules! impl_entity {
    ($ty:ty, $collection:expr) => {
        impl Entity for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn revision(&self) -> i64 {
                self.revision
            }
        }
    };
}

impl_entity!(Project, constants::PROJECTS);
impl_entity!(Profile, constants::PROFILES);
impl_entity!(Property, constants::PROPERTIES);
impl_entity!(Agency, constants::AGENCIES);
impl_entity!(Task, constants::TASKS);
impl_entity!(DocumentRecord, constants::DOCUMENTS);
impl_entity!(DocumentDefinition, constants::DOCUMENT_DEFINITIONS);
impl_entity!(FormDefinition, constants::FORM_DEFINITIONS);
impl_entity!(FormSubmission, constants::FORM_SUBMISSIONS);
impl_entity!(SignRequest, constants::SIGN_REQUESTS);
impl_entity!(Contract, constants::CONTRACTS);
impl_entity!(ContractTemplate, constants::CONTRACT_TEMPLATES);

/// Typed accessor for one entity collection
pub struct EntityStore<E> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityStore<E> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Persist a new entity, generating an id when it has none
    pub async fn create(&self, mut entity: E) -> StorageResult<E> {
        if entity.id().is_empty() {
            entity.set_id(new_id());
        }
        let fields = entity.encode()?;
        let doc = self.store.create(E::COLLECTION, entity.id(), fields).await?;
        E::decode(&doc)
    }

    pub async fn get(&self, id: &str) -> StorageResult<E> {
        let doc = self.store.get(E::COLLECTION, id).await?;
        E::decode(&doc)
    }

    /// Like `get`, but a missing document is `None`
    pub async fn find(&self, id: &str) -> StorageResult<Option<E>> {
        match self.get(id).await {
            Ok(entity) => Ok(Some(entity)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Documents that fail to decode are skipped with a warning
    pub async fn list(&self, query: &Query) -> StorageResult<Vec<E>> {
        let docs = self.store.list(E::COLLECTION, query).await?;
        let mut entities = Vec::with_capacity(docs.len());
        for doc in &docs {
            match E::decode(doc) {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!(
                    collection = E::COLLECTION,
                    id = %doc.id,
                    error = %e,
                    "Skipping undecodable document"
                ),
            }
        }
        Ok(entities)
    }

    pub async fn all(&self) -> StorageResult<Vec<E>> {
        self.list(&Query::new()).await
    }

    /// Write every field of `entity`, guarded by the revision it was read at
    pub async fn save(&self, entity: &E) -> StorageResult<E> {
        let fields = entity.encode()?;
        let doc = self
            .store
            .update(E::COLLECTION, entity.id(), fields, Some(entity.revision()))
            .await?;
        E::decode(&doc)
    }

    /// Merge raw fields without a revision check
    pub async fn patch(&self, id: &str, fields: Fields) -> StorageResult<E> {
        let doc = self.store.update(E::COLLECTION, id, fields, None).await?;
        E::decode(&doc)
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.store.delete(E::COLLECTION, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDocumentStore;
    use estately_core::meta::FormMeta;
    use estately_core::types::{FormStatus, ParticipantRole};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> Arc<dyn DocumentStore> {
        Arc::new(InMemoryDocumentStore::new())
    }

    #[tokio::test]
    async fn test_json_fields_are_stored_as_text() {
        let docs = store();
        let forms: EntityStore<FormSubmission> = EntityStore::new(docs.clone());

        let created = forms
            .create(FormSubmission {
                title: "Lijst van zaken".to_string(),
                form_key: "lijst_van_zaken".to_string(),
                attachments: vec!["a.pdf".to_string()],
                meta: FormMeta::new(false, true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!created.id.is_empty());

        let raw = docs.get("form_submissions", &created.id).await.unwrap();
        assert!(raw.fields.get("attachments").unwrap().is_string());
        assert!(raw.fields.get("meta").unwrap().is_string());
        assert!(!raw.fields.contains_key("id"));

        let loaded = forms.get(&created.id).await.unwrap();
        assert_eq!(loaded.attachments, vec!["a.pdf".to_string()]);
        assert_eq!(loaded.meta.required_roles(), vec![ParticipantRole::Buyer]);
    }

    #[tokio::test]
    async fn test_malformed_json_fields_default() {
        let docs = store();
        let mut fields = Fields::new();
        fields.insert("form_key".into(), json!("k"));
        fields.insert("status".into(), json!("submitted"));
        fields.insert("attachments".into(), json!("[broken"));
        fields.insert("meta".into(), json!("{\"needSignatureFromSeller\": true"));
        fields.insert("data".into(), json!("{}"));
        docs.create("form_submissions", "f1", fields).await.unwrap();

        let forms: EntityStore<FormSubmission> = EntityStore::new(docs);
        let loaded = forms.get("f1").await.unwrap();
        assert_eq!(loaded.status, FormStatus::Submitted);
        assert!(loaded.attachments.is_empty());
        assert_eq!(loaded.meta, FormMeta::default());
    }

    #[tokio::test]
    async fn test_save_uses_revision_guard() {
        let forms: EntityStore<FormSubmission> = EntityStore::new(store());
        let created = forms.create(FormSubmission::default()).await.unwrap();

        let mut first = created.clone();
        first.status = FormStatus::Submitted;
        let saved = forms.save(&first).await.unwrap();
        assert_eq!(saved.revision, 1);

        let mut stale = created;
        stale.status = FormStatus::Closed;
        assert!(matches!(
            forms.save(&stale).await,
            Err(StorageError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let tasks: EntityStore<Task> = EntityStore::new(store());
        assert!(tasks.find("nope").await.unwrap().is_none());
    }
}
