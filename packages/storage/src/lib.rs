// ABOUTME: Data layer and persistence for Estately
// ABOUTME: Document/object store traits, typed entity codecs and concrete backends

pub mod document;
pub mod entity;
pub mod error;
pub mod memory;
pub mod object;
pub mod query;
pub mod sqlite;
pub mod stores;
pub mod timeout;

pub use document::{Document, DocumentStore, Fields};
pub use entity::{Entity, EntityStore};
pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryDocumentStore, InMemoryObjectStore};
pub use object::{ObjectMetadata, ObjectRef, ObjectStore};
pub use query::{Filter, Query, SortOrder};
pub use sqlite::SqliteDocumentStore;
pub use stores::Stores;
pub use timeout::{TimeoutDocumentStore, TimeoutObjectStore};
