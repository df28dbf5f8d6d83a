//! Estately Workflow Engine
//!
//! Ties tasks, document requirements, form submissions and signatures into one
//! closing-requirements state per project. Every operation re-reads what it
//! needs from the document store and writes back with a revision check, so
//! concurrent sessions on the same project surface as `WorkflowError::Conflict`
//! instead of silently overwriting each other.

use std::sync::Arc;

use estately_storage::{
    DocumentStore, ObjectStore, Stores, TimeoutDocumentStore, TimeoutObjectStore,
};

pub mod config;
pub mod contracts;
pub mod error;
pub mod forms;
pub mod provisioning;
pub mod signing;
pub mod status;
pub mod tasks;
pub mod upload;

pub use config::{ConfigError, WorkflowConfig};
pub use error::{WorkflowError, WorkflowResult};
pub use forms::{effective_read_only, NewSubmission};
pub use provisioning::ProvisionReport;
pub use signing::{SignatureInput, SigningCollector};
pub use status::{
    is_visible, ContractStatusView, DocumentStatusView, FormStatusView, Participant,
    ParticipantLabel, ProjectStatus, VisibilityFacts,
};
pub use upload::{TaskMatch, UploadOutcome, UploadRequest};

/// The workflow service. Collaborators are injected so tests can swap in
/// in-memory or mocked stores.
#[derive(Clone)]
pub struct Workflow {
    stores: Stores,
    objects: Arc<dyn ObjectStore>,
    config: WorkflowConfig,
}

impl Workflow {
    /// Wrap both stores with the configured deadlines
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        config: WorkflowConfig,
    ) -> Self {
        let documents: Arc<dyn DocumentStore> =
            Arc::new(TimeoutDocumentStore::new(documents, config.store_timeout()));
        let objects: Arc<dyn ObjectStore> =
            Arc::new(TimeoutObjectStore::new(objects, config.object_timeout()));
        Self {
            stores: Stores::new(documents),
            objects,
            config,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }
}

pub(crate) fn require_admin(viewer: &estately_core::Viewer, action: &str) -> WorkflowResult<()> {
    if viewer.is_admin {
        Ok(())
    } else {
        Err(WorkflowError::PermissionDenied(format!(
            "Only admins can {}",
            action
        )))
    }
}
