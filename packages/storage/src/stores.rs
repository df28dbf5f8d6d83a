// ABOUTME: Bundle of typed entity stores sharing one document store
// ABOUTME: Handed to workflow services instead of global singletons

use std::sync::Arc;

use estately_core::types::{
    Agency, Contract, ContractTemplate, DocumentDefinition, DocumentRecord, FormDefinition,
    FormSubmission, Profile, Project, Property, SignRequest, Task,
};

use crate::document::DocumentStore;
use crate::entity::EntityStore;

#[derive(Clone)]
pub struct Stores {
    pub projects: EntityStore<Project>,
    pub profiles: EntityStore<Profile>,
    pub properties: EntityStore<Property>,
    pub agencies: EntityStore<Agency>,
    pub tasks: EntityStore<Task>,
    pub documents: EntityStore<DocumentRecord>,
    pub document_definitions: EntityStore<DocumentDefinition>,
    pub form_definitions: EntityStore<FormDefinition>,
    pub form_submissions: EntityStore<FormSubmission>,
    pub sign_requests: EntityStore<SignRequest>,
    pub contracts: EntityStore<Contract>,
    pub contract_templates: EntityStore<ContractTemplate>,
}

impl Stores {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            projects: EntityStore::new(store.clone()),
            profiles: EntityStore::new(store.clone()),
            properties: EntityStore::new(store.clone()),
            agencies: EntityStore::new(store.clone()),
            tasks: EntityStore::new(store.clone()),
            documents: EntityStore::new(store.clone()),
            document_definitions: EntityStore::new(store.clone()),
            form_definitions: EntityStore::new(store.clone()),
            form_submissions: EntityStore::new(store.clone()),
            sign_requests: EntityStore::new(store.clone()),
            contracts: EntityStore::new(store.clone()),
            contract_templates: EntityStore::new(store),
        }
    }
}
