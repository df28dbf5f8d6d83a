// ABOUTME: Common test utilities for workflow integration tests
// ABOUTME: In-memory stores, a seeded project with seller, buyer and agent, and definition builders

#![allow(dead_code)]

use std::sync::Arc;

use estately_core::types::{
    ContractTemplate, DocumentDefinition, FormDefinition, ParticipantRole, Profile, Project,
    ProvisioningFlags, UserRole,
};
use estately_storage::{DocumentStore, InMemoryDocumentStore, InMemoryObjectStore, ObjectStore};
use estately_workflow::{Workflow, WorkflowConfig};

pub const PROJECT: &str = "project-1";
pub const SELLER: &str = "seller-profile";
pub const BUYER: &str = "buyer-profile";
pub const AGENT: &str = "agent-profile";
pub const SELLER_USER: &str = "seller-user";
pub const BUYER_USER: &str = "buyer-user";

/// Workflow wired to in-memory stores, with the object store kept for inspection
pub struct TestContext {
    pub workflow: Workflow,
    pub objects: Arc<InMemoryObjectStore>,
}

pub async fn setup() -> TestContext {
    let objects = Arc::new(InMemoryObjectStore::new());
    let ctx = setup_with_objects(objects.clone()).await;
    TestContext {
        workflow: ctx,
        objects,
    }
}

/// Same seed data, any object store (used for failure injection)
pub async fn setup_with_objects(objects: Arc<dyn ObjectStore>) -> Workflow {
    setup_with_stores(Arc::new(InMemoryDocumentStore::new()), objects).await
}

/// Same seed data over caller-supplied stores
pub async fn setup_with_stores(
    documents: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
) -> Workflow {
    let workflow = Workflow::new(documents, objects, WorkflowConfig::default());
    seed(&workflow).await;
    workflow
}

async fn seed(workflow: &Workflow) {
    let stores = workflow.stores();
    for (id, user_id, name, role) in [
        (SELLER, Some(SELLER_USER), "Ann Peeters", UserRole::Seller),
        (BUYER, Some(BUYER_USER), "Bart Claes", UserRole::Buyer),
        (AGENT, None, "Eva Janssens", UserRole::Agent),
    ] {
        stores
            .profiles
            .create(Profile {
                id: id.to_string(),
                user_id: user_id.map(str::to_string),
                name: name.to_string(),
                role,
                ..Default::default()
            })
            .await
            .expect("Failed to seed profile");
    }

    stores
        .projects
        .create(Project {
            id: PROJECT.to_string(),
            title: "Kerkstraat 1".to_string(),
            manager_id: AGENT.to_string(),
            seller_id: Some(SELLER.to_string()),
            buyer_id: Some(BUYER.to_string()),
            ..Default::default()
        })
        .await
        .expect("Failed to seed project");
}

pub fn flags(assign_to: &[ParticipantRole]) -> ProvisioningFlags {
    ProvisioningFlags {
        auto_add_to_new_projects: true,
        auto_assign_to: assign_to.to_vec(),
        auto_create_task_for_assignee: true,
        ..Default::default()
    }
}

pub fn document_definition(key: &str, title: &str, assign_to: &[ParticipantRole]) -> DocumentDefinition {
    DocumentDefinition {
        key: key.to_string(),
        title: title.to_string(),
        flags: flags(assign_to),
        ..Default::default()
    }
}

pub fn form_definition(key: &str, title: &str, assign_to: &[ParticipantRole]) -> FormDefinition {
    FormDefinition {
        key: key.to_string(),
        title: title.to_string(),
        flags: flags(assign_to),
        ..Default::default()
    }
}

pub fn contract_template(title: &str, content: &str) -> ContractTemplate {
    ContractTemplate {
        id: "sales-agreement".to_string(),
        title: title.to_string(),
        content: content.to_string(),
        flags: ProvisioningFlags {
            auto_add_to_new_projects: true,
            need_signature_from_seller: true,
            need_signature_from_buyer: true,
            ..Default::default()
        },
        ..Default::default()
    }
}
