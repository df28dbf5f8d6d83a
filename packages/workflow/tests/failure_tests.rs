// ABOUTME: Failure injection through a mocked object store
// ABOUTME: Transient blob errors leave records intact; URL signing failures degrade to stable URLs

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use estately_core::types::DocumentRecord;
use estately_storage::{ObjectMetadata, ObjectRef, ObjectStore, StorageError, StorageResult};
use estately_workflow::{UploadRequest, WorkflowError};
use mockall::mock;
use mockall::predicate::eq;
use pretty_assertions::assert_eq;

mock! {
    Blobs {}

    #[async_trait::async_trait]
    impl ObjectStore for Blobs {
        async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<ObjectRef>;
        async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;
        async fn delete(&self, key: &str) -> StorageResult<()>;
        async fn head_metadata(&self, key: &str) -> StorageResult<ObjectMetadata>;
        async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String>;
    }
}

const KEY: &str = "project/project-1/user-files/deed.pdf";

#[tokio::test]
async fn test_backend_failure_on_delete_keeps_records() {
    let mut blobs = MockBlobs::new();
    blobs
        .expect_delete()
        .with(eq(KEY))
        .times(1)
        .returning(|_| Err(StorageError::Backend("503 Slow Down".to_string())));
    let workflow = setup_with_objects(Arc::new(blobs)).await;

    let record = workflow
        .stores()
        .documents
        .create(DocumentRecord {
            file_id: KEY.to_string(),
            project_id: PROJECT.to_string(),
            owner_id: SELLER.to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let result = workflow.delete_document(KEY).await;
    assert!(matches!(result, Err(WorkflowError::Transient(_))));
    assert!(result.unwrap_err().is_transient());
    assert!(workflow.stores().documents.find(&record.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_missing_blob_on_delete_is_not_an_error() {
    let mut blobs = MockBlobs::new();
    blobs
        .expect_delete()
        .returning(|key| Err(StorageError::ObjectNotFound(key.to_string())));
    let workflow = setup_with_objects(Arc::new(blobs)).await;

    let removal = workflow.delete_document(KEY).await.unwrap();
    assert_eq!(removal.removed_records, 0);
}

#[tokio::test]
async fn test_signing_failure_falls_back_to_stable_url() {
    let mut blobs = MockBlobs::new();
    blobs
        .expect_put()
        .times(1)
        .returning(|key, _, _| {
            Ok(ObjectRef {
                key: key.to_string(),
                url: format!("https://estately-test.s3.eu-west-1.amazonaws.com/{}", key),
            })
        });
    blobs
        .expect_signed_url()
        .returning(|_, _| Err(StorageError::Rejected("AccessDenied".to_string())));
    let workflow = setup_with_objects(Arc::new(blobs)).await;

    let outcome = workflow
        .upload_document(UploadRequest {
            user_id: SELLER_USER.to_string(),
            definition_id: "general".to_string(),
            project_id: PROJECT.to_string(),
            file_name: "deed.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.file_id, KEY);
    assert_eq!(
        outcome.file_url,
        format!("https://estately-test.s3.eu-west-1.amazonaws.com/{}", KEY)
    );
}

#[tokio::test]
async fn test_put_failure_writes_no_record() {
    let mut blobs = MockBlobs::new();
    blobs
        .expect_put()
        .returning(|_, _, _| Err(StorageError::Backend("connection reset".to_string())));
    let workflow = setup_with_objects(Arc::new(blobs)).await;

    let result = workflow
        .upload_document(UploadRequest {
            user_id: SELLER_USER.to_string(),
            definition_id: "general".to_string(),
            project_id: PROJECT.to_string(),
            file_name: "deed.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: Vec::new(),
        })
        .await;

    assert!(result.is_err());
    assert!(workflow.project_documents(PROJECT).await.unwrap().is_empty());
}
