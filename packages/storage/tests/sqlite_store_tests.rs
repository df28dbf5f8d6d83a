// ABOUTME: Integration tests for the SQLite document store
// ABOUTME: CRUD, json_extract filters, revision conflicts and query validation

use estately_core::types::{Task, TaskStatus, TaskType};
use estately_storage::{
    DocumentStore, EntityStore, Fields, Query, SortOrder, SqliteDocumentStore, StorageError,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

async fn memory_store() -> SqliteDocumentStore {
    SqliteDocumentStore::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to open in-memory database")
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_create_get_update_delete_roundtrip() {
    let store = memory_store().await;

    let created = store
        .create("tasks", "t1", fields(json!({"title": "Upload Document: Passport"})))
        .await
        .unwrap();
    assert_eq!(created.revision, 0);

    let fetched = store.get("tasks", "t1").await.unwrap();
    assert_eq!(fetched.fields.get("title"), Some(&json!("Upload Document: Passport")));

    let updated = store
        .update("tasks", "t1", fields(json!({"status": "completed"})), Some(0))
        .await
        .unwrap();
    assert_eq!(updated.revision, 1);
    assert_eq!(updated.fields.get("title"), Some(&json!("Upload Document: Passport")));

    store.delete("tasks", "t1").await.unwrap();
    assert!(matches!(
        store.get("tasks", "t1").await,
        Err(StorageError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_duplicate_id_in_same_collection() {
    let store = memory_store().await;
    store.create("tasks", "t1", Fields::new()).await.unwrap();
    store.create("documents", "t1", Fields::new()).await.unwrap();

    let err = store.create("tasks", "t1", Fields::new()).await.unwrap_err();
    assert!(matches!(err, StorageError::Duplicate { .. }));
}

#[tokio::test]
async fn test_stale_revision_is_rejected() {
    let store = memory_store().await;
    store.create("forms", "f1", Fields::new()).await.unwrap();
    store
        .update("forms", "f1", fields(json!({"status": "submitted"})), Some(0))
        .await
        .unwrap();

    let err = store
        .update("forms", "f1", fields(json!({"status": "assigned"})), Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict { expected: 0, actual: 1, .. }));
}

#[tokio::test]
async fn test_json_filters_and_ordering() {
    let store = memory_store().await;
    let rows = [
        ("a", json!({"project_id": "p1", "status": "todo", "title": "Upload Document: Passport", "rank": 2, "urgent": true})),
        ("b", json!({"project_id": "p1", "status": "completed", "title": "Upload Document: Deed", "rank": 1, "urgent": false})),
        ("c", json!({"project_id": "p2", "status": "todo", "title": "Fill out form: Lijst", "rank": 3})),
        ("d", json!({"project_id": "p1", "status": "todo", "title": "upload document: ID", "rank": 0, "assignee_id": "u1"})),
    ];
    for (id, value) in rows {
        store.create("tasks", id, fields(value)).await.unwrap();
    }

    let ids = |docs: Vec<estately_storage::Document>| -> Vec<String> {
        docs.into_iter().map(|d| d.id).collect()
    };

    let todo_p1 = store
        .list(
            "tasks",
            &Query::new()
                .eq("project_id", "p1")
                .eq("status", "todo")
                .order_by("rank", SortOrder::Asc),
        )
        .await
        .unwrap();
    assert_eq!(ids(todo_p1), vec!["d", "a"]);

    let search = store
        .list("tasks", &Query::new().contains("title", "UPLOAD DOCUMENT"))
        .await
        .unwrap();
    assert_eq!(ids(search), vec!["a", "b", "d"]);

    let unassigned = store
        .list("tasks", &Query::new().eq("project_id", "p1").is_null("assignee_id"))
        .await
        .unwrap();
    assert_eq!(ids(unassigned), vec!["a", "b"]);

    let urgent = store
        .list("tasks", &Query::new().eq("urgent", true))
        .await
        .unwrap();
    assert_eq!(ids(urgent), vec!["a"]);

    let paged = store
        .list(
            "tasks",
            &Query::new().order_by("rank", SortOrder::Desc).offset(1).limit(2),
        )
        .await
        .unwrap();
    assert_eq!(ids(paged), vec!["a", "b"]);
}

#[tokio::test]
async fn test_list_rejects_field_name_injection() {
    let store = memory_store().await;
    store
        .create("tasks", "t1", fields(json!({"status": "todo"})))
        .await
        .unwrap();

    let malicious = Query::new().eq("status') OR 1=1; DROP TABLE documents; --", "x");
    let result = store.list("tasks", &malicious).await;
    assert!(matches!(result, Err(StorageError::InvalidQuery(_))));

    // Table is intact
    assert!(store.get("tasks", "t1").await.is_ok());
}

#[tokio::test]
async fn test_typed_entities_over_sqlite() {
    let store: Arc<dyn DocumentStore> = Arc::new(memory_store().await);
    let tasks: EntityStore<Task> = EntityStore::new(store);

    let created = tasks
        .create(Task {
            title: "Upload Document: Passport".to_string(),
            task_type: TaskType::DocumentUpload,
            project_id: "p1".to_string(),
            assignee_id: Some("buyer".to_string()),
            required_doc_type: Some("passport".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let open = tasks
        .list(
            &Query::new()
                .eq("project_id", "p1")
                .eq("task_type", "document_upload")
                .eq("status", "todo"),
        )
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, created.id);
    assert_eq!(open[0].status, TaskStatus::Todo);
}

#[tokio::test]
async fn test_file_database_persists_across_connections() {
    let temp_dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", temp_dir.path().join("estately.db").display());

    {
        let store = SqliteDocumentStore::connect(&url, 2).await.unwrap();
        store
            .create("projects", "p1", fields(json!({"title": "Kerkstraat 1"})))
            .await
            .unwrap();
        store.pool().close().await;
    }

    let reopened = SqliteDocumentStore::connect(&url, 2).await.unwrap();
    let project = reopened.get("projects", "p1").await.unwrap();
    assert_eq!(project.fields.get("title"), Some(&json!("Kerkstraat 1")));
}
