// ABOUTME: Document upload and completion workflow
// ABOUTME: Stores the blob, records it, mirrors it on the profile and completes the matching task

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use estately_core::constants::{FALLBACK_DOCUMENT_TYPE, GENERAL_DEFINITION_ID};
use estately_core::types::{
    DocumentDefinition, DocumentRecord, DocumentSource, Profile, Task, TaskStatus,
    UploadedDocument, VerificationStatus, Viewer,
};
use estately_core::{object_key, storage_name};
use estately_storage::Query;

use crate::error::{WorkflowError, WorkflowResult};
use crate::{require_admin, Workflow};

/// A file handed in by a user for a project requirement
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Account id of the uploader; a profile id is accepted as well
    pub user_id: String,
    /// Document definition id, or `general` for an ad hoc upload
    pub definition_id: String,
    pub project_id: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// How an upload was tied to an open task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "task_id", rename_all = "snake_case")]
pub enum TaskMatch {
    /// Matched through the task's `required_doc_type`
    Linked(String),
    /// Matched on the task title only; flagged for review
    Heuristic(String),
}

impl TaskMatch {
    pub fn task_id(&self) -> &str {
        match self {
            TaskMatch::Linked(id) | TaskMatch::Heuristic(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    /// Time-limited URL of the stored file
    pub file_url: String,
    /// Object-store key
    pub file_id: String,
    pub document_id: String,
    pub completed_task: Option<TaskMatch>,
}

/// What deleting a document undid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentRemoval {
    pub reverted_tasks: Vec<String>,
    pub removed_records: usize,
    pub updated_profiles: usize,
}

impl Workflow {
    /// Find a profile by account id, falling back to the profile id itself
    pub async fn resolve_profile(&self, user_id: &str) -> WorkflowResult<Profile> {
        let query = Query::new().eq("user_id", user_id).limit(1);
        if let Some(profile) = self.stores.profiles.list(&query).await?.pop() {
            return Ok(profile);
        }
        self.stores
            .profiles
            .find(user_id)
            .await?
            .ok_or_else(|| WorkflowError::ProfileNotFound(user_id.to_string()))
    }

    /// Resolve the definition; lookup failures fall back to a generic type
    async fn upload_definition(&self, definition_id: &str) -> Option<DocumentDefinition> {
        if definition_id == GENERAL_DEFINITION_ID {
            return None;
        }
        match self.stores.document_definitions.get(definition_id).await {
            Ok(def) => Some(def),
            Err(e) => {
                warn!(
                    definition_id = %definition_id,
                    error = %e,
                    "Document definition unavailable, uploading as {}",
                    FALLBACK_DOCUMENT_TYPE
                );
                None
            }
        }
    }

    pub async fn upload_document(&self, mut request: UploadRequest) -> WorkflowResult<UploadOutcome> {
        if request.file_name.trim().is_empty() {
            return Err(WorkflowError::Validation("File name is required".to_string()));
        }

        let profile = self.resolve_profile(&request.user_id).await?;
        self.stores.projects.get(&request.project_id).await?;

        let definition = self.upload_definition(&request.definition_id).await;
        let document_type = definition
            .as_ref()
            .map(|def| def.title.trim())
            .filter(|title| !title.is_empty())
            .unwrap_or(FALLBACK_DOCUMENT_TYPE)
            .to_string();
        let override_name = definition
            .as_ref()
            .and_then(|def| def.override_document_name.as_deref());

        let name = storage_name(&request.file_name, override_name, &request.user_id);
        let key = object_key(&request.project_id, &self.config.upload_folder, &name);

        let stored = self
            .objects
            .put(&key, std::mem::take(&mut request.bytes), &request.content_type)
            .await?;
        let file_url = match self.objects.signed_url(&key, self.config.signed_url_ttl()).await {
            Ok(url) => url,
            Err(e) => {
                warn!(key = %key, error = %e, "Could not sign upload URL, returning stable URL");
                stored.url.clone()
            }
        };

        let record = self
            .record_upload(&request, &profile, definition.as_ref(), &document_type, &stored.key, &stored.url)
            .await?;

        self.mirror_upload(
            &profile,
            UploadedDocument {
                file_id: stored.key.clone(),
                name: name.clone(),
                document_requirement_id: request.definition_id.clone(),
                document_type: document_type.clone(),
                project_id: request.project_id.clone(),
                url: stored.url.clone(),
                uploaded_at: Utc::now().to_rfc3339(),
            },
        )
        .await;

        let completed_task = if request.definition_id == GENERAL_DEFINITION_ID {
            None
        } else {
            self.complete_upload_task(
                &request.project_id,
                &profile.id,
                &request.definition_id,
                definition.as_ref(),
                &document_type,
                &stored.key,
            )
            .await
        };

        info!(
            project_id = %request.project_id,
            profile_id = %profile.id,
            file_id = %stored.key,
            document_type = %document_type,
            completed_task = ?completed_task,
            "Document uploaded"
        );

        Ok(UploadOutcome {
            file_url,
            file_id: stored.key,
            document_id: record.id,
            completed_task,
        })
    }

    /// Create the DocumentRecord, or refresh it when the same key was uploaded before
    async fn record_upload(
        &self,
        request: &UploadRequest,
        profile: &Profile,
        definition: Option<&DocumentDefinition>,
        document_type: &str,
        key: &str,
        url: &str,
    ) -> WorkflowResult<DocumentRecord> {
        let query = Query::new().eq("file_id", key).limit(1);
        if let Some(mut existing) = self.stores.documents.list(&query).await?.pop() {
            existing.file_url = Some(url.to_string());
            existing.uploaded_at = Some(Utc::now());
            existing.verification_status = VerificationStatus::Pending;
            debug!(document_id = %existing.id, "Replacing previous upload");
            return Ok(self.stores.documents.save(&existing).await?);
        }

        Ok(self
            .stores
            .documents
            .create(DocumentRecord {
                title: document_type.to_string(),
                doc_type: document_type.to_string(),
                source: DocumentSource::Upload,
                file_id: key.to_string(),
                file_url: Some(url.to_string()),
                project_id: request.project_id.clone(),
                owner_id: profile.id.clone(),
                definition_id: definition.map(|def| def.id.clone()),
                verification_status: VerificationStatus::Pending,
                uploaded_at: Some(Utc::now()),
                ..Default::default()
            })
            .await?)
    }

    /// Best-effort: keep the legacy copy on the profile in sync
    async fn mirror_upload(&self, profile: &Profile, entry: UploadedDocument) {
        let mut profile = profile.clone();
        profile.user_documents.retain(|doc| doc.file_id != entry.file_id);
        profile.user_documents.push(entry);
        if let Err(e) = self.stores.profiles.save(&profile).await {
            warn!(profile_id = %profile.id, error = %e, "Failed to mirror upload on profile");
        }
    }

    /// Best-effort: complete the open upload task this file satisfies
    async fn complete_upload_task(
        &self,
        project_id: &str,
        assignee_id: &str,
        definition_id: &str,
        definition: Option<&DocumentDefinition>,
        document_type: &str,
        file_id: &str,
    ) -> Option<TaskMatch> {
        let query = Query::new()
            .eq("project_id", project_id)
            .eq("assignee_id", assignee_id)
            .eq("task_type", "document_upload")
            .eq("status", "todo");
        let open = match self.stores.tasks.list(&query).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "Task search failed");
                return None;
            }
        };

        let linked = |task: &Task| {
            task.required_doc_type.as_deref().is_some_and(|doc_type| {
                doc_type == definition_id || definition.is_some_and(|def| doc_type == def.key)
            })
        };

        let (mut task, heuristic) = match open.iter().find(|t| linked(t)) {
            Some(task) => (task.clone(), false),
            None => match open.iter().find(|t| t.title.contains(document_type)) {
                Some(task) => {
                    warn!(
                        task_id = %task.id,
                        document_type = %document_type,
                        "Completing task by title match only; flagged for review"
                    );
                    (task.clone(), true)
                }
                None => {
                    debug!(project_id = %project_id, definition_id = %definition_id, "No open task for upload");
                    return None;
                }
            },
        };

        task.status = TaskStatus::Completed;
        task.completion_file_id = Some(file_id.to_string());
        task.completed_at = Some(Utc::now());
        task.needs_review = heuristic;

        match self.stores.tasks.save(&task).await {
            Ok(saved) if heuristic => Some(TaskMatch::Heuristic(saved.id)),
            Ok(saved) => Some(TaskMatch::Linked(saved.id)),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Failed to complete upload task");
                None
            }
        }
    }

    /// Remove an upload and undo everything it caused
    pub async fn delete_document(&self, file_id: &str) -> WorkflowResult<DocumentRemoval> {
        match self.objects.delete(file_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!(file_id = %file_id, "Blob already gone"),
            Err(e) => return Err(e.into()),
        }

        let mut removal = DocumentRemoval {
            reverted_tasks: self.revert_tasks_completed_by(file_id).await?,
            ..Default::default()
        };

        let query = Query::new().eq("file_id", file_id);
        for record in self.stores.documents.list(&query).await? {
            self.stores.documents.delete(&record.id).await?;
            removal.removed_records += 1;
        }

        for mut profile in self.stores.profiles.all().await? {
            let before = profile.user_documents.len();
            profile.user_documents.retain(|doc| doc.file_id != file_id);
            if profile.user_documents.len() == before {
                continue;
            }
            match self.stores.profiles.save(&profile).await {
                Ok(_) => removal.updated_profiles += 1,
                Err(e) => warn!(profile_id = %profile.id, error = %e, "Failed to remove mirror entry"),
            }
        }

        info!(
            file_id = %file_id,
            reverted_tasks = removal.reverted_tasks.len(),
            removed_records = removal.removed_records,
            updated_profiles = removal.updated_profiles,
            "Document deleted"
        );
        Ok(removal)
    }

    /// Put every task completed by `file_id` back to todo
    async fn revert_tasks_completed_by(&self, file_id: &str) -> WorkflowResult<Vec<String>> {
        let query = Query::new().eq("completion_file_id", file_id);
        let mut reverted = Vec::new();
        for mut task in self.stores.tasks.list(&query).await? {
            task.status = TaskStatus::Todo;
            task.completion_file_id = None;
            task.completed_at = None;
            task.needs_review = false;
            let saved = self.stores.tasks.save(&task).await?;
            info!(task_id = %saved.id, file_id = %file_id, "Task reverted to todo");
            reverted.push(saved.id);
        }
        Ok(reverted)
    }

    pub async fn approve_document(&self, document_id: &str, viewer: &Viewer) -> WorkflowResult<DocumentRecord> {
        require_admin(viewer, "approve documents")?;
        self.set_verification(document_id, VerificationStatus::Approved).await
    }

    /// Reject an upload and reopen the task it completed
    pub async fn reject_document(&self, document_id: &str, viewer: &Viewer) -> WorkflowResult<DocumentRecord> {
        require_admin(viewer, "reject documents")?;
        let record = self
            .set_verification(document_id, VerificationStatus::Rejected)
            .await?;
        self.revert_tasks_completed_by(&record.file_id).await?;
        Ok(record)
    }

    async fn set_verification(
        &self,
        document_id: &str,
        status: VerificationStatus,
    ) -> WorkflowResult<DocumentRecord> {
        let mut record = self.stores.documents.get(document_id).await?;
        if record.verification_status != VerificationStatus::Pending {
            return Err(WorkflowError::transition(
                "document",
                record.verification_status,
                status,
            ));
        }
        record.verification_status = status;
        let saved = self.stores.documents.save(&record).await?;
        info!(document_id = %document_id, status = %status, "Document verified");
        Ok(saved)
    }

    /// Time-limited URL for an uploaded file
    pub async fn document_url(&self, file_id: &str) -> WorkflowResult<String> {
        Ok(self
            .objects
            .signed_url(file_id, self.config.signed_url_ttl())
            .await?)
    }

    pub async fn project_documents(&self, project_id: &str) -> WorkflowResult<Vec<DocumentRecord>> {
        let query = Query::new().eq("project_id", project_id);
        Ok(self.stores.documents.list(&query).await?)
    }
}
