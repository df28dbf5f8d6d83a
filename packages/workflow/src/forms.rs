// ABOUTME: Form submission lifecycle
// ABOUTME: Status transitions, signature collection, edit-lock policy and cleanup

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use estately_core::constants::FORM_TASK_PREFIX;
use estately_core::types::{
    AllowChanges, FormDefinition, FormStatus, FormSubmission, ParticipantRole, TaskStatus,
    TaskType, Viewer,
};
use estately_core::{sanitize_key, FormMeta};
use estately_storage::Query;

use crate::error::{WorkflowError, WorkflowResult};
use crate::signing::{is_complete, SignatureInput, SigningCollector};
use crate::{require_admin, Workflow};

/// Whether `viewer` may not change the submission's data.
///
/// Evaluated in order: a `never` policy locks everyone; admins may otherwise
/// always edit; everyone but the assignee is locked out; the assignee is
/// locked once anything is signed, or once submitted under a
/// `before_submission` policy.
pub fn effective_read_only(
    submission: &FormSubmission,
    definition: Option<&FormDefinition>,
    viewer: &Viewer,
) -> bool {
    let allow_changes = definition
        .map(|def| def.flags.allow_changes)
        .unwrap_or_default();

    if allow_changes == AllowChanges::Never {
        return true;
    }
    if viewer.is_admin {
        return false;
    }

    let is_assignee = submission.assignee_id.as_deref() == Some(viewer.profile_id.as_str());
    if !is_assignee {
        return true;
    }
    if submission.meta.has_any_signature() {
        return true;
    }
    allow_changes == AllowChanges::BeforeSubmission && submission.status.is_handed_in()
}

/// Status a form moves to when handed in or signed
fn settled_status(submission: &FormSubmission) -> FormStatus {
    if is_complete(submission) {
        FormStatus::Completed
    } else {
        FormStatus::Submitted
    }
}

/// Completed forms, closed forms and forms with every required signature are final
fn is_locked(submission: &FormSubmission) -> bool {
    matches!(submission.status, FormStatus::Completed | FormStatus::Closed)
        || (submission.meta.has_any_signature() && submission.meta.all_required_present())
}

/// Input for a new form submission
#[derive(Debug, Clone, Default)]
pub struct NewSubmission {
    pub project_id: String,
    pub form_key: String,
    /// Defaults to the definition's title
    pub title: Option<String>,
    pub submitter_id: Option<String>,
    pub assignee_id: Option<String>,
    /// Defaults to the definition's default data
    pub data: Option<Map<String, Value>>,
}

impl Workflow {
    /// Definition ids are sanitized keys; older definitions are matched on `key`
    pub async fn form_definition(&self, form_key: &str) -> WorkflowResult<Option<FormDefinition>> {
        if let Some(def) = self.stores.form_definitions.find(&sanitize_key(form_key)).await? {
            return Ok(Some(def));
        }
        let query = Query::new().eq("key", form_key).limit(1);
        Ok(self.stores.form_definitions.list(&query).await?.pop())
    }

    async fn load_form(&self, id: &str) -> WorkflowResult<(FormSubmission, Option<FormDefinition>)> {
        let form = self.stores.form_submissions.get(id).await?;
        let definition = self.form_definition(&form.form_key).await?;
        Ok((form, definition))
    }

    /// Persist a form, refusing to store `completed` while a signature is missing
    async fn save_form(&self, form: &FormSubmission) -> WorkflowResult<FormSubmission> {
        if form.status == FormStatus::Completed && !is_complete(form) {
            return Err(WorkflowError::InvariantViolation(format!(
                "Form {} cannot be completed before all required signatures are present",
                form.id
            )));
        }
        Ok(self.stores.form_submissions.save(form).await?)
    }

    pub async fn create_submission(&self, input: NewSubmission) -> WorkflowResult<FormSubmission> {
        if input.form_key.trim().is_empty() {
            return Err(WorkflowError::Validation("Form key is required".to_string()));
        }
        self.stores.projects.get(&input.project_id).await?;

        let definition = self.form_definition(&input.form_key).await?;
        if definition.is_none() {
            warn!(form_key = %input.form_key, "No definition found for form, creating without one");
        }

        let meta = definition
            .as_ref()
            .map(|def| {
                FormMeta::new(
                    def.flags.need_signature_from_seller,
                    def.flags.need_signature_from_buyer,
                )
            })
            .unwrap_or_default();
        let title = input
            .title
            .or_else(|| definition.as_ref().map(|def| def.title.clone()))
            .unwrap_or_else(|| input.form_key.clone());
        let data = input
            .data
            .or_else(|| definition.as_ref().map(|def| def.default_data.clone()))
            .unwrap_or_default();
        let status = if input.assignee_id.is_some() {
            FormStatus::Assigned
        } else {
            FormStatus::Draft
        };

        let form = self
            .stores
            .form_submissions
            .create(FormSubmission {
                title,
                form_key: input.form_key,
                data,
                status,
                project_id: input.project_id,
                submitter_id: input.submitter_id,
                assignee_id: input.assignee_id,
                meta,
                ..Default::default()
            })
            .await?;

        info!(
            form_id = %form.id,
            project_id = %form.project_id,
            form_key = %form.form_key,
            status = %form.status,
            "Created form submission"
        );
        Ok(form)
    }

    /// Save form data; `is_final` hands the form in
    pub async fn save_submission(
        &self,
        id: &str,
        viewer: &Viewer,
        data: Map<String, Value>,
        is_final: bool,
    ) -> WorkflowResult<FormSubmission> {
        let (mut form, definition) = self.load_form(id).await?;

        if effective_read_only(&form, definition.as_ref(), viewer) {
            return Err(WorkflowError::PermissionDenied(format!(
                "Form {} is read-only for {}",
                id, viewer.profile_id
            )));
        }
        if form.status == FormStatus::Closed {
            return Err(WorkflowError::transition("form", form.status, FormStatus::Submitted));
        }

        let previous = form.status;
        form.data = data;
        if is_final {
            form.status = settled_status(&form);
            if form.submitter_id.is_none() {
                form.submitter_id = Some(viewer.profile_id.clone());
            }
        }

        let saved = self.save_form(&form).await?;
        info!(
            form_id = %id,
            from = %previous,
            to = %saved.status,
            is_final,
            "Saved form submission"
        );

        if saved.status.is_handed_in() && !previous.is_handed_in() {
            self.complete_form_task(&saved).await;
        }
        Ok(saved)
    }

    /// Sign a handed-in form as `role`; it completes once every required role has signed
    pub async fn sign_submission(
        &self,
        id: &str,
        viewer: &Viewer,
        role: ParticipantRole,
        image: &str,
    ) -> WorkflowResult<FormSubmission> {
        let mut form = self.stores.form_submissions.get(id).await?;
        if !matches!(form.status, FormStatus::Submitted | FormStatus::Completed) {
            return Err(WorkflowError::transition("form", form.status, FormStatus::Completed));
        }

        if !viewer.is_admin {
            let project = self.stores.projects.get(&form.project_id).await?;
            if !project.roles_of(&viewer.profile_id).contains(&role) {
                return Err(WorkflowError::PermissionDenied(format!(
                    "{} cannot sign form {} as {}",
                    viewer.profile_id, id, role
                )));
            }
        }

        form.record(&role, &SignatureInput::new(image), Utc::now())?;
        let previous = form.status;
        form.status = settled_status(&form);

        let saved = self.save_form(&form).await?;
        info!(form_id = %id, role = %role, status = %saved.status, "Form signed");

        if saved.status == FormStatus::Completed && previous != FormStatus::Completed {
            self.complete_form_task(&saved).await;
        }
        Ok(saved)
    }

    /// Withdraw one role's signature; a completed form drops back to submitted.
    /// Closed forms must be unlocked first.
    pub async fn remove_form_signature(
        &self,
        id: &str,
        viewer: &Viewer,
        role: ParticipantRole,
    ) -> WorkflowResult<FormSubmission> {
        let mut form = self.stores.form_submissions.get(id).await?;
        if form.status == FormStatus::Closed {
            return Err(WorkflowError::transition("form", form.status, FormStatus::Submitted));
        }

        if !viewer.is_admin {
            if is_locked(&form) {
                return Err(WorkflowError::PermissionDenied(format!(
                    "Form {} is finalized; an admin must unlock it",
                    id
                )));
            }
            let project = self.stores.projects.get(&form.project_id).await?;
            if !project.roles_of(&viewer.profile_id).contains(&role) {
                return Err(WorkflowError::PermissionDenied(
                    "Only the signer or an admin can remove a signature".to_string(),
                ));
            }
        }

        if form.meta.signature(role).is_none() {
            debug!(form_id = %id, role = %role, "No signature to remove");
            return Ok(form);
        }

        form.revoke(&role);
        if form.status == FormStatus::Completed {
            form.status = FormStatus::Submitted;
        }
        let saved = self.save_form(&form).await?;
        info!(form_id = %id, role = %role, "Form signature removed");
        Ok(saved)
    }

    /// Take a handed-in form back to the assignee, dropping its signatures
    pub async fn undo_submission(&self, id: &str, viewer: &Viewer) -> WorkflowResult<FormSubmission> {
        let mut form = self.stores.form_submissions.get(id).await?;

        if form.status == FormStatus::Closed {
            return Err(WorkflowError::transition("form", form.status, FormStatus::Assigned));
        }
        if !viewer.is_admin {
            if is_locked(&form) {
                return Err(WorkflowError::PermissionDenied(format!(
                    "Form {} is finalized; an admin must unlock it",
                    id
                )));
            }
            if form.assignee_id.as_deref() != Some(viewer.profile_id.as_str()) {
                return Err(WorkflowError::PermissionDenied(
                    "You can only undo your own submissions".to_string(),
                ));
            }
        }
        if !matches!(form.status, FormStatus::Submitted | FormStatus::Completed) {
            return Err(WorkflowError::transition("form", form.status, FormStatus::Assigned));
        }

        form.meta.clear_signatures();
        form.status = if form.assignee_id.is_some() {
            FormStatus::Assigned
        } else {
            FormStatus::Draft
        };
        let saved = self.save_form(&form).await?;
        info!(form_id = %id, status = %saved.status, "Form submission undone");

        self.reopen_form_task(&saved).await;
        Ok(saved)
    }

    /// Admin override: reopen a completed or closed form for editing
    pub async fn unlock_submission(&self, id: &str, viewer: &Viewer) -> WorkflowResult<FormSubmission> {
        require_admin(viewer, "unlock forms")?;
        let mut form = self.stores.form_submissions.get(id).await?;
        if !matches!(form.status, FormStatus::Completed | FormStatus::Closed) {
            return Err(WorkflowError::transition("form", form.status, FormStatus::Submitted));
        }

        form.status = FormStatus::Submitted;
        let saved = self.save_form(&form).await?;
        info!(form_id = %id, "Form unlocked");
        Ok(saved)
    }

    pub async fn close_submission(&self, id: &str, viewer: &Viewer) -> WorkflowResult<FormSubmission> {
        require_admin(viewer, "close forms")?;
        let mut form = self.stores.form_submissions.get(id).await?;
        if form.status == FormStatus::Closed {
            return Ok(form);
        }

        form.status = FormStatus::Closed;
        let saved = self.save_form(&form).await?;
        info!(form_id = %id, "Form closed");
        Ok(saved)
    }

    pub async fn reject_submission(&self, id: &str, viewer: &Viewer) -> WorkflowResult<FormSubmission> {
        require_admin(viewer, "reject forms")?;
        let mut form = self.stores.form_submissions.get(id).await?;
        if !matches!(form.status, FormStatus::Submitted | FormStatus::Completed) {
            return Err(WorkflowError::transition("form", form.status, FormStatus::Rejected));
        }

        form.status = FormStatus::Rejected;
        let saved = self.save_form(&form).await?;
        info!(form_id = %id, "Form rejected");

        self.reopen_form_task(&saved).await;
        Ok(saved)
    }

    /// Delete a submission after removing its attachment blobs
    pub async fn delete_submission(&self, id: &str, viewer: &Viewer) -> WorkflowResult<()> {
        require_admin(viewer, "delete forms")?;
        let form = self.stores.form_submissions.get(id).await?;

        for key in &form.attachments {
            if let Err(e) = self.objects.delete(key).await {
                warn!(form_id = %id, key = %key, error = %e, "Failed to remove form attachment");
            }
        }

        for task in self.form_tasks(&form).await {
            if task.status != TaskStatus::Completed {
                if let Err(e) = self.stores.tasks.delete(&task.id).await {
                    warn!(task_id = %task.id, error = %e, "Failed to remove form task");
                }
            }
        }

        self.stores.form_submissions.delete(id).await?;
        info!(form_id = %id, attachments = form.attachments.len(), "Form submission deleted");
        Ok(())
    }

    pub async fn project_forms(&self, project_id: &str) -> WorkflowResult<Vec<FormSubmission>> {
        let query = Query::new().eq("project_id", project_id);
        Ok(self.stores.form_submissions.list(&query).await?)
    }

    /// Tasks created alongside this form for its assignee
    async fn form_tasks(&self, form: &FormSubmission) -> Vec<estately_core::Task> {
        let Some(assignee) = form.assignee_id.as_deref() else {
            return Vec::new();
        };
        let query = Query::new()
            .eq("project_id", form.project_id.as_str())
            .eq("task_type", "form_submission")
            .eq("assignee_id", assignee)
            .eq("title", format!("{}{}", FORM_TASK_PREFIX, form.title));
        match self.stores.tasks.list(&query).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(form_id = %form.id, error = %e, "Failed to look up form tasks");
                Vec::new()
            }
        }
    }

    /// Best-effort: mark the form's task completed
    async fn complete_form_task(&self, form: &FormSubmission) {
        for mut task in self.form_tasks(form).await {
            if task.status == TaskStatus::Completed || task.task_type != TaskType::FormSubmission {
                continue;
            }
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
            match self.stores.tasks.save(&task).await {
                Ok(_) => info!(task_id = %task.id, form_id = %form.id, "Form task completed"),
                Err(e) => warn!(task_id = %task.id, error = %e, "Failed to complete form task"),
            }
        }
    }

    /// Best-effort: put the form's task back to todo
    async fn reopen_form_task(&self, form: &FormSubmission) {
        for mut task in self.form_tasks(form).await {
            if task.status != TaskStatus::Completed {
                continue;
            }
            task.status = TaskStatus::Todo;
            task.completed_at = None;
            if let Err(e) = self.stores.tasks.save(&task).await {
                warn!(task_id = %task.id, error = %e, "Failed to reopen form task");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estately_core::types::ProvisioningFlags;
    use estately_core::SignatureEntry;
    use rstest::rstest;

    fn form(status: FormStatus, signed: bool) -> FormSubmission {
        let mut meta = FormMeta::new(true, true);
        if signed {
            meta.set_signature(
                ParticipantRole::Seller,
                SignatureEntry::new("data:image/png;base64,AAA", Utc::now()),
            );
        }
        FormSubmission {
            id: "f1".to_string(),
            status,
            assignee_id: Some("assignee".to_string()),
            meta,
            ..Default::default()
        }
    }

    fn definition(allow_changes: AllowChanges) -> FormDefinition {
        FormDefinition {
            flags: ProvisioningFlags {
                allow_changes,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[rstest]
    // Outsiders are always locked out
    #[case("someone", false, FormStatus::Assigned, false, AllowChanges::Always, true)]
    // The assignee edits until something is signed
    #[case("assignee", false, FormStatus::Assigned, false, AllowChanges::Always, false)]
    #[case("assignee", false, FormStatus::Submitted, false, AllowChanges::Always, false)]
    #[case("assignee", false, FormStatus::Assigned, true, AllowChanges::Always, true)]
    #[case("assignee", false, FormStatus::Submitted, true, AllowChanges::Always, true)]
    // before_submission locks handed-in forms for non-admins
    #[case("assignee", false, FormStatus::Assigned, false, AllowChanges::BeforeSubmission, false)]
    #[case("assignee", false, FormStatus::Submitted, false, AllowChanges::BeforeSubmission, true)]
    #[case("admin", true, FormStatus::Submitted, false, AllowChanges::BeforeSubmission, false)]
    // Admins bypass signature locks but not `never`
    #[case("admin", true, FormStatus::Submitted, true, AllowChanges::Always, false)]
    #[case("admin", true, FormStatus::Assigned, false, AllowChanges::Never, true)]
    #[case("assignee", false, FormStatus::Assigned, false, AllowChanges::Never, true)]
    fn test_effective_read_only(
        #[case] profile: &str,
        #[case] is_admin: bool,
        #[case] status: FormStatus,
        #[case] signed: bool,
        #[case] allow_changes: AllowChanges,
        #[case] expected: bool,
    ) {
        let viewer = Viewer::new(profile, is_admin);
        let def = definition(allow_changes);
        assert_eq!(
            effective_read_only(&form(status, signed), Some(&def), &viewer),
            expected
        );
    }

    #[test]
    fn test_missing_definition_allows_changes() {
        let viewer = Viewer::new("assignee", false);
        assert!(!effective_read_only(&form(FormStatus::Submitted, false), None, &viewer));
    }

    #[test]
    fn test_settled_status() {
        let mut f = form(FormStatus::Submitted, true);
        assert_eq!(settled_status(&f), FormStatus::Submitted);
        f.meta.set_signature(
            ParticipantRole::Buyer,
            SignatureEntry::new("data:b", Utc::now()),
        );
        assert_eq!(settled_status(&f), FormStatus::Completed);
        assert!(is_locked(&f));
    }
}
