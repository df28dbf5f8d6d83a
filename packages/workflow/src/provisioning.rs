// ABOUTME: Requirement provisioning and backfill
// ABOUTME: Materializes tasks, form submissions and contracts from definitions per project participant

use chrono::{Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use tracing::{debug, error, info};

use estately_core::constants::{FORM_TASK_PREFIX, UPLOAD_TASK_PREFIX};
use estately_core::sanitize_key;
use estately_core::types::{
    ContractTemplate, DocumentDefinition, FormDefinition, ParticipantRole, Project, Task,
    TaskStatus, TaskType,
};
use estately_storage::Query;

use crate::error::{WorkflowError, WorkflowResult};
use crate::forms::NewSubmission;
use crate::Workflow;

/// What a provisioning or backfill run created, skipped and failed on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub created_tasks: Vec<String>,
    pub created_forms: Vec<String>,
    pub created_contracts: Vec<String>,
    /// Projects left alone because they already had the requirement
    pub skipped_projects: Vec<String>,
    pub failures: Vec<String>,
}

impl ProvisionReport {
    pub fn merge(&mut self, other: ProvisionReport) {
        self.created_tasks.extend(other.created_tasks);
        self.created_forms.extend(other.created_forms);
        self.created_contracts.extend(other.created_contracts);
        self.skipped_projects.extend(other.skipped_projects);
        self.failures.extend(other.failures);
    }

    pub fn created(&self) -> usize {
        self.created_tasks.len() + self.created_forms.len() + self.created_contracts.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, context: String, err: WorkflowError) {
        error!("{}: {}", context, err);
        self.failures.push(format!("{}: {}", context, err));
    }
}

/// Participants a definition is assigned to on `project`; absent roles are skipped
fn targets(roles: &[ParticipantRole], project: &Project) -> Vec<(ParticipantRole, String)> {
    let mut targets: Vec<(ParticipantRole, String)> = Vec::new();
    for role in roles {
        match project.participant(*role) {
            Some(id) if !targets.iter().any(|(_, existing)| existing == id) => {
                targets.push((*role, id.to_string()))
            }
            Some(_) => {}
            None => debug!(project_id = %project.id, role = %role, "No participant for role"),
        }
    }
    targets
}

impl Workflow {
    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    /// Store a document definition under its sanitized key
    pub async fn register_document_definition(
        &self,
        mut definition: DocumentDefinition,
    ) -> WorkflowResult<DocumentDefinition> {
        definition.id = definition_id(&definition.key)?;
        Ok(self.stores.document_definitions.create(definition).await?)
    }

    /// Store a form definition under its sanitized key
    pub async fn register_form_definition(
        &self,
        mut definition: FormDefinition,
    ) -> WorkflowResult<FormDefinition> {
        definition.id = definition_id(&definition.key)?;
        Ok(self.stores.form_definitions.create(definition).await?)
    }

    // -----------------------------------------------------------------------
    // Single project
    // -----------------------------------------------------------------------

    /// Create upload tasks for every participant the definition is assigned to
    pub async fn provision_document(
        &self,
        definition: &DocumentDefinition,
        project: &Project,
    ) -> ProvisionReport {
        let mut report = ProvisionReport::default();
        if !definition.flags.auto_create_task_for_assignee {
            debug!(definition_id = %definition.id, "Definition does not create tasks");
            return report;
        }

        let targets = targets(&definition.flags.auto_assign_to, project);
        let results = join_all(targets.iter().map(|(role, profile_id)| async move {
            let result = self.create_document_task(definition, project, profile_id).await;
            (*role, profile_id, result)
        }))
        .await;

        for (role, profile_id, result) in results {
            match result {
                Ok(task) => report.created_tasks.push(task.id),
                Err(e) => report.fail(
                    format!(
                        "document {} for {} {} in project {}",
                        definition.id, role, profile_id, project.id
                    ),
                    e,
                ),
            }
        }
        report
    }

    async fn create_document_task(
        &self,
        definition: &DocumentDefinition,
        project: &Project,
        assignee: &str,
    ) -> WorkflowResult<Task> {
        let task = self
            .stores
            .tasks
            .create(Task {
                title: format!("{}{}", UPLOAD_TASK_PREFIX, definition.title),
                description: Some(format!("Please upload your {}.", definition.title)),
                task_type: TaskType::DocumentUpload,
                status: TaskStatus::Todo,
                project_id: project.id.clone(),
                assignee_id: Some(assignee.to_string()),
                due_date: Some(Utc::now() + Duration::days(self.config.document_task_due_days)),
                category: Some(self.config.document_task_category.clone()),
                required_doc_type: Some(definition.id.clone()),
                ..Default::default()
            })
            .await?;
        info!(
            task_id = %task.id,
            project_id = %project.id,
            assignee_id = %assignee,
            definition_id = %definition.id,
            "Created document task"
        );
        Ok(task)
    }

    /// Assign a form to every targeted participant, or add it unassigned
    pub async fn provision_form(&self, definition: &FormDefinition, project: &Project) -> ProvisionReport {
        if definition.flags.auto_assign_to.is_empty() {
            let mut report = ProvisionReport::default();
            if definition.flags.auto_add_to_new_projects {
                match self.create_form_for(definition, project, None).await {
                    Ok((form_id, _)) => report.created_forms.push(form_id),
                    Err(e) => report.fail(
                        format!("form {} in project {}", definition.key, project.id),
                        e,
                    ),
                }
            }
            return report;
        }

        let targets = targets(&definition.flags.auto_assign_to, project);
        self.assign_form(definition, project, &targets).await
    }

    async fn assign_form(
        &self,
        definition: &FormDefinition,
        project: &Project,
        targets: &[(ParticipantRole, String)],
    ) -> ProvisionReport {
        let mut report = ProvisionReport::default();
        let results = join_all(targets.iter().map(|(role, profile_id)| async move {
            let result = self
                .create_form_for(definition, project, Some(profile_id.as_str()))
                .await;
            (*role, profile_id, result)
        }))
        .await;

        for (role, profile_id, result) in results {
            match result {
                Ok((form_id, task_id)) => {
                    report.created_forms.push(form_id);
                    report.created_tasks.extend(task_id);
                }
                Err(e) => report.fail(
                    format!(
                        "form {} for {} {} in project {}",
                        definition.key, role, profile_id, project.id
                    ),
                    e,
                ),
            }
        }
        report
    }

    async fn create_form_for(
        &self,
        definition: &FormDefinition,
        project: &Project,
        assignee: Option<&str>,
    ) -> WorkflowResult<(String, Option<String>)> {
        let form = self
            .create_submission(NewSubmission {
                project_id: project.id.clone(),
                form_key: form_key(definition).to_string(),
                title: Some(definition.title.clone()),
                submitter_id: assignee.map(str::to_string),
                assignee_id: assignee.map(str::to_string),
                data: Some(definition.default_data.clone()),
            })
            .await?;

        let Some(assignee) = assignee.filter(|_| definition.flags.auto_create_task_for_assignee)
        else {
            return Ok((form.id, None));
        };

        let task = self
            .stores
            .tasks
            .create(Task {
                title: format!("{}{}", FORM_TASK_PREFIX, definition.title),
                description: Some(format!(
                    "Please complete the {} form as requested.",
                    definition.title
                )),
                task_type: TaskType::FormSubmission,
                status: TaskStatus::Todo,
                project_id: project.id.clone(),
                assignee_id: Some(assignee.to_string()),
                due_date: Some(Utc::now() + Duration::days(self.config.form_task_due_days)),
                ..Default::default()
            })
            .await?;
        info!(task_id = %task.id, form_id = %form.id, assignee_id = %assignee, "Created form task");
        Ok((form.id, Some(task.id)))
    }

    /// Generate the template's contract for the project
    pub async fn provision_contract(&self, template: &ContractTemplate, project: &Project) -> ProvisionReport {
        let mut report = ProvisionReport::default();
        match self.create_contract(template, project).await {
            Ok(contract) => report.created_contracts.push(contract.id),
            Err(e) => report.fail(
                format!("contract {} in project {}", template.id, project.id),
                e,
            ),
        }
        report
    }

    /// Apply every auto-add definition of all three kinds to a new project
    pub async fn provision_project(&self, project_id: &str) -> WorkflowResult<ProvisionReport> {
        let project = self.stores.projects.get(project_id).await?;
        let mut report = ProvisionReport::default();

        let documents = self.stores.document_definitions.all().await?;
        for def in documents.iter().filter(|d| d.flags.auto_add_to_new_projects) {
            report.merge(self.provision_document(def, &project).await);
        }

        let forms = self.stores.form_definitions.all().await?;
        for def in forms.iter().filter(|d| d.flags.auto_add_to_new_projects) {
            report.merge(self.provision_form(def, &project).await);
        }

        let templates = self.stores.contract_templates.all().await?;
        for template in templates.iter().filter(|t| t.flags.auto_add_to_new_projects) {
            report.merge(self.provision_contract(template, &project).await);
        }

        info!(
            project_id = %project_id,
            created = report.created(),
            failures = report.failures.len(),
            "Provisioned project"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Backfill across existing projects
    // -----------------------------------------------------------------------

    /// Provision a form for every targeted participant that has no submission
    /// with its key yet. Unassigned forms are added once per project.
    pub async fn backfill_form(&self, definition_id: &str) -> WorkflowResult<ProvisionReport> {
        let definition = self.stores.form_definitions.get(definition_id).await?;
        let definition = &definition;
        let key = form_key(definition);
        let projects = self.stores.projects.all().await?;

        let report = self
            .backfill_projects(&definition.id, &projects, |project| async move {
                let query = Query::new()
                    .eq("project_id", project.id.as_str())
                    .eq("form_key", key);
                let existing = self.stores.form_submissions.list(&query).await?;

                if definition.flags.auto_assign_to.is_empty() {
                    if !existing.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(self.provision_form(definition, project).await));
                }

                let missing: Vec<(ParticipantRole, String)> =
                    targets(&definition.flags.auto_assign_to, project)
                        .into_iter()
                        .filter(|(_, profile_id)| {
                            !existing
                                .iter()
                                .any(|form| form.assignee_id.as_deref() == Some(profile_id.as_str()))
                        })
                        .collect();
                if missing.is_empty() {
                    return Ok(None);
                }
                Ok(Some(self.assign_form(definition, project, &missing).await))
            })
            .await;
        Ok(report)
    }

    /// Provision upload tasks into every project that has none for this definition
    pub async fn backfill_document(&self, definition_id: &str) -> WorkflowResult<ProvisionReport> {
        let definition = self.stores.document_definitions.get(definition_id).await?;
        let definition = &definition;
        let projects = self.stores.projects.all().await?;

        let report = self
            .backfill_projects(&definition.id, &projects, |project| async move {
                let query = Query::new()
                    .eq("project_id", project.id.as_str())
                    .eq("task_type", "document_upload")
                    .eq("required_doc_type", definition.id.as_str())
                    .limit(1);
                if !self.stores.tasks.list(&query).await?.is_empty() {
                    return Ok(None);
                }
                Ok(Some(self.provision_document(definition, project).await))
            })
            .await;
        Ok(report)
    }

    /// Generate the contract in every project that has none from this template
    pub async fn backfill_contract(&self, template_id: &str) -> WorkflowResult<ProvisionReport> {
        let template = self.stores.contract_templates.get(template_id).await?;
        let template = &template;
        let projects = self.stores.projects.all().await?;

        let report = self
            .backfill_projects(&template.id, &projects, |project| async move {
                let query = Query::new()
                    .eq("project_id", project.id.as_str())
                    .eq("template_id", template.id.as_str())
                    .limit(1);
                if !self.stores.contracts.list(&query).await?.is_empty() {
                    return Ok(None);
                }
                Ok(Some(self.provision_contract(template, project).await))
            })
            .await;
        Ok(report)
    }

    /// Run `apply` against every project, continuing past per-project failures.
    /// `apply` yields `None` when the project already has the requirement.
    async fn backfill_projects<'p, F, Fut>(
        &self,
        definition_id: &str,
        projects: &'p [Project],
        apply: F,
    ) -> ProvisionReport
    where
        F: Fn(&'p Project) -> Fut,
        Fut: Future<Output = WorkflowResult<Option<ProvisionReport>>>,
    {
        let mut report = ProvisionReport::default();
        let results = join_all(projects.iter().map(|project| {
            let fut = apply(project);
            async move { (project, fut.await) }
        }))
        .await;

        for (project, result) in results {
            match result {
                Ok(Some(created)) => report.merge(created),
                Ok(None) => report.skipped_projects.push(project.id.clone()),
                Err(e) => report.fail(
                    format!("backfill {} into project {}", definition_id, project.id),
                    e,
                ),
            }
        }

        info!(
            definition_id = %definition_id,
            projects = projects.len(),
            created = report.created(),
            skipped = report.skipped_projects.len(),
            failures = report.failures.len(),
            "Backfill finished"
        );
        report
    }
}

fn form_key(definition: &FormDefinition) -> &str {
    if definition.key.is_empty() {
        &definition.id
    } else {
        &definition.key
    }
}

fn definition_id(key: &str) -> WorkflowResult<String> {
    let id = sanitize_key(key);
    if id.is_empty() {
        return Err(WorkflowError::Validation("Definition key is required".to_string()));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_targets_skip_absent_and_duplicate_participants() {
        let project = Project {
            id: "p1".to_string(),
            manager_id: "agent".to_string(),
            seller_id: Some("s".to_string()),
            buyer_id: None,
            ..Default::default()
        };
        let roles = [
            ParticipantRole::Seller,
            ParticipantRole::Buyer,
            ParticipantRole::Admin,
            ParticipantRole::Seller,
        ];
        assert_eq!(
            targets(&roles, &project),
            vec![
                (ParticipantRole::Seller, "s".to_string()),
                (ParticipantRole::Admin, "agent".to_string()),
            ]
        );
    }

    #[test]
    fn test_report_merge() {
        let mut report = ProvisionReport {
            created_tasks: vec!["t1".into()],
            ..Default::default()
        };
        report.merge(ProvisionReport {
            created_forms: vec!["f1".into()],
            failures: vec!["boom".into()],
            ..Default::default()
        });
        assert_eq!(report.created(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_definition_id_is_sanitized_key() {
        assert_eq!(definition_id("Passport Copy").unwrap(), "passport_copy");
        assert!(definition_id("  ").is_err());
    }
}
