// ABOUTME: Project status aggregation (read path)
// ABOUTME: Per-item participant completion across contracts, forms and document requirements, filtered by one visibility rule

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use estately_core::types::{
    Contract, DocumentDefinition, DocumentRecord, FormDefinition, FormSubmission,
    ParticipantRole, Profile, Project, Task, Viewer, Visibility,
};

use crate::error::WorkflowResult;
use crate::forms::effective_read_only;
use crate::Workflow;

/// How a participant relates to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantLabel {
    Seller,
    Buyer,
    Admin,
    /// Holds no project role, only the item assignment
    Assignee,
}

impl ParticipantLabel {
    fn for_profile(project: &Project, profile_id: &str) -> Self {
        match project.roles_of(profile_id).first() {
            Some(role) => (*role).into(),
            None => ParticipantLabel::Assignee,
        }
    }
}

impl From<ParticipantRole> for ParticipantLabel {
    fn from(role: ParticipantRole) -> Self {
        match role {
            ParticipantRole::Seller => ParticipantLabel::Seller,
            ParticipantRole::Buyer => ParticipantLabel::Buyer,
            ParticipantRole::Admin => ParticipantLabel::Admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub role: ParticipantLabel,
    pub profile_id: Option<String>,
    pub name: Option<String>,
    /// Signed, submitted or provided, depending on the item
    pub complete: bool,
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

/// The inputs of the visibility rule, extracted the same way for every item kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityFacts {
    pub is_public: bool,
    /// Profiles named on the item (assignees, signers, uploaders)
    pub participants: Vec<String>,
    /// Project roles the item is gated to
    pub role_flags: Vec<ParticipantRole>,
}

/// Admins see everything; others see public items, items they take part in,
/// and items gated to a role they hold on the project.
pub fn is_visible(viewer: &Viewer, viewer_roles: &[ParticipantRole], facts: &VisibilityFacts) -> bool {
    viewer.is_admin
        || facts.is_public
        || facts.participants.iter().any(|p| p == &viewer.profile_id)
        || facts.role_flags.iter().any(|role| viewer_roles.contains(role))
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractStatusView {
    pub contract: Contract,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormStatusView {
    pub form: FormSubmission,
    pub participants: Vec<Participant>,
    /// Whether the viewer may not edit the form data
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatusView {
    pub definition_id: String,
    pub title: String,
    pub visibility: Visibility,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    pub project_id: String,
    pub contracts: Vec<ContractStatusView>,
    pub forms: Vec<FormStatusView>,
    pub docs: Vec<DocumentStatusView>,
    pub tasks: Vec<Task>,
}

pub fn contract_visibility(contract: &Contract) -> VisibilityFacts {
    VisibilityFacts {
        is_public: contract.visibility == Visibility::Public,
        participants: contract.assignees.clone(),
        role_flags: contract.required_roles.clone(),
    }
}

pub fn form_visibility(form: &FormSubmission, definition: Option<&FormDefinition>) -> VisibilityFacts {
    VisibilityFacts {
        is_public: definition.is_some_and(|def| def.flags.visibility == Visibility::Public),
        participants: form.assignee_id.iter().cloned().collect(),
        role_flags: form.meta.required_roles(),
    }
}

pub fn document_visibility(definition: &DocumentDefinition, participants: &[Participant]) -> VisibilityFacts {
    VisibilityFacts {
        is_public: definition.flags.visibility == Visibility::Public,
        participants: participants
            .iter()
            .filter_map(|p| p.profile_id.clone())
            .collect(),
        role_flags: definition.flags.auto_assign_to.clone(),
    }
}

/// Profiles referenced by a status view, looked up once
struct Directory(HashMap<String, Profile>);

impl Directory {
    fn name(&self, profile_id: &str) -> Option<String> {
        self.0.get(profile_id).map(|p| p.name.clone())
    }

    fn participant(
        &self,
        role: ParticipantLabel,
        profile_id: Option<&str>,
        complete: bool,
        date: Option<DateTime<Utc>>,
    ) -> Participant {
        Participant {
            role,
            profile_id: profile_id.map(str::to_string),
            name: profile_id.and_then(|id| self.name(id)),
            complete,
            date,
            file_id: None,
            file_url: None,
        }
    }
}

fn contract_participants(contract: &Contract, project: &Project, dir: &Directory) -> Vec<Participant> {
    contract
        .assignees
        .iter()
        .map(|id| {
            dir.participant(
                ParticipantLabel::for_profile(project, id),
                Some(id.as_str()),
                contract.signed_by.contains(id),
                None,
            )
        })
        .collect()
}

/// The assignee until the form is handed in (or when nobody has to sign),
/// then one entry per required signer
fn form_participants(form: &FormSubmission, project: &Project, dir: &Directory) -> Vec<Participant> {
    let submitted = form.status.is_handed_in();
    let required = form.meta.required_roles();
    let mut participants = Vec::new();

    if !submitted || required.is_empty() {
        let label = form
            .assignee_id
            .as_deref()
            .map(|id| ParticipantLabel::for_profile(project, id))
            .unwrap_or(ParticipantLabel::Assignee);
        participants.push(dir.participant(
            label,
            form.assignee_id.as_deref(),
            submitted,
            Some(form.updated_at),
        ));
    }

    if submitted {
        for role in required {
            let signature = form.meta.signature(role);
            participants.push(dir.participant(
                role.into(),
                project.participant(role),
                signature.is_some(),
                signature.and_then(|s| s.signed_at),
            ));
        }
    }
    participants
}

fn with_file(mut participant: Participant, record: Option<&DocumentRecord>) -> Participant {
    if let Some(record) = record {
        participant.file_id = Some(record.file_id.clone());
        participant.file_url = record.file_url.clone();
        participant.date = record.uploaded_at.or(Some(record.created_at));
    }
    participant
}

/// One entry per assigned role, plus uploaders outside those roles
fn document_participants(
    definition: &DocumentDefinition,
    records: &[&DocumentRecord],
    project: &Project,
    dir: &Directory,
) -> Vec<Participant> {
    let mut participants: Vec<Participant> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for role in &definition.flags.auto_assign_to {
        let Some(profile_id) = project.participant(*role) else {
            continue;
        };
        if seen.iter().any(|s| s == profile_id) {
            continue;
        }
        seen.push(profile_id.to_string());
        let record = records.iter().copied().find(|r| r.owner_id == profile_id);
        participants.push(with_file(
            dir.participant((*role).into(), Some(profile_id), record.is_some(), None),
            record,
        ));
    }

    for record in records {
        if seen.contains(&record.owner_id) {
            continue;
        }
        seen.push(record.owner_id.clone());
        participants.push(with_file(
            dir.participant(
                ParticipantLabel::for_profile(project, &record.owner_id),
                Some(record.owner_id.as_str()),
                true,
                None,
            ),
            Some(*record),
        ));
    }
    participants
}

impl Workflow {
    async fn directory(&self, ids: impl IntoIterator<Item = String>) -> WorkflowResult<Directory> {
        let mut profiles = HashMap::new();
        for id in ids {
            if profiles.contains_key(&id) {
                continue;
            }
            if let Some(profile) = self.stores.profiles.find(&id).await? {
                profiles.insert(id, profile);
            }
        }
        Ok(Directory(profiles))
    }

    /// Everything the viewer may see of a project's closing requirements
    pub async fn project_status(&self, project_id: &str, viewer: &Viewer) -> WorkflowResult<ProjectStatus> {
        let project = self.stores.projects.get(project_id).await?;
        let viewer_roles = project.roles_of(&viewer.profile_id);

        let contracts = self.project_contracts(project_id).await?;
        let forms = self.project_forms(project_id).await?;
        let records = self.project_documents(project_id).await?;
        let tasks = self.project_tasks(project_id).await?;
        let form_definitions = self.stores.form_definitions.all().await?;
        let document_definitions = self.stores.document_definitions.all().await?;

        let mut ids: Vec<String> = ParticipantRole::ALL
            .iter()
            .filter_map(|role| project.participant(*role).map(str::to_string))
            .collect();
        ids.extend(contracts.iter().flat_map(|c| c.assignees.iter().cloned()));
        ids.extend(forms.iter().filter_map(|f| f.assignee_id.clone()));
        ids.extend(records.iter().map(|r| r.owner_id.clone()));
        let dir = self.directory(ids).await?;

        let contracts = contracts
            .into_iter()
            .filter(|c| is_visible(viewer, &viewer_roles, &contract_visibility(c)))
            .map(|contract| ContractStatusView {
                participants: contract_participants(&contract, &project, &dir),
                contract,
            })
            .collect();

        let forms = forms
            .into_iter()
            .filter_map(|form| {
                let definition = form_definitions
                    .iter()
                    .find(|d| d.key == form.form_key || d.id == form.form_key);
                if !is_visible(viewer, &viewer_roles, &form_visibility(&form, definition)) {
                    return None;
                }
                Some(FormStatusView {
                    participants: form_participants(&form, &project, &dir),
                    read_only: effective_read_only(&form, definition, viewer),
                    form,
                })
            })
            .collect();

        let mut docs = Vec::new();
        for definition in &document_definitions {
            let matching: Vec<&DocumentRecord> = records
                .iter()
                .filter(|r| r.definition_id.as_deref() == Some(definition.id.as_str()))
                .collect();
            if definition.flags.auto_assign_to.is_empty() && matching.is_empty() {
                continue;
            }
            let participants = document_participants(definition, &matching, &project, &dir);
            if !is_visible(viewer, &viewer_roles, &document_visibility(definition, &participants)) {
                continue;
            }
            docs.push(DocumentStatusView {
                definition_id: definition.id.clone(),
                title: definition.title.clone(),
                visibility: definition.flags.visibility,
                participants,
            });
        }

        let tasks = tasks
            .into_iter()
            .filter(|t| viewer.is_admin || t.assignee_id.as_deref() == Some(viewer.profile_id.as_str()))
            .collect();

        let status = ProjectStatus {
            project_id: project_id.to_string(),
            contracts,
            forms,
            docs,
            tasks,
        };
        debug!(
            project_id = %project_id,
            viewer = %viewer.profile_id,
            contracts = status.contracts.len(),
            forms = status.forms.len(),
            docs = status.docs.len(),
            tasks = status.tasks.len(),
            "Aggregated project status"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estately_core::types::FormStatus;
    use estately_core::{FormMeta, SignatureEntry};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn project() -> Project {
        Project {
            id: "p1".to_string(),
            manager_id: "agent".to_string(),
            seller_id: Some("s".to_string()),
            buyer_id: Some("b".to_string()),
            ..Default::default()
        }
    }

    #[rstest]
    #[case(Viewer::admin("agent"), false, &[], &[], true)]
    #[case(Viewer::new("x", false), true, &[], &[], true)]
    #[case(Viewer::new("b", false), false, &["b"], &[], true)]
    #[case(Viewer::new("b", false), false, &[], &[ParticipantRole::Buyer], true)]
    #[case(Viewer::new("s", false), false, &["b"], &[ParticipantRole::Buyer], false)]
    #[case(Viewer::new("x", false), false, &["b"], &[ParticipantRole::Seller], false)]
    fn test_visibility_rule(
        #[case] viewer: Viewer,
        #[case] is_public: bool,
        #[case] participants: &[&str],
        #[case] role_flags: &[ParticipantRole],
        #[case] expected: bool,
    ) {
        let roles = project().roles_of(&viewer.profile_id);
        let facts = VisibilityFacts {
            is_public,
            participants: participants.iter().map(|p| p.to_string()).collect(),
            role_flags: role_flags.to_vec(),
        };
        assert_eq!(is_visible(&viewer, &roles, &facts), expected);
    }

    #[test]
    fn test_form_participants_switch_to_signers_after_submit() {
        let dir = Directory(HashMap::new());
        let mut form = FormSubmission {
            status: FormStatus::Assigned,
            assignee_id: Some("b".to_string()),
            meta: FormMeta::new(false, true),
            ..Default::default()
        };

        let before = form_participants(&form, &project(), &dir);
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].role, ParticipantLabel::Buyer);
        assert!(!before[0].complete);

        form.status = FormStatus::Submitted;
        form.meta.set_signature(ParticipantRole::Buyer, SignatureEntry::new("data:b", Utc::now()));
        let after = form_participants(&form, &project(), &dir);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].profile_id.as_deref(), Some("b"));
        assert!(after[0].complete);
    }

    #[test]
    fn test_document_participants_include_outside_uploaders() {
        let dir = Directory(HashMap::new());
        let definition = DocumentDefinition {
            id: "passport".to_string(),
            flags: estately_core::ProvisioningFlags {
                auto_assign_to: vec![ParticipantRole::Seller, ParticipantRole::Buyer],
                ..Default::default()
            },
            ..Default::default()
        };
        let seller_upload = DocumentRecord {
            file_id: "project/p1/user-files/ID_s.pdf".to_string(),
            owner_id: "s".to_string(),
            ..Default::default()
        };
        let other_upload = DocumentRecord {
            file_id: "project/p1/user-files/ID_x.pdf".to_string(),
            owner_id: "x".to_string(),
            ..Default::default()
        };

        let participants = document_participants(
            &definition,
            &[&seller_upload, &other_upload],
            &project(),
            &dir,
        );
        let summary: Vec<(ParticipantLabel, bool)> =
            participants.iter().map(|p| (p.role, p.complete)).collect();
        assert_eq!(
            summary,
            vec![
                (ParticipantLabel::Seller, true),
                (ParticipantLabel::Buyer, false),
                (ParticipantLabel::Assignee, true),
            ]
        );
        assert_eq!(
            participants[0].file_id.as_deref(),
            Some("project/p1/user-files/ID_s.pdf")
        );
    }
}
