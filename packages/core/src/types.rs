// ABOUTME: Domain entity definitions for projects, requirements and workflow items
// ABOUTME: Plain serde structs shared by the storage codecs and the workflow engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::lenient::{self, json_text, opt_datetime, role_list};
use crate::meta::FormMeta;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// A participant's role within a single project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    #[serde(alias = "SELLER")]
    Seller,
    #[serde(alias = "BUYER")]
    Buyer,
    #[serde(alias = "ADMIN")]
    Admin,
}

impl ParticipantRole {
    pub const ALL: [ParticipantRole; 3] = [Self::Seller, Self::Buyer, Self::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Seller => "seller",
            ParticipantRole::Buyer => "buyer",
            ParticipantRole::Admin => "admin",
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "seller" => Ok(ParticipantRole::Seller),
            "buyer" => Ok(ParticipantRole::Buyer),
            "admin" | "agent" | "manager" => Ok(ParticipantRole::Admin),
            other => Err(format!("unknown participant role: {}", other)),
        }
    }
}

/// Account-level role stored on a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[serde(alias = "ADMIN")]
    Admin,
    #[serde(alias = "AGENT")]
    Agent,
    #[serde(alias = "SELLER")]
    Seller,
    #[serde(alias = "BUYER")]
    Buyer,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Buyer
    }
}

impl UserRole {
    /// Admins and agents manage projects and bypass participant checks
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Agent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[serde(alias = "TODO", alias = "PENDING")]
    Todo,
    #[serde(alias = "IN_PROGRESS", alias = "in-progress")]
    InProgress,
    #[serde(alias = "COMPLETED", alias = "done")]
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    DocumentUpload,
    FormSubmission,
    Signature,
    Personal,
    #[serde(other)]
    General,
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::General
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    Upload,
    Generated,
}

impl Default for DocumentSource {
    fn default() -> Self {
        DocumentSource::Upload
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[serde(alias = "PENDING")]
    Pending,
    #[serde(alias = "APPROVED")]
    Approved,
    #[serde(alias = "REJECTED")]
    Rejected,
}

impl Default for VerificationStatus {
    fn default() -> Self {
        VerificationStatus::Pending
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    Draft,
    Assigned,
    Submitted,
    Completed,
    Closed,
    Rejected,
}

impl Default for FormStatus {
    fn default() -> Self {
        FormStatus::Draft
    }
}

impl FormStatus {
    /// Submitted forms and anything past them count as handed in
    pub fn is_handed_in(&self) -> bool {
        matches!(
            self,
            FormStatus::Submitted | FormStatus::Completed | FormStatus::Closed
        )
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormStatus::Draft => "draft",
            FormStatus::Assigned => "assigned",
            FormStatus::Submitted => "submitted",
            FormStatus::Completed => "completed",
            FormStatus::Closed => "closed",
            FormStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignRequestStatus {
    Pending,
    Completed,
    Rejected,
    Expired,
}

impl Default for SignRequestStatus {
    fn default() -> Self {
        SignRequestStatus::Pending
    }
}

impl SignRequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SignRequestStatus::Rejected | SignRequestStatus::Expired)
    }
}

impl fmt::Display for SignRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignRequestStatus::Pending => "pending",
            SignRequestStatus::Completed => "completed",
            SignRequestStatus::Rejected => "rejected",
            SignRequestStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentType {
    Form,
    Document,
}

impl Default for ParentType {
    fn default() -> Self {
        ParentType::Form
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    #[serde(alias = "DRAFT")]
    Draft,
    #[serde(alias = "PENDING_SIGNATURE")]
    PendingSignature,
    #[serde(alias = "SIGNED")]
    Signed,
    #[serde(alias = "EXECUTED")]
    Executed,
    #[serde(alias = "CANCELLED")]
    Cancelled,
}

impl Default for ContractStatus {
    fn default() -> Self {
        ContractStatus::Draft
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContractStatus::Draft => "draft",
            ContractStatus::PendingSignature => "pending_signature",
            ContractStatus::Signed => "signed",
            ContractStatus::Executed => "executed",
            ContractStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[serde(alias = "PUBLIC")]
    Public,
    #[serde(alias = "PRIVATE")]
    Private,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Private
    }
}

/// Who may still edit a form's data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowChanges {
    Always,
    BeforeSubmission,
    Never,
}

impl Default for AllowChanges {
    fn default() -> Self {
        AllowChanges::Always
    }
}

// ---------------------------------------------------------------------------
// Project scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub title: String,
    pub status: String,
    pub price: Option<f64>,
    #[serde(with = "opt_datetime")]
    pub handover_date: Option<DateTime<Utc>>,
    pub reference_number: Option<String>,

    // Relationships
    pub property_id: Option<String>,
    pub agency_id: Option<String>,
    pub manager_id: String,
    pub seller_id: Option<String>,
    pub buyer_id: Option<String>,
}

impl Project {
    /// Resolve the profile that fills `role` on this project
    pub fn participant(&self, role: ParticipantRole) -> Option<&str> {
        let id = match role {
            ParticipantRole::Seller => self.seller_id.as_deref(),
            ParticipantRole::Buyer => self.buyer_id.as_deref(),
            ParticipantRole::Admin => Some(self.manager_id.as_str()),
        };
        id.filter(|id| !id.is_empty())
    }

    /// Every role `profile_id` holds on this project
    pub fn roles_of(&self, profile_id: &str) -> Vec<ParticipantRole> {
        ParticipantRole::ALL
            .into_iter()
            .filter(|role| self.participant(*role) == Some(profile_id))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Property {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub title: String,
    pub address: String,
    pub price: Option<f64>,
    #[serde(with = "opt_datetime")]
    pub handover_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Agency {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub name: String,
    pub address: String,
}

/// Legacy copy of an upload kept on the uploader's profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadedDocument {
    pub file_id: String,
    pub name: String,
    pub document_requirement_id: String,
    pub document_type: String,
    pub project_id: String,
    pub url: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Authentication account id, distinct from the profile document id
    pub user_id: Option<String>,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: UserRole,

    // Identity details used by contract templates
    pub birthday: Option<String>,
    pub birth_place: Option<String>,
    pub id_number: Option<String>,
    pub vat_number: Option<String>,
    pub bank_account: Option<String>,

    #[serde(with = "json_text")]
    pub user_documents: Vec<UploadedDocument>,
}

/// The identity a read or mutation is performed as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub profile_id: String,
    pub is_admin: bool,
}

impl Viewer {
    pub fn new(profile_id: impl Into<String>, is_admin: bool) -> Self {
        Self {
            profile_id: profile_id.into(),
            is_admin,
        }
    }

    pub fn admin(profile_id: impl Into<String>) -> Self {
        Self::new(profile_id, true)
    }

    pub fn from_profile(profile: &Profile) -> Self {
        Self::new(profile.id.clone(), profile.role.is_staff())
    }
}

// ---------------------------------------------------------------------------
// Workflow items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub project_id: String,
    /// Absent means the task is handled by the agent
    pub assignee_id: Option<String>,
    #[serde(with = "opt_datetime")]
    pub due_date: Option<DateTime<Utc>>,
    pub category: Option<String>,

    // Structured links back to the requirement
    pub required_doc_type: Option<String>,
    pub sign_request_id: Option<String>,

    // Completion bookkeeping
    pub completion_file_id: Option<String>,
    #[serde(with = "opt_datetime")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient::flag")]
    pub needs_review: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentRecord {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub title: String,
    pub doc_type: String,
    pub source: DocumentSource,
    /// Object-store key
    pub file_id: String,
    pub file_url: Option<String>,
    pub project_id: String,
    pub owner_id: String,
    pub definition_id: Option<String>,
    pub verification_status: VerificationStatus,
    #[serde(with = "opt_datetime")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSubmission {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub title: String,
    pub form_key: String,
    #[serde(with = "json_text")]
    pub data: Map<String, Value>,
    #[serde(with = "json_text")]
    pub attachments: Vec<String>,
    pub status: FormStatus,
    pub project_id: String,
    pub submitter_id: Option<String>,
    pub assignee_id: Option<String>,
    #[serde(with = "json_text")]
    pub meta: FormMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequiredSigner {
    pub profile_id: String,
    pub signed: bool,
    #[serde(with = "opt_datetime", skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignatureRecord {
    /// Signature image as a data URL or object-store URL
    pub url: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignRequest {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub parent_id: String,
    pub parent_type: ParentType,
    pub project_id: String,
    pub status: SignRequestStatus,
    #[serde(with = "json_text")]
    pub required_signers: Vec<RequiredSigner>,
    #[serde(with = "json_text")]
    pub signature_data: BTreeMap<String, SignatureRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contract {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub title: String,
    pub content: String,
    pub project_id: String,
    pub status: ContractStatus,
    #[serde(with = "json_text")]
    pub assignees: Vec<String>,
    #[serde(with = "json_text")]
    pub signed_by: Vec<String>,
    /// Profile id to signature image
    #[serde(with = "json_text")]
    pub signature_data: BTreeMap<String, String>,
    pub visibility: Visibility,
    pub template_id: Option<String>,
    #[serde(with = "role_list")]
    pub required_roles: Vec<ParticipantRole>,
}

// ---------------------------------------------------------------------------
// Requirement definitions
// ---------------------------------------------------------------------------

/// Provisioning and policy settings shared by every definition kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningFlags {
    #[serde(deserialize_with = "lenient::flag")]
    pub auto_add_to_new_projects: bool,
    #[serde(with = "role_list")]
    pub auto_assign_to: Vec<ParticipantRole>,
    #[serde(deserialize_with = "lenient::flag")]
    pub auto_create_task_for_assignee: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub need_signature_from_seller: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub need_signature_from_buyer: bool,
    pub allow_changes: AllowChanges,
    pub visibility: Visibility,
}

impl ProvisioningFlags {
    /// Roles whose signature the definition asks for
    pub fn signature_roles(&self) -> Vec<ParticipantRole> {
        let mut roles = Vec::new();
        if self.need_signature_from_seller {
            roles.push(ParticipantRole::Seller);
        }
        if self.need_signature_from_buyer {
            roles.push(ParticipantRole::Buyer);
        }
        roles
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentDefinition {
    /// Always the sanitized key
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub key: String,
    pub title: String,
    pub description: Option<String>,
    /// Replaces the uploaded file's name so each user gets one stable key
    pub override_document_name: Option<String>,
    #[serde(flatten)]
    pub flags: ProvisioningFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDefinition {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub key: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "json_text")]
    pub schema: Map<String, Value>,
    #[serde(with = "json_text")]
    pub default_data: Map<String, Value>,
    pub role: Option<UserRole>,
    #[serde(flatten)]
    pub flags: ProvisioningFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractTemplate {
    pub id: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub title: String,
    pub description: Option<String>,
    pub content: String,
    #[serde(flatten)]
    pub flags: ProvisioningFlags,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn project() -> Project {
        Project {
            id: "p1".to_string(),
            manager_id: "agent".to_string(),
            seller_id: Some("s".to_string()),
            buyer_id: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_participant_resolution() {
        let project = project();
        assert_eq!(project.participant(ParticipantRole::Seller), Some("s"));
        assert_eq!(project.participant(ParticipantRole::Buyer), None);
        assert_eq!(project.participant(ParticipantRole::Admin), Some("agent"));
        assert_eq!(project.roles_of("s"), vec![ParticipantRole::Seller]);
        assert!(project.roles_of("nobody").is_empty());
    }

    #[test]
    fn test_empty_participant_is_absent() {
        let mut project = project();
        project.buyer_id = Some(String::new());
        assert_eq!(project.participant(ParticipantRole::Buyer), None);
    }

    #[test]
    fn test_contract_status_accepts_uppercase() {
        let status: ContractStatus = serde_json::from_value(json!("PENDING_SIGNATURE")).unwrap();
        assert_eq!(status, ContractStatus::PendingSignature);
        assert_eq!(status.to_string(), "pending_signature");
    }

    #[test]
    fn test_unknown_task_type_falls_back_to_general() {
        let task: Task = serde_json::from_value(json!({
            "title": "Book movers",
            "task_type": "moving_day",
            "project_id": "p1"
        }))
        .unwrap();
        assert_eq!(task.task_type, TaskType::General);
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn test_definition_flags_tolerate_loose_values() {
        let def: FormDefinition = serde_json::from_value(json!({
            "key": "lijst_van_zaken",
            "title": "List of items",
            "auto_assign_to": "seller",
            "auto_add_to_new_projects": "true",
            "need_signature_from_buyer": 1,
            "default_data": "{\"rooms\": 3}",
            "schema": "not json"
        }))
        .unwrap();
        assert_eq!(def.flags.auto_assign_to, vec![ParticipantRole::Seller]);
        assert!(def.flags.auto_add_to_new_projects);
        assert!(def.flags.need_signature_from_buyer);
        assert_eq!(def.flags.allow_changes, AllowChanges::Always);
        assert_eq!(def.flags.visibility, Visibility::Private);
        assert_eq!(def.default_data.get("rooms"), Some(&json!(3)));
        assert!(def.schema.is_empty());
    }

    #[test]
    fn test_viewer_from_profile() {
        let agent = Profile {
            id: "a".to_string(),
            role: UserRole::Agent,
            ..Default::default()
        };
        assert!(Viewer::from_profile(&agent).is_admin);

        let buyer = Profile {
            id: "b".to_string(),
            role: UserRole::Buyer,
            ..Default::default()
        };
        assert!(!Viewer::from_profile(&buyer).is_admin);
    }
}
