// ABOUTME: Collection names and workflow defaults
// ABOUTME: Shared string constants so every crate addresses the same collections

// Collections
pub const PROJECTS: &str = "projects";
pub const PROFILES: &str = "profiles";
pub const PROPERTIES: &str = "properties";
pub const AGENCIES: &str = "agencies";
pub const TASKS: &str = "tasks";
pub const DOCUMENTS: &str = "documents";
pub const DOCUMENT_DEFINITIONS: &str = "document_definitions";
pub const FORM_DEFINITIONS: &str = "form_definitions";
pub const FORM_SUBMISSIONS: &str = "form_submissions";
pub const SIGN_REQUESTS: &str = "sign_requests";
pub const CONTRACTS: &str = "contracts";
pub const CONTRACT_TEMPLATES: &str = "contract_templates";

/// Definition id meaning "no specific requirement"
pub const GENERAL_DEFINITION_ID: &str = "general";

/// Document type used when a definition cannot be resolved
pub const FALLBACK_DOCUMENT_TYPE: &str = "Personal";

/// Title prefix of tasks created for document requirements
pub const UPLOAD_TASK_PREFIX: &str = "Upload Document: ";

/// Title prefix of tasks created for form assignments
pub const FORM_TASK_PREFIX: &str = "Fill out form: ";

/// Rendered for handover dates that are not yet known
pub const HANDOVER_DATE_UNKNOWN: &str = "TBD";
