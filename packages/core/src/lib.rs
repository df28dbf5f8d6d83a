// ABOUTME: Core types and pure helpers for Estately
// ABOUTME: Foundational package shared by storage, workflow and the CLI

pub mod constants;
pub mod lenient;
pub mod meta;
pub mod render;
pub mod types;
pub mod utils;

// Re-export main types
pub use meta::{FormMeta, SignatureEntry, Signatures};
pub use types::{
    Agency, AllowChanges, Contract, ContractStatus, ContractTemplate, DocumentDefinition,
    DocumentRecord, DocumentSource, FormDefinition, FormStatus, FormSubmission, ParentType,
    ParticipantRole, Profile, Project, Property, ProvisioningFlags, RequiredSigner,
    SignRequest, SignRequestStatus, SignatureRecord, Task, TaskStatus, TaskType,
    UploadedDocument, UserRole, VerificationStatus, Viewer, Visibility,
};

// Re-export utilities
pub use render::render_placeholders;
pub use utils::{file_extension, new_id, object_key, sanitize_key, storage_name};
