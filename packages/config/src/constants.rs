// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Estately

// Storage Configuration
pub const ESTATELY_DATABASE_URL: &str = "ESTATELY_DATABASE_URL";
pub const ESTATELY_DB_MAX_CONNECTIONS: &str = "ESTATELY_DB_MAX_CONNECTIONS";
pub const DATABASE_URL: &str = "DATABASE_URL"; // Legacy

// Workflow Configuration
pub const ESTATELY_CONFIG_PATH: &str = "ESTATELY_CONFIG_PATH";
pub const ESTATELY_DOCUMENT_TASK_DUE_DAYS: &str = "ESTATELY_DOCUMENT_TASK_DUE_DAYS";
pub const ESTATELY_FORM_TASK_DUE_DAYS: &str = "ESTATELY_FORM_TASK_DUE_DAYS";
pub const ESTATELY_DOCUMENT_TASK_CATEGORY: &str = "ESTATELY_DOCUMENT_TASK_CATEGORY";
pub const ESTATELY_UPLOAD_FOLDER: &str = "ESTATELY_UPLOAD_FOLDER";
pub const ESTATELY_SIGNED_URL_TTL_SECS: &str = "ESTATELY_SIGNED_URL_TTL_SECS";

// Timeouts
pub const ESTATELY_STORE_TIMEOUT_MS: &str = "ESTATELY_STORE_TIMEOUT_MS";
pub const ESTATELY_OBJECT_TIMEOUT_MS: &str = "ESTATELY_OBJECT_TIMEOUT_MS";

// Object Storage Configuration
pub const ESTATELY_OBJECT_BACKEND: &str = "ESTATELY_OBJECT_BACKEND";
pub const ESTATELY_S3_BUCKET: &str = "ESTATELY_S3_BUCKET";
pub const ESTATELY_S3_REGION: &str = "ESTATELY_S3_REGION";
pub const ESTATELY_S3_ENDPOINT: &str = "ESTATELY_S3_ENDPOINT";
pub const ESTATELY_S3_PREFIX: &str = "ESTATELY_S3_PREFIX";
pub const ESTATELY_S3_CONFIG_PATH: &str = "ESTATELY_S3_CONFIG_PATH";

// AWS Credentials
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const AWS_REGION: &str = "AWS_REGION";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";

// System Environment Variables
pub const HOME: &str = "HOME";
pub const USERPROFILE: &str = "USERPROFILE"; // Windows
