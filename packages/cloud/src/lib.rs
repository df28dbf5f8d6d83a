//! Estately Cloud Storage Package
//!
//! S3-compatible object storage for uploaded closing documents. Works with
//! AWS S3, Cloudflare R2, MinIO and other S3-compatible services.

pub mod config;
pub mod error;
pub mod s3;

pub use config::S3Settings;
pub use error::{CloudError, CloudResult};
pub use s3::S3ObjectStore;
