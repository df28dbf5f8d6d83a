// ABOUTME: S3 connection settings
// ABOUTME: Loaded from a TOML file with environment variable overrides

use estately_config::constants;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::error::{CloudError, CloudResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2)
    pub endpoint: Option<String>,
    /// Prepended to every object key
    pub key_prefix: String,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "eu-west-1".to_string(),
            endpoint: None,
            key_prefix: String::new(),
        }
    }
}

impl S3Settings {
    /// Default location: `~/.config/estately/s3.toml`
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var(constants::ESTATELY_S3_CONFIG_PATH) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("estately")
            .join("s3.toml")
    }

    /// Load from `path` if it exists, then apply environment overrides
    pub async fn load(path: &Path) -> CloudResult<Self> {
        let mut settings = if fs::try_exists(path).await.unwrap_or(false) {
            let content = fs::read_to_string(path).await?;
            toml::from_str(&content)
                .map_err(|e| CloudError::config(format!("Invalid S3 config format: {}", e)))?
        } else {
            Self::default()
        };
        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    pub async fn save(&self, path: &Path) -> CloudResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CloudError::config(format!("Failed to serialize S3 config: {}", e)))?;
        fs::write(path, content).await?;
        info!("Saved S3 settings to {}", path.display());
        Ok(())
    }

    pub fn apply_env(&mut self) {
        if let Ok(bucket) = env::var(constants::ESTATELY_S3_BUCKET) {
            self.bucket = bucket;
        }
        if let Ok(region) = env::var(constants::ESTATELY_S3_REGION)
            .or_else(|_| env::var(constants::AWS_REGION))
        {
            self.region = region;
        }
        if let Ok(endpoint) = env::var(constants::ESTATELY_S3_ENDPOINT) {
            self.endpoint = Some(endpoint).filter(|e| !e.is_empty());
        }
        if let Ok(prefix) = env::var(constants::ESTATELY_S3_PREFIX) {
            self.key_prefix = prefix;
        }
    }

    pub fn validate(&self) -> CloudResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(CloudError::config("S3 bucket is required"));
        }
        if self.region.trim().is_empty() {
            return Err(CloudError::config("S3 region is required"));
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
                return Err(CloudError::config("S3 endpoint must be an http(s) URL"));
            }
        }
        Ok(())
    }
}
