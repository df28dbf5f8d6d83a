// ABOUTME: Workflow engine configuration
// ABOUTME: Defaults, optional TOML file and ESTATELY_* environment overrides

use estately_config::constants;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidNumber { var: String, value: String },
    #[error("{0} must not be empty")]
    Empty(String),
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file format: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub document_task_due_days: i64,
    pub document_task_category: String,
    pub form_task_due_days: i64,
    /// Folder under `project/{id}/` that uploads land in
    pub upload_folder: String,
    pub signed_url_ttl_secs: u64,
    pub store_timeout_ms: u64,
    pub object_timeout_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            document_task_due_days: 3,
            document_task_category: "Legal".to_string(),
            form_task_due_days: 3,
            upload_folder: "user-files".to_string(),
            signed_url_ttl_secs: 3600,
            store_timeout_ms: 10_000,
            object_timeout_ms: 30_000,
        }
    }
}

impl WorkflowConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Read `path` when it exists, then apply environment overrides
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if fs::try_exists(path).await.unwrap_or(false) {
            debug!("Loading workflow config from {}", path.display());
            toml::from_str(&fs::read_to_string(path).await?)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(constants::ESTATELY_DOCUMENT_TASK_DUE_DAYS) {
            self.document_task_due_days = parse_number(constants::ESTATELY_DOCUMENT_TASK_DUE_DAYS, &v)?;
        }
        if let Some(v) = lookup(constants::ESTATELY_FORM_TASK_DUE_DAYS) {
            self.form_task_due_days = parse_number(constants::ESTATELY_FORM_TASK_DUE_DAYS, &v)?;
        }
        if let Some(v) = lookup(constants::ESTATELY_DOCUMENT_TASK_CATEGORY) {
            self.document_task_category = v;
        }
        if let Some(v) = lookup(constants::ESTATELY_UPLOAD_FOLDER) {
            if v.trim().is_empty() {
                return Err(ConfigError::Empty(constants::ESTATELY_UPLOAD_FOLDER.to_string()));
            }
            self.upload_folder = v.trim().trim_matches('/').to_string();
        }
        if let Some(v) = lookup(constants::ESTATELY_SIGNED_URL_TTL_SECS) {
            self.signed_url_ttl_secs = parse_number(constants::ESTATELY_SIGNED_URL_TTL_SECS, &v)?;
        }
        if let Some(v) = lookup(constants::ESTATELY_STORE_TIMEOUT_MS) {
            self.store_timeout_ms = parse_number(constants::ESTATELY_STORE_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(constants::ESTATELY_OBJECT_TIMEOUT_MS) {
            self.object_timeout_ms = parse_number(constants::ESTATELY_OBJECT_TIMEOUT_MS, &v)?;
        }
        Ok(())
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn object_timeout(&self) -> Duration {
        Duration::from_millis(self.object_timeout_ms)
    }
}

fn parse_number<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber {
            var: var.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_overrides() {
        let vars = HashMap::from([
            (constants::ESTATELY_DOCUMENT_TASK_DUE_DAYS, "5"),
            (constants::ESTATELY_UPLOAD_FOLDER, "/vault/"),
        ]);
        let mut config = WorkflowConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.document_task_due_days, 5);
        assert_eq!(config.upload_folder, "vault");
        assert_eq!(config.form_task_due_days, 3);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut config = WorkflowConfig::default();
        let err = config
            .apply_overrides(|name| {
                (name == constants::ESTATELY_STORE_TIMEOUT_MS).then(|| "soon".to_string())
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("workflow.toml");
        fs::write(&path, "document_task_category = \"Finance\"\nsigned_url_ttl_secs = 60\n")
            .await
            .unwrap();

        let parsed: WorkflowConfig =
            toml::from_str(&fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(parsed.document_task_category, "Finance");
        assert_eq!(parsed.signed_url_ttl(), Duration::from_secs(60));
        assert_eq!(parsed.upload_folder, "user-files");
    }
}
