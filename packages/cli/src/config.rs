// ABOUTME: CLI configuration from environment variables
// ABOUTME: Database location, pool size, object backend and workflow config path

use estately_config::constants;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://estately.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Error, Debug)]
pub enum CliConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidNumber { var: String, value: String },
    #[error("Unknown object backend '{0}' (expected 's3' or 'memory')")]
    UnknownBackend(String),
}

/// Where uploaded blobs go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectBackend {
    S3,
    /// Blobs live for the duration of the process only
    Memory,
}

impl FromStr for ObjectBackend {
    type Err = CliConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(ObjectBackend::S3),
            "memory" | "mem" => Ok(ObjectBackend::Memory),
            other => Err(CliConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for ObjectBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectBackend::S3 => f.write_str("s3"),
            ObjectBackend::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub object_backend: ObjectBackend,
    pub workflow_config_path: Option<PathBuf>,
}

impl CliConfig {
    pub fn from_env() -> Result<Self, CliConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CliConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(constants::ESTATELY_DATABASE_URL)
            .or_else(|| lookup(constants::DATABASE_URL))
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_connections = match lookup(constants::ESTATELY_DB_MAX_CONNECTIONS) {
            Some(value) => value.trim().parse::<u32>().map_err(|_| CliConfigError::InvalidNumber {
                var: constants::ESTATELY_DB_MAX_CONNECTIONS.to_string(),
                value,
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let object_backend = match lookup(constants::ESTATELY_OBJECT_BACKEND) {
            Some(value) => value.parse()?,
            None if cfg!(feature = "cloud") => ObjectBackend::S3,
            None => ObjectBackend::Memory,
        };

        Ok(Self {
            database_url,
            max_connections,
            object_backend,
            workflow_config_path: lookup(constants::ESTATELY_CONFIG_PATH).map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::from_lookup(lookup(&[(constants::ESTATELY_OBJECT_BACKEND, "memory")])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.object_backend, ObjectBackend::Memory);
        assert_eq!(config.workflow_config_path, None);
    }

    #[test]
    fn test_legacy_database_url() {
        let config = CliConfig::from_lookup(lookup(&[
            (constants::DATABASE_URL, "sqlite:///tmp/legacy.db"),
            (constants::ESTATELY_OBJECT_BACKEND, "S3"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite:///tmp/legacy.db");
        assert_eq!(config.object_backend, ObjectBackend::S3);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            CliConfig::from_lookup(lookup(&[(constants::ESTATELY_DB_MAX_CONNECTIONS, "many")])),
            Err(CliConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            CliConfig::from_lookup(lookup(&[(constants::ESTATELY_OBJECT_BACKEND, "gcs")])),
            Err(CliConfigError::UnknownBackend(_))
        ));
    }
}
