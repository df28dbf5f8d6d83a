// ABOUTME: Estately CLI library
// ABOUTME: Configuration, workflow wiring and logging setup shared by the binary

pub mod config;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use estately_storage::{InMemoryObjectStore, ObjectStore, SqliteDocumentStore};
use estately_workflow::{Workflow, WorkflowConfig};

pub use config::{CliConfig, CliConfigError, ObjectBackend};

/// Log to stderr; `RUST_LOG` wins over `--verbose`
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Open the document store and object backend and build the workflow service
pub async fn connect(config: &CliConfig) -> Result<Workflow> {
    let workflow_config = match &config.workflow_config_path {
        Some(path) => WorkflowConfig::load(path)
            .await
            .with_context(|| format!("Failed to load workflow config from {}", path.display()))?,
        None => WorkflowConfig::from_env().context("Invalid workflow configuration")?,
    };

    let documents = SqliteDocumentStore::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let objects = object_store(config.object_backend).await?;
    info!(
        database = %config.database_url,
        backend = %config.object_backend,
        "Workflow ready"
    );
    Ok(Workflow::new(Arc::new(documents), objects, workflow_config))
}

async fn object_store(backend: ObjectBackend) -> Result<Arc<dyn ObjectStore>> {
    match backend {
        ObjectBackend::Memory => {
            warn!("Using in-memory object storage; uploaded files are discarded on exit");
            Ok(Arc::new(InMemoryObjectStore::new()))
        }
        #[cfg(feature = "cloud")]
        ObjectBackend::S3 => {
            use estately_cloud::{S3ObjectStore, S3Settings};
            let settings = S3Settings::load(&S3Settings::default_path())
                .await
                .context("Invalid S3 configuration")?;
            let store = S3ObjectStore::from_settings(&settings)
                .await
                .context("Failed to set up S3 client")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "cloud"))]
        ObjectBackend::S3 => anyhow::bail!("This build has no S3 support; set ESTATELY_OBJECT_BACKEND=memory"),
    }
}
