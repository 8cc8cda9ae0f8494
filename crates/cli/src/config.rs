//! CLI configuration utilities

use anyhow::{Context, Result};
use salon_client::{ApiClient, ClientConfig, FileStore, Surface};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Configuration choices made on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub admin: bool,
}

/// Load the client configuration and apply command-line overrides
pub fn load_config(overrides: &Overrides) -> Result<ClientConfig> {
    let mut config = match &overrides.path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ClientConfig::from_env().context("loading configuration from environment")?,
    };

    if let Some(base_url) = &overrides.base_url {
        config.base_url.clone_from(base_url);
    }
    if overrides.admin {
        config.surface = Surface::Admin;
    }
    config.validate()?;
    Ok(config)
}

/// Build a client whose credentials persist across invocations
pub fn build_client(overrides: &Overrides) -> Result<ApiClient> {
    let config = load_config(overrides)?;
    let credentials = config.credentials_path();
    debug!(path = %credentials.display(), base_url = %config.base_url, "Using credential file");

    let client = ApiClient::builder()
        .config(config)
        .store(Arc::new(FileStore::new(credentials)))
        .build()?;
    Ok(client)
}

/// Save client configuration to a JSON file
pub fn save_config<P: AsRef<Path>>(config: &ClientConfig, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    save_config(&ClientConfig::default(), path)
}
