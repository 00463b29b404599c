//! Demo configuration and session file locations.

use std::path::{Path, PathBuf};

use anyhow::Context;
use uaepass_auth::{Config, PersistenceMode};

const APP_DIR: &str = "uaepass-demo";

/// Default location of `config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

/// Default location of the durable session file.
pub fn default_session_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("session.json")
}

/// Loads and validates the configuration.
pub async fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = tokio::fs::read_to_string(path).await.with_context(|| {
        format!(
            "failed to read {} (run `uaepass-demo init` to create one)",
            path.display()
        )
    })?;
    parse_config(&contents).with_context(|| format!("invalid configuration in {}", path.display()))
}

fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = serde_json::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Sandbox configuration for the UAE PASS staging environment.
pub fn sample_config() -> anyhow::Result<Config> {
    Ok(
        Config::builder("sandbox_stage", "http://localhost:4200/callback")
            .logout_redirect_uri("http://localhost:4200/")
            .persistence(PersistenceMode::DurableScoped)
            .build()?,
    )
}

/// Writes the sample configuration unless a file already exists.
pub async fn write_sample(path: &Path, force: bool) -> anyhow::Result<()> {
    if !force && tokio::fs::try_exists(path).await.unwrap_or(false) {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let contents = serde_json::to_string_pretty(&sample_config()?)?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!("Configuration written to {:?}", path);
    Ok(())
}
