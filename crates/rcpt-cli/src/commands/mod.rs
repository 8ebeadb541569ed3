//! Subcommands and shared helpers.

pub mod batch;
pub mod config;
pub mod extract;
pub mod patterns;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use rcpt_core::ReceiptPipeline;
use rcpt_core::models::config::RcptConfig;

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rcpt")
        .join("config.json")
}

/// Configuration file in effect: the `--config` path, else the default location.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load configuration; a missing default file yields the defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<RcptConfig> {
    match config_path {
        Some(path) => RcptConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path)),
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!("Using config {}", path.display());
                RcptConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))
            } else {
                Ok(RcptConfig::default())
            }
        }
    }
}

/// Build a pipeline from configuration.
pub fn build_pipeline(config: &RcptConfig) -> anyhow::Result<ReceiptPipeline> {
    ReceiptPipeline::from_config(config)
        .map_err(|e| anyhow::anyhow!("Failed to build pipeline: {}", e))
}
