//! Engine host configuration
//!
//! Controls how the command line front end hosts the engine, not the
//! settings document itself. Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. CLI flag overrides

mod merge;

pub use merge::{deep_merge, merge_layers};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SettingsError};

/// Resolved host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Where the file sink stores settings
    pub store_path: PathBuf,

    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,

    /// Pretty-print JSON output and the stored file
    pub pretty: bool,

    /// Require `--yes` before deleting a profile
    pub confirm_destructive: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("settings.json"),
            log_filter: "warn".to_string(),
            pretty: true,
            confirm_destructive: true,
        }
    }
}

/// Where a configuration layer came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing layer with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Configuration plus the layers that produced it
#[derive(Debug, Clone, Serialize)]
pub struct LoadedConfig {
    pub config: EngineConfig,
    pub sources: Vec<ConfigSource>,
}

impl EngineConfig {
    /// Merge defaults, the optional TOML file and CLI overrides.
    ///
    /// A missing file is an error: it was named explicitly. Null entries in
    /// `cli_overrides` leave lower layers untouched.
    pub fn load(file: Option<&Path>, cli_overrides: Option<Value>) -> Result<LoadedConfig> {
        let mut layers = vec![serde_json::to_value(EngineConfig::default())
            .map_err(|e| SettingsError::Config(e.to_string()))?];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = file {
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let config: EngineConfig =
            serde_json::from_value(merged).map_err(|e| SettingsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(LoadedConfig { config, sources })
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            return Err(SettingsError::Config("store_path must not be empty".to_string()));
        }
        if self.log_filter.trim().is_empty() {
            return Err(SettingsError::Config("log_filter must not be empty".to_string()));
        }
        Ok(())
    }
}

fn load_toml_file(path: &Path) -> Result<(Value, String)> {
    let bytes = fs::read(path)
        .map_err(|e| SettingsError::Config(format!("{}: {}", path.display(), e)))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let text = String::from_utf8(bytes)
        .map_err(|e| SettingsError::Config(format!("{}: {}", path.display(), e)))?;
    let value: Value = toml::from_str(&text)
        .map_err(|e| SettingsError::Config(format!("{}: {}", path.display(), e)))?;
    Ok((value, digest))
}
