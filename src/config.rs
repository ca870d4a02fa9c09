use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::license::normalize::{LicenseNormalizer, DEFAULT_UNKNOWN_MARKER};

/// Root configuration structure, deserialized from `.pkgrecon/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// License normalization rules.
    #[serde(default)]
    pub license: LicenseConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Extra rules applied on top of the built-in SPDX tables.
#[derive(Debug, Deserialize)]
pub struct LicenseConfig {
    /// Marker used for license text that matches nothing.
    #[serde(default = "default_unknown_marker")]
    pub unknown: String,
    /// Exact license text (case-insensitive) to the identifier it stands for,
    /// e.g. `"Acme Corp EULA" = "LicenseRef-acme-eula"`.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        LicenseConfig {
            unknown: default_unknown_marker(),
            aliases: HashMap::new(),
        }
    }
}

fn default_unknown_marker() -> String {
    DEFAULT_UNKNOWN_MARKER.to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    /// Report format used when `--report` is not given.
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl Config {
    pub fn normalizer(&self) -> LicenseNormalizer {
        LicenseNormalizer::new(&self.license.aliases, &self.license.unknown)
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
}

/// Candidate config locations after an explicit `--config`.
fn search_paths(working_dir: &Path) -> Vec<PathBuf> {
    let mut paths = vec![working_dir.join(".pkgrecon").join("config.toml")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join("pkgrecon").join("config.toml"));
    }
    paths
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`: path passed via `--config`
/// 2. `<working_dir>/.pkgrecon/config.toml`
/// 3. `~/.config/pkgrecon/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(working_dir: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }
    for path in search_paths(working_dir) {
        if path.exists() {
            tracing::debug!(config = %path.display(), "loading config");
            return read_config(&path);
        }
    }
    Ok(Config::default())
}
