// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for kubequel
//!
//! Stores user preferences like the default namespace in a config file.
//! Config location: ~/.config/kubequel/config.toml (XDG) or
//! ~/.kubequel/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::cli::OutputFormat;

/// kubequel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Namespace used when neither the query nor the command line names
    /// one
    #[serde(default)]
    pub default_namespace: Option<String>,

    /// Output format used when the command line names none
    #[serde(default)]
    pub default_output: Option<OutputFormat>,
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the config file path
    /// Uses XDG config directory (~/.config/kubequel/) or falls back to
    /// ~/.kubequel/
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .map(|p| p.join("kubequel"))
            .or_else(|| dirs::home_dir().map(|p| p.join(".kubequel")))
            .context("Could not determine config directory")?;

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.default_namespace.is_none());
        assert!(config.default_output.is_none());
    }

    #[test]
    fn test_config_serialize() {
        let config = Config {
            default_namespace: Some("kube-system".to_string()),
            default_output: Some(OutputFormat::Json),
        };
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("default_namespace"));
        assert!(toml.contains("kube-system"));
        assert!(toml.contains("json"));
    }

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
default_namespace = "team-a"
default_output = "csv"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.default_namespace.as_deref(), Some("team-a"));
        assert!(matches!(config.default_output, Some(OutputFormat::Csv)));
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.default_namespace.is_none());
        assert!(config.default_output.is_none());
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            default_namespace: Some("default".to_string()),
            default_output: None,
        };
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded: Config = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.default_namespace.as_deref(), Some("default"));
    }
}
