//! Access configuration
//!
//! Configuration file: ~/.config/docket/access.yaml

use crate::catalog::{ModuleCatalog, DEFAULT_SCOPED_MODULES};
use anyhow::{Context, Result};
use docket_core::paths::DATA_DIR_ENV;
use docket_core::{Directory, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Module keys that are foldered by court
    #[serde(default = "default_scoped_modules")]
    pub scoped_modules: Vec<String>,

    /// Data directory override (the DOCKET_DATA_DIR variable wins)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Install the demonstration county on first run
    #[serde(default = "default_seed_demo_data")]
    pub seed_demo_data: bool,

    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_scoped_modules() -> Vec<String> {
    DEFAULT_SCOPED_MODULES.iter().map(|s| s.to_string()).collect()
}

fn default_seed_demo_data() -> bool {
    true
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            scoped_modules: default_scoped_modules(),
            data_dir: None,
            seed_demo_data: default_seed_demo_data(),
            audit: AuditConfig::default(),
        }
    }
}

impl AccessConfig {
    /// Load configuration from the standard location
    pub fn load(paths: &Paths) -> Result<Self> {
        Self::load_from(&paths.config_file("access"))
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read access config from {:?}", path))?;
            let config: Self = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse access config from {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write access config to {:?}", path))?;
        Ok(())
    }

    /// Apply the configured data directory unless the environment overrides it
    pub fn resolve_paths(&self, paths: Paths) -> Paths {
        match &self.data_dir {
            Some(dir) if std::env::var_os(DATA_DIR_ENV).is_none() => paths.with_data_dir(dir.clone()),
            _ => paths,
        }
    }

    /// Module catalog for the county described by `directory`
    pub fn catalog(&self, directory: &Directory) -> ModuleCatalog {
        ModuleCatalog::from_directory(directory, self.scoped_modules.iter().cloned())
    }
}

/// Audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
}

fn default_audit_enabled() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
        }
    }
}
