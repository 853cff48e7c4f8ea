//! Standard paths used by Docket tools

use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "DOCKET_DATA_DIR";

/// Standard Docket paths
#[derive(Debug, Clone)]
pub struct Paths {
    /// Data directory (~/.local/share/docket)
    pub data: PathBuf,
    /// Config directory (~/.config/docket)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("docket"),
        };

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("docket");

        Self { data, config }
    }

    /// Keep both data and config under a single root
    pub fn rooted(root: &Path) -> Self {
        Self {
            data: root.join("data"),
            config: root.join("config"),
        }
    }

    /// Replace the data directory, keeping the config directory
    pub fn with_data_dir(mut self, data: PathBuf) -> Self {
        self.data = data;
        self
    }

    /// Persisted permission records
    pub fn permissions(&self) -> PathBuf {
        self.data.join("permissions.json")
    }

    /// Users, courts and document repositories
    pub fn directory(&self) -> PathBuf {
        self.data.join("directory.json")
    }

    /// Grant/revoke audit trail (JSON lines)
    pub fn audit_log(&self) -> PathBuf {
        self.data.join("audit.log")
    }

    /// Get config file path for a tool
    pub fn config_file(&self, tool: &str) -> PathBuf {
        self.config.join(format!("{}.yaml", tool))
    }
}
