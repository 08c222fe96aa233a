// ⚙️ Configuration - TOML file with defaults for every field

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_REPORTED_ERRORS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Address the web server binds to
    pub bind_address: String,

    /// Upload ceiling in bytes
    pub max_upload_bytes: usize,

    /// How many row errors a report lists (the total is always reported)
    pub max_reported_errors: usize,

    /// Default tracing filter when RUST_LOG is not set
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("directory.db"),
            bind_address: "0.0.0.0:3000".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_reported_errors: DEFAULT_MAX_REPORTED_ERRORS,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        toml::from_str(&content).context("Failed to parse config TOML")
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Config::from_file(p),
            None => Ok(Config::default()),
        }
    }
}
