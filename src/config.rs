//! Audit run configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables and command-line flags (applied by the binary).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agents::key_audit::DEFAULT_THRESHOLD_DAYS;
use crate::agents::report::DEFAULT_REPORT_FILE_NAME;

/// Default SES region
pub const DEFAULT_REGION: &str = "us-west-2";

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration shared by the auditor and the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Rotation threshold in days (inclusive)
    pub threshold_days: u32,
    /// From address (must be verified with SES)
    pub sender: String,
    /// To addresses
    pub recipients: Vec<String>,
    /// SES region
    pub region: String,
    /// Where the CSV report is written
    pub report_path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            sender: String::new(),
            recipients: Vec::new(),
            region: DEFAULT_REGION.to_string(),
            report_path: std::env::temp_dir().join(DEFAULT_REPORT_FILE_NAME),
        }
    }
}

impl AuditConfig {
    /// Load from a TOML file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Check that the configuration can drive a full run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold_days == 0 {
            return Err(ConfigError::Invalid(
                "threshold_days must be at least 1".to_string(),
            ));
        }
        if self.sender.trim().is_empty() {
            return Err(ConfigError::Invalid("sender is required".to_string()));
        }
        if self.recipients.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one recipient is required".to_string(),
            ));
        }
        let addresses = || self.recipients.iter().chain(std::iter::once(&self.sender));
        if let Some(bad) = addresses().find(|addr| has_line_break(addr)) {
            return Err(ConfigError::Invalid(format!(
                "address contains a line break: {:?}",
                bad
            )));
        }
        if let Some(bad) = addresses().find(|addr| !addr.contains('@')) {
            return Err(ConfigError::Invalid(format!("not an email address: {}", bad)));
        }
        if self
            .report_path
            .file_name()
            .is_some_and(|name| has_line_break(&name.to_string_lossy()))
        {
            return Err(ConfigError::Invalid(
                "report file name contains a line break".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("region is required".to_string()));
        }
        Ok(())
    }
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\r', '\n'])
}

/// Split a comma-separated address list, dropping blanks
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
