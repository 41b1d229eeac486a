//! Runtime configuration
//!
//! Defaults work out of the box; a YAML file can override them.

use crate::errors::{FlatpyError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix for generated temporary names. Double underscore keeps them out
/// of the way of ordinary user identifiers.
pub const DEFAULT_TEMP_PREFIX: &str = "__flat_";

/// Suffix appended to a rewritten callable's module name.
pub const FLATTENED_SUFFIX: &str = "_flattened";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FlatpyConfig {
    /// Prefix for generated temporary names
    pub temp_prefix: String,
    /// Directory where generated modules are written; system temp when unset
    pub temp_code_root: Option<PathBuf>,
    /// Keep generated files on disk after execution
    pub keep_generated: bool,
}

impl Default for FlatpyConfig {
    fn default() -> Self {
        Self {
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            temp_code_root: None,
            keep_generated: false,
        }
    }
}

impl FlatpyConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| FlatpyError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.temp_prefix.is_empty() {
            return Err(FlatpyError::config("temp_prefix must not be empty"));
        }
        let valid = self
            .temp_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid || self.temp_prefix.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Err(FlatpyError::config(format!(
                "temp_prefix `{}` is not a valid identifier prefix",
                self.temp_prefix
            )));
        }
        Ok(())
    }
}
