//! Host configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [udf]
//! user_path = "/opt/aerospike/usr/udf/go"
//!
//! [validator]
//! smoke_functions = ["HelloWorld", "Foobar"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Plugin search root used when nothing else is configured.
pub const DEFAULT_USER_PATH: &str = "/opt/aerospike/usr/udf/go";

/// Longest accepted plugin search root, in bytes.
pub const MAX_USER_PATH_LEN: usize = 256;

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// `[udf]`: applied through the configure event
    pub udf: ModuleConfig,
    /// `[validator]`: validation behaviour
    pub validator: ValidatorConfig,
}

/// Payload of the configure event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Plugin search root. Empty leaves the current setting untouched.
    pub user_path: String,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            user_path: DEFAULT_USER_PATH.into(),
        }
    }
}

impl ModuleConfig {
    pub fn with_user_path(path: impl Into<String>) -> Self {
        Self {
            user_path: path.into(),
        }
    }
}

/// Validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Functions invoked through `apply_record` after setup. Empty disables
    /// the smoke test.
    pub smoke_functions: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            smoke_functions: vec!["HelloWorld".into(), "Foobar".into()],
        }
    }
}

impl HostConfig {
    /// Parse a TOML document, expanding `~` and environment variables in
    /// `udf.user_path`.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw).context("Failed to parse host config")?;
        let expanded = shellexpand::full(&config.udf.user_path)
            .with_context(|| format!("Failed to expand user_path '{}'", config.udf.user_path))?
            .into_owned();
        config.udf.user_path = expanded;
        Ok(config)
    }

    /// Load from an explicit file. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Load from `path` if given, otherwise from the default location,
    /// falling back to defaults when no default file exists.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// `<config_dir>/udf-host/config.toml` for the current user.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "udf-host")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
