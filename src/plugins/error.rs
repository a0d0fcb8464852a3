//! Error types for plugin events and validation.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use super::traits::EntryPoint;

/// Event status: success.
pub const STATUS_OK: i32 = 0;
/// Event status: the module has no context attached.
pub const STATUS_MISSING_CONTEXT: i32 = 1;
/// Event status: event data is invalid or the context is not ready for it.
pub const STATUS_INVALID_DATA: i32 = 2;

/// Failure of a lifecycle event.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("module has no context attached")]
    MissingContext,
    #[error("plugin user path is not configured")]
    NotConfigured,
    #[error("invalid event data: {0}")]
    InvalidArgument(String),
}

impl EventError {
    /// Integer status reported to the host.
    pub fn status(&self) -> i32 {
        match self {
            Self::MissingContext => STATUS_MISSING_CONTEXT,
            Self::NotConfigured | Self::InvalidArgument(_) => STATUS_INVALID_DATA,
        }
    }
}

/// Failure of a single `validate` call.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("failed to write scratch file {}: {source}", path.display())]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("plugin user path is not configured")]
    NotConfigured,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("cannot load module: {0}")]
    Load(String),
    #[error("cannot find {entry}: {detail}")]
    SymbolNotFound { entry: EntryPoint, detail: String },
    #[error("incompatible API major version {found}, host supports {expected}")]
    IncompatibleVersion { found: i32, expected: i32 },
    #[error("setup returned {0}")]
    Setup(i32),
    #[error("smoke test {function} returned {result}")]
    SmokeTest { function: String, result: i32 },
}

impl ValidationError {
    /// Integer code reported to the host.
    pub fn code(&self) -> i32 {
        match self {
            Self::IoWrite { .. } => -1,
            Self::NotConfigured => -2,
            Self::InvalidArgument(_) => -3,
            Self::Load(_) => 10,
            Self::SymbolNotFound { entry, .. } => entry.missing_code(),
            Self::IncompatibleVersion { .. } => 22,
            Self::Setup(_) => 41,
            Self::SmokeTest { .. } => 254,
        }
    }

    /// Entry point the failure is attributed to, if any.
    pub fn entry_point(&self) -> Option<EntryPoint> {
        match self {
            Self::SymbolNotFound { entry, .. } => Some(*entry),
            Self::IncompatibleVersion { .. } => Some(EntryPoint::ApiVersionMajor),
            Self::Setup(_) => Some(EntryPoint::Setup),
            Self::SmokeTest { .. } => Some(EntryPoint::ApplyRecord),
            _ => None,
        }
    }
}

/// Outcome of `validate` as handed back to the host. Code 0 is a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub code: i32,
    pub message: String,
    /// Module the report is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Plugin entry point the failure is attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,
    /// Source line of the failure. Native images carry no source, so
    /// validation never sets it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl ValidationReport {
    pub fn from_result(module: &str, result: &Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Self::default(),
            Err(e) => Self {
                code: e.code(),
                message: format!("{module}: {e}"),
                file: Some(module.to_string()),
                func: e.entry_point().map(|ep| ep.symbol().to_string()),
                line: None,
            },
        }
    }

    pub fn is_pass(&self) -> bool {
        self.code == 0
    }
}
