//! Validation and loading of native UDF plugin images.
//!
//! See [`plugins`] for the validation protocol and [`config`] for the host
//! configuration file.

pub mod config;
pub mod plugins;

pub use config::{HostConfig, ModuleConfig, ValidatorConfig};
pub use plugins::{ModuleContext, ModuleEvent, UdfModule, ValidationReport};
