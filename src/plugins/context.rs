//! Shared per-host plugin configuration.
//!
//! A `ModuleContext` is created once and handed by reference (usually behind
//! an `Arc`) to every event and validation. Readers take the lock in shared
//! mode; `configure` swaps the whole path value under the exclusive lock, so
//! a reader sees either the previous or the new value, never a mix.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use super::error::EventError;
use crate::config::{ModuleConfig, MAX_USER_PATH_LEN};

/// State of the plugin search root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserPath {
    /// Never configured.
    Unset,
    /// Checked and reachable.
    Ready(PathBuf),
    /// Configured but could not be opened. Kept for diagnostics only; it is
    /// treated as unconfigured.
    Unreachable(PathBuf),
}

impl UserPath {
    pub fn ready(&self) -> Option<&Path> {
        match self {
            Self::Ready(path) => Some(path),
            _ => None,
        }
    }
}

/// Plugin configuration shared across worker threads.
pub struct ModuleContext {
    user_path: RwLock<UserPath>,
}

impl ModuleContext {
    /// Create an unconfigured context.
    pub fn new() -> Self {
        Self {
            user_path: RwLock::new(UserPath::Unset),
        }
    }

    /// Apply a configure event.
    ///
    /// An empty `user_path` leaves the current value untouched. A path that
    /// cannot be opened as a directory does not fail the call; the context
    /// drops to [`UserPath::Unreachable`] and later operations report it as
    /// unconfigured.
    pub fn configure(&self, config: &ModuleConfig) -> Result<(), EventError> {
        let raw = config.user_path.as_str();
        if raw.is_empty() {
            tracing::trace!("Configure event without user path, keeping current value");
            return Ok(());
        }
        if raw.len() > MAX_USER_PATH_LEN {
            return Err(EventError::InvalidArgument(format!(
                "user path is {} bytes, limit is {MAX_USER_PATH_LEN}",
                raw.len()
            )));
        }

        let path = PathBuf::from(raw);
        // Check outside the lock; the handle is only for the reachability check.
        let next = match std::fs::read_dir(&path) {
            Ok(_) => UserPath::Ready(path),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Plugin user path is not accessible, marking unconfigured"
                );
                UserPath::Unreachable(path)
            }
        };

        let mut current = self.user_path.write();
        if *current != next {
            tracing::info!(user_path = ?next, "Plugin user path updated");
        }
        *current = next;
        Ok(())
    }

    /// Snapshot of the search root state.
    pub fn user_path(&self) -> UserPath {
        self.user_path.read().clone()
    }

    /// Reachable search root, if configured.
    pub fn ready_path(&self) -> Option<PathBuf> {
        self.user_path.read().ready().map(Path::to_path_buf)
    }

    pub fn is_configured(&self) -> bool {
        self.user_path.read().ready().is_some()
    }
}

impl Default for ModuleContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("user_path", &*self.user_path.read())
            .finish()
    }
}
