//! Lifecycle events delivered by the host.

use super::context::ModuleContext;
use super::error::EventError;
use crate::config::ModuleConfig;

/// Events the host raises against the plugin module.
#[derive(Debug, Clone)]
pub enum ModuleEvent {
    /// (Re)configure the module. May arrive any number of times.
    Configure(ModuleConfig),
    /// Gate before the host scans the user path for plugin files.
    FileScan,
    /// A plugin file appeared under the user path.
    FileAdd(Option<String>),
    /// A plugin file was removed from the user path.
    FileRemove(Option<String>),
    /// Drop any cached plugin state.
    ClearCache,
}

impl ModuleEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::FileScan => "file_scan",
            Self::FileAdd(_) => "file_add",
            Self::FileRemove(_) => "file_remove",
            Self::ClearCache => "clear_cache",
        }
    }
}

/// Apply `event` to `ctx`. Only `Configure` mutates state.
pub fn handle_event(ctx: &ModuleContext, event: &ModuleEvent) -> Result<(), EventError> {
    tracing::trace!(event = event.kind(), "Handling module event");
    match event {
        ModuleEvent::Configure(config) => ctx.configure(config),
        ModuleEvent::FileScan => {
            if ctx.is_configured() {
                Ok(())
            } else {
                Err(EventError::NotConfigured)
            }
        }
        ModuleEvent::FileAdd(filename) | ModuleEvent::FileRemove(filename) => match filename {
            Some(name) if !name.is_empty() => Ok(()),
            _ => Err(EventError::InvalidArgument(format!(
                "{} event without a filename",
                event.kind()
            ))),
        },
        // No cache is held by this module.
        ModuleEvent::ClearCache => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn configured(dir: &TempDir) -> ModuleContext {
        let ctx = ModuleContext::new();
        let event = ModuleEvent::Configure(ModuleConfig::with_user_path(
            dir.path().to_str().unwrap(),
        ));
        handle_event(&ctx, &event).unwrap();
        ctx
    }

    #[test]
    fn file_scan_succeeds_after_configure() {
        let dir = TempDir::new().unwrap();
        let ctx = configured(&dir);
        assert!(handle_event(&ctx, &ModuleEvent::FileScan).is_ok());
    }

    #[test]
    fn file_scan_fails_when_unconfigured() {
        let ctx = ModuleContext::new();
        let err = handle_event(&ctx, &ModuleEvent::FileScan).unwrap_err();
        assert!(matches!(err, EventError::NotConfigured));
    }

    #[test]
    fn file_scan_fails_for_unreachable_path() {
        let ctx = ModuleContext::new();
        let event = ModuleEvent::Configure(ModuleConfig::with_user_path("/nonexistent/udf"));
        handle_event(&ctx, &event).unwrap();
        let err = handle_event(&ctx, &ModuleEvent::FileScan).unwrap_err();
        assert!(matches!(err, EventError::NotConfigured));
    }

    #[test]
    fn file_events_require_a_filename() {
        let ctx = ModuleContext::new();
        assert!(handle_event(&ctx, &ModuleEvent::FileAdd(None)).is_err());
        assert!(handle_event(&ctx, &ModuleEvent::FileRemove(None)).is_err());
        assert!(handle_event(&ctx, &ModuleEvent::FileAdd(Some("geo.so".into()))).is_ok());
        assert!(handle_event(&ctx, &ModuleEvent::FileRemove(Some("geo.so".into()))).is_ok());
    }

    #[test]
    fn clear_cache_is_a_no_op() {
        let ctx = ModuleContext::new();
        assert!(handle_event(&ctx, &ModuleEvent::ClearCache).is_ok());
        assert!(!ctx.is_configured());
    }
}
