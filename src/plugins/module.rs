//! Host-facing plugin module.
//!
//! `UdfModule` is what the host's module table holds: the shared context,
//! the loader and validator settings. It speaks the host's integer
//! protocol for events and returns a [`ValidationReport`] for validation.

use std::sync::Arc;

use super::context::ModuleContext;
use super::error::{EventError, ValidationError, ValidationReport, STATUS_OK};
use super::events::{handle_event, ModuleEvent};
use super::loader::NativeLoader;
use super::traits::ImageLoader;
use super::validator::Validator;
use crate::config::ValidatorConfig;

/// Plugin module registered with the host.
pub struct UdfModule<L = NativeLoader> {
    /// Shared context; `None` until the host attaches one
    context: Option<Arc<ModuleContext>>,
    /// Validator running candidate images through `L`
    validator: Validator<L>,
}

impl UdfModule<NativeLoader> {
    /// Module backed by the platform dynamic linker.
    ///
    /// # Arguments
    ///
    /// * `context` - Context shared with the host's other workers
    /// * `config` - Validator settings
    pub fn native(context: Arc<ModuleContext>, config: &ValidatorConfig) -> Self {
        Self::new(context, NativeLoader::new(), config)
    }
}

impl<L: ImageLoader> UdfModule<L> {
    /// Create a module with an attached context.
    ///
    /// # Arguments
    ///
    /// * `context` - Context shared with the host's other workers
    /// * `loader` - Loader used to map candidate images
    /// * `config` - Validator settings
    pub fn new(context: Arc<ModuleContext>, loader: L, config: &ValidatorConfig) -> Self {
        Self {
            context: Some(context),
            validator: Validator::new(loader, config),
        }
    }

    /// A module with no context attached. Every event fails with the
    /// missing-context status.
    ///
    /// # Arguments
    ///
    /// * `loader` - Loader used to map candidate images
    /// * `config` - Validator settings
    pub fn detached(loader: L, config: &ValidatorConfig) -> Self {
        Self {
            context: None,
            validator: Validator::new(loader, config),
        }
    }

    pub fn context(&self) -> Option<&Arc<ModuleContext>> {
        self.context.as_ref()
    }

    /// Handle a lifecycle event, returning the host status code.
    pub fn update(&self, event: &ModuleEvent) -> i32 {
        match self.try_update(event) {
            Ok(()) => STATUS_OK,
            Err(e) => {
                tracing::debug!(event = event.kind(), error = %e, "Module event rejected");
                e.status()
            }
        }
    }

    pub fn try_update(&self, event: &ModuleEvent) -> Result<(), EventError> {
        let ctx = self.context.as_deref().ok_or(EventError::MissingContext)?;
        handle_event(ctx, event)
    }

    /// Validate a plugin image. Code 0 is a pass.
    pub fn validate(&self, module: &str, content: &[u8]) -> ValidationReport {
        match self.context.as_deref() {
            Some(ctx) => self.validator.validate(ctx, module, content),
            None => ValidationReport::from_result(module, &Err(ValidationError::NotConfigured)),
        }
    }
}

impl<L> std::fmt::Debug for UdfModule<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdfModule")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
