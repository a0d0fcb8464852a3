//! Plugin image validation.
//!
//! `validate` copies the candidate image into the user path, loads it,
//! checks the ABI and runs the plugin's setup, then releases everything it
//! acquired. Release is tied to scope exit: the loaded image is released by
//! its [`ModuleHandle`] and the scratch copy by its guard, on every path out
//! of [`Validator::run`], in that order.
//!
//! Validations of the same module name share a scratch path, so they are
//! serialized; different names run concurrently.

use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::context::ModuleContext;
use super::error::{ValidationError, ValidationReport};
use super::loader::{ModuleHandle, UnloadPolicy};
use super::resolver::EntryPoints;
use super::scratch::{scratch_path, write_scratch};
use super::traits::{
    ImageLoader, PROP_CONN_NAME, PROP_CONN_VERSION, PROP_RUNTIME_VERSION, PROP_UNLOAD_SUPPORTED,
};
use super::version;
use crate::config::ValidatorConfig;

/// Validates plugin images with a given loader.
///
/// Thread-safe for concurrent use from multiple host workers.
#[derive(Debug)]
pub struct Validator<L> {
    /// Loader that maps candidate images
    loader: L,
    /// Functions invoked through `apply_record` after setup
    smoke_functions: Vec<String>,
    /// Scratch paths with a validation in progress
    in_flight: Mutex<HashSet<PathBuf>>,
    /// Signalled whenever a scratch path leaves `in_flight`
    released: Condvar,
}

impl<L: ImageLoader> Validator<L> {
    /// Create a new validator.
    ///
    /// # Arguments
    ///
    /// * `loader` - Loader used to map candidate images
    /// * `config` - Validator settings (smoke-test functions)
    pub fn new(loader: L, config: &ValidatorConfig) -> Self {
        Self {
            loader,
            smoke_functions: config.smoke_functions.clone(),
            in_flight: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// Wait until no other validation holds `path`, then take it.
    fn claim(&self, path: &Path) {
        let mut in_flight = self.in_flight.lock();
        while in_flight.contains(path) {
            tracing::debug!(path = %path.display(), "Waiting for validation of the same module");
            self.released.wait(&mut in_flight);
        }
        in_flight.insert(path.to_path_buf());
    }

    fn release(&self, path: &Path) {
        self.in_flight.lock().remove(path);
        self.released.notify_all();
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Validate `content` as the plugin image `module`. Code 0 is a pass.
    pub fn validate(&self, ctx: &ModuleContext, module: &str, content: &[u8]) -> ValidationReport {
        let result = self.run(ctx, module, content);
        match &result {
            Ok(()) => tracing::trace!(module = %module, "UDF validation pass"),
            Err(e) => tracing::debug!(
                module = %module,
                code = e.code(),
                error = %e,
                "UDF validation fail"
            ),
        }
        ValidationReport::from_result(module, &result)
    }

    fn run(&self, ctx: &ModuleContext, module: &str, content: &[u8]) -> Result<(), ValidationError> {
        let root = ctx.ready_path().ok_or(ValidationError::NotConfigured)?;
        let path = scratch_path(&root, module)?;

        self.claim(&path);
        // Declared first so it is released after the image and scratch file.
        let _claim = scopeguard::guard(path.clone(), |path| self.release(&path));
        let scratch = write_scratch(path, content)?;

        let handle = ModuleHandle::open(&self.loader, &scratch, module).map_err(|detail| {
            tracing::debug!(module = %module, error = %detail, "Cannot load UDF module");
            ValidationError::Load(detail)
        })?;

        version::negotiate(handle.image(), module)?;
        let entries = EntryPoints::resolve(handle.image())?;

        let unload = entries.property(PROP_UNLOAD_SUPPORTED);
        let policy = UnloadPolicy::from_property(unload.as_deref());
        handle.set_policy(policy);
        tracing::debug!(module = %module, policy = ?policy, "UDF module unload capability");

        let conn_name = entries.property(PROP_CONN_NAME);
        let conn_version = entries.property(PROP_CONN_VERSION);
        tracing::debug!(
            module = %module,
            conn = conn_name.as_deref().unwrap_or("unknown"),
            conn_version = conn_version.as_deref().unwrap_or("unknown"),
            "UDF module binding package"
        );
        let runtime = entries.property(PROP_RUNTIME_VERSION);
        tracing::debug!(
            module = %module,
            runtime = runtime.as_deref().unwrap_or("unknown"),
            "UDF module runtime version"
        );

        let rc = entries.setup();
        if rc != 0 {
            tracing::debug!(module = %module, result = rc, "UDF module setup failed");
            return Err(ValidationError::Setup(rc));
        }
        tracing::debug!(module = %module, "UDF module setup completed");

        for function in &self.smoke_functions {
            let rc = entries.apply_record(function);
            if rc != 0 {
                tracing::debug!(
                    module = %module,
                    function = %function,
                    result = rc,
                    "UDF smoke test failed"
                );
                return Err(ValidationError::SmokeTest {
                    function: function.clone(),
                    result: rc,
                });
            }
        }
        Ok(())
    }
}
