//! Native UDF plugin subsystem.
//!
//! Plugins are shared objects built outside the host against a fixed C ABI
//! (see [`traits`]). This module validates candidate images before the host
//! accepts them and holds the per-host plugin configuration they are loaded
//! from.
//!
//! # Validation protocol
//!
//! 1. Copy the image to `<user_path>/validate.<module>`
//! 2. Load it with all references bound eagerly
//! 3. Check the API major version (must be 1), log the minor
//! 4. Resolve property, setup and apply entry points, all or nothing
//! 5. Read the unload capability and build metadata
//! 6. Run setup, then the configured smoke-test functions
//! 7. Release the image (unload or leak) and delete the scratch copy
//!
//! Step 7 is scope-bound and runs on every exit path.
//!
//! # Example Configuration
//!
//! ```toml
//! [udf]
//! user_path = "/opt/aerospike/usr/udf/go"
//!
//! [validator]
//! smoke_functions = ["HelloWorld", "Foobar"]
//! ```
//!
//! # Limitations
//!
//! A plugin that hangs inside its load-time initializer or its setup routine
//! blocks the validating thread; there is no timeout or cancellation.

pub mod context;
pub mod error;
pub mod events;
pub mod loader;
pub mod module;
pub mod resolver;
pub mod scratch;
pub mod traits;
pub mod validator;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{ModuleContext, UserPath};
pub use error::{EventError, ValidationError, ValidationReport};
pub use events::{handle_event, ModuleEvent};
pub use loader::{ModuleHandle, NativeLoader, UnloadPolicy};
pub use module::UdfModule;
pub use traits::{EntryPoint, ImageLoader, LoadedImage, HOST_API_MAJOR};
pub use validator::Validator;
pub use version::ApiVersion;
