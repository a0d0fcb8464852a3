//! Plugin ABI contract.
//!
//! Names and signatures of the C entry points a UDF plugin image must export,
//! plus the loader seam the validator drives. Everything crossing the FFI
//! boundary is declared here so the rest of the subsystem only sees typed
//! function pointers.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};
use std::path::Path;

/// API major version this host speaks. Plugins must match it exactly.
pub const HOST_API_MAJOR: i32 = 1;

/// Property reporting whether the image may be unloaded (`"true"` = yes).
pub const PROP_UNLOAD_SUPPORTED: &str = "unload-supported";
/// Name of the binding package the plugin was built against.
pub const PROP_CONN_NAME: &str = "conn-name";
/// Version of the binding package the plugin was built against.
pub const PROP_CONN_VERSION: &str = "conn-version";
/// Version of the toolchain/runtime that compiled the plugin.
pub const PROP_RUNTIME_VERSION: &str = "go-version";

pub type ApiVersionFn = unsafe extern "C" fn() -> c_int;
/// Returns a `malloc`-allocated string the caller must `free`, or null.
pub type GetPropertyFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;
pub type SetupFn = unsafe extern "C" fn() -> c_int;
pub type ApplyFn = unsafe extern "C" fn(*const c_char) -> c_int;

/// Entry points exported by a plugin image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    ApiVersionMajor,
    ApiVersionMinor,
    GetProperty,
    Setup,
    ApplyRecord,
    ApplyStream,
}

impl EntryPoint {
    /// Exported symbol name.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::ApiVersionMajor => "aerospike_udf_go_get_api_version_major",
            Self::ApiVersionMinor => "aerospike_udf_go_get_api_version_minor",
            Self::GetProperty => "aerospike_udf_go_get_property",
            Self::Setup => "aerospike_udf_go_setup",
            Self::ApplyRecord => "aerospike_udf_go_apply_record",
            Self::ApplyStream => "aerospike_udf_go_apply_stream",
        }
    }

    /// Validation code reported when this symbol cannot be resolved.
    pub fn missing_code(self) -> i32 {
        match self {
            Self::ApiVersionMajor => 20,
            Self::ApiVersionMinor => 21,
            Self::GetProperty => 30,
            Self::Setup => 31,
            Self::ApplyRecord => 32,
            Self::ApplyStream => 33,
        }
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Opens plugin images from disk.
///
/// Implementations must be shareable across worker threads: several
/// validations may open images concurrently.
pub trait ImageLoader: Send + Sync {
    type Image: LoadedImage;

    /// Load the image at `path`, resolving all load-time references eagerly.
    ///
    /// The error string is the platform loader's diagnostic text.
    fn open(&self, path: &Path) -> Result<Self::Image, String>;
}

/// A loaded plugin image.
pub trait LoadedImage {
    /// Address of the exported symbol `name`.
    ///
    /// The error string is the platform loader's diagnostic text. A null
    /// address is reported as an error as well.
    fn symbol_address(&self, name: &str) -> Result<*mut c_void, String>;

    /// Unload the image.
    fn unload(self) -> Result<(), String>;

    /// Give up the image without unloading it; it stays mapped for the rest
    /// of the process.
    fn leak(self);
}
