//! Native plugin image loading.
//!
//! `NativeLoader` opens shared objects with `libloading`. `ModuleHandle`
//! owns a loaded image for the span of one validation and releases it on
//! drop according to the image's unload capability.

use libloading::Library;
use std::cell::Cell;
use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::path::Path;

use super::traits::{ImageLoader, LoadedImage};

/// Loader backed by the platform dynamic linker.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl NativeLoader {
    pub fn new() -> Self {
        Self
    }
}

/// An image opened by [`NativeLoader`].
#[derive(Debug)]
pub struct NativeImage {
    /// Handle from the dynamic linker
    library: Library,
}

/// Whether the dynamic linker already holds an image under `path`.
///
/// The linker matches by name, so a leaked image from an earlier validation
/// would be handed back instead of the file now at `path`.
#[cfg(unix)]
pub(crate) fn is_resident(path: &Path) -> bool {
    // SAFETY: RTLD_NOLOAD never maps or initializes a new image.
    let existing = unsafe {
        libloading::os::unix::Library::open(Some(path), libc::RTLD_NOW | libc::RTLD_NOLOAD)
    };
    match existing {
        Ok(library) => {
            // Drops only the reference taken here; the resident image stays.
            let _ = library.close();
            true
        }
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub(crate) fn is_resident(_path: &Path) -> bool {
    false
}

impl ImageLoader for NativeLoader {
    type Image = NativeImage;

    fn open(&self, path: &Path) -> Result<NativeImage, String> {
        if is_resident(path) {
            return Err(format!(
                "an image is already resident under {}; it was left loaded by an earlier validation",
                path.display()
            ));
        }

        // Bind everything now so unresolved references fail the load.
        #[cfg(unix)]
        let library = unsafe {
            libloading::os::unix::Library::open(
                Some(path),
                libloading::os::unix::RTLD_NOW | libloading::os::unix::RTLD_LOCAL,
            )
            .map(Library::from)
        };
        #[cfg(not(unix))]
        let library = unsafe { Library::new(path) };

        library
            .map(|library| NativeImage { library })
            .map_err(|e| e.to_string())
    }
}

impl LoadedImage for NativeImage {
    fn symbol_address(&self, name: &str) -> Result<*mut c_void, String> {
        let mut symbol = Vec::with_capacity(name.len() + 1);
        symbol.extend_from_slice(name.as_bytes());
        symbol.push(0);

        let address = unsafe {
            let sym: libloading::Symbol<*mut c_void> =
                self.library.get(&symbol).map_err(|e| e.to_string())?;
            *sym
        };
        if address.is_null() {
            return Err(format!("symbol {name} resolved to null"));
        }
        Ok(address)
    }

    fn unload(self) -> Result<(), String> {
        self.library.close().map_err(|e| e.to_string())
    }

    fn leak(self) {
        std::mem::forget(self.library);
    }
}

/// Whether a loaded image may be unloaded.
///
/// Some plugin runtimes cannot survive being unmapped; those images are
/// leaked for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadPolicy {
    Unloadable,
    MustLeak,
    /// Not yet reported by the image. Treated as [`UnloadPolicy::MustLeak`].
    Unknown,
}

impl UnloadPolicy {
    /// Decide from the `unload-supported` property value.
    pub fn from_property(value: Option<&str>) -> Self {
        match value {
            Some("true") => Self::Unloadable,
            _ => Self::MustLeak,
        }
    }
}

/// A loaded image scoped to a single validation.
///
/// Dropping the handle unloads the image if and only if its policy is
/// [`UnloadPolicy::Unloadable`]; otherwise the image is leaked. Either way
/// the release happens exactly once.
pub struct ModuleHandle<I: LoadedImage> {
    /// Loaded image, released exactly once in `drop`
    image: ManuallyDrop<I>,
    /// Unload capability, `Unknown` until the image reports it
    policy: Cell<UnloadPolicy>,
    /// Module name, for logging
    module: String,
}

impl<I: LoadedImage> ModuleHandle<I> {
    /// Open `path` with `loader` on behalf of `module`.
    ///
    /// # Arguments
    ///
    /// * `loader` - Loader that maps the image
    /// * `path` - Image file on disk
    /// * `module` - Module name used in log records
    ///
    /// # Returns
    ///
    /// The handle, or the loader's diagnostic text.
    pub fn open<L>(loader: &L, path: &Path, module: &str) -> Result<Self, String>
    where
        L: ImageLoader<Image = I>,
    {
        let image = loader.open(path)?;
        tracing::trace!(module = %module, "UDF module loaded");
        Ok(Self {
            image: ManuallyDrop::new(image),
            policy: Cell::new(UnloadPolicy::Unknown),
            module: module.to_string(),
        })
    }

    pub fn image(&self) -> &I {
        &self.image
    }

    pub fn policy(&self) -> UnloadPolicy {
        self.policy.get()
    }

    /// Record the image's unload capability. Decided once; later calls are
    /// ignored.
    pub fn set_policy(&self, policy: UnloadPolicy) {
        if self.policy.get() == UnloadPolicy::Unknown {
            self.policy.set(policy);
        }
    }
}

impl<I: LoadedImage> Drop for ModuleHandle<I> {
    fn drop(&mut self) {
        // SAFETY: `drop` runs once and `self.image` is not touched afterwards.
        let image = unsafe { ManuallyDrop::take(&mut self.image) };
        match self.policy.get() {
            UnloadPolicy::Unloadable => {
                if let Err(e) = image.unload() {
                    tracing::warn!(module = %self.module, error = %e, "Failed to unload UDF module");
                } else {
                    tracing::trace!(module = %self.module, "UDF module unloaded");
                }
            }
            UnloadPolicy::MustLeak | UnloadPolicy::Unknown => {
                tracing::debug!(
                    module = %self.module,
                    policy = ?self.policy.get(),
                    "Leaving UDF module loaded"
                );
                image.leak();
            }
        }
    }
}

impl<I: LoadedImage> std::fmt::Debug for ModuleHandle<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("module", &self.module)
            .field("policy", &self.policy.get())
            .finish_non_exhaustive()
    }
}
