//! Typed symbol resolution.
//!
//! Raw addresses from a [`LoadedImage`] are turned into typed entry points
//! here and nowhere else. [`EntryPoints`] is only ever produced with all four
//! post-version entry points present, and borrows the image so it cannot
//! outlive the handle that keeps the code mapped.

use std::ffi::{c_void, CStr, CString};
use std::marker::PhantomData;
use std::os::raw::c_char;

use super::error::ValidationError;
use super::traits::{ApplyFn, EntryPoint, GetPropertyFn, LoadedImage, SetupFn};

/// Resolve `entry` in `image` as a function pointer of type `F`.
///
/// # Safety
///
/// `F` must be the `extern "C"` function pointer type the ABI declares for
/// `entry`, and the returned pointer is only valid while `image` stays loaded.
pub unsafe fn resolve<F: Copy, I: LoadedImage>(
    image: &I,
    entry: EntryPoint,
) -> Result<F, ValidationError> {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*mut c_void>());
    match image.symbol_address(entry.symbol()) {
        Ok(address) => Ok(std::mem::transmute_copy::<*mut c_void, F>(&address)),
        Err(detail) => {
            tracing::debug!(symbol = entry.symbol(), error = %detail, "Cannot find entry point");
            Err(ValidationError::SymbolNotFound { entry, detail })
        }
    }
}

/// Property, setup and apply entry points of a loaded image.
#[derive(Clone, Copy)]
pub struct EntryPoints<'img> {
    get_property: GetPropertyFn,
    setup: SetupFn,
    apply_record: ApplyFn,
    apply_stream: ApplyFn,
    _image: PhantomData<&'img ()>,
}

impl<'img> EntryPoints<'img> {
    /// Resolve all four entry points, or fail on the first one missing.
    pub fn resolve<I: LoadedImage>(image: &'img I) -> Result<Self, ValidationError> {
        // SAFETY: types match the ABI declarations in `traits`, and the
        // lifetime ties every pointer to `image`.
        unsafe {
            Ok(Self {
                get_property: resolve(image, EntryPoint::GetProperty)?,
                setup: resolve(image, EntryPoint::Setup)?,
                apply_record: resolve(image, EntryPoint::ApplyRecord)?,
                apply_stream: resolve(image, EntryPoint::ApplyStream)?,
                _image: PhantomData,
            })
        }
    }

    /// Query a named property. `None` if the plugin returns null.
    pub fn property(&self, name: &str) -> Option<String> {
        let name = CString::new(name).ok()?;
        // SAFETY: the plugin returns a malloc'd string or null; ownership
        // passes to `PluginString`, which frees it.
        let raw = unsafe { PluginString::from_raw((self.get_property)(name.as_ptr())) }?;
        Some(raw.to_string_lossy())
    }

    /// Run the plugin's setup routine.
    pub fn setup(&self) -> i32 {
        unsafe { (self.setup)() }
    }

    /// Invoke `function` through the record entry point.
    pub fn apply_record(&self, function: &str) -> i32 {
        call_named(self.apply_record, function)
    }

    /// Invoke `function` through the stream entry point.
    pub fn apply_stream(&self, function: &str) -> i32 {
        call_named(self.apply_stream, function)
    }
}

impl std::fmt::Debug for EntryPoints<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPoints").finish_non_exhaustive()
    }
}

fn call_named(entry: ApplyFn, function: &str) -> i32 {
    match CString::new(function) {
        Ok(name) => unsafe { entry(name.as_ptr()) },
        // Interior NUL: the name cannot cross the ABI.
        Err(_) => -1,
    }
}

/// A `malloc`-allocated C string handed over by the plugin.
struct PluginString(*mut c_char);

impl PluginString {
    /// # Safety
    ///
    /// `ptr` must be null or a NUL-terminated string allocated with `malloc`
    /// that nobody else frees.
    unsafe fn from_raw(ptr: *mut c_char) -> Option<Self> {
        (!ptr.is_null()).then_some(Self(ptr))
    }

    fn to_string_lossy(&self) -> String {
        unsafe { CStr::from_ptr(self.0) }.to_string_lossy().into_owned()
    }
}

impl Drop for PluginString {
    fn drop(&mut self) {
        unsafe { libc::free(self.0.cast()) };
    }
}
