//! In-process plugin images for tests.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::traits::{EntryPoint, ImageLoader, LoadedImage};

thread_local! {
    static CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record(call: impl Into<String>) {
    CALLS.with(|calls| calls.borrow_mut().push(call.into()));
}

/// Entry points invoked on this thread since the last call.
pub fn take_calls() -> Vec<String> {
    CALLS.with(|calls| std::mem::take(&mut *calls.borrow_mut()))
}

unsafe fn dup(value: &CStr) -> *mut c_char {
    libc::strdup(value.as_ptr())
}

pub unsafe extern "C" fn major_one() -> c_int {
    record("major");
    1
}

pub unsafe extern "C" fn major_two() -> c_int {
    record("major");
    2
}

pub unsafe extern "C" fn minor_three() -> c_int {
    record("minor");
    3
}

unsafe fn property(name: *const c_char, unload: &CStr) -> *mut c_char {
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();
    record(format!("property:{name}"));
    match name.as_str() {
        "unload-supported" => dup(unload),
        "conn-name" => dup(c"aerospike-udf-go"),
        "conn-version" => dup(c"1.2.0"),
        "go-version" => dup(c"go1.21.4"),
        _ => std::ptr::null_mut(),
    }
}

pub unsafe extern "C" fn property_unloadable(name: *const c_char) -> *mut c_char {
    property(name, c"true")
}

pub unsafe extern "C" fn property_must_leak(name: *const c_char) -> *mut c_char {
    property(name, c"false")
}

pub unsafe extern "C" fn property_null(name: *const c_char) -> *mut c_char {
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();
    record(format!("property:{name}"));
    std::ptr::null_mut()
}

pub unsafe extern "C" fn setup_ok() -> c_int {
    record("setup");
    0
}

pub unsafe extern "C" fn setup_fails() -> c_int {
    record("setup");
    7
}

pub unsafe extern "C" fn apply_ok(name: *const c_char) -> c_int {
    record(format!("apply:{}", CStr::from_ptr(name).to_string_lossy()));
    0
}

pub unsafe extern "C" fn apply_rejects_foobar(name: *const c_char) -> c_int {
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();
    record(format!("apply:{name}"));
    if name == "Foobar" {
        3
    } else {
        0
    }
}

pub unsafe extern "C" fn apply_stream_ok(name: *const c_char) -> c_int {
    record(format!("stream:{}", CStr::from_ptr(name).to_string_lossy()));
    0
}

/// How a fake image was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Unloaded,
    Leaked,
}

/// Images opened and not yet released, and the most seen at once.
#[derive(Debug, Default)]
struct Live {
    current: usize,
    peak: usize,
}

impl Live {
    fn opened(&mut self) {
        self.current += 1;
        self.peak = self.peak.max(self.current);
    }

    fn released(&mut self) {
        self.current = self.current.saturating_sub(1);
    }
}

/// Symbol table of a fake image.
#[derive(Debug, Clone, Default)]
pub struct FakeImage {
    symbols: HashMap<&'static str, usize>,
    releases: Arc<Mutex<Vec<Release>>>,
    live: Arc<Mutex<Live>>,
}

impl FakeImage {
    /// All six entry points, API 1.3, unloadable, every call succeeding.
    pub fn complete() -> Self {
        Self::default()
            .with(EntryPoint::ApiVersionMajor, major_one as *const () as usize)
            .with(EntryPoint::ApiVersionMinor, minor_three as *const () as usize)
            .with(EntryPoint::GetProperty, property_unloadable as *const () as usize)
            .with(EntryPoint::Setup, setup_ok as *const () as usize)
            .with(EntryPoint::ApplyRecord, apply_ok as *const () as usize)
            .with(EntryPoint::ApplyStream, apply_stream_ok as *const () as usize)
    }

    pub fn with(mut self, entry: EntryPoint, address: usize) -> Self {
        self.symbols.insert(entry.symbol(), address);
        self
    }

    pub fn without(mut self, entry: EntryPoint) -> Self {
        self.symbols.remove(entry.symbol());
        self
    }
}

impl LoadedImage for FakeImage {
    fn symbol_address(&self, name: &str) -> Result<*mut c_void, String> {
        self.symbols
            .get(name)
            .map(|&address| address as *mut c_void)
            .ok_or_else(|| format!("undefined symbol: {name}"))
    }

    fn unload(self) -> Result<(), String> {
        self.live.lock().released();
        self.releases.lock().push(Release::Unloaded);
        Ok(())
    }

    fn leak(self) {
        self.live.lock().released();
        self.releases.lock().push(Release::Leaked);
    }
}

/// Loader handing out copies of one fake image.
pub struct FakeLoader {
    image: Option<FakeImage>,
    releases: Arc<Mutex<Vec<Release>>>,
    live: Arc<Mutex<Live>>,
    opened: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl FakeLoader {
    pub fn new(image: FakeImage) -> Self {
        let releases = Arc::new(Mutex::new(Vec::new()));
        let live = Arc::new(Mutex::new(Live::default()));
        Self {
            image: Some(FakeImage {
                releases: Arc::clone(&releases),
                live: Arc::clone(&live),
                ..image
            }),
            releases,
            live,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// A loader whose every `open` fails.
    pub fn failing() -> Self {
        Self {
            image: None,
            releases: Arc::new(Mutex::new(Vec::new())),
            live: Arc::new(Mutex::new(Live::default())),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn releases(&self) -> Vec<Release> {
        self.releases.lock().clone()
    }

    /// Most images held open at the same time.
    pub fn peak_live(&self) -> usize {
        self.live.lock().peak
    }

    /// Paths opened so far with the bytes found there at open time.
    pub fn opened(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.opened.lock().clone()
    }
}

impl ImageLoader for FakeLoader {
    type Image = FakeImage;

    fn open(&self, path: &Path) -> Result<FakeImage, String> {
        let bytes = std::fs::read(path).unwrap_or_default();
        self.opened.lock().push((path.to_path_buf(), bytes));
        let image = self
            .image
            .clone()
            .ok_or_else(|| format!("{}: invalid ELF header", path.display()))?;
        self.live.lock().opened();
        // Widen the window in which overlapping validations would show up.
        std::thread::sleep(Duration::from_millis(2));
        Ok(image)
    }
}
