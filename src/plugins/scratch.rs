//! Scratch copies of plugin images under validation.

use scopeguard::ScopeGuard;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::ValidationError;

/// Prefix of scratch file names inside the user path.
pub const SCRATCH_PREFIX: &str = "validate.";

/// Longest scratch path accepted, in bytes.
pub const MAX_SCRATCH_PATH_LEN: usize = 1023;

/// A scratch file on disk, removed when the guard drops.
pub type ScratchFile = ScopeGuard<PathBuf, fn(PathBuf)>;

/// `<root>/validate.<module>`, length-checked.
pub fn scratch_path(root: &Path, module: &str) -> Result<PathBuf, ValidationError> {
    if module.is_empty() || module == "." || module == ".." {
        return Err(ValidationError::InvalidArgument(format!(
            "invalid module name '{module}'"
        )));
    }
    if module.contains(['/', '\\', '\0']) {
        return Err(ValidationError::InvalidArgument(format!(
            "module name '{}' must be a bare file name",
            module.escape_debug()
        )));
    }

    let path = root.join(format!("{SCRATCH_PREFIX}{module}"));
    let len = path.as_os_str().len();
    if len > MAX_SCRATCH_PATH_LEN {
        return Err(ValidationError::InvalidArgument(format!(
            "scratch path is {len} bytes, limit is {MAX_SCRATCH_PATH_LEN}"
        )));
    }
    Ok(path)
}

/// Write `content` to `path`, creating or truncating it.
///
/// The returned guard deletes the file when dropped. A partially written
/// file is deleted before the error is returned. Empty content is a write
/// failure: nothing is created.
pub fn write_scratch(path: PathBuf, content: &[u8]) -> Result<ScratchFile, ValidationError> {
    if content.is_empty() {
        return Err(ValidationError::IoWrite {
            path,
            source: std::io::Error::new(std::io::ErrorKind::WriteZero, "module content is empty"),
        });
    }

    tracing::trace!(path = %path.display(), size = content.len(), "Writing module for validation");
    let mut file = match std::fs::File::create(&path) {
        Ok(file) => file,
        Err(source) => {
            tracing::debug!(path = %path.display(), error = %source, "Could not open scratch file");
            return Err(ValidationError::IoWrite { path, source });
        }
    };
    let guard = scopeguard::guard(path, remove_scratch as fn(PathBuf));

    if let Err(source) = file.write_all(content).and_then(|()| file.flush()) {
        tracing::debug!(path = %guard.display(), error = %source, "Could not write scratch file");
        return Err(ValidationError::IoWrite {
            path: guard.to_path_buf(),
            source,
        });
    }
    Ok(guard)
}

fn remove_scratch(path: PathBuf) {
    match std::fs::remove_file(&path) {
        Ok(()) => tracing::trace!(path = %path.display(), "Removed scratch file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builds_prefixed_path() {
        let path = scratch_path(Path::new("/opt/udf"), "geo.so").unwrap();
        assert_eq!(path, PathBuf::from("/opt/udf/validate.geo.so"));
    }

    #[test]
    fn rejects_names_that_escape_the_root() {
        for name in ["", ".", "..", "../evil.so", "a/b.so", "nul\0.so"] {
            let err = scratch_path(Path::new("/opt/udf"), name).unwrap_err();
            assert_eq!(err.code(), -3, "{name:?}");
        }
    }

    #[test]
    fn rejects_overlong_path() {
        let root = PathBuf::from(format!("/{}", "r".repeat(900)));
        let name = "m".repeat(200);
        let err = scratch_path(&root, &name).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidArgument(_)));
    }

    #[test]
    fn accepts_path_at_limit() {
        let root = PathBuf::from("/r");
        let name = "m".repeat(MAX_SCRATCH_PATH_LEN - "/r/validate.".len());
        let path = scratch_path(&root, &name).unwrap();
        assert_eq!(path.as_os_str().len(), MAX_SCRATCH_PATH_LEN);
    }

    #[test]
    fn guard_removes_file_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("validate.geo.so");
        let guard = write_scratch(path.clone(), b"\x7fELF").unwrap();
        assert_eq!(std::fs::read(&*guard).unwrap(), b"\x7fELF");
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("validate.geo.so");
        std::fs::write(&path, b"older and longer content").unwrap();
        let guard = write_scratch(path.clone(), b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        drop(guard);
    }

    #[test]
    fn unwritable_root_is_io_error() {
        let err = write_scratch(PathBuf::from("/nonexistent/dir/validate.x"), b"x").unwrap_err();
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn empty_content_is_write_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("validate.geo.so");
        let err = write_scratch(path.clone(), b"").unwrap_err();
        assert_eq!(err.code(), -1);
        assert!(err.to_string().contains("empty"), "{err}");
        assert!(!path.exists());
    }
}
