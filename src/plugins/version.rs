//! API version negotiation.

use super::error::ValidationError;
use super::resolver::resolve;
use super::traits::{ApiVersionFn, EntryPoint, LoadedImage, HOST_API_MAJOR};

/// API version a plugin reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion {
    pub major: i32,
    pub minor: i32,
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Read the plugin's API version and check it against the host.
///
/// Both version symbols must resolve before either is called. The major
/// version must equal [`HOST_API_MAJOR`]; on mismatch the minor query is
/// skipped. The minor version is informational.
pub fn negotiate<I: LoadedImage>(image: &I, module: &str) -> Result<ApiVersion, ValidationError> {
    // SAFETY: both symbols are declared as `ApiVersionFn` by the ABI, and
    // the pointers are used only within this call while `image` is loaded.
    let (major_fn, minor_fn) = unsafe {
        (
            resolve::<ApiVersionFn, _>(image, EntryPoint::ApiVersionMajor)?,
            resolve::<ApiVersionFn, _>(image, EntryPoint::ApiVersionMinor)?,
        )
    };

    let major = unsafe { major_fn() };
    if major != HOST_API_MAJOR {
        tracing::debug!(module = %module, major, "Incompatible API version major");
        return Err(ValidationError::IncompatibleVersion {
            found: major,
            expected: HOST_API_MAJOR,
        });
    }

    let minor = unsafe { minor_fn() };
    let version = ApiVersion { major, minor };
    tracing::debug!(module = %module, version = %version, "UDF module API version");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::{self, major_two, FakeImage};

    #[test]
    fn accepts_matching_major() {
        let image = FakeImage::complete();
        let version = negotiate(&image, "geo").unwrap();
        assert_eq!(version, ApiVersion { major: 1, minor: 3 });
        assert_eq!(version.to_string(), "1.3");
    }

    #[test]
    fn rejects_other_major_without_querying_minor() {
        let image = FakeImage::complete()
            .with(EntryPoint::ApiVersionMajor, major_two as *const () as usize);
        testing::take_calls();
        let err = negotiate(&image, "geo").unwrap_err();
        assert_eq!(err.code(), 22);
        assert_eq!(testing::take_calls(), vec!["major"]);
    }

    #[test]
    fn missing_major_symbol_is_code_20() {
        let image = FakeImage::complete().without(EntryPoint::ApiVersionMajor);
        assert_eq!(negotiate(&image, "geo").unwrap_err().code(), 20);
    }

    #[test]
    fn missing_minor_symbol_is_code_21_and_nothing_is_called() {
        let image = FakeImage::complete().without(EntryPoint::ApiVersionMinor);
        testing::take_calls();
        assert_eq!(negotiate(&image, "geo").unwrap_err().code(), 21);
        assert!(testing::take_calls().is_empty());
    }
}
