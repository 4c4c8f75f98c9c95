//! Validation of the relative file names that make up a source bundle.

use typed_path::{Utf8UnixComponent, Utf8UnixPath};

use crate::{SimrelayUtilsError, SimrelayUtilsResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Normalizes a relative file name and checks that it stays inside its parent directory.
///
/// Backslashes are treated as separators and `.` components are dropped. The following are
/// rejected:
/// - empty names, or names that reduce to nothing
/// - absolute paths
/// - any `..` component
/// - NUL bytes
///
/// ## Examples
///
/// ```
/// use simrelay_utils::normalize_relative_path;
///
/// assert_eq!(normalize_relative_path("./lib/food.py").unwrap(), "lib/food.py");
/// assert!(normalize_relative_path("../etc/passwd").is_err());
/// assert!(normalize_relative_path("/etc/passwd").is_err());
/// ```
pub fn normalize_relative_path(name: &str) -> SimrelayUtilsResult<String> {
    if name.trim().is_empty() {
        return Err(SimrelayUtilsError::PathValidation(
            "file name is empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(SimrelayUtilsError::PathValidation(format!(
            "file name {name:?} contains a NUL byte"
        )));
    }

    let unified = name.replace('\\', "/");
    let path = Utf8UnixPath::new(&unified);
    let mut parts = Vec::new();

    for component in path.components() {
        match component {
            Utf8UnixComponent::RootDir => {
                return Err(SimrelayUtilsError::PathValidation(format!(
                    "absolute paths are not allowed: {name}"
                )));
            }
            Utf8UnixComponent::ParentDir => {
                return Err(SimrelayUtilsError::PathValidation(format!(
                    "parent directory components are not allowed: {name}"
                )));
            }
            Utf8UnixComponent::CurDir => {}
            Utf8UnixComponent::Normal(part) => parts.push(part),
        }
    }

    if parts.is_empty() {
        return Err(SimrelayUtilsError::PathValidation(format!(
            "file name {name:?} does not name a file"
        )));
    }

    Ok(parts.join("/"))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
