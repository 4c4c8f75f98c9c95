use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Serialize;
use simrelay_utils::{normalize_relative_path, DEFAULT_ENTRY_CANDIDATES};

use crate::{SimrelayError, SimrelayResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// File name of the frame gate harness inside a run scope.
pub const HARNESS_FILENAME: &str = "_simrelay_gate.py";

/// File name of the default constants module inside a run scope.
pub const DEFAULTS_FILENAME: &str = "_simrelay_defaults.py";

/// File name of the headless display shim inside a run scope.
pub const PYGAME_SHIM_FILENAME: &str = "_simrelay_pygame.py";

/// File name of the program run for an empty bundle.
pub const PLACEHOLDER_FILENAME: &str = "_simrelay_placeholder.py";

/// Names the runtime owns. A bundle may not contain them.
pub const RESERVED_FILENAMES: &[&str] = &[
    HARNESS_FILENAME,
    DEFAULTS_FILENAME,
    PYGAME_SHIM_FILENAME,
    PLACEHOLDER_FILENAME,
    "simrelay.py",
];

/// Maximum number of files in a bundle.
pub const MAX_BUNDLE_FILES: usize = 64;

/// Maximum combined size of all files in a bundle.
pub const MAX_BUNDLE_BYTES: usize = 1024 * 1024;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The named source files that make up a user's program.
///
/// File names are normalized relative paths. A bundle is immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SourceBundle {
    files: BTreeMap<String, String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SourceBundle {
    /// Validates and normalizes the given files.
    ///
    /// Fails when a name is empty, absolute, escapes the scope, is reserved by the runtime, or
    /// collides with another name after normalization, and when the bundle is too large.
    pub fn new<I, K, V>(files: I) -> SimrelayResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut normalized = BTreeMap::new();
        let mut total_bytes = 0usize;

        for (name, content) in files {
            let raw = name.as_ref();
            let name = normalize_relative_path(raw)
                .map_err(|e| SimrelayError::InvalidBundle(e.to_string()))?;

            if is_reserved(&name) {
                return Err(SimrelayError::InvalidBundle(format!(
                    "file name {name:?} is reserved"
                )));
            }

            let content = content.into();
            total_bytes += content.len();

            if normalized.insert(name.clone(), content).is_some() {
                return Err(SimrelayError::InvalidBundle(format!(
                    "file {name:?} appears more than once"
                )));
            }
        }

        if normalized.len() > MAX_BUNDLE_FILES {
            return Err(SimrelayError::InvalidBundle(format!(
                "bundle has {} files, at most {MAX_BUNDLE_FILES} are allowed",
                normalized.len()
            )));
        }

        if total_bytes > MAX_BUNDLE_BYTES {
            return Err(SimrelayError::InvalidBundle(format!(
                "bundle is {total_bytes} bytes, at most {MAX_BUNDLE_BYTES} are allowed"
            )));
        }

        Ok(Self { files: normalized })
    }

    /// Reads every Python source file under `dir` into a bundle.
    ///
    /// Hidden entries and `__pycache__` directories are skipped.
    pub fn from_dir(dir: impl AsRef<Path>) -> SimrelayResult<Self> {
        let root = dir.as_ref();
        let mut files = Vec::new();
        collect_sources(root, root, &mut files)?;
        Self::new(files)
    }

    /// Returns the files by normalized name.
    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    /// Returns the content of a file.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Whether a file with the given name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Whether the bundle has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns the file names in order.
    pub fn names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Iterates over the Python source files.
    pub fn python_sources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .filter(|(name, _)| name.ends_with(".py"))
            .map(|(name, content)| (name.as_str(), content.as_str()))
    }

    /// Chooses the program entry point.
    ///
    /// The first present of `snake.py` and `main.py` wins. Otherwise the bundle's only top-level
    /// `.py` file is used.
    pub fn entry_point(&self) -> SimrelayResult<String> {
        if let Some(candidate) = DEFAULT_ENTRY_CANDIDATES
            .iter()
            .find(|candidate| self.contains(candidate))
        {
            return Ok(candidate.to_string());
        }

        let top_level: Vec<&String> = self
            .files
            .keys()
            .filter(|name| name.ends_with(".py") && !name.contains('/'))
            .collect();

        match top_level.as_slice() {
            [only] => Ok(only.to_string()),
            [] => Err(SimrelayError::NoEntryPoint(
                "the bundle contains no top-level .py file".to_string(),
            )),
            many => Err(SimrelayError::NoEntryPoint(format!(
                "{} (name one of them snake.py or main.py)",
                many.iter()
                    .map(|name| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn is_reserved(name: &str) -> bool {
    RESERVED_FILENAMES.contains(&name)
}

fn collect_sources(
    root: &Path,
    dir: &Path,
    files: &mut Vec<(String, String)>,
) -> SimrelayResult<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path: PathBuf = entry.path();
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();

        if file_name.starts_with('.') || file_name == "__pycache__" {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_sources(root, &path, files)?;
        } else if file_type.is_file() && file_name.ends_with(".py") {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| SimrelayError::InvalidBundle(e.to_string()))?;
            let content = std::fs::read_to_string(&path)?;
            files.push((relative.to_string_lossy().into_owned(), content));
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
