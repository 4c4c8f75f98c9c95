use std::path::{Path, PathBuf};

use getset::Getters;
use simrelay_utils::SCRATCH_DIR_PREFIX;
use tempfile::TempDir;

use super::{
    synthesize_stubs, DefaultConstants, SourceBundle, DEFAULTS_FILENAME, HARNESS_FILENAME,
    PLACEHOLDER_FILENAME, PYGAME_SHIM_FILENAME,
};
use crate::SimrelayResult;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const HARNESS_SOURCE: &str = include_str!("assets/harness.py");
const PYGAME_SHIM_SOURCE: &str = include_str!("assets/pygame_shim.py");
const PLACEHOLDER_SOURCE: &str = include_str!("assets/placeholder.py");

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A materialized run scope.
///
/// The directory is removed when the scope is closed or dropped.
#[derive(Debug, Getters)]
#[getset(get = "pub with_prefix")]
pub struct SandboxScope {
    /// The scoped temporary directory
    #[getset(skip)]
    dir: TempDir,

    /// File the program starts from, relative to the scope
    entry: String,

    /// Files supplied by the bundle
    files: Vec<String>,

    /// Stub modules synthesized for the run
    stubs: Vec<String>,

    /// Whether the placeholder program runs in place of an empty bundle
    placeholder: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandboxScope {
    /// The scope directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The frame gate harness inside the scope.
    pub fn harness_path(&self) -> PathBuf {
        self.dir.path().join(HARNESS_FILENAME)
    }

    /// Removes the scope directory.
    pub fn close(self) -> SimrelayResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!("removed run scope {}", path.display());
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Writes a bundle into a fresh scoped temporary directory under `scratch_dir`.
///
/// The scope holds the bundle's files, stubs for imported-but-missing support modules, and the
/// runtime assets. If any step fails the directory is removed before the error is returned.
pub async fn bootstrap(bundle: &SourceBundle, scratch_dir: &Path) -> SimrelayResult<SandboxScope> {
    let (entry, placeholder) = if bundle.is_empty() {
        (PLACEHOLDER_FILENAME.to_string(), true)
    } else {
        (bundle.entry_point()?, false)
    };

    let dir = tempfile::Builder::new()
        .prefix(SCRATCH_DIR_PREFIX)
        .tempdir_in(scratch_dir)?;
    let root = dir.path().to_path_buf();

    for (name, content) in bundle.files() {
        write_file(&root, name, content).await?;
    }

    let stubs = synthesize_stubs(bundle);
    for stub in &stubs {
        write_file(&root, &stub.filename, stub.content).await?;
    }

    let defaults = DefaultConstants::with_overrides(bundle.get("constants.py"));
    write_file(&root, DEFAULTS_FILENAME, &defaults.render()).await?;
    write_file(&root, HARNESS_FILENAME, HARNESS_SOURCE).await?;
    write_file(&root, PYGAME_SHIM_FILENAME, PYGAME_SHIM_SOURCE).await?;
    if placeholder {
        write_file(&root, PLACEHOLDER_FILENAME, PLACEHOLDER_SOURCE).await?;
    }

    let stubs: Vec<String> = stubs.into_iter().map(|stub| stub.filename).collect();
    tracing::debug!(
        "bootstrapped run scope {} (entry: {entry}, stubs: {stubs:?})",
        root.display()
    );

    Ok(SandboxScope {
        dir,
        entry,
        files: bundle.names(),
        stubs,
        placeholder,
    })
}

async fn write_file(root: &Path, name: &str, content: &str) -> SimrelayResult<()> {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, content).await?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
