use crate::error::{EnvError, Result};
use crate::models::Location;
use crate::services::PathResolver;
use camino::Utf8Path;
use std::fs;

/// Directories that must exist before anything else touches the filesystem,
/// in creation order.
pub const REQUIRED_DIRECTORIES: [Location; 7] = [
    Location::Skin,
    Location::Cache,
    Location::RuntimeCache,
    Location::NetCache,
    Location::Chart,
    Location::RecordOutputs,
    Location::Logs,
];

/// Creates the required directory tree.
pub struct DirectoryBootstrapper<'a> {
    paths: &'a PathResolver,
}

impl<'a> DirectoryBootstrapper<'a> {
    pub fn new(paths: &'a PathResolver) -> Self {
        Self { paths }
    }

    /// Create every directory in [`REQUIRED_DIRECTORIES`].
    ///
    /// Stops at the first failure; callers treat that as fatal.
    pub fn ensure_all(&self) -> Result<()> {
        for location in REQUIRED_DIRECTORIES {
            ensure(self.paths.path(location))?;
        }
        Ok(())
    }
}

/// Create `path` and any missing parents. Existing directories are left alone.
pub fn ensure(path: &Utf8Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|source| EnvError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("Created directory {}", path);
    Ok(())
}
