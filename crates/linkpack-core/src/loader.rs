// crates/linkpack-core/src/loader.rs
// ============================================================================
// Module: Linkpack Manifest Loader
// Description: Discovers local packages and builds the package index.
// Purpose: Turn a repository directory into a per-invocation PackageIndex.
// Dependencies: thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`load_packages`] enumerates the immediate subdirectories of the package
//! container directory and loads each one's manifest.
//! Invariants:
//! - A missing container directory yields an empty index, not an error.
//! - Subdirectories without a manifest are skipped with a notice.
//! - Malformed manifests and duplicate names are fatal.
//! - Subdirectories are visited in name order so diagnostics are stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tokio::fs;
use tracing::debug;
use tracing::info;

use crate::manifest::Manifest;
use crate::model::InsertOutcome;
use crate::model::PackageIndex;
use crate::model::PackageRecord;
use crate::settings::PipelineSettings;
use crate::settings::is_linkable_name;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading local packages.
///
/// # Invariants
/// - Every variant names the path it concerns.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Filesystem failure other than a missing container directory.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error message.
        message: String,
    },
    /// Manifest could not be parsed.
    #[error("invalid manifest {path}: {message}")]
    ManifestParse {
        /// Manifest path.
        path: PathBuf,
        /// Parse failure description.
        message: String,
    },
    /// The declared name cannot be mapped to an artifact inside the cache root.
    #[error("invalid package name {name:?} in {path}")]
    InvalidName {
        /// Declared package name.
        name: String,
        /// Manifest path.
        path: PathBuf,
    },
    /// Two directories declare the same package name.
    #[error("package {name} declared by both {first} and {second}")]
    DuplicatePackage {
        /// Duplicated package name.
        name: String,
        /// Manifest loaded first.
        first: PathBuf,
        /// Manifest rejected as the duplicate.
        second: PathBuf,
    },
}

impl LoadError {
    /// Builds an I/O error for a path.
    fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Loads every local package under the repository's package container.
///
/// `origin_dir` locates the origin repository whose package directories are
/// recorded as build inputs; when absent the working directories are used.
///
/// # Errors
///
/// Returns [`LoadError`] on filesystem failures (other than a missing
/// container directory), malformed manifests, names that cannot be linked,
/// or duplicate package names.
pub async fn load_packages(
    repo_dir: &Path,
    origin_dir: Option<&Path>,
    settings: &PipelineSettings,
) -> Result<PackageIndex, LoadError> {
    let container = settings.packages_root(repo_dir);
    let Some(folders) = read_package_folders(&container).await? else {
        info!(path = %container.display(), "no packages to link");
        return Ok(PackageIndex::new());
    };

    let mut index = PackageIndex::new();
    for folder in folders {
        let working_dir = container.join(&folder);
        let manifest_path = working_dir.join(&settings.layout.manifest_file);
        let Some(manifest) = read_manifest(&manifest_path).await? else {
            info!(folder = %folder.to_string_lossy(), "skipping directory without a manifest");
            continue;
        };
        let name = manifest
            .require_name()
            .map_err(|err| LoadError::ManifestParse {
                path: manifest_path.clone(),
                message: err.to_string(),
            })?
            .to_string();
        if !is_linkable_name(&name) {
            return Err(LoadError::InvalidName {
                name,
                path: manifest_path,
            });
        }
        let source_dir = origin_dir.map_or_else(
            || working_dir.clone(),
            |origin| settings.packages_root(origin).join(&folder),
        );
        debug!(package = %name, dir = %working_dir.display(), "loaded package");
        let record = PackageRecord {
            artifact_path: settings.artifact_path(&name),
            name,
            manifest_path,
            source_dir,
            working_dir,
            manifest,
        };
        if let InsertOutcome::Duplicate(rejected) = index.insert(record) {
            let first = index
                .get(&rejected.name)
                .map(|existing| existing.manifest_path.clone())
                .unwrap_or_default();
            return Err(LoadError::DuplicatePackage {
                name: rejected.name,
                first,
                second: rejected.manifest_path,
            });
        }
    }
    Ok(index)
}

/// Reads a manifest file, returning `None` when it does not exist.
///
/// # Errors
///
/// Returns [`LoadError`] when the file cannot be read or parsed.
pub async fn read_manifest(path: &Path) -> Result<Option<Manifest>, LoadError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(LoadError::io(path, &err)),
    };
    Manifest::parse(&bytes).map(Some).map_err(|err| LoadError::ManifestParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Lists package directory names under the container, sorted by name.
///
/// Returns `None` when the container directory does not exist.
async fn read_package_folders(container: &Path) -> Result<Option<Vec<OsString>>, LoadError> {
    let mut entries = match fs::read_dir(container).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(LoadError::io(container, &err)),
    };
    let mut folders = Vec::new();
    while let Some(entry) =
        entries.next_entry().await.map_err(|err| LoadError::io(container, &err))?
    {
        let path = entry.path();
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            // Dangling symlink.
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(LoadError::io(&path, &err)),
        };
        if !metadata.is_dir() {
            continue;
        }
        folders.push(entry.file_name());
    }
    folders.sort();
    Ok(Some(folders))
}
