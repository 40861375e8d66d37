// crates/linkpack-core/src/rewrite.rs
// ============================================================================
// Module: Linkpack Dependency Rewriter
// Description: Local dependency substitution followed by package policies.
// Purpose: Point inter-package dependencies at locally packed artifacts.
// Dependencies: thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`rewrite_index`] substitutes artifact paths for every dependency that
//! names a local package, then applies the [`PolicyTable`]. All lookups go
//! through an artifact snapshot taken before the first write, so the result
//! does not depend on iteration order.
//! [`rewrite_manifests`] adds the filesystem work around that pure pass:
//! reading the root manifest's `packageManager` and listing the directories
//! policies asked to inspect.
//! Invariants:
//! - Only the record being processed is mutated.
//! - Dependencies naming non-local packages keep their original specifier.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tokio::fs;
use tracing::debug;
use tracing::info;

use crate::loader::LoadError;
use crate::loader::read_manifest;
use crate::model::ArtifactMap;
use crate::model::PackageIndex;
use crate::model::PackageRecord;
use crate::policy::PolicyContext;
use crate::policy::PolicyEffects;
use crate::policy::PolicyError;
use crate::policy::PolicyTable;
use crate::settings::PipelineSettings;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while rewriting manifests.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// A directory requested for inspection could not be listed.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error message.
        message: String,
    },
    /// The repository root manifest could not be read or parsed.
    #[error("root manifest: {0}")]
    RootManifest(#[from] LoadError),
    /// A package policy failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Caller-supplied inputs to the rewrite pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteInputs<'a> {
    /// Dependency entries merged into the primary package, overriding local substitution.
    pub native_dependency_override: Option<&'a BTreeMap<String, String>>,
    /// `packageManager` inherited by packages that do not declare one.
    pub root_package_manager: Option<&'a str>,
}

// ============================================================================
// SECTION: Substitution
// ============================================================================

/// Rewrites one record's dependencies that name local packages.
///
/// Returns the names of the dependencies that were rewritten.
pub fn substitute_local_dependencies(
    record: &mut PackageRecord,
    artifacts: &ArtifactMap,
) -> Vec<String> {
    let mut rewritten = Vec::new();
    for dependency in record.manifest.dependency_names() {
        let Some(artifact) = artifacts.get(&dependency) else {
            continue;
        };
        if record.manifest.replace_dependency(&dependency, artifact.to_string_lossy()) {
            rewritten.push(dependency);
        }
    }
    rewritten
}

/// Runs substitution and policies over every record of the index.
///
/// # Errors
///
/// Returns [`RewriteError::Policy`] when a policy fails.
pub fn rewrite_index(
    index: &mut PackageIndex,
    inputs: RewriteInputs<'_>,
    policies: &PolicyTable,
    settings: &PipelineSettings,
) -> Result<PolicyEffects, RewriteError> {
    let artifacts = index.artifact_map();
    let context = PolicyContext {
        artifacts: &artifacts,
        native_dependency_override: inputs.native_dependency_override,
        root_package_manager: inputs.root_package_manager,
        settings,
    };
    let mut effects = PolicyEffects::default();
    for record in index.iter_mut() {
        let rewritten = substitute_local_dependencies(record, &artifacts);
        if !rewritten.is_empty() {
            debug!(package = %record.name, dependencies = ?rewritten, "linked local dependencies");
        }
        policies.apply(record, &context, &mut effects)?;
    }
    Ok(effects)
}

// ============================================================================
// SECTION: Rewrite Stage
// ============================================================================

/// Reads `packageManager` from the repository root manifest.
///
/// A missing root manifest yields `None`.
///
/// # Errors
///
/// Returns [`RewriteError`] when the root manifest cannot be read or parsed.
pub async fn read_root_package_manager(
    repo_dir: &Path,
    settings: &PipelineSettings,
) -> Result<Option<String>, RewriteError> {
    let path = repo_dir.join(&settings.layout.manifest_file);
    let Some(manifest) = read_manifest(&path).await? else {
        debug!(path = %path.display(), "no root manifest; packageManager is not defaulted");
        return Ok(None);
    };
    Ok(manifest.package_manager().map(ToString::to_string))
}

/// Rewrites every manifest of the index in memory.
///
/// # Errors
///
/// Returns [`RewriteError`] when the root manifest is malformed, a policy
/// fails, or a directory requested for inspection cannot be listed.
pub async fn rewrite_manifests(
    index: &mut PackageIndex,
    repo_dir: &Path,
    native_dependency_override: Option<&BTreeMap<String, String>>,
    policies: &PolicyTable,
    settings: &PipelineSettings,
) -> Result<(), RewriteError> {
    let root_package_manager = read_root_package_manager(repo_dir, settings).await?;
    let inputs = RewriteInputs {
        native_dependency_override,
        root_package_manager: root_package_manager.as_deref(),
    };
    let effects = rewrite_index(index, inputs, policies, settings)?;
    for dir in &effects.inspect_dirs {
        let entries = list_directory(dir).await?;
        info!(path = %dir.display(), entries = ?entries, "using native binaries");
    }
    Ok(())
}

/// Lists directory entry names in sorted order.
async fn list_directory(dir: &Path) -> Result<Vec<String>, RewriteError> {
    let io_error = |err: std::io::Error| RewriteError::Io {
        path: dir.to_path_buf(),
        message: err.to_string(),
    };
    let mut entries = fs::read_dir(dir).await.map_err(io_error)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
