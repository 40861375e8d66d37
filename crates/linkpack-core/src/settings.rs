// crates/linkpack-core/src/settings.rs
// ============================================================================
// Module: Linkpack Pipeline Settings
// Description: Typed knobs for repository layout, build tool, and policies.
// Purpose: Give every pipeline stage one explicit source of naming conventions.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`PipelineSettings`] gathers the conventions the link-and-pack pipeline
//! relies on: where packages live, what the manifest and auxiliary files are
//! called, how the build tool is invoked, and which package names receive
//! special packaging policies. Defaults match a pnpm + turbo monorepo layout.
//! Invariants:
//! - Settings are read-only for the duration of a pipeline invocation.
//! - Artifact paths derive only from the cache root and the package name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default directory (relative to the repository) holding local packages.
pub const DEFAULT_PACKAGES_DIR: &str = "packages";
/// Default manifest file name inside each package directory.
pub const DEFAULT_MANIFEST_FILE: &str = "package.json";
/// Default build-pipeline descriptor file name.
pub const DEFAULT_DESCRIPTOR_FILE: &str = "turbo.json";
/// Default lockfile placeholder file name.
pub const DEFAULT_LOCKFILE_NAME: &str = "pnpm-lock.yaml";
/// Default build tool executable.
pub const DEFAULT_BUILD_PROGRAM: &str = "pnpm";
/// Default name of the synthesized packing task and script.
pub const DEFAULT_PACK_TASK: &str = "test-pack";
/// Default native-binary package name.
pub const DEFAULT_NATIVE_PACKAGE: &str = "@next/swc";
/// Default primary framework package name.
pub const DEFAULT_PRIMARY_PACKAGE: &str = "next";
/// Default native binary subdirectory name.
pub const DEFAULT_NATIVE_DIR: &str = "native";
/// Suffix appended to every packed artifact file name.
pub const ARTIFACT_SUFFIX: &str = "-packed.tgz";
/// Default build cache subdirectory under the cache root.
const DEFAULT_BUILD_CACHE_DIR: &str = "build-cache";
/// Default cache root directory name under the system temp directory.
const DEFAULT_CACHE_ROOT_NAME: &str = "linkpack";

// ============================================================================
// SECTION: Settings Types
// ============================================================================

/// Complete pipeline settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Repository and package file layout.
    pub layout: LayoutSettings,
    /// External build tool invocation.
    pub build_tool: BuildToolSettings,
    /// Package-specific policy names.
    pub policies: PolicySettings,
    /// Artifact and build cache locations.
    pub cache: CacheSettings,
}

impl PipelineSettings {
    /// Returns the packed artifact path for a package name.
    #[must_use]
    pub fn artifact_path(&self, package_name: &str) -> PathBuf {
        self.cache.root.join(artifact_file_name(package_name))
    }

    /// Returns the shared build cache directory.
    #[must_use]
    pub fn build_cache_dir(&self) -> PathBuf {
        self.cache
            .build_cache_dir
            .clone()
            .unwrap_or_else(|| self.cache.root.join(DEFAULT_BUILD_CACHE_DIR))
    }

    /// Returns the package container directory for a repository.
    #[must_use]
    pub fn packages_root(&self, repo_dir: &Path) -> PathBuf {
        repo_dir.join(&self.layout.packages_dir)
    }
}

/// Repository layout conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSettings {
    /// Package container directory relative to the repository root.
    pub packages_dir: String,
    /// Manifest file name in each package directory and the repository root.
    pub manifest_file: String,
    /// Build-pipeline descriptor file name.
    pub descriptor_file: String,
    /// Lockfile placeholder file name.
    pub lockfile_name: String,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            packages_dir: DEFAULT_PACKAGES_DIR.to_string(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            descriptor_file: DEFAULT_DESCRIPTOR_FILE.to_string(),
            lockfile_name: DEFAULT_LOCKFILE_NAME.to_string(),
        }
    }
}

/// Build tool invocation settings.
///
/// # Invariants
/// - `program` is a bare executable name or path; arguments are never shell-joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildToolSettings {
    /// Build tool executable.
    pub program: String,
    /// Arguments placed before the artifact path in the pack script.
    pub pack_args: Vec<String>,
    /// Arguments placed before the task name when running the pipeline task.
    pub run_args: Vec<String>,
    /// Task and script name used for packing.
    pub task: String,
    /// Optional bound on concurrent pack invocations.
    pub max_concurrency: Option<usize>,
}

impl Default for BuildToolSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_BUILD_PROGRAM.to_string(),
            pack_args: vec!["pack".to_string(), "--out".to_string()],
            run_args: vec!["turbo".to_string(), "run".to_string()],
            task: DEFAULT_PACK_TASK.to_string(),
            max_concurrency: None,
        }
    }
}

impl BuildToolSettings {
    /// Renders the pack script stored in each manifest for an artifact path.
    #[must_use]
    pub fn pack_script(&self, artifact_path: &Path) -> String {
        let mut parts = Vec::with_capacity(self.pack_args.len() + 2);
        parts.push(self.program.clone());
        parts.extend(self.pack_args.iter().cloned());
        parts.push(format!("\"{}\"", artifact_path.display()));
        parts.join(" ")
    }
}

/// Names that select package-specific packaging policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySettings {
    /// Package shipping compiled native binaries.
    pub native_package: String,
    /// Primary framework package depending on the native package.
    pub primary_package: String,
    /// Subdirectory holding native binaries.
    pub native_dir: String,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            native_package: DEFAULT_NATIVE_PACKAGE.to_string(),
            primary_package: DEFAULT_PRIMARY_PACKAGE.to_string(),
            native_dir: DEFAULT_NATIVE_DIR.to_string(),
        }
    }
}

/// Artifact and build cache locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Directory receiving packed artifacts.
    pub root: PathBuf,
    /// Shared build tool cache (defaults to `<root>/build-cache`).
    pub build_cache_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join(DEFAULT_CACHE_ROOT_NAME),
            build_cache_dir: None,
        }
    }
}

impl CacheSettings {
    /// Creates cache settings rooted at the provided directory.
    #[must_use]
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            build_cache_dir: None,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the artifact path for a package name, relative to the cache root.
///
/// The name is kept verbatim: `utils` becomes `utils-packed.tgz` and
/// `@scope/pkg` becomes `@scope/pkg-packed.tgz` inside a per-scope directory.
/// Distinct linkable names therefore never share an artifact file.
#[must_use]
pub fn artifact_file_name(package_name: &str) -> PathBuf {
    PathBuf::from(format!("{package_name}{ARTIFACT_SUFFIX}"))
}

/// Returns true when a package name maps to an artifact inside the cache root.
///
/// Accepted forms are `pkg` and `@scope/pkg`. Segments must be non-empty, must
/// not be `.` or `..`, and must not contain path separators. Unscoped names
/// may not start with `@`, so no artifact file collides with a scope directory.
#[must_use]
pub fn is_linkable_name(package_name: &str) -> bool {
    let valid_segment = |segment: &str| {
        !segment.is_empty()
            && segment != "."
            && segment != ".."
            && !segment.contains(['/', '\\'])
    };
    match package_name.strip_prefix('@') {
        Some(scoped) => scoped
            .split_once('/')
            .is_some_and(|(scope, name)| valid_segment(scope) && valid_segment(name)),
        None => valid_segment(package_name),
    }
}
