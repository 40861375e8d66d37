// crates/linkpack-core/src/policy.rs
// ============================================================================
// Module: Linkpack Package Policies
// Description: Package-specific manifest policies and the policy table.
// Purpose: Isolate environment-specific packaging rules from the rewrite loop.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! A [`PolicyTable`] maps package names to [`PackagePolicy`] implementations
//! and also holds policies applied to every package. The rewriter consults
//! the table once per record after local dependency substitution.
//! Built-in policies:
//! - [`NativeBinaryPolicy`]: ships the native binary directory.
//! - [`PrimaryPackagePolicy`]: wires the native dependency into the framework package.
//! - [`PackageManagerDefaultPolicy`]: inherits the root `packageManager` field.
//! - [`PackScriptPolicy`]: synthesizes the pack script.
//!
//! Invariants:
//! - Policies mutate only the record they are given.
//! - Per-package policies run before policies registered for every package.
//! - Registration order is application order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::manifest::ManifestError;
use crate::model::PackageRecord;
use crate::settings::BuildToolSettings;
use crate::settings::PipelineSettings;

// ============================================================================
// SECTION: Policy Errors
// ============================================================================

/// Errors raised by package policies.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The manifest could not be updated.
    #[error("policy for {package} failed: {source}")]
    Manifest {
        /// Package the policy was applied to.
        package: String,
        /// Manifest failure.
        source: ManifestError,
    },
    /// Custom policy failure.
    #[error("policy for {package} failed: {message}")]
    Custom {
        /// Package the policy was applied to.
        package: String,
        /// Failure description.
        message: String,
    },
}

impl PolicyError {
    /// Wraps a manifest failure for a package.
    #[must_use]
    pub fn manifest(package: &str, source: ManifestError) -> Self {
        Self::Manifest {
            package: package.to_string(),
            source,
        }
    }
}

// ============================================================================
// SECTION: Policy Context
// ============================================================================

/// Read-only inputs shared by every policy invocation.
///
/// # Invariants
/// - `artifacts` is a snapshot taken before any record was rewritten.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// Name-to-artifact snapshot of the whole index.
    pub artifacts: &'a BTreeMap<String, PathBuf>,
    /// Externally supplied override for the native dependency.
    pub native_dependency_override: Option<&'a BTreeMap<String, String>>,
    /// `packageManager` declared by the repository root manifest.
    pub root_package_manager: Option<&'a str>,
    /// Pipeline settings.
    pub settings: &'a PipelineSettings,
}

/// Follow-up work requested by policies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyEffects {
    /// Directories whose listing is logged for diagnostics.
    pub inspect_dirs: Vec<PathBuf>,
}

// ============================================================================
// SECTION: Policy Trait
// ============================================================================

/// Manifest policy applied to a package record.
pub trait PackagePolicy: Send + Sync {
    /// Applies the policy to a record.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when the manifest cannot be updated.
    fn apply(
        &self,
        record: &mut PackageRecord,
        context: &PolicyContext<'_>,
        effects: &mut PolicyEffects,
    ) -> Result<(), PolicyError>;
}

/// Callback handler signature used by [`CallbackPolicy`].
type PolicyHandler = dyn Fn(&mut PackageRecord, &PolicyContext<'_>, &mut PolicyEffects) -> Result<(), PolicyError>
    + Send
    + Sync;

/// Policy backed by a closure.
#[derive(Clone)]
pub struct CallbackPolicy {
    /// Handler invoked for each matching record.
    handler: Arc<PolicyHandler>,
}

impl CallbackPolicy {
    /// Creates a policy from a handler function.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&mut PackageRecord, &PolicyContext<'_>, &mut PolicyEffects) -> Result<(), PolicyError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl PackagePolicy for CallbackPolicy {
    fn apply(
        &self,
        record: &mut PackageRecord,
        context: &PolicyContext<'_>,
        effects: &mut PolicyEffects,
    ) -> Result<(), PolicyError> {
        (self.handler)(record, context, effects)
    }
}

// ============================================================================
// SECTION: Built-in Policies
// ============================================================================

/// Ships the native binary directory with the native-binary package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBinaryPolicy {
    /// Native binary subdirectory name.
    native_dir: String,
}

impl NativeBinaryPolicy {
    /// Creates the policy for a native binary directory name.
    #[must_use]
    pub fn new(native_dir: impl Into<String>) -> Self {
        Self {
            native_dir: native_dir.into(),
        }
    }
}

impl PackagePolicy for NativeBinaryPolicy {
    fn apply(
        &self,
        record: &mut PackageRecord,
        _context: &PolicyContext<'_>,
        effects: &mut PolicyEffects,
    ) -> Result<(), PolicyError> {
        record
            .manifest
            .ensure_file(&self.native_dir)
            .map_err(|err| PolicyError::manifest(&record.name, err))?;
        effects.inspect_dirs.push(record.working_dir.join(&self.native_dir));
        Ok(())
    }
}

/// Points the primary framework package at the native binaries.
///
/// Precedence: the external override map, then the locally packed native
/// package, then the primary package's own native directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryPackagePolicy {
    /// Native-binary package name.
    native_package: String,
    /// Native binary subdirectory name.
    native_dir: String,
}

impl PrimaryPackagePolicy {
    /// Creates the policy for the native package and directory names.
    #[must_use]
    pub fn new(native_package: impl Into<String>, native_dir: impl Into<String>) -> Self {
        Self {
            native_package: native_package.into(),
            native_dir: native_dir.into(),
        }
    }
}

impl PackagePolicy for PrimaryPackagePolicy {
    fn apply(
        &self,
        record: &mut PackageRecord,
        context: &PolicyContext<'_>,
        _effects: &mut PolicyEffects,
    ) -> Result<(), PolicyError> {
        let manifest = &mut record.manifest;
        let result = if let Some(overrides) = context.native_dependency_override {
            overrides
                .iter()
                .try_for_each(|(name, specifier)| manifest.set_dependency(name, specifier))
        } else if let Some(artifact) = context.artifacts.get(&self.native_package) {
            manifest.set_dependency(&self.native_package, artifact.to_string_lossy())
        } else {
            // Binaries are expected inside the primary package itself.
            manifest.ensure_file(&self.native_dir).map(|_| ())
        };
        result.map_err(|err| PolicyError::manifest(&record.name, err))
    }
}

/// Defaults `packageManager` from the repository root manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackageManagerDefaultPolicy;

impl PackagePolicy for PackageManagerDefaultPolicy {
    fn apply(
        &self,
        record: &mut PackageRecord,
        context: &PolicyContext<'_>,
        _effects: &mut PolicyEffects,
    ) -> Result<(), PolicyError> {
        if record.manifest.package_manager().is_none()
            && let Some(package_manager) = context.root_package_manager
        {
            record.manifest.set_package_manager(package_manager);
        }
        Ok(())
    }
}

/// Synthesizes the pack script targeting the record's artifact path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackScriptPolicy {
    /// Build tool settings used to render the script.
    build_tool: BuildToolSettings,
}

impl PackScriptPolicy {
    /// Creates the policy from build tool settings.
    #[must_use]
    pub const fn new(build_tool: BuildToolSettings) -> Self {
        Self {
            build_tool,
        }
    }
}

impl PackagePolicy for PackScriptPolicy {
    fn apply(
        &self,
        record: &mut PackageRecord,
        _context: &PolicyContext<'_>,
        _effects: &mut PolicyEffects,
    ) -> Result<(), PolicyError> {
        let script = self.build_tool.pack_script(&record.artifact_path);
        record
            .manifest
            .set_script(&self.build_tool.task, script)
            .map_err(|err| PolicyError::manifest(&record.name, err))
    }
}

// ============================================================================
// SECTION: Policy Table
// ============================================================================

/// Builder for a policy table.
#[derive(Default)]
pub struct PolicyTableBuilder {
    /// Policies keyed by package name.
    by_package: BTreeMap<String, Vec<Arc<dyn PackagePolicy>>>,
    /// Policies applied to every package.
    global: Vec<Arc<dyn PackagePolicy>>,
}

impl PolicyTableBuilder {
    /// Registers a policy for one package name.
    #[must_use]
    pub fn package(mut self, name: impl Into<String>, policy: impl PackagePolicy + 'static) -> Self {
        self.by_package.entry(name.into()).or_default().push(Arc::new(policy));
        self
    }

    /// Registers a policy applied to every package.
    #[must_use]
    pub fn every_package(mut self, policy: impl PackagePolicy + 'static) -> Self {
        self.global.push(Arc::new(policy));
        self
    }

    /// Builds the policy table.
    #[must_use]
    pub fn build(self) -> PolicyTable {
        PolicyTable {
            by_package: self.by_package,
            global: self.global,
        }
    }
}

/// Package-name to policy table.
///
/// # Invariants
/// - Lookups never fail; unknown names receive only the global policies.
#[derive(Clone, Default)]
pub struct PolicyTable {
    /// Policies keyed by package name.
    by_package: BTreeMap<String, Vec<Arc<dyn PackagePolicy>>>,
    /// Policies applied to every package.
    global: Vec<Arc<dyn PackagePolicy>>,
}

impl PolicyTable {
    /// Returns a builder for a policy table.
    #[must_use]
    pub fn builder() -> PolicyTableBuilder {
        PolicyTableBuilder::default()
    }

    /// Returns the default table derived from pipeline settings.
    #[must_use]
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        let policies = &settings.policies;
        Self::builder()
            .package(&policies.native_package, NativeBinaryPolicy::new(&policies.native_dir))
            .package(
                &policies.primary_package,
                PrimaryPackagePolicy::new(&policies.native_package, &policies.native_dir),
            )
            .every_package(PackageManagerDefaultPolicy)
            .every_package(PackScriptPolicy::new(settings.build_tool.clone()))
            .build()
    }

    /// Returns the policies applied to a package, in application order.
    pub fn policies_for<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a dyn PackagePolicy> {
        self.by_package
            .get(name)
            .into_iter()
            .flatten()
            .chain(self.global.iter())
            .map(|policy| -> &'a dyn PackagePolicy { &**policy })
    }

    /// Applies every matching policy to a record.
    ///
    /// # Errors
    ///
    /// Returns the first [`PolicyError`] raised.
    pub fn apply(
        &self,
        record: &mut PackageRecord,
        context: &PolicyContext<'_>,
        effects: &mut PolicyEffects,
    ) -> Result<(), PolicyError> {
        let name = record.name.clone();
        for policy in self.policies_for(&name) {
            policy.apply(record, context, effects)?;
        }
        Ok(())
    }
}
