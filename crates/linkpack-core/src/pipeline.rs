// crates/linkpack-core/src/pipeline.rs
// ============================================================================
// Module: Linkpack Pipeline
// Description: Entry point wiring load, rewrite, persist, and pack stages.
// Purpose: Run the link-and-pack pipeline once per request with fresh state.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! [`link_packages`] runs the stages in strict order. Each stage completes
//! for the whole index before the next begins, so no package is packed with
//! a manifest whose dependencies are not final.
//! Invariants:
//! - All state is scoped to one invocation; nothing is cached across calls.
//! - An absent package container returns an empty map without writes or packing.
//! - Errors before packing abort before any build tool invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::descriptor::DescriptorError;
use crate::descriptor::write_descriptors;
use crate::loader::LoadError;
use crate::loader::load_packages;
use crate::model::ArtifactMap;
use crate::packer::PackError;
use crate::packer::pack_packages;
use crate::policy::PolicyTable;
use crate::process::CommandRunner;
use crate::rewrite::RewriteError;
use crate::rewrite::rewrite_manifests;
use crate::settings::PipelineSettings;
use crate::tracer::NoopTracer;
use crate::tracer::Tracer;
use crate::tracer::trace_async_fn;

// ============================================================================
// SECTION: Span Names
// ============================================================================

/// Span wrapping package discovery.
pub const SPAN_READ_PACKAGES: &str = "read-packages-folder";
/// Span wrapping manifest loading.
pub const SPAN_LOAD_MANIFESTS: &str = "get-pkgdatas";
/// Span wrapping the rewrite pass.
pub const SPAN_REWRITE: &str = "rewrite-manifests";
/// Span wrapping descriptor and manifest persistence.
pub const SPAN_WRITE: &str = "write-descriptors";
/// Span wrapping the concurrent pack stage.
pub const SPAN_PACK: &str = "test-pack-packages";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the pipeline, one variant per stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Package discovery failed.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Manifest rewriting failed.
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    /// Persisting files failed.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// Packing failed.
    #[error(transparent)]
    Pack(#[from] PackError),
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// Inputs of a single pipeline invocation.
#[derive(Clone, Default)]
pub struct LinkRequest {
    /// Repository being prepared.
    pub repo_dir: PathBuf,
    /// Origin repository whose package directories are recorded as build inputs.
    pub origin_dir: Option<PathBuf>,
    /// Dependency entries merged into the primary framework package.
    pub native_dependency_override: Option<BTreeMap<String, String>>,
    /// Caller-supplied tracer; a no-op tracer is used when absent.
    pub tracer: Option<Arc<dyn Tracer>>,
}

impl LinkRequest {
    /// Creates a request for a repository directory.
    #[must_use]
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the origin repository directory.
    #[must_use]
    pub fn origin_dir(mut self, origin_dir: impl Into<PathBuf>) -> Self {
        self.origin_dir = Some(origin_dir.into());
        self
    }

    /// Sets the native dependency override.
    #[must_use]
    pub fn native_dependency_override(mut self, entries: BTreeMap<String, String>) -> Self {
        self.native_dependency_override = Some(entries);
        self
    }

    /// Sets the tracer.
    #[must_use]
    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Runs the pipeline with the default policy table.
///
/// # Errors
///
/// Returns [`PipelineError`] from the first failing stage.
pub async fn link_packages(
    settings: &PipelineSettings,
    request: LinkRequest,
    runner: &dyn CommandRunner,
) -> Result<ArtifactMap, PipelineError> {
    let policies = PolicyTable::from_settings(settings);
    run_pipeline(settings, &policies, request, runner).await
}

/// Settings, runner, and policy table bundled for repeated invocations.
pub struct Linker<R> {
    /// Pipeline settings.
    settings: PipelineSettings,
    /// Policy table applied during rewriting.
    policies: PolicyTable,
    /// External command runner.
    runner: R,
}

impl<R: CommandRunner> Linker<R> {
    /// Creates a linker with the default policy table.
    #[must_use]
    pub fn new(settings: PipelineSettings, runner: R) -> Self {
        let policies = PolicyTable::from_settings(&settings);
        Self {
            settings,
            policies,
            runner,
        }
    }

    /// Replaces the policy table.
    #[must_use]
    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    /// Returns the pipeline settings.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs one pipeline invocation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] from the first failing stage.
    pub async fn link(&self, request: LinkRequest) -> Result<ArtifactMap, PipelineError> {
        run_pipeline(&self.settings, &self.policies, request, &self.runner).await
    }
}

/// Runs the stages in order under the request's tracer.
async fn run_pipeline(
    settings: &PipelineSettings,
    policies: &PolicyTable,
    request: LinkRequest,
    runner: &dyn CommandRunner,
) -> Result<ArtifactMap, PipelineError> {
    let LinkRequest {
        repo_dir,
        origin_dir,
        native_dependency_override,
        tracer,
    } = request;
    let tracer: Arc<dyn Tracer> = tracer.unwrap_or_else(|| Arc::new(NoopTracer));

    let repo_dir = repo_dir.as_path();
    let origin_dir = origin_dir.as_deref();
    let mut index = trace_async_fn(&tracer, SPAN_READ_PACKAGES, move |child| async move {
        trace_async_fn(&child, SPAN_LOAD_MANIFESTS, move |_| {
            load_packages(repo_dir, origin_dir, settings)
        })
        .await
    })
    .await?;
    if index.is_empty() {
        return Ok(ArtifactMap::new());
    }
    info!(packages = index.len(), "linking local packages");

    let native_dependency_override = native_dependency_override.as_ref();
    let index_mut = &mut index;
    trace_async_fn(&tracer, SPAN_REWRITE, move |_| {
        rewrite_manifests(index_mut, repo_dir, native_dependency_override, policies, settings)
    })
    .await?;

    let index = &index;
    trace_async_fn(&tracer, SPAN_WRITE, move |_| write_descriptors(index, settings)).await?;

    let artifacts = trace_async_fn(&tracer, SPAN_PACK, move |child| async move {
        pack_packages(index, settings, runner, &child).await
    })
    .await?;
    Ok(artifacts)
}
