// crates/linkpack-core/src/packer.rs
// ============================================================================
// Module: Linkpack Packer Orchestrator
// Description: Concurrent per-package invocation of the build tool pack task.
// Purpose: Produce one packed artifact per package and return the artifact map.
// Dependencies: futures, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`pack_packages`] prepares the cache directories, then launches one build
//! tool invocation per package through the [`CommandRunner`] seam. The stage
//! completes when every invocation has settled successfully.
//! Invariants:
//! - No invocation failure is swallowed; the first failure fails the stage.
//! - On failure, in-flight invocations are dropped (and their children killed).
//! - Every invocation writes a distinct artifact file, and its parent
//!   directory exists before the invocation starts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use futures::TryStreamExt;
use futures::future::try_join_all;
use futures::stream;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::model::ArtifactMap;
use crate::model::PackageIndex;
use crate::model::PackageRecord;
use crate::process::CommandRunner;
use crate::process::CommandSpec;
use crate::process::ProcessError;
use crate::settings::PipelineSettings;
use crate::tracer::Tracer;
use crate::tracer::trace_async_fn;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while packing packages.
#[derive(Debug, Error)]
pub enum PackError {
    /// A cache or artifact directory could not be created.
    #[error("failed to create {path}: {message}")]
    Io {
        /// Directory being created.
        path: PathBuf,
        /// Underlying I/O error message.
        message: String,
    },
    /// A pack invocation failed.
    #[error("packing {package} failed: {source}")]
    Process {
        /// Package whose invocation failed.
        package: String,
        /// Process failure with captured output.
        source: ProcessError,
    },
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Builds the pack task invocation for one record.
#[must_use]
pub fn pack_command(record: &PackageRecord, settings: &PipelineSettings) -> CommandSpec {
    let tool = &settings.build_tool;
    CommandSpec::new(&tool.program)
        .args(tool.run_args.iter().cloned())
        .arg(&tool.task)
        .arg("--cache-dir")
        .arg(settings.build_cache_dir().to_string_lossy())
        .arg("--cwd")
        .arg(record.working_dir.to_string_lossy())
        .current_dir(&record.working_dir)
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Packs every package of the index concurrently.
///
/// # Errors
///
/// Returns [`PackError`] when a cache or artifact directory cannot be created
/// or any invocation fails.
pub async fn pack_packages(
    index: &PackageIndex,
    settings: &PipelineSettings,
    runner: &dyn CommandRunner,
    tracer: &Arc<dyn Tracer>,
) -> Result<ArtifactMap, PackError> {
    ensure_dir(&settings.cache.root).await?;
    ensure_dir(&settings.build_cache_dir()).await?;
    for record in index.iter() {
        // Scoped packages pack into a per-scope directory.
        if let Some(parent) = record.artifact_path.parent() {
            ensure_dir(parent).await?;
        }
    }

    let invocations = index.iter().map(|record| pack_one(record, settings, runner, tracer));
    match settings.build_tool.max_concurrency {
        Some(limit) => {
            stream::iter(invocations)
                .buffer_unordered(limit.max(1))
                .try_collect::<Vec<()>>()
                .await?;
        }
        None => {
            try_join_all(invocations).await?;
        }
    }
    Ok(index.artifact_map())
}

/// Runs the pack task for a single record inside its own span.
async fn pack_one(
    record: &PackageRecord,
    settings: &PipelineSettings,
    runner: &dyn CommandRunner,
    tracer: &Arc<dyn Tracer>,
) -> Result<(), PackError> {
    let span_name = format!("pack {}", record.name);
    trace_async_fn(tracer, &span_name, |_| async move {
        let command = pack_command(record, settings);
        info!(package = %record.name, artifact = %record.artifact_path.display(), "packing");
        runner.run(&command).await.map_err(|source| PackError::Process {
            package: record.name.clone(),
            source,
        })?;
        Ok(())
    })
    .await
}

/// Creates a directory and its parents.
async fn ensure_dir(path: &Path) -> Result<(), PackError> {
    fs::create_dir_all(path).await.map_err(|err| PackError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
