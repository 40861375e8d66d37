// crates/linkpack-core/src/descriptor.rs
// ============================================================================
// Module: Linkpack Build Descriptor Writer
// Description: Persists rewritten manifests and build tool auxiliary files.
// Purpose: Materialize the in-memory rewrite onto each package working directory.
// Dependencies: serde, serde_json, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! For each record, [`write_descriptors`] writes three files into the working
//! directory: the build-pipeline descriptor, an empty lockfile placeholder, and
//! the rewritten manifest.
//! Invariants:
//! - Runs only after the rewrite pass completed for the whole index.
//! - Output is a pure function of the record: reruns are byte-identical.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::model::PackageIndex;
use crate::model::PackageRecord;
use crate::settings::PipelineSettings;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while persisting package files.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// A file could not be written.
    #[error("failed to write {path}: {message}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error message.
        message: String,
    },
    /// A document could not be serialized.
    #[error("failed to serialize {path}: {message}")]
    Serialize {
        /// Path the document was destined for.
        path: PathBuf,
        /// Serialization failure description.
        message: String,
    },
}

// ============================================================================
// SECTION: Descriptor Types
// ============================================================================

/// Build-pipeline descriptor written next to each manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    /// Tasks keyed by task name.
    pub pipeline: BTreeMap<String, TaskDescriptor>,
}

/// Declared outputs and inputs of one build task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Files the task produces.
    pub outputs: Vec<String>,
    /// Paths whose changes invalidate the task cache.
    pub inputs: Vec<String>,
}

impl BuildDescriptor {
    /// Returns the descriptor declaring the pack task for a record.
    #[must_use]
    pub fn for_record(record: &PackageRecord, task: &str) -> Self {
        let task_descriptor = TaskDescriptor {
            outputs: vec![record.artifact_path.to_string_lossy().into_owned()],
            inputs: vec![record.source_dir.to_string_lossy().into_owned()],
        };
        Self {
            pipeline: BTreeMap::from([(task.to_string(), task_descriptor)]),
        }
    }
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Persists descriptor, lockfile placeholder, and manifest for every record.
///
/// # Errors
///
/// Returns [`DescriptorError`] on the first failed write.
pub async fn write_descriptors(
    index: &PackageIndex,
    settings: &PipelineSettings,
) -> Result<(), DescriptorError> {
    for record in index.iter() {
        write_package_files(record, settings).await?;
    }
    Ok(())
}

/// Persists the files of a single record.
///
/// # Errors
///
/// Returns [`DescriptorError`] on the first failed write.
pub async fn write_package_files(
    record: &PackageRecord,
    settings: &PipelineSettings,
) -> Result<(), DescriptorError> {
    let descriptor_path = record.working_dir.join(&settings.layout.descriptor_file);
    let descriptor = BuildDescriptor::for_record(record, &settings.build_tool.task);
    let descriptor_bytes = render_pretty(&descriptor, &descriptor_path)?;
    write_file(&descriptor_path, &descriptor_bytes).await?;

    let lockfile_path = record.working_dir.join(&settings.layout.lockfile_name);
    write_file(&lockfile_path, b"").await?;

    let manifest_bytes =
        record.manifest.to_pretty_bytes().map_err(|err| DescriptorError::Serialize {
            path: record.manifest_path.clone(),
            message: err.to_string(),
        })?;
    write_file(&record.manifest_path, &manifest_bytes).await?;
    debug!(package = %record.name, dir = %record.working_dir.display(), "wrote package files");
    Ok(())
}

/// Serializes a document as two-space indented JSON with a trailing newline.
fn render_pretty<T: Serialize>(document: &T, path: &Path) -> Result<Vec<u8>, DescriptorError> {
    let mut bytes =
        serde_json::to_vec_pretty(document).map_err(|err| DescriptorError::Serialize {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes bytes to a path.
async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), DescriptorError> {
    fs::write(path, bytes).await.map_err(|err| DescriptorError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
