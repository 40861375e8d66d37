// crates/linkpack-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for linkpack-core integration tests.
// Purpose: Build fixture repositories and record build tool invocations.
// Dependencies: linkpack-core, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Provides fixture repository builders and a recording [`CommandRunner`]
//! that stands in for the external build tool.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    dead_code,
    reason = "Test-only helpers; not every test binary uses every helper."
)]

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use linkpack_core::CacheSettings;
use linkpack_core::CommandOutput;
use linkpack_core::CommandRunner;
use linkpack_core::CommandSpec;
use linkpack_core::PipelineSettings;
use linkpack_core::ProcessError;
use linkpack_core::Tracer;
use serde_json::Value;
use tempfile::TempDir;
use tracing::Span;

// ============================================================================
// SECTION: Fixture Repositories
// ============================================================================

/// Temporary repository with a separate cache root.
pub struct Fixture {
    /// Holds the repository and cache directories alive.
    pub root: TempDir,
}

impl Fixture {
    /// Creates an empty fixture.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// Repository directory.
    pub fn repo(&self) -> PathBuf {
        self.root.path().join("repo")
    }

    /// Artifact cache root.
    pub fn cache(&self) -> PathBuf {
        self.root.path().join("cache")
    }

    /// Settings pointing the cache root into the fixture.
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            cache: CacheSettings::rooted_at(self.cache()),
            ..PipelineSettings::default()
        }
    }

    /// Writes the repository root manifest.
    pub fn write_root_manifest(&self, manifest: &Value) {
        std::fs::create_dir_all(self.repo()).expect("create repo dir");
        write_json(&self.repo().join("package.json"), manifest);
    }

    /// Writes a package manifest under `packages/<folder>`.
    pub fn write_package(&self, folder: &str, manifest: &Value) -> PathBuf {
        let dir = self.repo().join("packages").join(folder);
        std::fs::create_dir_all(&dir).expect("create package dir");
        write_json(&dir.join("package.json"), manifest);
        dir
    }

    /// Reads a package manifest back as raw text.
    pub fn read_package_text(&self, folder: &str) -> String {
        std::fs::read_to_string(self.repo().join("packages").join(folder).join("package.json"))
            .expect("read manifest")
    }

    /// Reads a package manifest back as JSON.
    pub fn read_package(&self, folder: &str) -> Value {
        serde_json::from_str(&self.read_package_text(folder)).expect("parse manifest")
    }
}

/// Writes a JSON document with two-space indentation.
pub fn write_json(path: &Path, value: &Value) {
    let text = serde_json::to_string_pretty(value).expect("serialize");
    std::fs::write(path, text).expect("write json");
}

// ============================================================================
// SECTION: Recording Runner
// ============================================================================

/// Command runner that records invocations instead of running them.
#[derive(Default)]
pub struct RecordingRunner {
    /// Commands received, in arrival order.
    commands: Mutex<Vec<CommandSpec>>,
    /// Working directory whose invocation fails.
    fail_in: Option<PathBuf>,
}

impl RecordingRunner {
    /// Creates a runner that fails invocations inside `dir`.
    pub fn failing_in(dir: impl Into<PathBuf>) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail_in: Some(dir.into()),
        }
    }

    /// Returns the recorded commands.
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().expect("commands lock").clone()
    }

    /// Returns the recorded working directories, sorted.
    pub fn working_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> =
            self.commands().into_iter().filter_map(|command| command.current_dir).collect();
        dirs.sort();
        dirs
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.commands.lock().expect("commands lock").push(command.clone());
        if self.fail_in.is_some() && command.current_dir == self.fail_in {
            return Err(ProcessError::Failed {
                command: command.to_string(),
                code: Some(1),
                stdout: String::new(),
                stderr: "pack failed".to_string(),
            });
        }
        Ok(CommandOutput::default())
    }
}

// ============================================================================
// SECTION: Recording Tracer
// ============================================================================

/// One child span request: the parent span name and the child span name.
pub type SpanEdge = (String, String);

/// Tracer that records every child span it hands out.
pub struct RecordingTracer {
    /// Name of the span this tracer stands for.
    name: String,
    /// Edges shared by the whole tracer tree, in creation order.
    edges: Arc<Mutex<Vec<SpanEdge>>>,
}

impl RecordingTracer {
    /// Creates a root tracer named `root`.
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            name: "root".to_string(),
            edges: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Returns the recorded edges in creation order.
    pub fn edges(&self) -> Vec<SpanEdge> {
        self.edges.lock().expect("edges lock").clone()
    }

    /// Returns the child names created under `parent`, in creation order.
    pub fn children_of(&self, parent: &str) -> Vec<String> {
        self.edges()
            .into_iter()
            .filter(|(edge_parent, _)| edge_parent == parent)
            .map(|(_, child)| child)
            .collect()
    }
}

impl Tracer for RecordingTracer {
    fn trace_child(&self, name: &str) -> Arc<dyn Tracer> {
        self.edges.lock().expect("edges lock").push((self.name.clone(), name.to_string()));
        Arc::new(Self {
            name: name.to_string(),
            edges: Arc::clone(&self.edges),
        })
    }

    fn span(&self) -> Span {
        Span::none()
    }
}
