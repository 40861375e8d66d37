// crates/linkpack-core/src/lib.rs
// ============================================================================
// Module: Linkpack Core Library
// Description: Local package link-and-pack pipeline.
// Purpose: Rewrite monorepo package manifests to local artifacts and pack them.
// Dependencies: async-trait, futures, serde, serde_json, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! Linkpack prepares a set of interdependent local packages for isolated
//! testing. [`link_packages`] discovers packages, rewrites each manifest so
//! that dependencies on sibling packages point at locally packed artifacts,
//! persists the manifests with their build descriptors, and packs every
//! package concurrently through the external build tool.
//! Invariants:
//! - Stages run strictly in order: load, rewrite, persist, pack.
//! - Every invocation owns its [`PackageIndex`]; nothing is cached globally.
//! - External programs are described by argument lists, never shell strings.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod descriptor;
pub mod loader;
pub mod manifest;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod policy;
pub mod process;
pub mod rewrite;
pub mod settings;
pub mod tracer;
pub mod vcs;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use descriptor::BuildDescriptor;
pub use descriptor::DescriptorError;
pub use descriptor::TaskDescriptor;
pub use loader::LoadError;
pub use loader::load_packages;
pub use manifest::Manifest;
pub use manifest::ManifestError;
pub use model::ArtifactMap;
pub use model::PackageIndex;
pub use model::PackageRecord;
pub use packer::PackError;
pub use packer::pack_packages;
pub use pipeline::LinkRequest;
pub use pipeline::Linker;
pub use pipeline::PipelineError;
pub use pipeline::link_packages;
pub use policy::CallbackPolicy;
pub use policy::PackagePolicy;
pub use policy::PolicyContext;
pub use policy::PolicyEffects;
pub use policy::PolicyError;
pub use policy::PolicyTable;
pub use process::CommandOutput;
pub use process::CommandRunner;
pub use process::CommandSpec;
pub use process::ProcessError;
pub use process::SystemCommandRunner;
pub use rewrite::RewriteError;
pub use settings::BuildToolSettings;
pub use settings::CacheSettings;
pub use settings::LayoutSettings;
pub use settings::PipelineSettings;
pub use settings::PolicySettings;
pub use tracer::NoopTracer;
pub use tracer::Tracer;
pub use tracer::TracingTracer;
pub use vcs::GitClient;
pub use vcs::MergeOutcome;
pub use vcs::VcsError;
