// crates/linkpack-config/src/lib.rs
// ============================================================================
// Module: Linkpack Config Library
// Description: Configuration model and validation for the linkpack pipeline.
// Purpose: Single source of truth for linkpack.toml semantics.
// Dependencies: linkpack-core, serde, toml
// ============================================================================

//! ## Overview
//! `linkpack-config` defines the `linkpack.toml` model. It loads with strict,
//! fail-closed limits and converts into [`linkpack_core::PipelineSettings`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
