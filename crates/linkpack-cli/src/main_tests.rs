// crates/linkpack-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and setting overrides.
// Purpose: Ensure command-line inputs map onto pipeline settings.
// Dependencies: linkpack-cli main helpers
// ============================================================================

//! ## Overview
//! Validates override parsing, request construction, and artifact rendering.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use clap::Parser;
use linkpack_core::ArtifactMap;
use linkpack_core::PipelineSettings;

use super::Cli;
use super::Commands;
use super::LinkCommand;
use super::apply_overrides;
use super::build_request;
use super::parse_override;
use super::render_artifacts;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn parse_link(args: &[&str]) -> LinkCommand {
    let cli = Cli::try_parse_from(args).expect("parse cli");
    match cli.command {
        Commands::Link(command) => command,
        Commands::Config {
            ..
        } => panic!("expected link command"),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn parse_override_splits_on_first_equals() {
    assert_eq!(
        parse_override("@next/swc-linux-x64-gnu=file:/tmp/a=b.tgz").unwrap(),
        ("@next/swc-linux-x64-gnu".to_string(), "file:/tmp/a=b.tgz".to_string())
    );
}

#[test]
fn parse_override_rejects_missing_parts() {
    assert!(parse_override("no-separator").is_err());
    assert!(parse_override("=value").is_err());
    assert!(parse_override("name=").is_err());
}

#[test]
fn link_arguments_build_request() {
    let command = parse_link(&[
        "linkpack",
        "link",
        "--repo",
        "/work/repo",
        "--origin",
        "/work/origin",
        "--native-override",
        "a=file:/a.tgz",
        "--native-override",
        "b=file:/b.tgz",
    ]);
    let request = build_request(&command);

    assert_eq!(request.repo_dir, PathBuf::from("/work/repo"));
    assert_eq!(request.origin_dir, Some(PathBuf::from("/work/origin")));
    let overrides = request.native_dependency_override.unwrap();
    assert_eq!(overrides.len(), 2);
    assert_eq!(overrides.get("b").map(String::as_str), Some("file:/b.tgz"));
    assert!(request.tracer.is_some());
}

#[test]
fn request_without_overrides_leaves_them_unset() {
    let command = parse_link(&["linkpack", "link", "--repo", "/work/repo"]);
    let request = build_request(&command);
    assert!(request.origin_dir.is_none());
    assert!(request.native_dependency_override.is_none());
}

#[test]
fn overrides_replace_cache_root_and_concurrency() {
    let command = parse_link(&[
        "linkpack",
        "link",
        "--repo",
        "/work/repo",
        "--cache-root",
        "/var/cache/lp",
        "--max-concurrency",
        "3",
    ]);
    let settings = apply_overrides(PipelineSettings::default(), &command);
    assert_eq!(settings.cache.root, PathBuf::from("/var/cache/lp"));
    assert_eq!(settings.build_tool.max_concurrency, Some(3));
}

#[test]
fn zero_concurrency_is_rejected_by_parser() {
    let result = Cli::try_parse_from([
        "linkpack",
        "link",
        "--repo",
        "/work/repo",
        "--max-concurrency",
        "0",
    ]);
    assert!(result.is_err());
}

#[test]
fn artifacts_render_as_json_object() {
    let mut artifacts = ArtifactMap::new();
    artifacts.insert("next".to_string(), PathBuf::from("/cache/next-packed.tgz"));
    let rendered = render_artifacts(&artifacts).unwrap();
    let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(value["next"], "/cache/next-packed.tgz");
}
