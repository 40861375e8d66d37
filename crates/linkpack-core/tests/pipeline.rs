// crates/linkpack-core/tests/pipeline.rs
// ============================================================================
// Module: Link Pipeline Tests
// Description: End-to-end tests for load, rewrite, persist, and pack stages.
// Purpose: Validate on-disk manifests, descriptors, and build tool invocations.
// Dependencies: linkpack-core, serde_json, tempfile, tokio
// ============================================================================
//! ## Overview
//! Runs the pipeline against fixture repositories with a recording runner in
//! place of the build tool.

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

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use linkpack_core::BuildDescriptor;
use linkpack_core::CallbackPolicy;
use linkpack_core::LinkRequest;
use linkpack_core::Linker;
use linkpack_core::LoadError;
use linkpack_core::PackError;
use linkpack_core::PipelineError;
use linkpack_core::PolicyError;
use linkpack_core::PolicyTable;
use linkpack_core::RewriteError;
use linkpack_core::TracingTracer;
use linkpack_core::link_packages;
use serde_json::Value;
use serde_json::json;

use crate::common::Fixture;
use crate::common::RecordingRunner;
use crate::common::RecordingTracer;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn artifact(fixture: &Fixture, file: &str) -> String {
    fixture.cache().join(file).to_string_lossy().into_owned()
}

fn core_and_utils(fixture: &Fixture) {
    fixture.write_package(
        "core",
        &json!({
            "name": "core",
            "version": "1.0.0",
            "dependencies": { "utils": "^1.0.0", "left-pad": "1.3.0" }
        }),
    );
    fixture.write_package("utils", &json!({ "name": "utils", "version": "1.0.0" }));
}

// ============================================================================
// SECTION: Substitution Tests
// ============================================================================

#[tokio::test]
async fn links_core_to_local_utils_artifact() {
    let fixture = Fixture::new();
    core_and_utils(&fixture);
    let runner = RecordingRunner::default();

    let artifacts =
        link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    let expected = BTreeMap::from([
        ("core".to_string(), fixture.cache().join("core-packed.tgz")),
        ("utils".to_string(), fixture.cache().join("utils-packed.tgz")),
    ]);
    assert_eq!(artifacts, expected);
    let core = fixture.read_package("core");
    assert_eq!(core["dependencies"]["utils"], json!(artifact(&fixture, "utils-packed.tgz")));
    assert_eq!(core["dependencies"]["left-pad"], json!("1.3.0"));
}

#[tokio::test]
async fn packages_without_cross_dependencies_keep_dependencies() {
    let fixture = Fixture::new();
    fixture.write_package("a", &json!({ "name": "a", "dependencies": { "react": "^18.0.0" } }));
    fixture.write_package("b", &json!({ "name": "b" }));
    let runner = RecordingRunner::default();

    let artifacts =
        link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    assert_eq!(artifacts.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(fixture.read_package("a")["dependencies"], json!({ "react": "^18.0.0" }));
    assert!(fixture.read_package("b").get("dependencies").is_none());
}

#[tokio::test]
async fn non_local_dependency_text_is_untouched() {
    let fixture = Fixture::new();
    fixture.write_package(
        "app",
        &json!({ "name": "app", "dependencies": { "missing-lib": "~2.4.1 || ^3" } }),
    );
    let runner = RecordingRunner::default();

    link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    let text = fixture.read_package_text("app");
    assert!(text.contains("\"missing-lib\": \"~2.4.1 || ^3\""));
}

#[tokio::test]
async fn rerunning_produces_identical_manifests() {
    let fixture = Fixture::new();
    core_and_utils(&fixture);
    let settings = fixture.settings();
    let runner = RecordingRunner::default();

    link_packages(&settings, LinkRequest::new(fixture.repo()), &runner).await.unwrap();
    let first = (fixture.read_package_text("core"), fixture.read_package_text("utils"));
    link_packages(&settings, LinkRequest::new(fixture.repo()), &runner).await.unwrap();
    let second = (fixture.read_package_text("core"), fixture.read_package_text("utils"));

    assert_eq!(first, second);
    assert!(first.0.ends_with("}\n"));
}

// ============================================================================
// SECTION: Empty and Skipped Inputs
// ============================================================================

#[tokio::test]
async fn absent_package_container_returns_empty_map_without_side_effects() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.repo()).unwrap();
    let runner = RecordingRunner::default();

    let artifacts =
        link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    assert!(artifacts.is_empty());
    assert!(runner.commands().is_empty());
    assert!(!fixture.cache().exists());
    assert_eq!(std::fs::read_dir(fixture.repo()).unwrap().count(), 0);
}

#[tokio::test]
async fn directories_without_manifest_and_stray_files_are_skipped() {
    let fixture = Fixture::new();
    core_and_utils(&fixture);
    let packages = fixture.repo().join("packages");
    std::fs::create_dir_all(packages.join("docs")).unwrap();
    std::fs::write(packages.join("README.md"), "notes").unwrap();
    let runner = RecordingRunner::default();

    let artifacts =
        link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    assert_eq!(artifacts.len(), 2);
    assert!(!packages.join("docs").join("turbo.json").exists());
}

// ============================================================================
// SECTION: Persisted Files
// ============================================================================

#[tokio::test]
async fn writes_descriptor_lockfile_and_pack_script() {
    let fixture = Fixture::new();
    core_and_utils(&fixture);
    let origin = fixture.root.path().join("origin");
    let runner = RecordingRunner::default();

    link_packages(
        &fixture.settings(),
        LinkRequest::new(fixture.repo()).origin_dir(&origin),
        &runner,
    )
    .await
    .unwrap();

    let utils_dir = fixture.repo().join("packages").join("utils");
    let descriptor: BuildDescriptor =
        serde_json::from_str(&std::fs::read_to_string(utils_dir.join("turbo.json")).unwrap())
            .unwrap();
    let task = &descriptor.pipeline["test-pack"];
    assert_eq!(task.outputs, vec![artifact(&fixture, "utils-packed.tgz")]);
    assert_eq!(
        task.inputs,
        vec![origin.join("packages").join("utils").to_string_lossy().into_owned()]
    );
    assert_eq!(std::fs::read(utils_dir.join("pnpm-lock.yaml")).unwrap(), Vec::<u8>::new());
    let utils = fixture.read_package("utils");
    assert_eq!(
        utils["scripts"]["test-pack"],
        json!(format!("pnpm pack --out \"{}\"", artifact(&fixture, "utils-packed.tgz")))
    );
}

#[tokio::test]
async fn package_manager_defaults_from_root_manifest() {
    let fixture = Fixture::new();
    fixture.write_root_manifest(&json!({ "name": "monorepo", "packageManager": "pnpm@8.6.0" }));
    fixture.write_package("a", &json!({ "name": "a" }));
    fixture.write_package("b", &json!({ "name": "b", "packageManager": "pnpm@7.0.0" }));
    let runner = RecordingRunner::default();

    link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    assert_eq!(fixture.read_package("a")["packageManager"], json!("pnpm@8.6.0"));
    assert_eq!(fixture.read_package("b")["packageManager"], json!("pnpm@7.0.0"));
}

#[tokio::test]
async fn native_package_ships_binaries_and_primary_links_to_it() {
    let fixture = Fixture::new();
    let swc_dir = fixture.write_package("next-swc", &json!({ "name": "@next/swc" }));
    std::fs::create_dir_all(swc_dir.join("native")).unwrap();
    std::fs::write(swc_dir.join("native").join("next-swc.linux-x64-gnu.node"), b"bin").unwrap();
    fixture.write_package(
        "next",
        &json!({ "name": "next", "dependencies": { "@next/swc": "13.0.0" } }),
    );
    let runner = RecordingRunner::default();

    let artifacts =
        link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    assert_eq!(artifacts["@next/swc"], fixture.cache().join("@next").join("swc-packed.tgz"));
    assert!(fixture.cache().join("@next").is_dir());
    assert_eq!(fixture.read_package("next-swc")["files"], json!(["native"]));
    assert_eq!(
        fixture.read_package("next")["dependencies"]["@next/swc"],
        json!(artifact(&fixture, "@next/swc-packed.tgz"))
    );
}

#[tokio::test]
async fn native_dependency_override_takes_precedence() {
    let fixture = Fixture::new();
    fixture.write_package(
        "next",
        &json!({ "name": "next", "files": ["dist"], "dependencies": { "@next/swc": "13.0.0" } }),
    );
    let overrides =
        BTreeMap::from([("@next/swc".to_string(), "file:/prebuilt/next-swc.tgz".to_string())]);
    let runner = RecordingRunner::default();

    link_packages(
        &fixture.settings(),
        LinkRequest::new(fixture.repo()).native_dependency_override(overrides),
        &runner,
    )
    .await
    .unwrap();

    let next = fixture.read_package("next");
    assert_eq!(next["dependencies"]["@next/swc"], json!("file:/prebuilt/next-swc.tgz"));
    assert_eq!(next["files"], json!(["dist"]));
}

#[tokio::test]
async fn primary_package_without_native_package_ships_own_binaries() {
    let fixture = Fixture::new();
    fixture.write_package("next", &json!({ "name": "next", "files": ["dist"] }));
    let runner = RecordingRunner::default();

    link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    assert_eq!(fixture.read_package("next")["files"], json!(["dist", "native"]));
}

// ============================================================================
// SECTION: Packing
// ============================================================================

#[tokio::test]
async fn packs_every_package_with_shared_cache() {
    let fixture = Fixture::new();
    core_and_utils(&fixture);
    let settings = fixture.settings();
    let runner = RecordingRunner::default();

    link_packages(&settings, LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    let packages = fixture.repo().join("packages");
    assert_eq!(runner.working_dirs(), vec![packages.join("core"), packages.join("utils")]);
    let cache_dir = settings.build_cache_dir().to_string_lossy().into_owned();
    for command in runner.commands() {
        let cwd = command.current_dir.clone().unwrap().to_string_lossy().into_owned();
        assert_eq!(command.program, "pnpm");
        assert_eq!(
            command.args,
            vec!["turbo", "run", "test-pack", "--cache-dir", cache_dir.as_str(), "--cwd", cwd.as_str()]
        );
    }
    assert!(settings.build_cache_dir().is_dir());
}

#[tokio::test]
async fn bounded_concurrency_still_packs_every_package() {
    let fixture = Fixture::new();
    for name in ["a", "b", "c", "d"] {
        fixture.write_package(name, &json!({ "name": name }));
    }
    let mut settings = fixture.settings();
    settings.build_tool.max_concurrency = Some(1);
    let runner = RecordingRunner::default();

    let artifacts =
        link_packages(&settings, LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    assert_eq!(artifacts.len(), 4);
    assert_eq!(runner.commands().len(), 4);
}

#[tokio::test]
async fn pack_failure_fails_the_pipeline() {
    let fixture = Fixture::new();
    core_and_utils(&fixture);
    let runner = RecordingRunner::failing_in(fixture.repo().join("packages").join("utils"));

    let err = link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner)
        .await
        .expect_err("expected pack failure");

    match err {
        PipelineError::Pack(PackError::Process {
            package,
            source,
        }) => {
            assert_eq!(package, "utils");
            assert!(source.to_string().contains("pack failed"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// SECTION: Failures Before Packing
// ============================================================================

#[tokio::test]
async fn malformed_manifest_aborts_before_writes_and_packing() {
    let fixture = Fixture::new();
    core_and_utils(&fixture);
    let broken = fixture.repo().join("packages").join("broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("package.json"), "{ \"name\": ").unwrap();
    let runner = RecordingRunner::default();

    let err = link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner)
        .await
        .expect_err("expected parse failure");

    assert!(matches!(err, PipelineError::Load(LoadError::ManifestParse { .. })));
    assert!(runner.commands().is_empty());
    assert!(!fixture.repo().join("packages").join("core").join("turbo.json").exists());
}

#[tokio::test]
async fn duplicate_package_names_are_rejected() {
    let fixture = Fixture::new();
    fixture.write_package("one", &json!({ "name": "same" }));
    fixture.write_package("two", &json!({ "name": "same" }));
    let runner = RecordingRunner::default();

    let err = link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner)
        .await
        .expect_err("expected duplicate failure");

    match err {
        PipelineError::Load(LoadError::DuplicatePackage {
            name,
            first,
            second,
        }) => {
            assert_eq!(name, "same");
            assert!(first.ends_with("one/package.json"));
            assert!(second.ends_with("two/package.json"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_native_directory_is_reported() {
    let fixture = Fixture::new();
    fixture.write_package("next-swc", &json!({ "name": "@next/swc" }));
    let runner = RecordingRunner::default();

    let err = link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner)
        .await
        .expect_err("expected listing failure");

    assert!(matches!(err, PipelineError::Rewrite(RewriteError::Io { .. })));
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn malformed_root_manifest_is_fatal() {
    let fixture = Fixture::new();
    fixture.write_package("a", &json!({ "name": "a" }));
    std::fs::write(fixture.repo().join("package.json"), "not json").unwrap();
    let runner = RecordingRunner::default();

    let err = link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner)
        .await
        .expect_err("expected root manifest failure");

    assert!(matches!(err, PipelineError::Rewrite(RewriteError::RootManifest(_))));
}

// ============================================================================
// SECTION: Package Names
// ============================================================================

#[tokio::test]
async fn scoped_and_dashed_names_pack_to_distinct_artifacts() {
    let fixture = Fixture::new();
    fixture.write_package("scoped", &json!({ "name": "@a/b" }));
    fixture.write_package("dashed", &json!({ "name": "a-b" }));
    fixture.write_package(
        "app",
        &json!({ "name": "app", "dependencies": { "@a/b": "^1.0.0", "a-b": "^1.0.0" } }),
    );
    let runner = RecordingRunner::default();

    let artifacts =
        link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    assert_ne!(artifacts["@a/b"], artifacts["a-b"]);
    assert_eq!(artifacts["@a/b"], fixture.cache().join("@a").join("b-packed.tgz"));
    assert_eq!(artifacts["a-b"], fixture.cache().join("a-b-packed.tgz"));
    assert!(fixture.cache().join("@a").is_dir());
    let app = fixture.read_package("app");
    assert_eq!(app["dependencies"]["@a/b"], json!(artifact(&fixture, "@a/b-packed.tgz")));
    assert_eq!(app["dependencies"]["a-b"], json!(artifact(&fixture, "a-b-packed.tgz")));
    assert_eq!(runner.commands().len(), 3);
}

#[tokio::test]
async fn names_escaping_the_cache_are_rejected_before_packing() {
    let fixture = Fixture::new();
    fixture.write_package("a", &json!({ "name": "a" }));
    fixture.write_package("evil", &json!({ "name": "@x/../../outside" }));
    let runner = RecordingRunner::default();

    let err = link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner)
        .await
        .expect_err("expected invalid name");

    match err {
        PipelineError::Load(LoadError::InvalidName {
            name,
            path,
        }) => {
            assert_eq!(name, "@x/../../outside");
            assert!(path.ends_with("evil/package.json"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(runner.commands().is_empty());
    assert!(!fixture.repo().join("packages").join("a").join("turbo.json").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn non_utf8_package_folder_is_loaded() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fixture = Fixture::new();
    let folder = OsStr::from_bytes(b"pkg-\xff");
    let dir = fixture.repo().join("packages").join(folder);
    std::fs::create_dir_all(&dir).unwrap();
    common::write_json(&dir.join("package.json"), &json!({ "name": "odd" }));
    let runner = RecordingRunner::default();

    let artifacts =
        link_packages(&fixture.settings(), LinkRequest::new(fixture.repo()), &runner).await.unwrap();

    assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["odd"]);
    assert_eq!(runner.working_dirs(), vec![dir.clone()]);
    assert!(dir.join("turbo.json").is_file());
}

// ============================================================================
// SECTION: Linker and Tracing
// ============================================================================

#[tokio::test]
async fn linker_applies_custom_policies_and_tracer_is_transparent() {
    let fixture = Fixture::new();
    core_and_utils(&fixture);
    let settings = fixture.settings();
    let policies = PolicyTable::builder()
        .package(
            "core",
            CallbackPolicy::new(|record, _, _| {
                record
                    .manifest
                    .set_script("lint", "eslint .")
                    .map_err(|err| PolicyError::manifest(&record.name, err))
            }),
        )
        .build();
    let linker = Linker::new(settings, RecordingRunner::default()).with_policies(policies);

    let traced = linker
        .link(LinkRequest::new(fixture.repo()).tracer(Arc::new(TracingTracer::root("test"))))
        .await
        .unwrap();
    let traced_core = fixture.read_package_text("core");
    let untraced = linker.link(LinkRequest::new(fixture.repo())).await.unwrap();

    assert_eq!(traced, untraced);
    assert_eq!(traced_core, fixture.read_package_text("core"));
    let core: Value = fixture.read_package("core");
    assert_eq!(core["scripts"]["lint"], json!("eslint ."));
    // Custom table replaces the defaults, so no pack script is synthesized.
    assert!(core["scripts"].get("test-pack").is_none());
}

#[tokio::test]
async fn caller_tracer_receives_every_phase_span() {
    let fixture = Fixture::new();
    core_and_utils(&fixture);
    let tracer = RecordingTracer::root();
    let runner = RecordingRunner::default();

    let request = LinkRequest::new(fixture.repo()).tracer(tracer.clone());
    link_packages(&fixture.settings(), request, &runner).await.unwrap();

    assert_eq!(
        tracer.children_of("root"),
        vec!["read-packages-folder", "rewrite-manifests", "write-descriptors", "test-pack-packages"]
    );
    assert_eq!(tracer.children_of("read-packages-folder"), vec!["get-pkgdatas"]);
    let mut pack_spans = tracer.children_of("test-pack-packages");
    pack_spans.sort();
    assert_eq!(pack_spans, vec!["pack core", "pack utils"]);
    assert_eq!(tracer.edges().len(), 7);
}

#[tokio::test]
async fn empty_repository_only_traces_discovery() {
    let fixture = Fixture::new();
    let tracer = RecordingTracer::root();
    let runner = RecordingRunner::default();

    let request = LinkRequest::new(fixture.repo()).tracer(tracer.clone());
    let artifacts = link_packages(&fixture.settings(), request, &runner).await.unwrap();

    assert!(artifacts.is_empty());
    assert_eq!(tracer.children_of("root"), vec!["read-packages-folder"]);
    assert_eq!(tracer.children_of("read-packages-folder"), vec!["get-pkgdatas"]);
}
