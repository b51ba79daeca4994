//! Behaviour-driven tests for exporting a module.
//!
//! These scenarios lay out a throwaway project, run the export pipeline
//! against it, and inspect the staged tree, the archive, and the progress
//! output. Tests use the rstest-bdd v0.5.0 mutable world pattern.

use module_exporter::config::ExportConfig;
use module_exporter::error::ExportError;
use module_exporter::manifest::FsManifestStore;
use module_exporter::pipeline::{ExportOutcome, PipelineContext, run_export};
use module_exporter::resolver::MissingDependencyPolicy;
use module_exporter::test_utils::{FIXTURE_MODULE, ProjectFixture};
use module_exporter::workspace::{ExportPaths, PathOverrides};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::collections::BTreeMap;
use std::fs::File;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ExportWorld {
    project: ProjectFixture,
    declared: Vec<String>,
    packages: BTreeMap<String, Vec<String>>,
    config: ExportConfig,
    result: Option<Result<ExportOutcome, ExportError>>,
    stderr: String,
}

#[fixture]
fn world() -> ExportWorld {
    ExportWorld {
        config: ExportConfig {
            keep_staged: true,
            ..ExportConfig::default()
        },
        ..ExportWorld::default()
    }
}

fn outcome(world: &ExportWorld) -> &ExportOutcome {
    match world.result.as_ref().expect("export has run") {
        Ok(outcome) => outcome,
        Err(err) => panic!("expected export to succeed, got {err}"),
    }
}

fn write_package(world: &ExportWorld, name: &str) {
    let deps: Vec<&str> = world.packages[name].iter().map(String::as_str).collect();
    world.project.add_package(name, &deps);
}

fn archive_names(world: &ExportWorld) -> Vec<String> {
    let summary = outcome(world).archive.as_ref().expect("archive written");
    let file = File::open(&summary.path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("read zip");
    (0..archive.len())
        .map(|i| archive.by_index(i).expect("zip entry").name().to_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[given("a project with a module folder")]
fn given_module(world: &mut ExportWorld) {
    world.project.add_module();
    world.project.declare_dependencies(&[]);
}

#[given("the project declares \"{name}\"")]
fn given_declared(world: &mut ExportWorld, name: String) {
    world.declared.push(name);
    let declared: Vec<&str> = world.declared.iter().map(String::as_str).collect();
    world.project.declare_dependencies(&declared);
}

#[given("package \"{name}\" is installed")]
fn given_installed(world: &mut ExportWorld, name: String) {
    world.packages.entry(name.clone()).or_default();
    write_package(world, &name);
}

#[given("package \"{name}\" depends on \"{dependency}\"")]
fn given_edge(world: &mut ExportWorld, name: String, dependency: String) {
    world
        .packages
        .entry(name.clone())
        .or_default()
        .push(dependency);
    write_package(world, &name);
}

#[given("missing dependencies are fatal")]
fn given_strict(world: &mut ExportWorld) {
    world.config.missing = MissingDependencyPolicy::Fail;
}

#[when("the module is exported")]
fn when_exported(world: &mut ExportWorld) {
    let root = world.project.root();
    let paths =
        ExportPaths::resolve(root, &PathOverrides::default(), root).expect("paths resolve");
    let context = PipelineContext {
        paths: &paths,
        config: &world.config,
        quiet: true,
        verbosity: 0,
    };
    let mut stderr = Vec::new();
    let result = run_export(&context, &FsManifestStore::default(), &mut stderr);
    world.stderr = String::from_utf8(stderr).expect("stderr was not UTF-8");
    world.result = Some(result);
}

#[then("the export succeeds")]
fn then_succeeds(world: &mut ExportWorld) {
    let _ = outcome(world);
}

#[then("the staged dependencies are \"{expected}\"")]
fn then_staged_dependencies(world: &mut ExportWorld, expected: String) {
    let staged: Vec<String> = outcome(world)
        .staged
        .dependencies
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(staged.join(", "), expected);

    let container = world.project.output_root().join("dependencies");
    for name in &staged {
        assert!(
            container.join(name).join("package.json").is_file(),
            "{name} missing from {container}"
        );
    }
}

#[then("a warning names \"{name}\"")]
fn then_warning_names(world: &mut ExportWorld, name: String) {
    assert!(
        world.stderr.lines().any(|line| line.contains(&name)),
        "no warning for {name} in: {}",
        world.stderr
    );
}

#[then("the export fails because \"{name}\" is missing")]
fn then_fails_missing(world: &mut ExportWorld, name: String) {
    let result = world.result.as_ref().expect("export has run");
    assert!(
        matches!(result, Err(ExportError::DependencyMissing { name: missing }) if missing.as_str() == name),
        "expected DependencyMissing({name}), got {result:?}"
    );
}

#[then("nothing was staged")]
fn then_nothing_staged(world: &mut ExportWorld) {
    assert!(!world.project.output_root().exists());
}

#[then("the staged private folder is empty")]
fn then_private_empty(world: &mut ExportWorld) {
    let private = world.project.output_root().join("module_builder");
    assert!(private.is_dir());
    let count = private.read_dir_utf8().expect("read private dir").count();
    assert_eq!(count, 0);
}

#[then("the archive contains \"{entry}\"")]
fn then_archive_contains(world: &mut ExportWorld, entry: String) {
    let names = archive_names(world);
    assert!(names.contains(&entry), "{entry} not in {names:?}");
}

#[then("no archive entry starts with the module folder name")]
fn then_no_root_prefix(world: &mut ExportWorld) {
    let prefix = format!("{FIXTURE_MODULE}/");
    let names = archive_names(world);
    assert!(!names.is_empty());
    assert!(
        names.iter().all(|name| !name.starts_with(&prefix)),
        "root-prefixed entries in {names:?}"
    );
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/export.feature", name = "Single leaf dependency")]
fn scenario_single_leaf(world: ExportWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/export.feature",
    name = "Missing transitive dependency is skipped with a warning"
)]
fn scenario_missing_transitive(world: ExportWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/export.feature",
    name = "Exporter and self-cycle are handled"
)]
fn scenario_exporter_and_self_cycle(world: ExportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/export.feature", name = "Two-package cycle terminates")]
fn scenario_two_package_cycle(world: ExportWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/export.feature",
    name = "Diamond dependency is staged once"
)]
fn scenario_diamond(world: ExportWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/export.feature",
    name = "Strict mode rejects missing dependencies"
)]
fn scenario_strict(world: ExportWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/export.feature",
    name = "Builder-private folder ships empty"
)]
fn scenario_private_folder(world: ExportWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/export.feature",
    name = "Archive entries are relative to the module folder"
)]
fn scenario_relative_entries(world: ExportWorld) {
    let _ = world;
}
