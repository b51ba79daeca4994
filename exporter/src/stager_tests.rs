//! Unit tests for output staging.

use super::*;
use crate::manifest::FsManifestStore;
use crate::resolver::DependencyResolver;
use crate::test_utils::{ProjectFixture, snapshot_tree};
use rstest::{fixture, rstest};
use std::collections::BTreeSet;

#[fixture]
fn project() -> ProjectFixture {
    let project = ProjectFixture::new();
    project.add_module();
    project.add_package("left-pad", &[]);
    project.add_package("chalk", &["ansi-styles"]);
    project.add_package("ansi-styles", &[]);
    project
}

fn resolve(project: &ProjectFixture, direct: &[&str]) -> Resolution {
    let store = FsManifestStore::default();
    let direct: Vec<PackageName> = direct.iter().copied().map(PackageName::from).collect();
    DependencyResolver::new(&store, project.dependency_root())
        .resolve(&direct, &BTreeSet::new())
        .expect("resolution succeeds")
}

fn stage(project: &ProjectFixture, resolution: &Resolution) -> Result<StagedTree> {
    Stager::new(project.output_root(), StagingLayout::default()).stage(
        &project.module_root(),
        resolution,
        &project.dependency_root(),
    )
}

#[rstest]
fn stages_module_files_and_dependency_closure(project: ProjectFixture) {
    let resolution = resolve(&project, &["chalk", "left-pad"]);

    let staged = stage(&project, &resolution).expect("staging succeeds");

    let out = project.output_root();
    assert!(out.join("main.js").is_file());
    assert!(out.join("moduleinfo.json").is_file());
    assert!(out.join("assets/face.svg").is_file());
    for dep in ["chalk", "ansi-styles", "left-pad"] {
        assert!(
            out.join("dependencies").join(dep).join("package.json").is_file(),
            "missing staged dependency {dep}"
        );
    }
    assert_eq!(
        staged.dependencies,
        vec![
            PackageName::from("ansi-styles"),
            PackageName::from("chalk"),
            PackageName::from("left-pad"),
        ]
    );
}

#[rstest]
fn private_directory_is_recreated_empty(project: ProjectFixture) {
    let resolution = resolve(&project, &[]);

    let staged = stage(&project, &resolution).expect("staging succeeds");

    let private = project.output_root().join(DEFAULT_PRIVATE_DIR);
    assert!(private.is_dir());
    let contents: Vec<_> = private.read_dir_utf8().expect("read private dir").collect();
    assert!(contents.is_empty(), "builder-private files leaked: {contents:?}");
    assert!(!staged.module_entries.contains(&DEFAULT_PRIVATE_DIR.to_owned()));
}

#[rstest]
fn only_resolved_dependencies_are_copied(project: ProjectFixture) {
    let resolution = resolve(&project, &["left-pad"]);

    stage(&project, &resolution).expect("staging succeeds");

    let deps = project.output_root().join("dependencies");
    let staged: Vec<String> = deps
        .read_dir_utf8()
        .expect("read dependency dir")
        .map(|entry| entry.expect("entry").file_name().to_owned())
        .collect();
    assert_eq!(staged, ["left-pad"]);
}

#[rstest]
fn staging_twice_produces_identical_trees(project: ProjectFixture) {
    let resolution = resolve(&project, &["chalk", "left-pad"]);

    stage(&project, &resolution).expect("first staging succeeds");
    let first = snapshot_tree(&project.output_root());
    stage(&project, &resolution).expect("second staging succeeds");
    let second = snapshot_tree(&project.output_root());

    assert_eq!(first, second);
}

#[rstest]
fn stale_files_from_previous_runs_are_removed(project: ProjectFixture) {
    project.write_file("output/Clock/stale.txt", "left over");
    project.write_file("output/Clock/dependencies/old-dep/index.js", "old");
    let resolution = resolve(&project, &["left-pad"]);

    stage(&project, &resolution).expect("staging succeeds");

    assert!(!project.output_root().join("stale.txt").exists());
    assert!(!project.output_root().join("dependencies/old-dep").exists());
}

#[rstest]
fn scoped_dependencies_stage_into_nested_directories(project: ProjectFixture) {
    project.add_package("@scope/widget", &[]);
    let resolution = resolve(&project, &["@scope/widget"]);

    stage(&project, &resolution).expect("staging succeeds");

    assert!(
        project
            .output_root()
            .join("dependencies/@scope/widget/index.js")
            .is_file()
    );
}

#[rstest]
fn custom_layout_names_are_honoured(project: ProjectFixture) {
    project.write_file("src/Clock/tooling/secret.txt", "private");
    let layout = StagingLayout {
        private_dir: "tooling".to_owned(),
        dependency_dir: "node_modules".to_owned(),
    };
    let resolution = resolve(&project, &["left-pad"]);

    Stager::new(project.output_root(), layout)
        .stage(&project.module_root(), &resolution, &project.dependency_root())
        .expect("staging succeeds");

    let out = project.output_root();
    assert!(out.join("node_modules/left-pad/index.js").is_file());
    assert!(!out.join("tooling/secret.txt").exists());
    // With a different private name the default folder is ordinary content.
    assert!(out.join("module_builder/build.js").is_file());
}

#[rstest]
fn output_inside_module_root_is_rejected(project: ProjectFixture) {
    let resolution = resolve(&project, &[]);
    let nested_output = project.module_root().join("output");

    let err = Stager::new(nested_output, StagingLayout::default())
        .stage(&project.module_root(), &resolution, &project.dependency_root())
        .expect_err("overlapping layout is rejected");

    assert!(matches!(err, ExportError::InvalidLayout { .. }), "got {err:?}");
}

#[rstest]
fn output_containing_an_input_is_rejected_without_deleting(project: ProjectFixture) {
    let resolution = resolve(&project, &[]);

    let err = Stager::new(project.root().join("src"), StagingLayout::default())
        .stage(&project.module_root(), &resolution, &project.dependency_root())
        .expect_err("overlapping layout is rejected");

    assert!(matches!(err, ExportError::InvalidLayout { .. }), "got {err:?}");
    assert!(project.module_root().join("main.js").is_file());
}

#[rstest]
fn output_reaching_module_through_parent_segments_is_rejected(project: ProjectFixture) {
    let resolution = resolve(&project, &["left-pad"]);
    let before = snapshot_tree(&project.module_root());
    let detour = project.root().join("x/../src/Clock");

    let err = Stager::new(detour, StagingLayout::default())
        .stage(&project.module_root(), &resolution, &project.dependency_root())
        .expect_err("overlapping layout is rejected");

    assert!(matches!(err, ExportError::InvalidLayout { .. }), "got {err:?}");
    assert_eq!(snapshot_tree(&project.module_root()), before);
}

#[rstest]
fn absolute_dependency_name_is_rejected_before_copying(project: ProjectFixture) {
    project.write_file("victim/package.json", "{}");
    project.write_file("victim/data.txt", "precious");
    let victim = project.root().join("victim");
    let resolution = resolve(&project, &[victim.as_str()]);

    let err = stage(&project, &resolution).expect_err("absolute name is rejected");

    assert!(matches!(err, ExportError::InvalidLayout { .. }), "got {err:?}");
    let data = fs::read_to_string(victim.join("data.txt")).expect("victim still readable");
    assert_eq!(data, "precious");
}

#[rstest]
fn dependency_vanishing_after_resolution_is_fatal(project: ProjectFixture) {
    let resolution = resolve(&project, &["left-pad"]);
    fs::remove_dir_all(project.dependency_root().join("left-pad")).expect("remove dependency");

    let err = stage(&project, &resolution).expect_err("copy of missing source fails");

    assert!(
        matches!(err, ExportError::StagingIo { operation: "copy", .. }),
        "got {err:?}"
    );
}

#[rstest]
fn missing_module_root_is_a_staging_error(project: ProjectFixture) {
    let resolution = resolve(&project, &[]);

    let err = Stager::new(project.output_root(), StagingLayout::default())
        .stage(
            &project.root().join("src/Missing"),
            &resolution,
            &project.dependency_root(),
        )
        .expect_err("module root is absent");

    assert!(matches!(err, ExportError::StagingIo { .. }), "got {err:?}");
}

#[cfg(unix)]
#[rstest]
fn symlinks_inside_packages_are_preserved(project: ProjectFixture) {
    let bin = project.dependency_root().join("left-pad/bin");
    fs::create_dir_all(&bin).expect("mkdir bin");
    std::os::unix::fs::symlink("../index.js", bin.join("left-pad")).expect("symlink");
    let resolution = resolve(&project, &["left-pad"]);

    stage(&project, &resolution).expect("staging succeeds");

    let staged_link = project.output_root().join("dependencies/left-pad/bin/left-pad");
    let target = fs::read_link(&staged_link).expect("staged entry is a symlink");
    assert_eq!(target, std::path::Path::new("../index.js"));
}

#[rstest]
fn clean_tolerates_missing_output(project: ProjectFixture) {
    let stager = Stager::new(project.output_root(), StagingLayout::default());
    stager.clean().expect("removing an absent tree succeeds");
}

#[cfg(unix)]
#[rstest]
fn unwritable_output_parent_is_a_staging_error(project: ProjectFixture) {
    use std::os::unix::fs::PermissionsExt;

    // Root bypasses directory permissions.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }
    let parent = project.root().join("locked");
    fs::create_dir_all(&parent).expect("mkdir locked");
    fs::set_permissions(&parent, fs::Permissions::from_mode(0o555)).expect("chmod locked");
    let resolution = resolve(&project, &[]);

    let result = Stager::new(parent.join("Clock"), StagingLayout::default()).stage(
        &project.module_root(),
        &resolution,
        &project.dependency_root(),
    );

    fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).expect("restore permissions");
    assert!(
        matches!(result, Err(ExportError::StagingIo { operation: "create", .. })),
        "got {result:?}"
    );
}
