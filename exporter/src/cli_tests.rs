//! Tests for exporter CLI parsing and flag layering.

use super::*;
use rstest::rstest;

#[test]
fn cli_parses_defaults() {
    let cli = Cli::parse_from(["module-export"]);
    assert!(cli.project_dir.is_none());
    assert!(cli.module_dir.is_none());
    assert!(cli.output_dir.is_none());
    assert!(cli.dependency_root.is_none());
    assert!(cli.format.is_none());
    assert!(!cli.no_archive);
    assert!(!cli.keep_staged);
    assert!(!cli.strict);
    assert!(!cli.no_bump);
    assert!(!cli.dry_run);
    assert!(!cli.quiet);
    assert_eq!(cli.verbosity, 0);
    assert!(cli.exclude.is_empty());
}

#[rstest]
#[case::zip("zip", ArchiveFormat::Zip)]
#[case::tar("tar", ArchiveFormat::Tar)]
#[case::tar_gz("tar-gz", ArchiveFormat::TarGz)]
#[case::tar_zst("tar-zst", ArchiveFormat::TarZst)]
fn cli_parses_archive_formats(#[case] value: &str, #[case] expected: ArchiveFormat) {
    let cli = Cli::parse_from(["module-export", "--format", value]);
    assert_eq!(cli.format, Some(expected));
}

#[test]
fn cli_rejects_unknown_format() {
    let result = Cli::try_parse_from(["module-export", "--format", "rar"]);
    assert!(result.is_err());
}

#[test]
fn cli_parses_repeated_excludes() {
    let cli = Cli::parse_from(["module-export", "-x", "typescript", "--exclude", "eslint"]);
    assert_eq!(cli.exclude, ["typescript", "eslint"]);
}

#[test]
fn cli_parses_directories() {
    let cli = Cli::parse_from([
        "module-export",
        "--project-dir",
        "/work/app",
        "--output-dir",
        "dist",
        "--dependency-root",
        "/opt/modules",
    ]);
    assert_eq!(cli.project_dir, Some(Utf8PathBuf::from("/work/app")));
    let overrides = cli.path_overrides();
    assert_eq!(overrides.output_dir, Some(Utf8PathBuf::from("dist")));
    assert_eq!(
        overrides.dependency_root,
        Some(Utf8PathBuf::from("/opt/modules"))
    );
    assert!(overrides.module_dir.is_none());
}

#[test]
fn cli_counts_verbosity() {
    let cli = Cli::parse_from(["module-export", "-vv"]);
    assert_eq!(cli.verbosity, 2);
}

#[rstest]
#[case::quiet_and_verbose(&["module-export", "-q", "-v"])]
#[case::no_archive_with_format(&["module-export", "--no-archive", "--format", "tar"])]
#[case::no_archive_with_keep(&["module-export", "--no-archive", "--keep-staged"])]
fn cli_rejects_conflicting_flags(#[case] args: &[&str]) {
    assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn overrides_layer_on_top_of_file_settings() {
    let from_file = ExportConfig {
        format: ArchiveFormat::Tar,
        exclude: vec!["typescript".to_owned()],
        ..ExportConfig::default()
    };
    let cli = Cli::parse_from([
        "module-export",
        "--format",
        "tar-zst",
        "--strict",
        "--no-bump",
        "--keep-staged",
        "-x",
        "eslint",
    ]);

    let config = cli.apply_overrides(from_file);

    assert_eq!(config.format, ArchiveFormat::TarZst);
    assert_eq!(config.missing, MissingDependencyPolicy::Fail);
    assert!(!config.bump_version);
    assert!(config.keep_staged);
    assert_eq!(config.exclude, ["typescript", "eslint"]);
}

#[test]
fn absent_flags_keep_file_settings() {
    let from_file = ExportConfig {
        format: ArchiveFormat::TarGz,
        keep_staged: true,
        missing: MissingDependencyPolicy::Fail,
        ..ExportConfig::default()
    };

    let config = Cli::default().apply_overrides(from_file.clone());

    assert_eq!(config, from_file);
}

#[test]
fn explicit_config_file_is_required() {
    let cli = Cli {
        config: Some(Utf8PathBuf::from("/etc/export.toml")),
        ..Cli::default()
    };
    assert_eq!(
        cli.config_source(Utf8Path::new("/work")),
        (Utf8PathBuf::from("/etc/export.toml"), true)
    );
}

#[test]
fn default_config_file_is_optional() {
    assert_eq!(
        Cli::default().config_source(Utf8Path::new("/work")),
        (Utf8PathBuf::from("/work/module-export.toml"), false)
    );
}
