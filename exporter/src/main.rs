//! Module exporter CLI entrypoint.
//!
//! This binary stages a module and its installed dependency closure into an
//! output folder, archives it, and reports progress on stderr.

use clap::Parser;
use module_exporter::cli::Cli;
use module_exporter::config::ExportConfig;
use module_exporter::error::Result;
use module_exporter::manifest::FsManifestStore;
use module_exporter::output::write_stderr_line;
use module_exporter::pipeline::{PipelineContext, plan_export, run_export};
use module_exporter::workspace::{ExportPaths, absolutize, current_dir_utf8};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let cwd = current_dir_utf8()?;
    let project_root = cli
        .project_dir
        .as_deref()
        .map_or_else(|| cwd.clone(), |dir| absolutize(dir, &cwd));

    // Settings: defaults, then the config file, then flags.
    let (config_path, required) = cli.config_source(&project_root);
    let config_path = absolutize(&config_path, &cwd);
    let config = cli.apply_overrides(ExportConfig::load(&config_path, required)?);

    let paths = ExportPaths::resolve(&project_root, &cli.path_overrides(), &cwd)?;
    let store = FsManifestStore::new(config.descriptor_file.clone());
    let context = PipelineContext {
        paths: &paths,
        config: &config,
        quiet: cli.quiet,
        verbosity: cli.verbosity,
    };

    if cli.dry_run {
        plan_export(&context, &store, stderr)?;
    } else {
        run_export(&context, &store, stderr)?;
    }
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
