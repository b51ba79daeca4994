//! Export pipeline orchestration.
//!
//! This module runs the stages of an export in order: resolve the dependency
//! closure, bump the module's build counter, stage the output tree, archive
//! it, and finally drop the staged tree. Every input that can fail without
//! side effects is checked before the first write.

use crate::archive::{ArchiveSummary, Archiver};
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::manifest::ManifestStore;
use crate::module_info::{ModuleInfo, bump_build_version};
use crate::output::{
    DryRunInfo, archive_message, missing_dependency_warning, success_message, write_stderr_line,
};
use crate::resolver::{DependencyResolver, Resolution};
use crate::stager::{StagedTree, Stager};
use crate::workspace::ExportPaths;
use log::debug;
use std::io::Write;

/// Context for an export run.
pub struct PipelineContext<'a> {
    /// Resolved locations.
    pub paths: &'a ExportPaths,
    /// Effective settings.
    pub config: &'a ExportConfig,
    /// Suppress progress output. Missing-dependency warnings are still shown.
    pub quiet: bool,
    /// Detail level of progress output (0 = summary, 1+ = list packages).
    pub verbosity: u8,
}

/// Result of a completed export.
#[derive(Debug)]
pub struct ExportOutcome {
    /// The dependency closure that was staged.
    pub resolution: Resolution,
    /// The staged tree, which may have been removed afterwards.
    pub staged: StagedTree,
    /// New build counter, when it was bumped.
    pub build_version: Option<u64>,
    /// Archive details, when archival ran.
    pub archive: Option<ArchiveSummary>,
    /// Whether the staged tree was removed after archival.
    pub staged_removed: bool,
}

/// Run a complete export.
///
/// Writes progress to `stderr` unless quiet.
///
/// # Errors
///
/// Returns the first failure from layout checks, the module info file,
/// resolution, version bumping, staging, or archival. A failed archive leaves
/// the staged tree in place.
pub fn run_export(
    context: &PipelineContext<'_>,
    store: &dyn ManifestStore,
    stderr: &mut dyn Write,
) -> Result<ExportOutcome> {
    let stager = Stager::new(
        context.paths.output_root.clone(),
        context.config.staging_layout(),
    );
    stager.validate(&context.paths.module_root, &context.paths.dependency_root)?;
    load_module_info(context)?;

    let resolution = resolve_dependencies(context, store, stderr)?;
    let build_version = bump_version(context, stderr)?;
    let staged = stage_module(context, &stager, &resolution, stderr)?;

    let Some(archive) = archive_staged(context, &staged, stderr)? else {
        progress(
            context,
            stderr,
            success_message(
                context.paths.module_name(),
                resolution.len(),
                &staged.root,
            ),
        );
        return Ok(ExportOutcome {
            resolution,
            staged,
            build_version,
            archive: None,
            staged_removed: false,
        });
    };

    let staged_removed = !context.config.keep_staged;
    if staged_removed {
        debug!("removing staged tree {}", staged.root);
        stager.clean()?;
    }
    progress(
        context,
        stderr,
        success_message(context.paths.module_name(), resolution.len(), &archive.path),
    );
    Ok(ExportOutcome {
        resolution,
        staged,
        build_version,
        archive: Some(archive),
        staged_removed,
    })
}

/// Resolve the closure and print the plan without writing anything.
///
/// # Errors
///
/// Returns resolution failures, the layout and module info errors that a real
/// run would hit before writing, and [`ExportError::WriteFailed`] when the
/// plan cannot be written.
pub fn plan_export(
    context: &PipelineContext<'_>,
    store: &dyn ManifestStore,
    stderr: &mut dyn Write,
) -> Result<Resolution> {
    Stager::new(
        context.paths.output_root.clone(),
        context.config.staging_layout(),
    )
    .validate(&context.paths.module_root, &context.paths.dependency_root)?;
    load_module_info(context)?;

    let resolver = DependencyResolver::new(store, context.paths.dependency_root.clone())
        .with_policy(context.config.missing);
    let resolution =
        resolver.resolve_project(&context.paths.project_root, &context.config.excluded())?;

    let info = DryRunInfo {
        paths: context.paths,
        config: context.config,
        resolution: &resolution,
    };
    writeln!(stderr, "{}", info.display_text())
        .map_err(|source| ExportError::WriteFailed { source })?;
    Ok(resolution)
}

/// Resolves the module's dependency closure, reporting missing packages.
///
/// # Errors
///
/// Returns manifest errors, or a missing dependency under the strict policy.
pub fn resolve_dependencies(
    context: &PipelineContext<'_>,
    store: &dyn ManifestStore,
    stderr: &mut dyn Write,
) -> Result<Resolution> {
    progress(
        context,
        stderr,
        format!(
            "Resolving dependencies of {} from {}...",
            context.paths.project_root, context.paths.dependency_root
        ),
    );

    let resolver = DependencyResolver::new(store, context.paths.dependency_root.clone())
        .with_policy(context.config.missing);
    let resolution =
        resolver.resolve_project(&context.paths.project_root, &context.config.excluded())?;

    if context.verbosity > 0 {
        for name in resolution.discovery_order() {
            progress(context, stderr, format!("  - {name}"));
        }
    }
    for name in resolution.missing() {
        write_stderr_line(
            stderr,
            missing_dependency_warning(name, &context.paths.dependency_root),
        );
    }
    Ok(resolution)
}

fn load_module_info(context: &PipelineContext<'_>) -> Result<ModuleInfo> {
    let module = ModuleInfo::load(&context.paths.module_root)?;
    debug!(
        "exporting {} at build {} from {}",
        module.module_name, module.build_version, context.paths.module_root
    );
    Ok(module)
}

fn bump_version(context: &PipelineContext<'_>, stderr: &mut dyn Write) -> Result<Option<u64>> {
    if !context.config.bump_version {
        return Ok(None);
    }
    let version = bump_build_version(&context.paths.module_root)?;
    progress(context, stderr, format!("Build version is now {version}"));
    Ok(Some(version))
}

/// Stages the module and its resolved dependencies.
///
/// # Errors
///
/// Returns staging failures.
pub fn stage_module(
    context: &PipelineContext<'_>,
    stager: &Stager,
    resolution: &Resolution,
    stderr: &mut dyn Write,
) -> Result<StagedTree> {
    progress(
        context,
        stderr,
        format!(
            "Staging {} with {} dependencies to {}...",
            context.paths.module_name(),
            resolution.len(),
            stager.output_root()
        ),
    );
    stager.stage(
        &context.paths.module_root,
        resolution,
        &context.paths.dependency_root,
    )
}

/// Archives the staged tree when archival is enabled.
///
/// The archive is written on a worker thread; this function blocks until it
/// has finished.
///
/// # Errors
///
/// Returns [`crate::error::ExportError::ArchiveWrite`] on failure.
pub fn archive_staged(
    context: &PipelineContext<'_>,
    staged: &StagedTree,
    stderr: &mut dyn Write,
) -> Result<Option<ArchiveSummary>> {
    if !context.config.archive {
        return Ok(None);
    }

    let archiver = Archiver::new(context.config.archive_options());
    let archive_path = archiver.archive_path_for(&staged.root);
    progress(context, stderr, format!("Archiving to {archive_path}..."));

    let summary = archiver.spawn(staged.root.clone(), archive_path)?.wait()?;
    progress(context, stderr, archive_message(&summary));
    Ok(Some(summary))
}

fn progress(context: &PipelineContext<'_>, stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if !context.quiet {
        write_stderr_line(stderr, message);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
