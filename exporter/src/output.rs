//! Output formatting for the exporter CLI.
//!
//! Progress and summaries are written as plain lines to an injected writer,
//! normally stderr, so tests can capture exactly what an operator would see.

use crate::archive::ArchiveSummary;
use crate::config::ExportConfig;
use crate::package_name::PackageName;
use crate::resolver::Resolution;
use crate::workspace::ExportPaths;
use camino::Utf8Path;
use std::fmt;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort progress output; ignore write failures.
    }
}

/// Warning shown for a dependency that is declared but not installed.
#[must_use]
pub fn missing_dependency_warning(name: &PackageName, dependency_root: &Utf8Path) -> String {
    format!("Warning: {name} is not installed in {dependency_root}; it was left out of the export")
}

/// Format the final message of a successful export.
///
/// # Example
///
/// ```
/// use camino::Utf8Path;
/// use module_exporter::output::success_message;
///
/// let msg = success_message("Clock", 1, Utf8Path::new("/out/Clock.zip"));
/// assert_eq!(msg, "Exported Clock with 1 dependency to /out/Clock.zip");
/// ```
#[must_use]
pub fn success_message(module_name: &str, dependency_count: usize, destination: &Utf8Path) -> String {
    let plural = if dependency_count == 1 {
        "dependency"
    } else {
        "dependencies"
    };
    format!("Exported {module_name} with {dependency_count} {plural} to {destination}")
}

/// One-line description of a written archive.
#[must_use]
pub fn archive_message(summary: &ArchiveSummary) -> String {
    format!(
        "Wrote {} ({} entries, sha256 {})",
        summary.path,
        summary.file_entries + summary.dir_entries,
        summary.sha256
    )
}

/// Plan shown by `--dry-run`.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// Resolved locations.
    pub paths: &'a ExportPaths,
    /// Effective settings.
    pub config: &'a ExportConfig,
    /// Dependency closure that would be staged.
    pub resolution: &'a Resolution,
}

impl DryRunInfo<'_> {
    /// Format the plan for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Project root: {}", self.paths.project_root),
            format!("Module folder: {}", self.paths.module_root),
            format!("Dependency root: {}", self.paths.dependency_root),
            format!("Output directory: {}", self.paths.output_root),
        ];
        if self.config.archive {
            lines.push(format!(
                "Archive: {}.{}",
                self.paths.output_root,
                self.config.format.extension()
            ));
            lines.push(format!("Keep staged tree: {}", self.config.keep_staged));
        } else {
            lines.push("Archive: disabled".to_owned());
        }
        lines.push(format!("Bump build version: {}", self.config.bump_version));

        lines.push(String::new());
        lines.push(format!("Dependencies to stage ({}):", self.resolution.len()));
        for name in self.resolution.packages() {
            lines.push(format!("  - {name}"));
        }
        if !self.resolution.missing().is_empty() {
            lines.push(String::new());
            lines.push("Missing dependencies:".to_owned());
            for name in self.resolution.missing() {
                lines.push(format!("  - {name}"));
            }
        }

        lines.join("\n")
    }
}
