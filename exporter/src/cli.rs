//! CLI argument definitions for the module exporter.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint so the flag-to-setting mapping can be tested
//! without spawning the binary.

use crate::archive::ArchiveFormat;
use crate::config::{CONFIG_FILE, ExportConfig};
use crate::resolver::MissingDependencyPolicy;
use crate::workspace::PathOverrides;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;

/// Export a module together with the packages it depends on.
#[derive(Parser, Debug, Clone)]
#[command(name = "module-export")]
#[command(version, about)]
#[command(long_about = concat!(
    "Export a module together with the packages it depends on.\n\n",
    "The exporter finds the module folder under src/ (the one holding ",
    "moduleinfo.json), walks the dependencies declared in package.json through ",
    "node_modules, and stages the module plus exactly that closure into ",
    "output/<module>. The staged tree is then archived and removed.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Export the module in the current project as a zip:\n",
    "    $ module-export\n\n",
    "  Produce a gzipped tarball and keep the staged folder:\n",
    "    $ module-export --format tar-gz --keep-staged\n\n",
    "  Fail if any declared dependency is not installed:\n",
    "    $ module-export --strict\n\n",
    "  Show what would be exported:\n",
    "    $ module-export --dry-run",
))]
pub struct Cli {
    /// Project root holding package.json [default: current directory].
    #[arg(short, long, value_name = "DIR")]
    pub project_dir: Option<Utf8PathBuf>,

    /// Module folder to export instead of scanning src/.
    #[arg(short, long, value_name = "DIR")]
    pub module_dir: Option<Utf8PathBuf>,

    /// Parent directory for the staged tree [default: <project>/output].
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Directory holding installed packages [default: <project>/node_modules].
    #[arg(long, value_name = "DIR")]
    pub dependency_root: Option<Utf8PathBuf>,

    /// Archive format.
    #[arg(short, long, value_enum, value_name = "FORMAT")]
    pub format: Option<ArchiveFormat>,

    /// Stage only; do not create an archive.
    #[arg(long, conflicts_with_all = ["format", "keep_staged", "include_empty_dirs"])]
    pub no_archive: bool,

    /// Keep the staged tree after archiving.
    #[arg(long)]
    pub keep_staged: bool,

    /// Record empty directories in the archive.
    #[arg(long)]
    pub include_empty_dirs: bool,

    /// Treat a declared but uninstalled dependency as an error.
    #[arg(long)]
    pub strict: bool,

    /// Leave a package out of the export (can be repeated).
    #[arg(short = 'x', long, value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Do not increment the module's build version.
    #[arg(long)]
    pub no_bump: bool,

    /// Read settings from FILE instead of <project>/module-export.toml.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Show the export plan and exit without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase progress detail (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (warnings and errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Default for Cli {
    /// Creates a `Cli` with no flags set, as if run without arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use module_exporter::cli::Cli;
    ///
    /// let cli = Cli::default();
    /// assert!(cli.format.is_none());
    /// assert!(cli.exclude.is_empty());
    /// ```
    fn default() -> Self {
        Self {
            project_dir: None,
            module_dir: None,
            output_dir: None,
            dependency_root: None,
            format: None,
            no_archive: false,
            keep_staged: false,
            include_empty_dirs: false,
            strict: false,
            exclude: Vec::new(),
            no_bump: false,
            config: None,
            dry_run: false,
            verbosity: 0,
            quiet: false,
        }
    }
}

impl Cli {
    /// Configuration file to read, and whether it must exist.
    ///
    /// An explicit `--config` must exist; the default file is optional.
    #[must_use]
    pub fn config_source(&self, project_root: &Utf8Path) -> (Utf8PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (project_root.join(CONFIG_FILE), false),
        }
    }

    /// Path overrides requested on the command line.
    #[must_use]
    pub fn path_overrides(&self) -> PathOverrides {
        PathOverrides {
            module_dir: self.module_dir.clone(),
            output_dir: self.output_dir.clone(),
            dependency_root: self.dependency_root.clone(),
        }
    }

    /// Layer command-line flags over `config`.
    ///
    /// Flags only ever switch behaviour on; leaving a flag out keeps the
    /// configured value. Exclusions are added to the configured list.
    ///
    /// # Examples
    ///
    /// ```
    /// use module_exporter::cli::Cli;
    /// use module_exporter::config::ExportConfig;
    ///
    /// let cli = Cli {
    ///     no_archive: true,
    ///     ..Cli::default()
    /// };
    /// let config = cli.apply_overrides(ExportConfig::default());
    /// assert!(!config.archive);
    /// assert!(config.bump_version);
    /// ```
    #[must_use]
    pub fn apply_overrides(&self, mut config: ExportConfig) -> ExportConfig {
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.no_archive {
            config.archive = false;
        }
        config.keep_staged |= self.keep_staged;
        config.include_empty_dirs |= self.include_empty_dirs;
        if self.strict {
            config.missing = MissingDependencyPolicy::Fail;
        }
        if self.no_bump {
            config.bump_version = false;
        }
        config.exclude.extend(self.exclude.iter().cloned());
        config
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
