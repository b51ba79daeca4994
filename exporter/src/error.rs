//! Error types for the module exporter.
//!
//! This module defines the semantic error variants surfaced by each stage of
//! an export run. Manifest and layout errors abort before the output tree is
//! touched; staging and archive errors abort after it has been mutated, and
//! the next run's cleanup step discards whatever was left behind.

use crate::archive::ArchiveError;
use crate::package_name::PackageName;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while exporting a module.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A package directory has no descriptor file.
    #[error("manifest not found at {path}")]
    ManifestNotFound {
        /// Path where the descriptor was expected.
        path: Utf8PathBuf,
    },

    /// A descriptor exists but is not well-formed.
    #[error("invalid manifest at {path}: {reason}")]
    ManifestParse {
        /// Path to the malformed descriptor.
        path: Utf8PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// No module folder containing the marker file was found.
    #[error("could not locate '{marker}' under {search_dir}; ensure your module folder contains it")]
    ModuleNotFound {
        /// Directory that was scanned.
        search_dir: Utf8PathBuf,
        /// Marker file name the scan looked for.
        marker: String,
    },

    /// The module info file could not be rewritten after a version bump.
    #[error("failed to update module info at {path}")]
    ModuleInfoWrite {
        /// Path to the module info file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A declared dependency is absent from the dependency root and the run
    /// requires every dependency to be present.
    #[error("dependency {name} was not found in the dependency root")]
    DependencyMissing {
        /// Name of the missing dependency.
        name: PackageName,
    },

    /// A filesystem operation failed while staging the output tree.
    #[error("staging failed to {operation} {path}")]
    StagingIo {
        /// Short verb describing the failed operation (copy, create, remove).
        operation: &'static str,
        /// Path the operation was acting on.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The requested directories overlap in a way that would corrupt inputs.
    #[error("invalid export layout: {reason}")]
    InvalidLayout {
        /// Description of the conflict.
        reason: String,
    },

    /// Writing the archive failed; any file at `path` must be discarded.
    #[error("failed to write archive {path}")]
    ArchiveWrite {
        /// Destination path of the archive.
        path: Utf8PathBuf,
        /// The underlying archive failure.
        #[source]
        source: ArchiveError,
    },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration at {path}: {reason}")]
    Config {
        /// Path to the configuration file.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// An I/O operation failed outside staging and archival.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output that is the product of the command, such as
    /// the dry-run plan.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Build a [`ExportError::StagingIo`] for the given operation and path.
    pub(crate) fn staging(
        operation: &'static str,
        path: impl Into<Utf8PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::StagingIo {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using [`ExportError`].
pub type Result<T> = std::result::Result<T, ExportError>;
