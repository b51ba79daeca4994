//! Export settings.
//!
//! `ExportConfig` gathers every knob an export run reads. Values come from
//! three layers: built-in defaults, an optional `module-export.toml` at the
//! project root, and command-line flags. Later layers win.

use crate::archive::{ArchiveFormat, ArchiveOptions};
use crate::error::{ExportError, Result};
use crate::manifest::DEFAULT_DESCRIPTOR_FILE;
use crate::package_name::PackageName;
use crate::resolver::MissingDependencyPolicy;
use crate::stager::{DEFAULT_DEPENDENCY_DIR, DEFAULT_PRIVATE_DIR, StagingLayout};
use camino::Utf8Path;
use log::debug;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;

/// Name of the optional configuration file at the project root.
pub const CONFIG_FILE: &str = "module-export.toml";

/// Settings for one export run.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Whether to compress the staged tree into an archive.
    pub archive: bool,
    /// Archive container format.
    pub format: ArchiveFormat,
    /// Keep the staged directory after a successful archive.
    pub keep_staged: bool,
    /// Emit archive entries for empty directories.
    pub include_empty_dirs: bool,
    /// Extra package names to leave out of the closure, together with
    /// everything reachable only through them.
    pub exclude: Vec<String>,
    /// Handling of declared dependencies absent from the dependency root.
    pub missing: MissingDependencyPolicy,
    /// Descriptor file name read from every package directory.
    pub descriptor_file: String,
    /// Dependency container name inside the staged tree.
    pub dependency_dir: String,
    /// Builder-private directory name inside the module folder.
    pub private_dir: String,
    /// Increment the module's build counter before staging.
    pub bump_version: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            archive: true,
            format: ArchiveFormat::default(),
            keep_staged: false,
            include_empty_dirs: false,
            exclude: Vec::new(),
            missing: MissingDependencyPolicy::default(),
            descriptor_file: DEFAULT_DESCRIPTOR_FILE.to_owned(),
            dependency_dir: DEFAULT_DEPENDENCY_DIR.to_owned(),
            private_dir: DEFAULT_PRIVATE_DIR.to_owned(),
            bump_version: true,
        }
    }
}

impl ExportConfig {
    /// Load settings from `path`.
    ///
    /// A missing file yields the defaults unless `required` is set, which is
    /// the case when the operator named the file explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Config`] when the file cannot be read, is not
    /// valid TOML, or contains unknown keys.
    pub fn load(path: &Utf8Path, required: bool) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound && !required => {
                debug!("no configuration at {path}; using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ExportError::Config {
                    path: path.to_owned(),
                    reason: e.to_string(),
                });
            }
        };

        let config = toml::from_str::<Self>(&contents).map_err(|e| ExportError::Config {
            path: path.to_owned(),
            reason: e.message().to_owned(),
        })?;
        config.validate(path)?;
        debug!("loaded configuration from {path}");
        Ok(config)
    }

    fn validate(&self, path: &Utf8Path) -> Result<()> {
        let names = [
            ("descriptor_file", &self.descriptor_file),
            ("dependency_dir", &self.dependency_dir),
            ("private_dir", &self.private_dir),
        ];
        for (key, value) in names {
            if value.trim().is_empty()
                || value.contains(['/', '\\'])
                || matches!(value.as_str(), "." | "..")
            {
                return Err(ExportError::Config {
                    path: path.to_owned(),
                    reason: format!("{key} must be a plain file or directory name, got '{value}'"),
                });
            }
        }
        if self.dependency_dir == self.private_dir {
            return Err(ExportError::Config {
                path: path.to_owned(),
                reason: format!(
                    "dependency_dir and private_dir must differ, both are '{}'",
                    self.dependency_dir
                ),
            });
        }
        Ok(())
    }

    /// Archive settings derived from this configuration.
    #[must_use]
    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions {
            format: self.format,
            include_empty_dirs: self.include_empty_dirs,
        }
    }

    /// Staged directory names derived from this configuration.
    #[must_use]
    pub fn staging_layout(&self) -> StagingLayout {
        StagingLayout {
            private_dir: self.private_dir.clone(),
            dependency_dir: self.dependency_dir.clone(),
        }
    }

    /// Explicit exclusions as package names.
    #[must_use]
    pub fn excluded(&self) -> BTreeSet<PackageName> {
        self.exclude
            .iter()
            .map(|name| PackageName::from(name.trim()))
            .filter(|name| !name.as_str().is_empty())
            .collect()
    }
}
