//! Output tree staging.
//!
//! This module assembles the output directory a host application consumes:
//! the module's own files (minus its builder-private folder), an empty slot
//! for that folder, and one verbatim copy of every resolved dependency.
//! Staging always starts from an empty output root so nothing from an
//! earlier run survives.

use crate::error::{ExportError, Result};
use crate::package_name::PackageName;
use crate::resolver::Resolution;
use crate::workspace::paths_overlap;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace};
use std::fs;
use std::io::ErrorKind;

/// Default name of the module's builder-private directory.
pub const DEFAULT_PRIVATE_DIR: &str = "module_builder";

/// Default name of the dependency container inside the output root.
pub const DEFAULT_DEPENDENCY_DIR: &str = "dependencies";

/// Directory names used inside a staged tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    /// Builder-private directory: never copied, recreated empty.
    pub private_dir: String,
    /// Directory that receives one subdirectory per resolved dependency.
    pub dependency_dir: String,
}

impl Default for StagingLayout {
    fn default() -> Self {
        Self {
            private_dir: DEFAULT_PRIVATE_DIR.to_owned(),
            dependency_dir: DEFAULT_DEPENDENCY_DIR.to_owned(),
        }
    }
}

/// Description of a completed staging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTree {
    /// Root of the staged output.
    pub root: Utf8PathBuf,
    /// Top-level module entries copied into the root, in copy order.
    pub module_entries: Vec<String>,
    /// Dependencies copied into the dependency container, in copy order.
    pub dependencies: Vec<PackageName>,
}

/// Stages a module and its resolved dependencies into an output root.
#[derive(Debug, Clone)]
pub struct Stager {
    output_root: Utf8PathBuf,
    layout: StagingLayout,
}

impl Stager {
    /// Create a stager writing to `output_root`.
    #[must_use]
    pub fn new(output_root: impl Into<Utf8PathBuf>, layout: StagingLayout) -> Self {
        Self {
            output_root: output_root.into(),
            layout,
        }
    }

    /// Root of the staged output.
    #[must_use]
    pub fn output_root(&self) -> &Utf8Path {
        &self.output_root
    }

    /// `<output root>/<dependency dir>`.
    #[must_use]
    pub fn dependency_path(&self) -> Utf8PathBuf {
        self.output_root.join(&self.layout.dependency_dir)
    }

    /// `<output root>/<private dir>`.
    #[must_use]
    pub fn private_path(&self) -> Utf8PathBuf {
        self.output_root.join(&self.layout.private_dir)
    }

    /// Check that the output root does not lie inside either input tree.
    ///
    /// Paths are compared after resolving `..` segments and symlinks, so an
    /// output root spelled through a detour still counts as overlapping.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidLayout`] when the output root is inside
    /// the module root or dependency root, or contains either of them.
    pub fn validate(&self, module_root: &Utf8Path, dependency_root: &Utf8Path) -> Result<()> {
        let inputs = [
            ("module root", module_root),
            ("dependency root", dependency_root),
        ];
        for (label, input) in inputs {
            if paths_overlap(&self.output_root, input) {
                return Err(ExportError::InvalidLayout {
                    reason: format!(
                        "output root {} overlaps the {label} {input}",
                        self.output_root
                    ),
                });
            }
        }
        Ok(())
    }

    /// Stage the module and its dependencies.
    ///
    /// Removes any existing output root, recreates it with the private and
    /// dependency directories, copies every top-level module entry except the
    /// private directory, then copies each resolved dependency verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidLayout`] before touching the filesystem
    /// when the directories overlap or a resolved name does not map to a
    /// directory below the dependency root, and [`ExportError::StagingIo`] for any
    /// filesystem failure. A failed run leaves a partial tree behind that the
    /// next run removes.
    pub fn stage(
        &self,
        module_root: &Utf8Path,
        resolution: &Resolution,
        dependency_root: &Utf8Path,
    ) -> Result<StagedTree> {
        self.validate(module_root, dependency_root)?;
        check_package_names(resolution)?;
        self.clean()?;
        self.create_directories()?;
        let module_entries = self.copy_module(module_root)?;
        let dependencies = self.copy_dependencies(resolution, dependency_root)?;

        debug!(
            "staged {} module entries and {} dependencies into {}",
            module_entries.len(),
            dependencies.len(),
            self.output_root
        );
        Ok(StagedTree {
            root: self.output_root.clone(),
            module_entries,
            dependencies,
        })
    }

    /// Remove the output root if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::StagingIo`] if removal fails for any reason
    /// other than the directory being absent.
    pub fn clean(&self) -> Result<()> {
        remove_tree(&self.output_root)
    }

    fn create_directories(&self) -> Result<()> {
        for dir in [
            self.output_root.clone(),
            self.private_path(),
            self.dependency_path(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| ExportError::staging("create", dir, e))?;
        }
        Ok(())
    }

    fn copy_module(&self, module_root: &Utf8Path) -> Result<Vec<String>> {
        let mut copied = Vec::new();
        for entry in sorted_entries(module_root)? {
            let name = entry.file_name().unwrap_or_default().to_owned();
            if name == self.layout.private_dir && entry.is_dir() {
                trace!("skipping builder-private directory {entry}");
                continue;
            }
            let dest = self.output_root.join(&name);
            trace!("copying '{entry}' to '{dest}'");
            copy_entry(&entry, &dest)?;
            copied.push(name);
        }
        Ok(copied)
    }

    fn copy_dependencies(
        &self,
        resolution: &Resolution,
        dependency_root: &Utf8Path,
    ) -> Result<Vec<PackageName>> {
        let container = self.dependency_path();
        let mut copied = Vec::with_capacity(resolution.len());
        for name in resolution.packages() {
            let source = dependency_root.join(name.as_relative_path());
            let dest = container.join(name.as_relative_path());
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| ExportError::staging("create", parent, e))?;
            }
            trace!("copying '{source}' to '{dest}'");
            // Linked packages are followed at the top level so the bundle
            // carries their contents rather than a dangling link.
            if source.is_dir() {
                copy_dir(&source, &dest)?;
            } else {
                copy_entry(&source, &dest)?;
            }
            copied.push(name.clone());
        }
        Ok(copied)
    }
}

/// Reject names that would escape the dependency root or container.
fn check_package_names(resolution: &Resolution) -> Result<()> {
    for name in resolution.packages() {
        name.validate().map_err(|problem| ExportError::InvalidLayout {
            reason: format!("dependency '{name}' cannot be staged: {problem}"),
        })?;
    }
    Ok(())
}

/// Remove `path` recursively, ignoring a missing directory.
fn remove_tree(path: &Utf8Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("removed existing output at {path}");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ExportError::staging("remove", path, e)),
    }
}

/// List the entries of `dir` sorted by name.
fn sorted_entries(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let read_dir = dir
        .read_dir_utf8()
        .map_err(|e| ExportError::staging("read", dir, e))?;
    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| ExportError::staging("read", dir, e))?;
        entries.push(entry.into_path());
    }
    entries.sort();
    Ok(entries)
}

/// Recreate directory `source` at `dest` and copy its children into it.
fn copy_dir(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| ExportError::staging("create", dest, e))?;
    for child in sorted_entries(source)? {
        let name = child.file_name().unwrap_or_default();
        copy_entry(&child, &dest.join(name))?;
    }
    Ok(())
}

/// Copy `source` to `dest`, recursing into directories and preserving the
/// entry type.
fn copy_entry(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    let metadata =
        fs::symlink_metadata(source).map_err(|e| ExportError::staging("copy", source, e))?;
    let file_type = metadata.file_type();

    if file_type.is_symlink() {
        copy_symlink(source, dest)
    } else if file_type.is_dir() {
        copy_dir(source, dest)
    } else {
        fs::copy(source, dest)
            .map(|_| ())
            .map_err(|e| ExportError::staging("copy", source, e))
    }
}

#[cfg(unix)]
fn copy_symlink(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    let target = fs::read_link(source).map_err(|e| ExportError::staging("copy", source, e))?;
    std::os::unix::fs::symlink(&target, dest).map_err(|e| ExportError::staging("copy", dest, e))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    // Without portable symlink creation, materialize the target instead.
    if source.is_dir() {
        copy_dir(source, dest)
    } else {
        fs::copy(source, dest)
            .map(|_| ())
            .map_err(|e| ExportError::staging("copy", source, e))
    }
}

#[cfg(test)]
#[path = "stager_tests.rs"]
mod tests;
