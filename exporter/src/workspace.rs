//! Project layout discovery and path resolution.
//!
//! A project keeps its module folder somewhere below `src/`, marked by a
//! `moduleinfo.json` file, and its installed packages in `node_modules/`.
//! This module finds the module folder and derives every path an export run
//! touches.

use crate::error::{ExportError, Result};
use crate::module_info::MODULE_INFO_FILE;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use log::debug;
use std::io::ErrorKind;

/// Directory below the project root scanned for the module folder.
pub const SOURCE_DIR: &str = "src";

/// Default parent of staged trees below the project root.
pub const OUTPUT_DIR: &str = "output";

/// Default dependency root below the project root.
pub const DEPENDENCY_ROOT_DIR: &str = "node_modules";

/// Explicit path choices that replace the derived defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOverrides {
    /// Module folder to export instead of scanning `src/`.
    pub module_dir: Option<Utf8PathBuf>,
    /// Parent directory for the staged tree.
    pub output_dir: Option<Utf8PathBuf>,
    /// Directory holding installed packages.
    pub dependency_root: Option<Utf8PathBuf>,
}

/// Every location an export run reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// Project root holding the top-level descriptor.
    pub project_root: Utf8PathBuf,
    /// Module folder being exported.
    pub module_root: Utf8PathBuf,
    /// Directory holding installed packages.
    pub dependency_root: Utf8PathBuf,
    /// Root of the staged tree.
    pub output_root: Utf8PathBuf,
}

impl ExportPaths {
    /// Derive all paths for `project_root`, honouring `overrides`.
    ///
    /// Relative overrides are taken relative to `base`, normally the current
    /// directory. The output root is `<output dir>/<module folder name>`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::ModuleNotFound`] when no module folder is given
    /// and none is found, and [`ExportError::InvalidLayout`] when the module
    /// path has no final component to name the output after.
    pub fn resolve(
        project_root: &Utf8Path,
        overrides: &PathOverrides,
        base: &Utf8Path,
    ) -> Result<Self> {
        let project_root = absolutize(project_root, base);
        let module_root = match &overrides.module_dir {
            Some(dir) => absolutize(dir, base),
            None => locate_module(&project_root.join(SOURCE_DIR))?,
        };
        let module_name = module_root
            .file_name()
            .ok_or_else(|| ExportError::InvalidLayout {
                reason: format!("module path {module_root} has no folder name"),
            })?
            .to_owned();

        let output_parent = overrides
            .output_dir
            .as_deref()
            .map_or_else(|| project_root.join(OUTPUT_DIR), |dir| absolutize(dir, base));
        let dependency_root = overrides.dependency_root.as_deref().map_or_else(
            || project_root.join(DEPENDENCY_ROOT_DIR),
            |dir| absolutize(dir, base),
        );

        Ok(Self {
            output_root: output_parent.join(module_name),
            project_root,
            module_root,
            dependency_root,
        })
    }

    /// Name of the module folder, which also names the staged tree.
    #[must_use]
    pub fn module_name(&self) -> &str {
        self.output_root.file_name().unwrap_or_default()
    }
}

/// Find the first folder below `source_dir`, in name order, that contains
/// the module info marker.
///
/// # Errors
///
/// Returns [`ExportError::ModuleNotFound`] when `source_dir` is absent or no
/// folder carries the marker, and [`ExportError::Io`] when it cannot be read.
pub fn locate_module(source_dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let not_found = || ExportError::ModuleNotFound {
        search_dir: source_dir.to_owned(),
        marker: MODULE_INFO_FILE.to_owned(),
    };

    let read_dir = match source_dir.read_dir_utf8() {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    let mut candidates = Vec::new();
    for entry in read_dir {
        let path = entry?.into_path();
        if path.is_dir() {
            candidates.push(path);
        }
    }
    candidates.sort();

    let found = candidates
        .into_iter()
        .find(|dir| dir.join(MODULE_INFO_FILE).is_file())
        .ok_or_else(not_found)?;
    debug!("located module folder {found}");
    Ok(found)
}

/// Join `path` onto `base` unless it is already absolute.
#[must_use]
pub fn absolutize(path: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        base.join(path)
    }
}

/// Resolve `path` to the location it actually names on disk.
///
/// The longest prefix of `path` that exists is canonicalized, which follows
/// symlinks and `..` through real directories. The remaining components are
/// applied lexically. The result is suitable for containment checks between
/// paths that may not exist yet.
#[must_use]
pub fn normalize_path(path: &Utf8Path) -> Utf8PathBuf {
    let components: Vec<Utf8Component<'_>> = path.components().collect();
    for split in (1..=components.len()).rev() {
        let prefix: Utf8PathBuf = components[..split].iter().collect();
        if let Ok(canonical) = prefix.canonicalize_utf8() {
            return push_lexically(canonical, &components[split..]);
        }
    }
    push_lexically(Utf8PathBuf::new(), &components)
}

fn push_lexically(mut base: Utf8PathBuf, components: &[Utf8Component<'_>]) -> Utf8PathBuf {
    for component in components {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                base.pop();
            }
            other => base.push(other.as_str()),
        }
    }
    base
}

/// Return true when `a` and `b` resolve to the same place or one contains
/// the other.
#[must_use]
pub fn paths_overlap(a: &Utf8Path, b: &Utf8Path) -> bool {
    let a = normalize_path(a);
    let b = normalize_path(b);
    a.starts_with(&b) || b.starts_with(&a)
}

/// The current directory as a UTF-8 path.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if the directory cannot be determined, and
/// [`ExportError::InvalidLayout`] if it is not valid UTF-8.
pub fn current_dir_utf8() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|e| ExportError::InvalidLayout {
        reason: format!("current directory is not valid UTF-8: {e}"),
    })
}
