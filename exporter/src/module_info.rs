//! Module info file handling.
//!
//! The module folder is identified by a `moduleinfo.json` marker that names
//! the bundle and carries a build counter. The export core only reads it; the
//! build counter is bumped once per run before staging so the staged copy
//! ships the new value.

use crate::error::{ExportError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;

/// File name of the module info marker inside a module folder.
pub const MODULE_INFO_FILE: &str = "moduleinfo.json";

const BUILD_VERSION_KEY: &str = "build_version";
const BUILD_VERSION_ALIAS: &str = "buildVersion";

/// Identity of the module being exported.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleInfo {
    /// Name identifying the bundle.
    #[serde(rename = "moduleName")]
    pub module_name: String,
    /// Monotonic build counter.
    #[serde(alias = "buildVersion", default)]
    pub build_version: u64,
}

impl ModuleInfo {
    /// Read `moduleinfo.json` from `module_root`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::ManifestNotFound`] when the file is absent and
    /// [`ExportError::ManifestParse`] when it is malformed or lacks
    /// `moduleName`.
    pub fn load(module_root: &Utf8Path) -> Result<Self> {
        let path = module_info_path(module_root);
        let contents = read_module_info(&path)?;
        serde_json::from_str(&contents).map_err(|e| ExportError::ManifestParse {
            path,
            reason: e.to_string(),
        })
    }
}

/// Path of the module info file inside `module_root`.
#[must_use]
pub fn module_info_path(module_root: &Utf8Path) -> Utf8PathBuf {
    module_root.join(MODULE_INFO_FILE)
}

/// Increment the build counter in `moduleinfo.json` and return the new value.
///
/// Keys other than the build counter are written back unchanged and in their
/// original order. The counter is updated under whichever of `build_version`
/// or `buildVersion` the file already uses; a missing counter is treated as
/// zero and written as `build_version`.
///
/// # Errors
///
/// Returns [`ExportError::ManifestNotFound`] or [`ExportError::ManifestParse`]
/// when the file cannot be read, and [`ExportError::ModuleInfoWrite`] when
/// the updated document cannot be written.
pub fn bump_build_version(module_root: &Utf8Path) -> Result<u64> {
    let path = module_info_path(module_root);
    let contents = read_module_info(&path)?;
    let mut document: Map<String, Value> =
        serde_json::from_str(&contents).map_err(|e| ExportError::ManifestParse {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    let key = counter_key(&document, &path)?;
    let current = match document.get(key) {
        None | Some(Value::Null) => 0,
        Some(value) => value.as_u64().ok_or_else(|| ExportError::ManifestParse {
            path: path.clone(),
            reason: format!("{key} must be a non-negative integer"),
        })?,
    };
    let next = current.saturating_add(1);
    document.insert(key.to_owned(), Value::from(next));

    let serialized = serde_json::to_string(&document).map_err(|e| ExportError::ModuleInfoWrite {
        path: path.clone(),
        source: std::io::Error::other(e),
    })?;
    fs::write(&path, serialized).map_err(|source| ExportError::ModuleInfoWrite {
        path: path.clone(),
        source,
    })?;

    debug!("bumped {key} in {path} from {current} to {next}");
    Ok(next)
}

/// Pick the key holding the build counter.
fn counter_key(document: &Map<String, Value>, path: &Utf8Path) -> Result<&'static str> {
    match (
        document.contains_key(BUILD_VERSION_KEY),
        document.contains_key(BUILD_VERSION_ALIAS),
    ) {
        (true, true) => Err(ExportError::ManifestParse {
            path: path.to_owned(),
            reason: format!("both {BUILD_VERSION_KEY} and {BUILD_VERSION_ALIAS} are set"),
        }),
        (false, true) => Ok(BUILD_VERSION_ALIAS),
        _ => Ok(BUILD_VERSION_KEY),
    }
}

fn read_module_info(path: &Utf8Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ExportError::ManifestNotFound {
                path: path.to_owned(),
            }
        } else {
            ExportError::ManifestParse {
                path: path.to_owned(),
                reason: format!("failed to read module info: {e}"),
            }
        }
    })
}
