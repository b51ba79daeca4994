//! Package descriptor reading.
//!
//! Every package directory (the project root and each directory under the
//! dependency root) carries a JSON descriptor whose `dependencies` table
//! names its direct runtime dependencies. The exporter only reads the names;
//! version specifiers are retained for logging but never matched.

use crate::error::{ExportError, Result};
use crate::package_name::PackageName;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;

/// Default descriptor file name inside a package directory.
pub const DEFAULT_DESCRIPTOR_FILE: &str = "package.json";

/// A single declared dependency with its (unmatched) version specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    /// Dependency name.
    pub name: PackageName,
    /// Version specifier exactly as written in the descriptor.
    pub version_spec: String,
}

/// Direct dependencies of one package, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredDependencies(Vec<DeclaredDependency>);

impl DeclaredDependencies {
    /// Create a dependency list from `(name, version)` pairs.
    #[must_use]
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<PackageName>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(name, version)| DeclaredDependency {
                    name: name.into(),
                    version_spec: version.into(),
                })
                .collect(),
        )
    }

    /// Iterate over the declared dependencies in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &DeclaredDependency> {
        self.0.iter()
    }

    /// Dependency names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<PackageName> {
        self.0.iter().map(|dep| dep.name.clone()).collect()
    }

    /// Number of declared dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return true when nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Source of declared dependencies for package directories.
///
/// The trait exists so resolution can be exercised against scripted
/// manifests in tests.
#[cfg_attr(test, mockall::automock)]
pub trait ManifestStore {
    /// Return the direct dependencies declared by the package at `package_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::ManifestNotFound`] when the directory has no
    /// descriptor and [`ExportError::ManifestParse`] when the descriptor is
    /// not well-formed.
    fn declared_dependencies(&self, package_dir: &Utf8Path) -> Result<DeclaredDependencies>;
}

/// Reads descriptors from the filesystem.
#[derive(Debug, Clone)]
pub struct FsManifestStore {
    descriptor_file: String,
}

impl FsManifestStore {
    /// Create a store that reads `descriptor_file` from each package directory.
    #[must_use]
    pub fn new(descriptor_file: impl Into<String>) -> Self {
        Self {
            descriptor_file: descriptor_file.into(),
        }
    }

    /// Path of the descriptor inside `package_dir`.
    #[must_use]
    pub fn descriptor_path(&self, package_dir: &Utf8Path) -> Utf8PathBuf {
        package_dir.join(&self.descriptor_file)
    }
}

impl Default for FsManifestStore {
    fn default() -> Self {
        Self::new(DEFAULT_DESCRIPTOR_FILE)
    }
}

impl ManifestStore for FsManifestStore {
    fn declared_dependencies(&self, package_dir: &Utf8Path) -> Result<DeclaredDependencies> {
        let path = self.descriptor_path(package_dir);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ExportError::ManifestNotFound { path });
            }
            Err(e) => {
                return Err(ExportError::ManifestParse {
                    path,
                    reason: format!("failed to read descriptor: {e}"),
                });
            }
        };
        parse_declared_dependencies(&contents).map_err(|reason| ExportError::ManifestParse {
            path,
            reason,
        })
    }
}

#[derive(Deserialize)]
struct PackageDescriptor {
    #[serde(default)]
    dependencies: Option<Map<String, Value>>,
}

/// Parse the `dependencies` table of a JSON descriptor.
///
/// A missing or `null` table yields an empty list. Declaration order is
/// preserved.
///
/// # Errors
///
/// Returns a description of the problem when the document is not a JSON
/// object, a dependency's version specifier is not a string, or a dependency
/// name is not a plain or scoped package name.
///
/// # Examples
///
/// ```
/// use module_exporter::manifest::parse_declared_dependencies;
///
/// let deps = parse_declared_dependencies(
///     r#"{"name":"demo","dependencies":{"zod":"^3.0.0","axios":"1.6.0"}}"#,
/// )
/// .expect("valid descriptor");
/// let names: Vec<String> = deps.names().iter().map(ToString::to_string).collect();
/// assert_eq!(names, ["zod", "axios"]);
/// ```
pub fn parse_declared_dependencies(
    contents: &str,
) -> std::result::Result<DeclaredDependencies, String> {
    let descriptor: PackageDescriptor =
        serde_json::from_str(contents).map_err(|e| e.to_string())?;
    let Some(table) = descriptor.dependencies else {
        return Ok(DeclaredDependencies::default());
    };

    let mut declared = Vec::with_capacity(table.len());
    for (name, spec) in table {
        let Value::String(version_spec) = spec else {
            return Err(format!(
                "version specifier for dependency '{name}' must be a string"
            ));
        };
        let name = PackageName::from(name);
        name.validate()
            .map_err(|problem| format!("invalid dependency name '{name}': {problem}"))?;
        declared.push(DeclaredDependency { name, version_spec });
    }
    Ok(DeclaredDependencies(declared))
}
