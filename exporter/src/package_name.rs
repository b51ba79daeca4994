//! Semantic wrapper for dependency package names.
//!
//! This module provides the [`PackageName`] newtype for type-safe handling of
//! package names throughout the exporter.

use camino::{Utf8Component, Utf8Path};
use std::fmt;

/// Name of the packaging tool itself. It is a build-time dependency and is
/// never shipped with an exported module.
pub const EXPORT_TOOL_PACKAGE: &str = "modules-export-script";

/// A package name as declared in a descriptor's dependency table.
///
/// Scoped names such as `@scope/pkg` are kept verbatim; they map to a nested
/// directory under the dependency root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the package name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a relative path below a dependency root.
    #[must_use]
    pub fn as_relative_path(&self) -> &Utf8Path {
        Utf8Path::new(&self.0)
    }

    /// Check that the name maps to a directory directly below a dependency
    /// root: either a plain name or `@scope/name`.
    ///
    /// # Errors
    ///
    /// Returns a short description of the problem for empty names, absolute
    /// paths, backslashes, and `.` or `..` segments.
    ///
    /// # Examples
    ///
    /// ```
    /// use module_exporter::package_name::PackageName;
    ///
    /// assert!(PackageName::from("@types/node").validate().is_ok());
    /// assert!(PackageName::from("../escape").validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), &'static str> {
        let name = self.0.as_str();
        if name.is_empty() {
            return Err("name is empty");
        }
        if name.contains('\\') {
            return Err("name contains a backslash");
        }
        let path = self.as_relative_path();
        if path.has_root() || path.is_absolute() {
            return Err("name is an absolute path");
        }
        let segments: Vec<&str> = name.split('/').collect();
        let expected = if name.starts_with('@') { 2 } else { 1 };
        if segments.len() != expected {
            return Err("name must be a plain name or @scope/name");
        }
        if segments
            .iter()
            .any(|segment| matches!(*segment, "" | "." | ".." | "@"))
        {
            return Err("name contains an empty, '.', or '..' segment");
        }
        if !path
            .components()
            .all(|component| matches!(component, Utf8Component::Normal(_)))
        {
            return Err("name is not a relative path");
        }
        Ok(())
    }

    /// Return true when this names the packaging tool itself.
    #[must_use]
    pub fn is_export_tool(&self) -> bool {
        self.0 == EXPORT_TOOL_PACKAGE
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
