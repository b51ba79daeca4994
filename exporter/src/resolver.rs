//! Transitive dependency resolution.
//!
//! Starting from a module's direct dependencies, the resolver walks the graph
//! implied by each dependency's descriptor and returns the closure that must
//! ship alongside the module. Every name is expanded at most once, which
//! both deduplicates diamonds and terminates cycles.

use crate::error::{ExportError, Result};
use crate::manifest::ManifestStore;
use crate::package_name::PackageName;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeSet;

/// What to do when a declared dependency is absent from the dependency root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingDependencyPolicy {
    /// Record a warning, skip the dependency, and keep resolving.
    #[default]
    Warn,
    /// Abort resolution with [`ExportError::DependencyMissing`].
    Fail,
}

/// The outcome of a resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    packages: BTreeSet<PackageName>,
    discovery_order: Vec<PackageName>,
    missing: Vec<PackageName>,
}

impl Resolution {
    /// The resolved closure.
    #[must_use]
    pub fn packages(&self) -> &BTreeSet<PackageName> {
        &self.packages
    }

    /// Resolved packages in the order the depth-first walk first reached them.
    #[must_use]
    pub fn discovery_order(&self) -> &[PackageName] {
        &self.discovery_order
    }

    /// Dependencies that were declared but not found, each listed once.
    #[must_use]
    pub fn missing(&self) -> &[PackageName] {
        &self.missing
    }

    /// Return true when `name` is part of the closure.
    #[must_use]
    pub fn contains(&self, name: &PackageName) -> bool {
        self.packages.contains(name)
    }

    /// Number of resolved packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Return true when nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Accumulator for a single `resolve` call. It is created and consumed inside
/// that call and never shared.
struct Walk<'a> {
    exclude: &'a BTreeSet<PackageName>,
    resolution: Resolution,
}

impl<'a> Walk<'a> {
    fn new(exclude: &'a BTreeSet<PackageName>) -> Self {
        Self {
            exclude,
            resolution: Resolution::default(),
        }
    }

    fn is_settled(&self, name: &PackageName) -> bool {
        name.is_export_tool()
            || self.exclude.contains(name)
            || self.resolution.packages.contains(name)
            || self.resolution.missing.contains(name)
    }

    fn record_resolved(&mut self, name: &PackageName) {
        self.resolution.packages.insert(name.clone());
        self.resolution.discovery_order.push(name.clone());
    }

    fn record_missing(&mut self, name: &PackageName) {
        self.resolution.missing.push(name.clone());
    }
}

/// Computes dependency closures against a dependency root.
pub struct DependencyResolver<'a> {
    store: &'a dyn ManifestStore,
    dependency_root: Utf8PathBuf,
    policy: MissingDependencyPolicy,
}

impl<'a> DependencyResolver<'a> {
    /// Create a resolver reading manifests through `store`.
    #[must_use]
    pub fn new(store: &'a dyn ManifestStore, dependency_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            store,
            dependency_root: dependency_root.into(),
            policy: MissingDependencyPolicy::default(),
        }
    }

    /// Set the policy applied to missing dependencies.
    #[must_use]
    pub fn with_policy(mut self, policy: MissingDependencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Directory holding the package `name`.
    #[must_use]
    pub fn package_dir(&self, name: &PackageName) -> Utf8PathBuf {
        self.dependency_root.join(name.as_relative_path())
    }

    /// The dependency root packages are looked up in.
    #[must_use]
    pub fn dependency_root(&self) -> &Utf8Path {
        &self.dependency_root
    }

    /// Resolve the closure of the dependencies declared by `project_dir`.
    ///
    /// # Errors
    ///
    /// Propagates manifest errors for the project descriptor and for every
    /// resolved dependency, and [`ExportError::DependencyMissing`] under
    /// [`MissingDependencyPolicy::Fail`].
    pub fn resolve_project(
        &self,
        project_dir: &Utf8Path,
        exclude: &BTreeSet<PackageName>,
    ) -> Result<Resolution> {
        let declared = self.store.declared_dependencies(project_dir)?;
        debug!(
            "{project_dir} declares {} direct dependencies",
            declared.len()
        );
        self.resolve(&declared.names(), exclude)
    }

    /// Compute the transitive closure of `direct`, minus `exclude` and the
    /// packaging tool itself.
    ///
    /// Direct dependencies are walked in the given order, and each package's
    /// own dependencies in declaration order, so warnings and logs are
    /// reproducible.
    ///
    /// # Errors
    ///
    /// Returns manifest errors for resolved packages, and
    /// [`ExportError::DependencyMissing`] under [`MissingDependencyPolicy::Fail`].
    pub fn resolve(
        &self,
        direct: &[PackageName],
        exclude: &BTreeSet<PackageName>,
    ) -> Result<Resolution> {
        let mut walk = Walk::new(exclude);
        for name in direct {
            self.visit(name, &mut walk)?;
        }
        Ok(walk.resolution)
    }

    fn visit(&self, name: &PackageName, walk: &mut Walk<'_>) -> Result<()> {
        if walk.is_settled(name) {
            return Ok(());
        }

        let package_dir = self.package_dir(name);
        if !package_dir.is_dir() {
            warn!("{name} was not found in '{}'; skipping", self.dependency_root);
            if self.policy == MissingDependencyPolicy::Fail {
                return Err(ExportError::DependencyMissing { name: name.clone() });
            }
            walk.record_missing(name);
            return Ok(());
        }

        // Mark before descending so cycles terminate.
        walk.record_resolved(name);
        let declared = self.store.declared_dependencies(&package_dir)?;
        debug!("{name} declares {} dependencies", declared.len());
        for dependency in declared.iter() {
            self.visit(&dependency.name, walk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
