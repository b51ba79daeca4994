//! Shared test utilities for the exporter crate.
//!
//! [`ProjectFixture`] lays out a throwaway project on disk in the shape the
//! exporter expects:
//!
//! ```text
//! <root>/package.json
//! <root>/node_modules/<name>/package.json
//! <root>/src/<module>/moduleinfo.json
//! ```

use crate::manifest::DEFAULT_DESCRIPTOR_FILE;
use crate::module_info::MODULE_INFO_FILE;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

/// Name of the module folder created by [`ProjectFixture::add_module`].
pub const FIXTURE_MODULE: &str = "Clock";

/// A temporary project directory.
#[derive(Debug)]
pub struct ProjectFixture {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl ProjectFixture {
    /// Create an empty project in a fresh temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created or is not UTF-8.
    #[must_use]
    pub fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        Self { _temp: temp, root }
    }

    /// The project root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// `<root>/node_modules`.
    #[must_use]
    pub fn dependency_root(&self) -> Utf8PathBuf {
        self.root.join("node_modules")
    }

    /// `<root>/src/<module>`.
    #[must_use]
    pub fn module_root(&self) -> Utf8PathBuf {
        self.root.join("src").join(FIXTURE_MODULE)
    }

    /// `<root>/output/<module>`.
    #[must_use]
    pub fn output_root(&self) -> Utf8PathBuf {
        self.root.join("output").join(FIXTURE_MODULE)
    }

    /// Write the project descriptor declaring `dependencies`.
    pub fn declare_dependencies(&self, dependencies: &[&str]) {
        self.write_file(DEFAULT_DESCRIPTOR_FILE, &descriptor_json(dependencies));
    }

    /// Materialize a package under the dependency root declaring `dependencies`.
    pub fn add_package(&self, name: &str, dependencies: &[&str]) {
        let package = Utf8Path::new("node_modules").join(name);
        self.write_file(
            package.join(DEFAULT_DESCRIPTOR_FILE).as_str(),
            &descriptor_json(dependencies),
        );
        self.write_file(
            package.join("index.js").as_str(),
            &format!("module.exports = '{name}';\n"),
        );
    }

    /// Create the module folder with a marker file, one source file, a nested
    /// asset, and a non-empty builder-private directory.
    pub fn add_module(&self) {
        let module = Utf8Path::new("src").join(FIXTURE_MODULE);
        self.write_file(
            module.join(MODULE_INFO_FILE).as_str(),
            &format!(r#"{{"moduleName":"{FIXTURE_MODULE}","build_version":1}}"#),
        );
        self.write_file(module.join("main.js").as_str(), "console.log('tick');\n");
        self.write_file(
            module.join("assets").join("face.svg").as_str(),
            "<svg></svg>\n",
        );
        self.write_file(
            module.join("module_builder").join("build.js").as_str(),
            "// build tooling\n",
        );
    }

    /// Write `contents` to `relative` below the root, creating parents.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_file(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directory");
        }
        fs::write(&path, contents).expect("failed to write fixture file");
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a descriptor whose dependency table lists `dependencies` in order.
#[must_use]
pub fn descriptor_json(dependencies: &[&str]) -> String {
    let entries: Vec<String> = dependencies
        .iter()
        .map(|name| format!(r#""{name}":"^1.0.0""#))
        .collect();
    format!(r#"{{"dependencies":{{{}}}}}"#, entries.join(","))
}

/// Snapshot a directory tree as relative path to contents.
///
/// Directories map to `None`, files to their bytes. Paths use `/`.
///
/// # Panics
///
/// Panics if the tree cannot be read.
#[must_use]
pub fn snapshot_tree(root: &Utf8Path) -> BTreeMap<String, Option<Vec<u8>>> {
    let mut snapshot = BTreeMap::new();
    collect_snapshot(root, root, &mut snapshot);
    snapshot
}

fn collect_snapshot(
    root: &Utf8Path,
    dir: &Utf8Path,
    snapshot: &mut BTreeMap<String, Option<Vec<u8>>>,
) {
    for entry in dir.read_dir_utf8().expect("failed to read directory") {
        let entry = entry.expect("failed to read directory entry");
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .expect("entry is below root")
            .components()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/");
        if path.is_dir() {
            snapshot.insert(relative, None);
            collect_snapshot(root, path, snapshot);
        } else {
            snapshot.insert(relative, Some(fs::read(path).expect("failed to read file")));
        }
    }
}
