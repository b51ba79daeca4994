//! Module exporter library.
//!
//! This crate packages a development module together with the installed
//! packages it depends on. It resolves the transitive dependency closure from
//! package descriptors, stages the module and exactly that closure into a
//! clean output tree, and optionally compresses the tree into one archive.
//! It is used by the `module-export` CLI binary and can be driven
//! programmatically.
//!
//! # Modules
//!
//! - [`archive`] - Zip and tar archive creation on a worker thread
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Settings from defaults, `module-export.toml`, and flags
//! - [`error`] - Semantic error types
//! - [`manifest`] - Package descriptor reading
//! - [`module_info`] - Module marker file and build counter
//! - [`output`] - Progress and summary formatting
//! - [`package_name`] - Semantic wrapper for package names
//! - [`pipeline`] - Resolve, stage, and archive orchestration
//! - [`resolver`] - Transitive dependency closure
//! - [`stager`] - Output tree staging
//! - [`workspace`] - Project layout discovery and path resolution

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod module_info;
pub mod output;
pub mod package_name;
pub mod pipeline;
pub mod resolver;
pub mod stager;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod workspace;
