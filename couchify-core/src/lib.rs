//! # couchify-core
//!
//! Core library for the couchify design document bundler.
//!
//! This crate turns a directory of CommonJS design functions into a single
//! CouchDB design document: it resolves each function's dependency graph,
//! numbers shared modules into slots, and rewrites `require` calls to point at
//! those slots.

pub mod assemble;
pub mod attachments;
pub mod builder;
pub mod config;
pub mod discover;
pub mod entry;
pub mod extract;
pub mod graph;
pub mod js;
pub mod resolve;
pub mod rewrite;
pub mod slots;
pub mod template;
pub mod transform;

pub use builder::{BuildError, DesignBuilder};
pub use config::{Config, ConfigError};
pub use graph::{resolve_dependencies, DependencyList, ModuleNode};
pub use transform::{SourceTransform, TransformChain};

pub use couchify_types::DesignDocument;

/// Bundle the design functions under `base_dir` into `_design/<name>`
///
/// Shorthand for [`DesignBuilder`] with default configuration.
pub async fn couchify(
    base_dir: impl Into<std::path::PathBuf>,
    name: impl Into<String>,
) -> Result<DesignDocument, BuildError> {
    DesignBuilder::new(Config::new(base_dir, name))?.build().await
}
