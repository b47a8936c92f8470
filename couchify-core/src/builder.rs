//! Design document building - orchestrates discovery, resolution, and assembly.

use crate::{
    assemble::{assemble, Assembly, RewrittenEntry},
    attachments::{collect_attachment, AttachmentError},
    config::{Config, ConfigError},
    discover::{discover, DiscoverError},
    entry::{design_function_entry, DesignFunctionEntry},
    extract::ExtractError,
    graph::GraphError,
    js::JsError,
    slots::{allocate, RewriteOutput, RewriteTarget, RewriteTask},
    template::{load_rewrites, load_template},
    transform::{SourceTransform, TransformChain, TransformError},
};
use couchify_types::{Category, DesignDocument};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// View name taken by the shared module map
const VIEW_LIB: &str = "lib";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("base directory does not exist: {0}")]
    BaseDirNotFound(PathBuf),

    #[error(transparent)]
    Discover(#[from] DiscoverError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error("Failed to rewrite requires: {0}")]
    Rewrite(#[from] JsError),

    #[error("view name 'lib' is reserved for shared modules: {0}")]
    ReservedViewName(String),

    #[error("Rewrite task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Main design document builder
pub struct DesignBuilder {
    config: Config,
    transforms: TransformChain,
}

impl DesignBuilder {
    /// Validate `config` and set up its source transforms
    pub fn new(config: Config) -> Result<Self, BuildError> {
        config.validate()?;
        let transforms = TransformChain::from_names(&config.transforms)?;
        Ok(Self { config, transforms })
    }

    /// Append a transform after the configured ones
    pub fn with_transform(mut self, transform: impl SourceTransform + 'static) -> Self {
        self.transforms = self.transforms.with(transform);
        self
    }

    /// Build the design document
    ///
    /// Entries and attachments are processed concurrently. Slot numbering is a
    /// sequential fold over entries in discovery order, so the output is the
    /// same on every run over the same tree.
    pub async fn build(&self) -> Result<DesignDocument, BuildError> {
        let base_dir = self.config.base_dir()?;
        let base_dir = match tokio::fs::canonicalize(&base_dir).await {
            Ok(dir) if dir.is_dir() => dir,
            _ => return Err(BuildError::BaseDirNotFound(base_dir)),
        };

        let discovery = discover(&self.config, &base_dir)?;
        tracing::info!(
            "Found {} design functions and {} attachments",
            discovery.design_files.len(),
            discovery.attachment_files.len()
        );

        // Phase 1: per-entry resolution and extraction, attachment encoding
        let attachments_dir = base_dir.join(&self.config.attachments_dir);
        let entries_fut = try_join_all(
            discovery
                .design_files
                .iter()
                .map(|file| design_function_entry(&base_dir, file, &self.transforms)),
        );
        let attachments_fut = try_join_all(discovery.attachment_files.iter().map(|rel| {
            let dir = &attachments_dir;
            async move { collect_attachment(dir, rel).await.map_err(BuildError::from) }
        }));
        let (entries, attachments) = futures::try_join!(entries_fut, attachments_fut)?;

        check_view_names(&entries)?;

        // Slot allocation, then independent rewrites
        let allocation = allocate(&entries);
        tracing::info!(
            "Bundled {} library modules for {} entries",
            allocation.modules.len(),
            entries.len()
        );
        let outputs = run_rewrites(allocation.tasks).await?;

        let mut modules: Vec<String> = vec![String::new(); allocation.modules.len()];
        let mut fragments: Vec<BTreeMap<String, String>> = vec![BTreeMap::new(); entries.len()];
        for output in outputs {
            match output.target {
                RewriteTarget::Dependency(slot) => modules[slot] = output.code,
                RewriteTarget::Entry { index, export } => {
                    fragments[index].insert(export, output.code);
                }
            }
        }

        let rewritten = entries
            .into_iter()
            .zip(fragments)
            .map(|(entry, fragments)| RewrittenEntry {
                category: entry.category,
                name: entry.name,
                fragments,
            })
            .collect();

        let (template, rewrites) = futures::join!(
            load_template(&base_dir, &self.config.template_file),
            load_rewrites(&base_dir, &self.config.rewrites_file)
        );

        let doc = assemble(Assembly {
            name: self.config.design_name().to_string(),
            entries: rewritten,
            modules,
            usage: allocation.usage,
            attachments,
            rewrites,
            template,
        });

        tracing::info!("Built design document {}", doc.id);
        Ok(doc)
    }
}

fn check_view_names(entries: &[DesignFunctionEntry]) -> Result<(), BuildError> {
    match entries
        .iter()
        .find(|e| e.category == Category::Views && e.name == VIEW_LIB)
    {
        Some(entry) => Err(BuildError::ReservedViewName(entry.relative_path.clone())),
        None => Ok(()),
    }
}

/// Run every rewrite task on the blocking pool
async fn run_rewrites(tasks: Vec<RewriteTask>) -> Result<Vec<RewriteOutput>, BuildError> {
    let handles = tasks
        .into_iter()
        .map(|task| tokio::task::spawn_blocking(move || task.run()));
    let results = try_join_all(handles).await?;
    results
        .into_iter()
        .map(|r| r.map_err(BuildError::from))
        .collect()
}
