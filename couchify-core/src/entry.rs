//! Per-file design function processing: dependency discovery plus export extraction.

use crate::builder::BuildError;
use crate::discover::DesignFile;
use crate::extract::{extract_exports, ExportShape};
use crate::graph::{resolve_dependencies, ModuleNode};
use crate::transform::TransformChain;
use couchify_types::Category;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One design function file, resolved and extracted
#[derive(Debug, Clone)]
pub struct DesignFunctionEntry {
    pub category: Category,
    /// File stem, the key under the category field
    pub name: String,
    /// Path relative to the base directory, for error messages
    pub relative_path: String,
    /// Export name -> wrapped function fragment
    pub exports: BTreeMap<String, String>,
    /// References made by the entry module itself
    pub refs: BTreeMap<String, PathBuf>,
    /// Dependency list without the entry, leaves first
    pub dependencies: Vec<ModuleNode>,
}

/// Resolve the dependencies of one design function file and extract its exports
pub async fn design_function_entry(
    base_dir: &Path,
    file: &DesignFile,
    transforms: &TransformChain,
) -> Result<DesignFunctionEntry, BuildError> {
    let path = base_dir.join(&file.relative_path);
    let list = resolve_dependencies(&path, transforms).await?;
    let (entry, dependencies) = list.into_parts();

    let exports = extract_exports(
        &file.relative_path,
        &entry.source,
        ExportShape::for_category(file.category),
    )?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    tracing::debug!(
        "{}: {} export(s), {} dependencies",
        file.relative_path,
        exports.len(),
        dependencies.len()
    );

    Ok(DesignFunctionEntry {
        category: file.category,
        name,
        relative_path: file.relative_path.clone(),
        exports,
        refs: entry.refs,
        dependencies,
    })
}
