//! Module graph resolution: transitive `require` discovery and ordering.
//!
//! The graph is built once per entry file as an index-based adjacency list
//! keyed by canonical paths, sorted leaves-first, and then discarded; only the
//! ordered [`DependencyList`] survives.

use crate::js::{self, JsError};
use crate::resolve::{self, ResolveError};
use crate::transform::{TransformChain, TransformError};
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: JsError },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("cyclic dependency: {}", display_cycle(.0))]
    Cycle(Vec<PathBuf>),
}

fn display_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// One module in a dependency list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNode {
    /// Canonical path; the deduplication key
    pub id: PathBuf,
    pub file: PathBuf,
    /// Module text after source transforms
    pub source: String,
    pub is_entry: bool,
    /// Reference literal as written in `source` -> canonical path it resolves to
    pub refs: BTreeMap<String, PathBuf>,
}

/// Modules needed by one entry file, leaves first, entry last
#[derive(Debug, Clone)]
pub struct DependencyList {
    dependencies: Vec<ModuleNode>,
    entry: ModuleNode,
}

impl DependencyList {
    pub fn entry(&self) -> &ModuleNode {
        &self.entry
    }

    /// Everything but the entry, leaves first
    pub fn dependencies(&self) -> &[ModuleNode] {
        &self.dependencies
    }

    /// All modules in order, ending with the entry
    pub fn modules(&self) -> impl Iterator<Item = &ModuleNode> {
        self.dependencies.iter().chain(std::iter::once(&self.entry))
    }

    pub fn into_parts(self) -> (ModuleNode, Vec<ModuleNode>) {
        (self.entry, self.dependencies)
    }
}

/// Discover every module reachable from `entry` and order them leaves first
///
/// Files of each discovery wave are read concurrently. Every module's text goes
/// through `transforms` before its references are scanned, so requires added
/// by a transform are followed too.
pub async fn resolve_dependencies(
    entry: &Path,
    transforms: &TransformChain,
) -> Result<DependencyList, GraphError> {
    let entry_id = resolve::canonical(entry)?;
    let mut entry = load_module(&entry_id, transforms).await?;
    entry.is_entry = true;

    let mut nodes: Vec<ModuleNode> = vec![entry.clone()];
    let mut seen: HashSet<PathBuf> = HashSet::from([entry_id]);
    let mut wave: Vec<PathBuf> = entry
        .refs
        .values()
        .filter(|target| seen.insert((*target).clone()))
        .cloned()
        .collect();

    while !wave.is_empty() {
        let loaded = try_join_all(wave.iter().map(|path| load_module(path, transforms))).await?;

        let mut next = Vec::new();
        for node in loaded {
            for target in node.refs.values() {
                if seen.insert(target.clone()) {
                    next.push(target.clone());
                }
            }
            nodes.push(node);
        }
        wave = next;
    }

    tracing::debug!("Resolved {} modules for {:?}", nodes.len(), entry.id);

    // The entry sits at index 0; it goes last whatever position the sort
    // gave it.
    let order = sort_leaves_first(&nodes)?;
    let mut slots: Vec<Option<ModuleNode>> = nodes.into_iter().map(Some).collect();
    let dependencies: Vec<ModuleNode> = order
        .into_iter()
        .filter(|&i| i != 0)
        .filter_map(|i| slots[i].take())
        .collect();

    Ok(DependencyList {
        dependencies,
        entry,
    })
}

async fn load_module(path: &Path, transforms: &TransformChain) -> Result<ModuleNode, GraphError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| GraphError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
    if is_json {
        return Ok(ModuleNode {
            id: path.to_path_buf(),
            file: path.to_path_buf(),
            source: format!("module.exports = {};", raw.trim()),
            is_entry: false,
            refs: BTreeMap::new(),
        });
    }

    let source = transforms.apply(path, raw)?;
    let tree = js::parse_strict(&source).map_err(|source| GraphError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut refs = BTreeMap::new();
    for call in js::require_calls(&tree, &source) {
        if refs.contains_key(&call.literal) {
            continue;
        }
        let target = resolve::resolve(&call.literal, path)?;
        refs.insert(call.literal, target);
    }

    Ok(ModuleNode {
        id: path.to_path_buf(),
        file: path.to_path_buf(),
        source,
        is_entry: false,
        refs,
    })
}

/// Topological order over depends-on edges; dependencies before dependents
///
/// Ties are broken by discovery index, so the order is stable for a given
/// input tree.
fn sort_leaves_first(nodes: &[ModuleNode]) -> Result<Vec<usize>, GraphError> {
    let index: HashMap<&Path, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_path(), i))
        .collect();

    let deps: Vec<BTreeSet<usize>> = nodes
        .iter()
        .map(|n| {
            n.refs
                .values()
                .filter_map(|target| index.get(target.as_path()).copied())
                .collect()
        })
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, ds) in deps.iter().enumerate() {
        for &d in ds {
            dependents[d].push(i);
        }
    }

    let mut remaining: Vec<usize> = deps.iter().map(|d| d.len()).collect();
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| remaining[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &dependent in &dependents[i] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != nodes.len() {
        let cycle = find_cycle(&deps, &remaining)
            .into_iter()
            .map(|i| nodes[i].id.clone())
            .collect();
        return Err(GraphError::Cycle(cycle));
    }

    Ok(order)
}

/// Follow unresolved edges until a node repeats
fn find_cycle(deps: &[BTreeSet<usize>], remaining: &[usize]) -> Vec<usize> {
    let Some(start) = (0..deps.len()).find(|&i| remaining[i] > 0) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(&next) = deps[current].iter().find(|&&d| remaining[d] > 0) else {
            return path;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle = path.split_off(pos);
            cycle.push(next);
            return cycle;
        }
        path.push(next);
        current = next;
    }
}
