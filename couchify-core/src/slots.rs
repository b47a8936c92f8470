//! Slot allocation: numbering library modules shared across entries.
//!
//! Entries are folded in discovery order. Every dependency gets the next free
//! slot the first time it is seen and keeps it for the rest of the build, so
//! two entries that require the same file point at the same slot. The fold is
//! sequential; the rewrite tasks it schedules are independent of each other.

use crate::entry::DesignFunctionEntry;
use crate::graph::ModuleNode;
use crate::js::JsError;
use crate::rewrite::{rewrite_requires, Address};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Index of a library module in the design document
pub type Slot = usize;

/// Canonical path -> slot, append-only
#[derive(Debug, Clone, Default)]
pub struct SlotRegistry {
    slots: HashMap<PathBuf, Slot>,
}

impl SlotRegistry {
    pub fn get(&self, id: &Path) -> Option<Slot> {
        self.slots.get(id).copied()
    }

    pub fn contains(&self, id: &Path) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn register(&mut self, id: PathBuf) -> Slot {
        let next = self.slots.len();
        *self.slots.entry(id).or_insert(next)
    }
}

/// Which kinds of entry reach a slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotUsage {
    /// Reached from a view; emitted under `views.lib`
    pub views: bool,
    /// Reached from a filter, list, show or update; emitted under `commons`
    pub commons: bool,
}

/// Where the output of a rewrite task belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteTarget {
    Dependency(Slot),
    Entry { index: usize, export: String },
}

/// One unit of rewrite work
///
/// Owns its text and the complete literal -> address table, so it can run on
/// any thread without touching shared state.
#[derive(Debug, Clone)]
pub struct RewriteTask {
    pub target: RewriteTarget,
    pub source: String,
    pub addresses: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RewriteOutput {
    pub target: RewriteTarget,
    pub code: String,
}

impl RewriteTask {
    pub fn run(self) -> Result<RewriteOutput, JsError> {
        let code = rewrite_requires(&self.source, |literal| self.addresses.get(literal).cloned())?;
        Ok(RewriteOutput {
            target: self.target,
            code,
        })
    }
}

/// Result of folding every entry through the registry
#[derive(Debug, Default)]
pub struct SlotAllocation {
    pub registry: SlotRegistry,
    /// Library modules, indexed by slot
    pub modules: Vec<ModuleNode>,
    /// Indexed by slot
    pub usage: Vec<SlotUsage>,
    pub tasks: Vec<RewriteTask>,
}

/// Assign slots to every dependency of `entries` and schedule rewrite tasks
///
/// A dependency is scheduled once, when it first receives its slot. Each
/// export fragment of each entry is scheduled separately.
pub fn allocate(entries: &[DesignFunctionEntry]) -> SlotAllocation {
    let mut alloc = SlotAllocation::default();

    for (index, entry) in entries.iter().enumerate() {
        for dep in &entry.dependencies {
            if !alloc.registry.contains(&dep.id) {
                let slot = alloc.registry.register(dep.id.clone());
                alloc.modules.push(dep.clone());
                alloc.usage.push(SlotUsage::default());

                alloc.tasks.push(RewriteTask {
                    target: RewriteTarget::Dependency(slot),
                    source: dep.source.clone(),
                    addresses: addresses(&alloc.registry, &dep.refs, Address::Relative),
                });
            }

            if let Some(slot) = alloc.registry.get(&dep.id) {
                let usage = &mut alloc.usage[slot];
                if entry.category.is_view() {
                    usage.views = true;
                } else {
                    usage.commons = true;
                }
            }
        }

        let root: fn(Slot) -> Address = if entry.category.is_view() {
            Address::ViewLib
        } else {
            Address::Commons
        };
        let entry_addresses = addresses(&alloc.registry, &entry.refs, root);
        for (export, fragment) in &entry.exports {
            alloc.tasks.push(RewriteTask {
                target: RewriteTarget::Entry {
                    index,
                    export: export.clone(),
                },
                source: fragment.clone(),
                addresses: entry_addresses.clone(),
            });
        }
    }

    tracing::debug!(
        "Allocated {} slots, scheduled {} rewrite tasks",
        alloc.registry.len(),
        alloc.tasks.len()
    );
    alloc
}

fn addresses(
    registry: &SlotRegistry,
    refs: &BTreeMap<String, PathBuf>,
    address: fn(Slot) -> Address,
) -> BTreeMap<String, String> {
    refs.iter()
        .filter_map(|(literal, target)| {
            registry
                .get(target)
                .map(|slot| (literal.clone(), address(slot).to_string()))
        })
        .collect()
}
