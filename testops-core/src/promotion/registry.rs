//! Shared-Step Registry.
//!
//! Legacy source test case id -> promoted shared step id, shared by every
//! worker of a run. Insertion is insert-if-absent: when two workers promote
//! the same source concurrently, the first registered id wins and the loser
//! adopts it, leaving its own freshly created shared step unused.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct SharedStepRegistry {
    entries: RwLock<HashMap<i64, i64>>,
}

impl SharedStepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: BTreeMap<i64, i64>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }

    pub fn get(&self, source_id: i64) -> Option<i64> {
        self.entries.read().get(&source_id).copied()
    }

    /// Register `shared_step_id` for `source_id` unless a mapping already
    /// exists. Returns the id that is registered afterwards.
    pub fn claim(&self, source_id: i64, shared_step_id: i64) -> i64 {
        *self
            .entries
            .write()
            .entry(source_id)
            .or_insert(shared_step_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Ordered copy of the current mappings.
    pub fn snapshot(&self) -> BTreeMap<i64, i64> {
        self.entries
            .read()
            .iter()
            .map(|(source, shared)| (*source, *shared))
            .collect()
    }
}
