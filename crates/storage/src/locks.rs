#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vil_core::ParentId;

/// One mutex per parent id.
///
/// The registry lock is only held to look up or create an entry, so work on different parents
/// never waits on each other.
#[derive(Debug, Default)]
pub struct ParentLocks<T> {
    entries: Mutex<HashMap<ParentId, Arc<Mutex<T>>>>,
}

impl<T: Default> ParentLocks<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn entry(&self, parent_id: ParentId) -> Arc<Mutex<T>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(entries.entry(parent_id).or_default())
    }

    /// Existing entry, without creating one.
    pub fn existing(&self, parent_id: ParentId) -> Option<Arc<Mutex<T>>> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(&parent_id).cloned()
    }
}
