#![forbid(unsafe_code)]

use crate::{LinkStore, ParentLocks, StoreError, validate_path};
use vil_core::{Link, ParentId};

/// Process-local store; contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    parents: ParentLocks<Vec<Link>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkStore for MemoryLinkStore {
    fn get(&self, parent_id: ParentId) -> Result<Vec<Link>, StoreError> {
        let Some(entry) = self.parents.existing(parent_id) else {
            return Ok(Vec::new());
        };
        let links = entry.lock().map_err(|_| StoreError::Poisoned(parent_id))?;
        Ok(links.clone())
    }

    fn upsert(&self, parent_id: ParentId, mut link: Link) -> Result<(), StoreError> {
        validate_path(&link.path)?;
        link.parent_id = parent_id;
        let entry = self.parents.entry(parent_id);
        let mut links = entry.lock().map_err(|_| StoreError::Poisoned(parent_id))?;
        links.retain(|existing| existing.path != link.path);
        links.push(link);
        Ok(())
    }

    fn remove(&self, parent_id: ParentId, path: &str) -> Result<(), StoreError> {
        let Some(entry) = self.parents.existing(parent_id) else {
            return Ok(());
        };
        let mut links = entry.lock().map_err(|_| StoreError::Poisoned(parent_id))?;
        links.retain(|existing| existing.path != path);
        Ok(())
    }
}
