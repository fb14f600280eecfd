#![forbid(unsafe_code)]

mod error;
mod locks;
mod memory;
mod sqlite;

pub use error::StoreError;
pub use locks::ParentLocks;
pub use memory::MemoryLinkStore;
pub use sqlite::SqliteLinkStore;

use vil_core::{Link, ParentId};

/// Per-parent link sets keyed by path.
///
/// Calls for the same parent are serialized; calls for different parents do not block each other.
pub trait LinkStore: Send + Sync {
    /// Links in stored order; an unknown parent yields an empty list.
    fn get(&self, parent_id: ParentId) -> Result<Vec<Link>, StoreError>;

    /// Replaces the entry with the same path (the replacement moves to the end), else appends.
    /// The stored link always carries `parent_id`.
    fn upsert(&self, parent_id: ParentId, link: Link) -> Result<(), StoreError>;

    /// Removes the entry with `path`; a missing entry is not an error.
    fn remove(&self, parent_id: ParentId, path: &str) -> Result<(), StoreError>;
}

pub(crate) fn validate_path(path: &str) -> Result<(), StoreError> {
    if path.trim().is_empty() {
        return Err(StoreError::InvalidInput("path must not be empty"));
    }
    Ok(())
}
