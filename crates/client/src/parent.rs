#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard};
use vil_core::{ParentId, ParentRecord, SavedCallback};

/// A parent record that already exists server-side, as addressed from the command line.
///
/// Saved notifications can be delivered by the owner through [`ExistingParent::notify_saved`].
pub struct ExistingParent {
    id: ParentId,
    listeners: Mutex<Vec<SavedCallback>>,
}

impl ExistingParent {
    pub fn new(id: ParentId) -> Self {
        Self {
            id,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Runs every saved callback without holding the listener lock, so a callback may subscribe
    /// again. Callbacks added during the run are kept after the existing ones.
    pub fn notify_saved(&self, is_new: bool) {
        let mut running = std::mem::take(&mut *self.listeners());
        for listener in &running {
            listener(is_new);
        }
        let mut listeners = self.listeners();
        running.append(&mut listeners);
        *listeners = running;
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<SavedCallback>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ParentRecord for ExistingParent {
    fn id(&self) -> ParentId {
        self.id
    }

    fn is_new(&self) -> bool {
        false
    }

    fn subscribe_saved(&self, callback: SavedCallback) {
        self.listeners().push(callback);
    }
}
