//! The active work item slot.
//!
//! One mutable slot shared between a [`crate::Client`] and the audit log
//! layer: the cursor and the lifecycle context write it, the audit layer reads
//! it when it builds each record. A worker processes one item at a time, so
//! this is a slot, not a set. Two cursors sharing one slot in the same process
//! will overwrite each other's tag; give them separate clients instead.

use crate::model::WorkItemId;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct ActiveWorkItem {
    slot: Arc<Mutex<Option<WorkItemId>>>,
}

impl ActiveWorkItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag subsequent log records with `id`.
    pub fn start(&self, id: WorkItemId) {
        *self.lock() = Some(id);
    }

    /// Clear the tag.
    pub fn end(&self) {
        *self.lock() = None;
    }

    pub fn current(&self) -> Option<WorkItemId> {
        *self.lock()
    }

    // A panic while holding the lock cannot leave an Option half-written.
    fn lock(&self) -> std::sync::MutexGuard<'_, Option<WorkItemId>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the slot when dropped, including on panic or when the owning
/// future is cancelled.
pub(crate) struct ActiveGuard<'a> {
    active: &'a ActiveWorkItem,
}

impl<'a> ActiveGuard<'a> {
    pub(crate) fn start(active: &'a ActiveWorkItem, id: WorkItemId) -> Self {
        active.start(id);
        Self { active }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.end();
    }
}
