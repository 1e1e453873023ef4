//! Per-id activation gate
//!
//! Incarnation and deactivation of one object id call out to the servant
//! manager with no adapter lock held. The gate keeps those callouts for the
//! same id one at a time, so concurrent misses incarnate once and a
//! deactivation etherealizes once.

use std::collections::HashSet;
use parking_lot::{Condvar, Mutex};
use crate::types::ObjectId;

/// Ids with a servant manager callout in progress
#[derive(Debug, Default)]
pub(crate) struct ActivationGate {
    busy: Mutex<HashSet<ObjectId>>,
    released: Condvar,
}

impl ActivationGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Block until no other caller holds `id`, then hold it
    ///
    /// Not re-entrant: entering an id already held by the calling thread
    /// never returns.
    pub(crate) fn enter(&self, id: &ObjectId) -> GatePass<'_> {
        let mut busy = self.busy.lock();
        while busy.contains(id) {
            self.released.wait(&mut busy);
        }
        busy.insert(id.clone());
        GatePass {
            gate: self,
            id: id.clone(),
        }
    }
}

/// Holds one id of an [`ActivationGate`] until dropped
pub(crate) struct GatePass<'a> {
    gate: &'a ActivationGate,
    id: ObjectId,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.gate.busy.lock().remove(&self.id);
        self.gate.released.notify_all();
    }
}
