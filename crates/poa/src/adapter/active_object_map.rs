//! Active object map
//!
//! The bidirectional servant directory of one adapter: object id to
//! servant, and servant to the ids it is bound under. The map itself is not
//! synchronized; it lives inside the owning adapter's lock.

use std::collections::HashMap;
use crate::servant::ServantHandle;
use crate::types::{IdUniquenessPolicy, ObjectId, PoaError, Result};

/// Entry removed from the map
#[derive(Clone, Debug)]
pub struct RemovedEntry {
    /// The id that was bound
    pub id: ObjectId,
    /// The servant it was bound to
    pub servant: ServantHandle,
    /// Whether the servant is still bound under other ids
    pub remaining_activations: bool,
}

/// Forward and reverse servant directory
#[derive(Debug)]
pub struct ActiveObjectMap {
    uniqueness: IdUniquenessPolicy,
    by_id: HashMap<ObjectId, ServantHandle>,
    by_servant: HashMap<ServantHandle, Vec<ObjectId>>,
}

impl ActiveObjectMap {
    /// Create an empty map enforcing the given uniqueness policy
    pub fn new(uniqueness: IdUniquenessPolicy) -> Self {
        Self {
            uniqueness,
            by_id: HashMap::new(),
            by_servant: HashMap::new(),
        }
    }

    /// Look up the servant bound to an id
    pub fn get(&self, id: &ObjectId) -> Option<&ServantHandle> {
        self.by_id.get(id)
    }

    /// Whether a servant is bound under at least one id
    pub fn contains_servant(&self, servant: &ServantHandle) -> bool {
        self.by_servant.contains_key(servant)
    }

    /// All ids a servant is bound under, in activation order
    pub fn ids_of(&self, servant: &ServantHandle) -> &[ObjectId] {
        self.by_servant
            .get(servant)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first id a servant was bound under
    pub fn first_id(&self, servant: &ServantHandle) -> Option<&ObjectId> {
        self.ids_of(servant).first()
    }

    /// Bind `id` to `servant`
    ///
    /// Never overwrites: a bound id fails with `ObjectAlreadyActive`, and a
    /// bound servant under `UniqueId` fails with `ServantAlreadyActive`.
    pub fn insert(&mut self, id: ObjectId, servant: ServantHandle) -> Result<()> {
        if self.by_id.contains_key(&id) {
            return Err(PoaError::ObjectAlreadyActive(id));
        }
        if self.uniqueness == IdUniquenessPolicy::UniqueId && self.contains_servant(&servant) {
            return Err(PoaError::ServantAlreadyActive);
        }

        self.by_servant
            .entry(servant.clone())
            .or_default()
            .push(id.clone());
        self.by_id.insert(id, servant);
        Ok(())
    }

    /// Unbind an id, pruning the servant's reverse entry
    pub fn remove(&mut self, id: &ObjectId) -> Option<RemovedEntry> {
        let servant = self.by_id.remove(id)?;

        let remaining_activations = match self.by_servant.get_mut(&servant) {
            Some(ids) => {
                ids.retain(|bound| bound != id);
                !ids.is_empty()
            }
            None => false,
        };
        if !remaining_activations {
            self.by_servant.remove(&servant);
        }

        Some(RemovedEntry {
            id: id.clone(),
            servant,
            remaining_activations,
        })
    }

    /// Remove every entry
    ///
    /// Entries of the same servant are returned together, with
    /// `remaining_activations` false only on that servant's last entry.
    pub fn drain(&mut self) -> Vec<RemovedEntry> {
        self.by_id.clear();
        let mut removed = Vec::new();
        for (servant, ids) in self.by_servant.drain() {
            let last = ids.len().saturating_sub(1);
            for (i, id) in ids.into_iter().enumerate() {
                removed.push(RemovedEntry {
                    id,
                    servant: servant.clone(),
                    remaining_activations: i < last,
                });
            }
        }
        removed
    }

    /// Number of bound ids
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether no id is bound
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of distinct bound servants
    pub fn servant_count(&self) -> usize {
        self.by_servant.len()
    }

    /// All bound ids
    pub fn ids(&self) -> Vec<ObjectId> {
        self.by_id.keys().cloned().collect()
    }

    /// Check referential symmetry and the uniqueness rule
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.by_id.iter().all(|(id, servant)| {
            self.by_servant
                .get(servant)
                .is_some_and(|ids| ids.contains(id))
        });
        let reverse_ok = self.by_servant.iter().all(|(servant, ids)| {
            !ids.is_empty()
                && ids.iter().all(|id| self.by_id.get(id) == Some(servant))
        });
        let reverse_count: usize = self.by_servant.values().map(Vec::len).sum();
        let unique_ok = self.uniqueness == IdUniquenessPolicy::MultipleId
            || self.by_servant.values().all(|ids| ids.len() == 1);

        forward_ok && reverse_ok && unique_ok && reverse_count == self.by_id.len()
    }
}
