//! Adapter manager state machine
//!
//! ```text
//!            activate()              hold()
//!   Holding ───────────▶ Active ◀──────────▶ Holding
//!      │                   │ ▲
//!      │ discard()         │ │ activate()
//!      ▼                   ▼ │
//!   Discarding ◀──────── (any) ─────────▶ Inactive
//!                 discard()     deactivate()
//! ```
//!
//! State changes are broadcast over a watch channel so that requests held
//! at admission wake up as soon as the manager leaves Holding. The member
//! list has its own lock; bulk operations snapshot it and release the lock
//! before calling into any member adapter.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};
use crate::adapter::{ObjectAdapter, TeardownReport};
use crate::types::{PoaError, Result};

/// Hold-queue capacity of managers created without an explicit one
pub const DEFAULT_HOLD_CAPACITY: usize = 1024;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// Admission state of an adapter manager
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManagerState {
    /// New requests wait until the manager leaves this state
    Holding,
    /// Requests are admitted
    Active,
    /// New requests are rejected with a transient error
    Discarding,
    /// New requests are rejected; members are deactivated
    Inactive,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManagerState::Holding => "HOLDING",
            ManagerState::Active => "ACTIVE",
            ManagerState::Discarding => "DISCARDING",
            ManagerState::Inactive => "INACTIVE",
        };
        f.write_str(s)
    }
}

/// Gates request admission for a group of adapters
pub struct AdapterManager {
    id: u64,
    state: watch::Sender<ManagerState>,
    members: Mutex<Vec<Weak<ObjectAdapter>>>,
    held: AtomicUsize,
    hold_capacity: usize,
}

impl AdapterManager {
    /// Create a manager in the Holding state
    pub fn new() -> Arc<Self> {
        Self::with_hold_capacity(DEFAULT_HOLD_CAPACITY)
    }

    /// Create a manager in the Holding state with a bounded hold queue
    pub fn with_hold_capacity(hold_capacity: usize) -> Arc<Self> {
        let (state, _) = watch::channel(ManagerState::Holding);
        Arc::new(Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            state,
            members: Mutex::new(Vec::new()),
            held: AtomicUsize::new(0),
            hold_capacity,
        })
    }

    /// Process-unique manager number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state
    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<ManagerState> {
        self.state.subscribe()
    }

    /// Maximum number of requests waiting while Holding
    pub fn hold_capacity(&self) -> usize {
        self.hold_capacity
    }

    /// Number of requests currently waiting while Holding
    pub fn held_requests(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    /// Admit requests and turn every member adapter on
    pub fn activate(&self) {
        self.transition(ManagerState::Active);
        for adapter in self.members() {
            // Destroyed concurrently; nothing left to turn on
            let _ = adapter.activate();
        }
    }

    /// Hold new requests until the state changes
    pub fn hold(&self) {
        self.transition(ManagerState::Holding);
    }

    /// Reject new requests with a transient error
    pub fn discard(&self) {
        self.transition(ManagerState::Discarding);
    }

    /// Reject new requests and deactivate every member adapter
    ///
    /// `wait_for_completion` blocks the calling thread per member. From an
    /// async task pass `false` and await [`AdapterManager::drained`].
    pub fn deactivate(&self, etherealize: bool, wait_for_completion: bool) -> TeardownReport {
        self.transition(ManagerState::Inactive);
        let mut report = TeardownReport::new();
        for adapter in self.members() {
            report.merge(adapter.deactivate(etherealize, wait_for_completion));
        }
        report
    }

    /// Wait until no request is in flight on any member adapter
    pub async fn drained(&self) {
        for adapter in self.members() {
            adapter.drained().await;
        }
    }

    /// Live member adapters
    pub fn members(&self) -> Vec<Arc<ObjectAdapter>> {
        self.members.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of live member adapters
    pub fn member_count(&self) -> usize {
        self.members.lock().iter().filter(|m| m.strong_count() > 0).count()
    }

    pub(crate) fn add_member(&self, adapter: &Arc<ObjectAdapter>) {
        let mut members = self.members.lock();
        members.retain(|m| m.strong_count() > 0);
        members.push(Arc::downgrade(adapter));
    }

    pub(crate) fn remove_member(&self, adapter: &Arc<ObjectAdapter>) {
        let target = Arc::as_ptr(adapter);
        self.members
            .lock()
            .retain(|m| m.strong_count() > 0 && m.as_ptr() != target);
    }

    /// Decide whether a new request may proceed
    ///
    /// While Holding, the request waits for the next state change, unless
    /// the hold queue is full.
    pub(crate) async fn admit(&self) -> Result<()> {
        match self.state() {
            ManagerState::Holding => {}
            other => return self.admission_for(other),
        }

        let _slot = self.reserve_hold_slot()?;
        let mut changes = self.state.subscribe();
        let state = changes
            .wait_for(|s| *s != ManagerState::Holding)
            .await
            .map(|s| *s)
            .map_err(|_| PoaError::Transient(format!("{} shut down", self)))?;
        self.admission_for(state)
    }

    fn admission_for(&self, state: ManagerState) -> Result<()> {
        match state {
            ManagerState::Active => Ok(()),
            ManagerState::Inactive => Err(PoaError::AdapterInactive(self.to_string())),
            ManagerState::Discarding | ManagerState::Holding => {
                Err(PoaError::Transient(format!("{} is {}", self, state)))
            }
        }
    }

    fn reserve_hold_slot(&self) -> Result<HoldSlot<'_>> {
        let previous = self.held.fetch_add(1, Ordering::SeqCst);
        if previous >= self.hold_capacity {
            self.held.fetch_sub(1, Ordering::SeqCst);
            return Err(PoaError::Transient(format!("{} hold queue is full", self)));
        }
        Ok(HoldSlot { held: &self.held })
    }

    fn transition(&self, next: ManagerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!("{}: {} -> {}", self, previous, next);
        } else {
            debug!("{}: already {}", self, next);
        }
    }
}

/// One occupied place in the hold queue
struct HoldSlot<'a> {
    held: &'a AtomicUsize,
}

impl Drop for HoldSlot<'_> {
    fn drop(&mut self) {
        self.held.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Display for AdapterManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdapterManager#{}", self.id)
    }
}

impl fmt::Debug for AdapterManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterManager")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("members", &self.member_count())
            .finish()
    }
}
