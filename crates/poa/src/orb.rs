//! Broker instance
//!
//! An [`Orb`] owns one adapter tree: the root adapter created at startup,
//! the root adapter's manager, and the initial reference registry through
//! which bootstrap code finds them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use crate::adapter::{ObjectAdapter, TeardownReport};
use crate::dispatch::{locate_adapter, RequestDispatcher};
use crate::manager::{AdapterManager, ManagerState, DEFAULT_HOLD_CAPACITY};
use crate::registry::{InitialReference, InitialReferences};
use crate::servant::ServantHandle;
use crate::types::{initial_reference, ObjectKey, PoaError, PolicySet, Result};

/// Broker configuration
#[derive(Clone, Debug)]
pub struct OrbConfig {
    /// Name of the root adapter
    pub root_name: String,
    /// Requests each adapter manager may hold while Holding
    pub hold_capacity: usize,
    /// State the root manager is put in at startup
    pub root_manager_state: ManagerState,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            root_name: initial_reference::ROOT_POA.to_string(),
            hold_capacity: DEFAULT_HOLD_CAPACITY,
            root_manager_state: ManagerState::Holding,
        }
    }
}

impl OrbConfig {
    /// Create a new configuration
    pub fn new(root_name: &str) -> Self {
        Self {
            root_name: root_name.to_string(),
            ..Self::default()
        }
    }

    /// Set the hold-queue capacity of every manager the broker creates
    pub fn with_hold_capacity(mut self, hold_capacity: usize) -> Self {
        self.hold_capacity = hold_capacity;
        self
    }

    /// Set the root manager's startup state
    pub fn with_root_manager_state(mut self, state: ManagerState) -> Self {
        self.root_manager_state = state;
        self
    }
}

/// One broker: an adapter tree plus its bootstrap registry
pub struct Orb {
    config: OrbConfig,
    root: Arc<ObjectAdapter>,
    root_manager: Arc<AdapterManager>,
    initial_references: InitialReferences,
    shut_down: AtomicBool,
}

impl Orb {
    /// Start a broker, creating its root adapter
    ///
    /// The root adapter and its manager are registered as `RootPOA` and
    /// `RootPOAManager`.
    pub fn new(config: OrbConfig) -> Result<Self> {
        if config.root_name.is_empty() {
            return Err(PoaError::InvalidName("root adapter name must not be empty".to_string()));
        }

        let root_manager = AdapterManager::with_hold_capacity(config.hold_capacity);
        let root = ObjectAdapter::new_root(&config.root_name, PolicySet::root(), root_manager.clone())?;

        let initial_references = InitialReferences::new();
        initial_references.register(
            initial_reference::ROOT_POA,
            InitialReference::Adapter(root.clone()),
        )?;
        initial_references.register(
            initial_reference::ROOT_POA_MANAGER,
            InitialReference::Manager(root_manager.clone()),
        )?;

        match config.root_manager_state {
            ManagerState::Holding => {}
            ManagerState::Active => root_manager.activate(),
            ManagerState::Discarding => root_manager.discard(),
            ManagerState::Inactive => {
                root_manager.deactivate(false, false);
            }
        }

        info!(
            "Broker started: root adapter {} ({})",
            config.root_name,
            root_manager.state()
        );

        Ok(Self {
            config,
            root,
            root_manager,
            initial_references,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Configuration the broker was started with
    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    /// The root adapter
    pub fn root_adapter(&self) -> &Arc<ObjectAdapter> {
        &self.root
    }

    /// The root adapter's manager
    pub fn root_manager(&self) -> &Arc<AdapterManager> {
        &self.root_manager
    }

    /// A new manager (Holding) using the configured hold capacity
    pub fn create_manager(&self) -> Arc<AdapterManager> {
        AdapterManager::with_hold_capacity(self.config.hold_capacity)
    }

    /// The initial reference registry
    pub fn initial_references(&self) -> &InitialReferences {
        &self.initial_references
    }

    /// Register a well-known name
    pub fn register_initial_reference(&self, name: &str, reference: InitialReference) -> Result<()> {
        self.initial_references.register(name, reference)
    }

    /// Look up a well-known name
    pub fn resolve_initial_references(&self, name: &str) -> Result<InitialReference> {
        self.initial_references.resolve(name)
    }

    /// Walk the tree from the root, consulting adapter activators on misses
    /// when `activate_if_needed`
    pub fn find_adapter_by_path(&self, path: &[String], activate_if_needed: bool) -> Result<Arc<ObjectAdapter>> {
        self.root.descendant(path, activate_if_needed)
    }

    /// Resolve the servant behind an inbound object key
    ///
    /// Locator-managed adapters have no servant outside a call; use the
    /// dispatcher for those.
    pub fn resolve_servant(&self, key: &ObjectKey) -> Result<ServantHandle> {
        locate_adapter(&self.root, key)?.resolve_servant(&key.object_id)
    }

    /// Dispatcher for inbound calls into this broker's tree
    pub fn dispatcher(&self) -> RequestDispatcher {
        RequestDispatcher::new(self.root.clone())
    }

    /// Whether `shutdown` has run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop admitting requests and destroy the whole adapter tree
    ///
    /// `wait_for_completion` blocks the calling thread. An async caller
    /// discards at the root manager, awaits the root adapter's `drained`,
    /// then shuts down without waiting.
    pub fn shutdown(&self, etherealize: bool, wait_for_completion: bool) -> Result<TeardownReport> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Err(PoaError::BadInvOrder("broker already shut down".to_string()));
        }
        self.root_manager.discard();
        let report = self.root.destroy(etherealize, wait_for_completion)?;
        self.root_manager.deactivate(false, false);
        info!(
            "Broker shut down: {} adapters destroyed, {} servants etherealized",
            report.adapters_destroyed, report.etherealized
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Orb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orb")
            .field("config", &self.config)
            .field("root_manager", &self.root_manager)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
