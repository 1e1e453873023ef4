//! Core Object Adapter implementation
//!
//! The Object Adapter maps object ids to servants within one namespace.
//! Adapters form a tree rooted at the broker's root adapter; each one owns
//! its children and belongs to exactly one [`AdapterManager`].
//!
//! # Locking
//!
//! Each adapter has one read/write lock over its mutable state (active
//! flag, active object map, default servant, servant manager, children).
//! Policies are immutable and read without locking. No operation holds
//! an adapter's lock while acquiring the lock of another adapter: creation
//! locks only the parent, and destruction finishes each child (releasing its
//! lock) before locking the parent to detach.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use crate::manager::AdapterManager;
use crate::servant::ServantHandle;
use crate::types::{
    AdapterStamp, ObjectId, ObjectKey, ObjectReference, PoaError, Policy, PolicySet,
    RequestProcessingPolicy, Result,
};
use super::activation_gate::ActivationGate;
use super::active_object_map::{ActiveObjectMap, RemovedEntry};
use super::invocation::Invocation;
use super::request_tracker::{RequestGuard, RequestTracker};
use super::servant_manager::{AdapterActivator, ServantActivator, ServantManager};
use super::teardown::{EtherealizeFailure, TeardownReport};

/// Mutable state guarded by the adapter lock
struct AdapterState {
    active: bool,
    destroyed: bool,
    objects: ActiveObjectMap,
    default_servant: Option<ServantHandle>,
    servant_manager: Option<ServantManager>,
    adapter_activator: Option<Arc<dyn AdapterActivator>>,
    children: HashMap<String, Arc<ObjectAdapter>>,
}

/// Object Adapter - maps object ids to servants for one namespace
pub struct ObjectAdapter {
    name: String,
    /// Names from the root (exclusive) down to this adapter
    path: Vec<String>,
    policies: PolicySet,
    /// Incarnation stamp, transient adapters only
    stamp: Option<AdapterStamp>,
    parent: Weak<ObjectAdapter>,
    manager: Arc<AdapterManager>,
    state: RwLock<AdapterState>,
    requests: Arc<RequestTracker>,
    /// One servant manager callout per id at a time
    gate: ActivationGate,
    /// Serializes calls under SingleThread / MainThread
    serializer: tokio::sync::Mutex<()>,
}

impl ObjectAdapter {
    fn build(
        name: String,
        path: Vec<String>,
        policies: PolicySet,
        parent: Weak<ObjectAdapter>,
        manager: Arc<AdapterManager>,
    ) -> Arc<Self> {
        let stamp = (!policies.is_persistent()).then(AdapterStamp::generate);
        Arc::new(Self {
            name,
            path,
            policies,
            stamp,
            parent,
            manager,
            state: RwLock::new(AdapterState {
                active: true,
                destroyed: false,
                objects: ActiveObjectMap::new(policies.id_uniqueness),
                default_servant: None,
                servant_manager: None,
                adapter_activator: None,
                children: HashMap::new(),
            }),
            requests: Arc::new(RequestTracker::new()),
            gate: ActivationGate::new(),
            serializer: tokio::sync::Mutex::new(()),
        })
    }

    /// Create the root adapter of a broker
    pub(crate) fn new_root(
        name: &str,
        policies: PolicySet,
        manager: Arc<AdapterManager>,
    ) -> Result<Arc<Self>> {
        policies.validate()?;
        let root = Self::build(name.to_string(), Vec::new(), policies, Weak::new(), manager.clone());
        manager.add_member(&root);
        info!("Created root adapter {} ({})", name, policies);
        Ok(root)
    }

    /// Create a child adapter
    ///
    /// The child starts from this adapter's policies with `policies`
    /// overriding individual kinds. Without an explicit `manager` the child
    /// joins this adapter's manager. The child is active on return.
    pub fn create_child(
        self: &Arc<Self>,
        name: &str,
        manager: Option<Arc<AdapterManager>>,
        policies: &[Policy],
    ) -> Result<Arc<ObjectAdapter>> {
        if name.is_empty() {
            return Err(PoaError::InvalidName("adapter names must not be empty".to_string()));
        }
        let policies = self.policies.with_overrides(policies)?;
        let manager = manager.unwrap_or_else(|| self.manager.clone());

        let child = {
            let mut state = self.state_for_write()?;
            if state.children.contains_key(name) {
                return Err(PoaError::AdapterAlreadyExists(name.to_string()));
            }
            let mut path = self.path.clone();
            path.push(name.to_string());
            let child = Self::build(
                name.to_string(),
                path,
                policies,
                Arc::downgrade(self),
                manager.clone(),
            );
            state.children.insert(name.to_string(), child.clone());
            child
        };

        manager.add_member(&child);
        debug!("Created adapter {} ({})", child.display_path(), policies);
        Ok(child)
    }

    /// Find a child adapter by name
    ///
    /// On a miss with `activate_if_needed`, the installed adapter activator
    /// (if any) is asked to create the child and the lookup is repeated.
    pub fn find_adapter(
        self: &Arc<Self>,
        name: &str,
        activate_if_needed: bool,
    ) -> Result<Arc<ObjectAdapter>> {
        let activator = {
            let state = self.state_for_read()?;
            if let Some(child) = state.children.get(name) {
                return Ok(child.clone());
            }
            state.adapter_activator.clone()
        };

        match activator {
            Some(activator) if activate_if_needed => {
                if activator.unknown_adapter(self, name) {
                    if let Some(child) = self.state_for_read()?.children.get(name) {
                        return Ok(child.clone());
                    }
                }
                Err(PoaError::AdapterNonExistent(name.to_string()))
            }
            _ => Err(PoaError::AdapterNonExistent(name.to_string())),
        }
    }

    /// Walk down a path of child names, one `find_adapter` per hop
    pub fn descendant(
        self: &Arc<Self>,
        path: &[String],
        activate_if_needed: bool,
    ) -> Result<Arc<ObjectAdapter>> {
        let mut current = self.clone();
        for name in path {
            current = current.find_adapter(name, activate_if_needed)?;
        }
        Ok(current)
    }

    /// The adapter's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names from the root (exclusive) down to this adapter
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Path rendered as `/a/b` (`/` for the root)
    pub fn display_path(&self) -> String {
        if self.path.is_empty() {
            "/".to_string()
        } else {
            self.path.iter().map(|n| format!("/{}", n)).collect()
        }
    }

    /// The adapter's policies
    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    /// Incarnation stamp (transient adapters only)
    pub fn stamp(&self) -> Option<AdapterStamp> {
        self.stamp
    }

    /// The parent adapter, `None` for the root or once the parent is gone
    pub fn parent(&self) -> Option<Arc<ObjectAdapter>> {
        self.parent.upgrade()
    }

    /// The manager gating this adapter
    pub fn manager(&self) -> &Arc<AdapterManager> {
        &self.manager
    }

    /// Child adapters, sorted by name
    pub fn children(&self) -> Vec<Arc<ObjectAdapter>> {
        let state = self.state.read();
        let mut children: Vec<_> = state.children.values().cloned().collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    /// Whether the adapter is accepting requests
    pub fn is_active(&self) -> bool {
        let state = self.state.read();
        state.active && !state.destroyed
    }

    /// Whether the adapter has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.state.read().destroyed
    }

    /// Number of ids in the active object map
    pub fn active_object_count(&self) -> usize {
        self.state.read().objects.len()
    }

    /// Ids in the active object map
    pub fn active_object_ids(&self) -> Vec<ObjectId> {
        self.state.read().objects.ids()
    }

    /// Whether the active object map is symmetric and honours uniqueness
    pub fn is_consistent(&self) -> bool {
        self.state.read().objects.is_consistent()
    }

    /// Number of requests currently executing against this adapter
    pub fn in_flight_requests(&self) -> usize {
        self.requests.in_flight()
    }

    /// Wait until no request is in flight here or in any descendant
    ///
    /// The async counterpart of `wait_for_completion`: stop admission
    /// first (deactivate without waiting, or discard at the manager), then
    /// await this.
    pub async fn drained(&self) {
        self.requests.drained().await;
        let mut pending = self.children();
        while let Some(adapter) = pending.pop() {
            adapter.requests.drained().await;
            pending.extend(adapter.children());
        }
    }

    // ------------------------------------------------------------------
    // Default servant, servant manager and adapter activator slots
    // ------------------------------------------------------------------

    /// Install the default servant
    pub fn set_servant(&self, servant: ServantHandle) -> Result<()> {
        self.require_processing(RequestProcessingPolicy::UseDefaultServant, "set_servant")?;
        self.state_for_write()?.default_servant = Some(servant);
        Ok(())
    }

    /// The default servant
    pub fn get_servant(&self) -> Result<ServantHandle> {
        self.require_processing(RequestProcessingPolicy::UseDefaultServant, "get_servant")?;
        self.state_for_read()?
            .default_servant
            .clone()
            .ok_or(PoaError::NoServant)
    }

    /// Install the servant manager; allowed once per adapter
    pub fn set_servant_manager(&self, manager: ServantManager) -> Result<()> {
        self.require_processing(
            RequestProcessingPolicy::UseServantManager,
            "set_servant_manager",
        )?;
        if manager.required_retention() != self.policies.servant_retention {
            return Err(PoaError::WrongPolicy(format!(
                "{:?} requires {:?}",
                manager,
                manager.required_retention()
            )));
        }

        let mut state = self.state_for_write()?;
        if state.servant_manager.is_some() {
            return Err(PoaError::BadInvOrder(format!(
                "servant manager already set on {}",
                self.display_path()
            )));
        }
        debug!("Installed {:?} on {}", manager, self.display_path());
        state.servant_manager = Some(manager);
        Ok(())
    }

    /// The installed servant manager, if any
    pub fn get_servant_manager(&self) -> Result<Option<ServantManager>> {
        self.require_processing(RequestProcessingPolicy::UseServantManager, "get_servant_manager")?;
        Ok(self.state_for_read()?.servant_manager.clone())
    }

    /// Install the adapter activator consulted by `find_adapter`
    pub fn set_adapter_activator(&self, activator: Arc<dyn AdapterActivator>) -> Result<()> {
        self.state_for_write()?.adapter_activator = Some(activator);
        Ok(())
    }

    /// The installed adapter activator, if any
    pub fn adapter_activator(&self) -> Option<Arc<dyn AdapterActivator>> {
        self.state.read().adapter_activator.clone()
    }

    // ------------------------------------------------------------------
    // Object activation
    // ------------------------------------------------------------------

    /// Activate a servant under a fresh system-assigned id
    pub fn activate_object(&self, servant: ServantHandle) -> Result<ObjectId> {
        self.require_retain("activate_object")?;
        if !self.policies.system_ids() {
            return Err(PoaError::WrongPolicy(
                "activate_object requires SYSTEM_ID".to_string(),
            ));
        }
        let mut state = self.state_for_write()?;
        Self::activate_with_system_id(&mut state.objects, servant)
    }

    /// Activate a servant under a caller-supplied id
    pub fn activate_object_with_id(&self, id: ObjectId, servant: ServantHandle) -> Result<()> {
        self.require_retain("activate_object_with_id")?;
        if id.is_empty() {
            return Err(PoaError::InvalidObjectId);
        }
        self.state_for_write()?.objects.insert(id, servant)
    }

    /// Remove an id from the active object map
    ///
    /// With an activator installed, its `etherealize` runs while the entry
    /// is still bound, with no adapter lock held. The entry is removed
    /// afterwards even if `etherealize` fails; the failure is returned.
    pub fn deactivate_object(&self, id: &ObjectId) -> Result<()> {
        self.require_retain("deactivate_object")?;
        let _pass = self.gate.enter(id);

        let (servant, remaining_activations, activator) = {
            let state = self.state_for_read()?;
            let servant = state
                .objects
                .get(id)
                .cloned()
                .ok_or_else(|| PoaError::ObjectNotActive(id.clone()))?;
            let remaining_activations = state.objects.ids_of(&servant).len() > 1;
            (servant, remaining_activations, Self::activator_of(&state))
        };

        let etherealized = match activator {
            Some(activator) => activator.etherealize(id, self, servant, true, remaining_activations),
            None => Ok(()),
        };

        // A concurrent destroy may have drained the map already
        self.state.write().objects.remove(id);
        etherealized
    }

    /// The id a servant is bound under, activating it implicitly if allowed
    ///
    /// Under `MultipleId` the first bound id is returned.
    pub fn servant_to_id(&self, servant: &ServantHandle) -> Result<ObjectId> {
        self.require_retain("servant_to_id")?;
        {
            let state = self.state_for_read()?;
            if let Some(id) = state.objects.first_id(servant) {
                return Ok(id.clone());
            }
        }
        if !self.policies.implicit_activation() {
            return Err(PoaError::NoServant);
        }

        let mut state = self.state_for_write()?;
        // Re-check: a concurrent caller may have activated it between the locks
        if let Some(id) = state.objects.first_id(servant) {
            return Ok(id.clone());
        }
        Self::activate_with_system_id(&mut state.objects, servant.clone())
    }

    /// The servant bound to an id, without consulting any servant manager
    pub fn id_to_servant(&self, id: &ObjectId) -> Result<ServantHandle> {
        let state = self.state_for_read()?;
        if self.policies.retains() {
            if let Some(servant) = state.objects.get(id) {
                return Ok(servant.clone());
            }
        }
        match self.policies.request_processing {
            RequestProcessingPolicy::UseDefaultServant => {
                state.default_servant.clone().ok_or(PoaError::NoServant)
            }
            _ if self.policies.retains() => Err(PoaError::ObjectNotActive(id.clone())),
            _ => Err(PoaError::WrongPolicy(
                "id_to_servant requires RETAIN or USE_DEFAULT_SERVANT".to_string(),
            )),
        }
    }

    // ------------------------------------------------------------------
    // Request-path resolution
    // ------------------------------------------------------------------

    /// Resolve the servant for an inbound request
    ///
    /// 1. Retained id in the active object map
    /// 2. Default servant under `UseDefaultServant`
    /// 3. Activator incarnation under `UseServantManager` + `Retain`
    /// 4. Otherwise `ObjectNotActive`
    ///
    /// Only the branch selected by the policies is attempted. Locators are
    /// driven per call through [`ObjectAdapter::begin_invocation`], so this
    /// fails with `WrongPolicy` on a `NonRetain` servant-manager adapter.
    pub fn resolve_servant(&self, id: &ObjectId) -> Result<ServantHandle> {
        let retains = self.policies.retains();
        {
            let state = self.state_for_read()?;
            if retains {
                if let Some(servant) = state.objects.get(id) {
                    return Ok(servant.clone());
                }
            }

            match self.policies.request_processing {
                RequestProcessingPolicy::UseActiveObjectMapOnly => {
                    return Err(PoaError::ObjectNotActive(id.clone()));
                }
                RequestProcessingPolicy::UseDefaultServant => {
                    return state
                        .default_servant
                        .clone()
                        .ok_or_else(|| PoaError::ObjectNotActive(id.clone()));
                }
                RequestProcessingPolicy::UseServantManager if !retains => {
                    return Err(PoaError::WrongPolicy(
                        "NON_RETAIN servant managers are driven per call".to_string(),
                    ));
                }
                RequestProcessingPolicy::UseServantManager => {
                    if Self::activator_of(&state).is_none() {
                        return Err(PoaError::ObjectNotActive(id.clone()));
                    }
                }
            }
        }

        self.incarnate(id)
    }

    /// Miss path: incarnate with no lock held, then re-check and insert
    ///
    /// Any failure on this branch surfaces as `ObjectNotActive`. A servant
    /// that was incarnated but could not be bound is etherealized.
    fn incarnate(&self, id: &ObjectId) -> Result<ServantHandle> {
        let _pass = self.gate.enter(id);

        let activator = {
            let state = self.state_for_read()?;
            // Bound by whoever held the gate before us
            if let Some(servant) = state.objects.get(id) {
                return Ok(servant.clone());
            }
            Self::activator_of(&state).ok_or_else(|| PoaError::ObjectNotActive(id.clone()))?
        };

        let servant = activator.incarnate(id, self).map_err(|e| {
            debug!("Incarnate of {} failed on {}: {}", id, self.display_path(), e);
            PoaError::ObjectNotActive(id.clone())
        })?;

        let (outcome, remaining_activations) = {
            let mut state = match self.state_for_write() {
                Ok(state) => state,
                Err(e) => {
                    self.discard_incarnation(&activator, id, servant, false);
                    return Err(e);
                }
            };
            // Re-check: activate_object_with_id does not take the gate
            let winner = state.objects.get(id).cloned();
            if let Some(winner) = winner {
                if winner == servant {
                    return Ok(winner);
                }
                (Ok(winner), state.objects.contains_servant(&servant))
            } else {
                match state.objects.insert(id.clone(), servant.clone()) {
                    Ok(()) => return Ok(servant),
                    Err(e) => {
                        let bound_elsewhere = state.objects.contains_servant(&servant);
                        debug!("Incarnated servant for {} not bound: {}", id, e);
                        (Err(PoaError::ObjectNotActive(id.clone())), bound_elsewhere)
                    }
                }
            }
        };

        self.discard_incarnation(&activator, id, servant, remaining_activations);
        outcome
    }

    /// Etherealize a servant that was incarnated but never bound to `id`
    fn discard_incarnation(
        &self,
        activator: &Arc<dyn ServantActivator>,
        id: &ObjectId,
        servant: ServantHandle,
        remaining_activations: bool,
    ) {
        if let Err(e) = activator.etherealize(id, self, servant, false, remaining_activations) {
            warn!(
                "Etherealize of unbound incarnation {} failed on {}: {}",
                id,
                self.display_path(),
                e
            );
        }
    }

    /// Locate the servant for one call
    ///
    /// For `NonRetain` + `UseServantManager` this runs the locator's
    /// `preinvoke`; the returned [`Invocation`] runs `postinvoke` when
    /// finished or dropped. Every other configuration goes through
    /// [`ObjectAdapter::resolve_servant`].
    pub fn begin_invocation(self: &Arc<Self>, id: &ObjectId, operation: &str) -> Result<Invocation> {
        if self.policies.retains()
            || self.policies.request_processing != RequestProcessingPolicy::UseServantManager
        {
            return self.resolve_servant(id).map(Invocation::resolved);
        }

        let locator = self
            .state_for_read()?
            .servant_manager
            .as_ref()
            .and_then(ServantManager::as_locator)
            .cloned()
            .ok_or_else(|| PoaError::ObjectNotActive(id.clone()))?;

        let (servant, cookie) = locator.preinvoke(id, self, operation)?;
        Ok(Invocation::located(
            servant,
            cookie,
            locator,
            self.clone(),
            id.clone(),
            operation,
        ))
    }

    /// Admit one request, returning the guard that tracks it in flight
    pub(crate) fn admit(&self) -> Result<RequestGuard> {
        let state = self.state.read();
        if state.destroyed {
            return Err(PoaError::ObjectNotExist(self.display_path()));
        }
        if !state.active {
            return Err(PoaError::AdapterInactive(self.display_path()));
        }
        Ok(self.requests.begin())
    }

    /// Lock held for the duration of a call under serialized thread policies
    pub(crate) fn serializer(&self) -> &tokio::sync::Mutex<()> {
        &self.serializer
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    /// Object key for an id of this adapter
    pub fn object_key(&self, id: ObjectId) -> ObjectKey {
        ObjectKey::new(self.path.clone(), self.stamp, id)
    }

    /// Reference under a fresh system id, without activating anything
    pub fn create_reference(&self, interface_id: &str) -> Result<ObjectReference> {
        if !self.policies.system_ids() {
            return Err(PoaError::WrongPolicy(
                "create_reference requires SYSTEM_ID".to_string(),
            ));
        }
        self.state_for_read()?;
        Ok(ObjectReference::new(
            self.object_key(ObjectId::generate()),
            interface_id,
        ))
    }

    /// Reference for a caller-chosen id, without activating anything
    pub fn create_reference_with_id(
        &self,
        id: ObjectId,
        interface_id: &str,
    ) -> Result<ObjectReference> {
        if id.is_empty() {
            return Err(PoaError::InvalidObjectId);
        }
        self.state_for_read()?;
        Ok(ObjectReference::new(self.object_key(id), interface_id))
    }

    /// Reference for a servant, activating it implicitly if allowed
    pub fn servant_to_reference(&self, servant: &ServantHandle) -> Result<ObjectReference> {
        let id = self.servant_to_id(servant)?;
        Ok(ObjectReference::new(self.object_key(id), servant.interface_id()))
    }

    /// Reference for an active id
    pub fn id_to_reference(&self, id: &ObjectId) -> Result<ObjectReference> {
        self.require_retain("id_to_reference")?;
        let interface_id = {
            let state = self.state_for_read()?;
            let servant = state
                .objects
                .get(id)
                .ok_or_else(|| PoaError::ObjectNotActive(id.clone()))?;
            servant.interface_id().to_string()
        };
        Ok(ObjectReference::new(self.object_key(id.clone()), interface_id))
    }

    /// The id inside a reference issued by this adapter
    pub fn reference_to_id(&self, reference: &ObjectReference) -> Result<ObjectId> {
        let key = reference.key();
        if key.adapter_path != self.path || key.stamp != self.stamp {
            return Err(PoaError::WrongAdapter(key.to_string()));
        }
        Ok(key.object_id.clone())
    }

    /// The servant behind a reference issued by this adapter
    pub fn reference_to_servant(&self, reference: &ObjectReference) -> Result<ServantHandle> {
        let id = self.reference_to_id(reference)?;
        self.id_to_servant(&id)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start accepting requests again; idempotent
    pub fn activate(&self) -> Result<()> {
        let mut state = self.state_for_write()?;
        if !state.active {
            state.active = true;
            debug!("Activated adapter {}", self.display_path());
        }
        Ok(())
    }

    /// Stop accepting requests
    ///
    /// With `wait_for_completion`, blocks the calling thread until requests
    /// already admitted have finished; calling it that way from inside one
    /// of those requests, or from a task on a runtime those requests need,
    /// never returns. Async callers pass `false` and await
    /// [`ObjectAdapter::drained`]. With `etherealize` and an activator installed, every
    /// retained entry is removed and etherealized.
    pub fn deactivate(&self, etherealize: bool, wait_for_completion: bool) -> TeardownReport {
        {
            let mut state = self.state.write();
            if state.destroyed {
                return TeardownReport::new();
            }
            state.active = false;
        }
        debug!("Deactivated adapter {}", self.display_path());

        if wait_for_completion {
            self.requests.wait_idle();
        }

        let mut report = TeardownReport::new();
        if etherealize && self.policies.retains() {
            let drained = {
                let mut state = self.state.write();
                Self::activator_of(&state).map(|activator| (activator, state.objects.drain()))
            };
            if let Some((activator, entries)) = drained {
                self.etherealize_entries(&activator, entries, &mut report);
            }
        }
        report
    }

    /// Destroy this adapter and all its descendants
    ///
    /// Children are destroyed first (depth-first). Then this adapter is
    /// deactivated, its maps are cleared (etherealizing retained servants
    /// when asked), and it detaches from its manager and parent. Failed
    /// etherealize callbacks are collected in the report, never aborting
    /// the cascade. The handle is unusable afterwards.
    ///
    /// `wait_for_completion` blocks the calling thread, with the same
    /// caveats as [`ObjectAdapter::deactivate`].
    pub fn destroy(
        self: &Arc<Self>,
        etherealize: bool,
        wait_for_completion: bool,
    ) -> Result<TeardownReport> {
        let children: Vec<Arc<ObjectAdapter>> = {
            let mut state = self.state.write();
            if state.destroyed {
                return Err(PoaError::AdapterNonExistent(self.display_path()));
            }
            state.destroyed = true;
            state.active = false;
            let mut children: Vec<_> = state.children.values().cloned().collect();
            children.sort_by(|a, b| a.name.cmp(&b.name));
            children
        };

        let mut report = TeardownReport::new();
        for child in children {
            // A concurrent destroy of the same child already did the work
            if let Ok(child_report) = child.destroy(etherealize, wait_for_completion) {
                report.merge(child_report);
            }
        }

        if wait_for_completion {
            self.requests.wait_idle();
        }

        let (entries, servant_manager) = {
            let mut state = self.state.write();
            state.default_servant = None;
            state.adapter_activator = None;
            state.children.clear();
            (state.objects.drain(), state.servant_manager.take())
        };
        if etherealize {
            if let Some(activator) = servant_manager.as_ref().and_then(ServantManager::as_activator) {
                self.etherealize_entries(activator, entries, &mut report);
            }
        }

        self.manager.remove_member(self);
        if let Some(parent) = self.parent() {
            let mut state = parent.state.write();
            let is_ours = state
                .children
                .get(&self.name)
                .is_some_and(|child| Arc::ptr_eq(child, self));
            if is_ours {
                state.children.remove(&self.name);
            }
        }

        report.adapters_destroyed += 1;
        info!(
            "Destroyed adapter {} ({} etherealized, {} failures)",
            self.display_path(),
            report.etherealized,
            report.failures.len()
        );
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn activate_with_system_id(objects: &mut ActiveObjectMap, servant: ServantHandle) -> Result<ObjectId> {
        let id = ObjectId::generate();
        objects.insert(id.clone(), servant)?;
        Ok(id)
    }

    fn activator_of(state: &AdapterState) -> Option<Arc<dyn ServantActivator>> {
        state
            .servant_manager
            .as_ref()
            .and_then(ServantManager::as_activator)
            .cloned()
    }

    fn etherealize_entries(
        &self,
        activator: &Arc<dyn ServantActivator>,
        entries: Vec<RemovedEntry>,
        report: &mut TeardownReport,
    ) {
        for entry in entries {
            report.etherealized += 1;
            let id = entry.id;
            if let Err(error) =
                activator.etherealize(&id, self, entry.servant, true, entry.remaining_activations)
            {
                warn!(
                    "Etherealize failed on {} for {}: {}",
                    self.display_path(),
                    id,
                    error
                );
                report.failures.push(EtherealizeFailure {
                    adapter: self.display_path(),
                    object_id: id,
                    error,
                });
            }
        }
    }

    fn state_for_read(&self) -> Result<RwLockReadGuard<'_, AdapterState>> {
        let state = self.state.read();
        if state.destroyed {
            return Err(PoaError::AdapterNonExistent(self.display_path()));
        }
        Ok(state)
    }

    fn state_for_write(&self) -> Result<RwLockWriteGuard<'_, AdapterState>> {
        let state = self.state.write();
        if state.destroyed {
            return Err(PoaError::AdapterNonExistent(self.display_path()));
        }
        Ok(state)
    }

    fn require_retain(&self, operation: &str) -> Result<()> {
        if self.policies.retains() {
            Ok(())
        } else {
            Err(PoaError::WrongPolicy(format!("{} requires RETAIN", operation)))
        }
    }

    fn require_processing(&self, expected: RequestProcessingPolicy, operation: &str) -> Result<()> {
        if self.policies.request_processing == expected {
            Ok(())
        } else {
            Err(PoaError::WrongPolicy(format!(
                "{} requires {:?}",
                operation, expected
            )))
        }
    }
}

impl fmt::Debug for ObjectAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectAdapter")
            .field("path", &self.display_path())
            .field("policies", &self.policies)
            .field("stamp", &self.stamp)
            .finish()
    }
}
