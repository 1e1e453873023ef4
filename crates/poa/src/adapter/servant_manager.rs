//! Pluggable servant managers and adapter activators
//!
//! A servant manager supplies servants when the active object map misses:
//! - Activator: incarnates a servant once and lets the adapter retain it
//! - Locator: supplies a servant per call, bracketed by pre/postinvoke
//!
//! An adapter activator creates child adapters on demand.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use crate::servant::ServantHandle;
use crate::types::{ObjectId, Result, ServantRetentionPolicy};
use super::object_adapter::ObjectAdapter;

/// Opaque per-call value passed from `preinvoke` to the matching `postinvoke`
pub type Cookie = Box<dyn Any + Send>;

/// Servant manager for adapters that retain servants
pub trait ServantActivator: Send + Sync {
    /// Create the servant for an id that is not in the active object map
    ///
    /// Runs with no adapter lock held and may call back into `adapter`,
    /// except to resolve or deactivate this same `id`, which waits for this
    /// call to finish. Only one incarnation of an id runs at a time. Any
    /// error is reported to the caller as `ObjectNotActive`. A servant that
    /// cannot be bound afterwards is handed straight to `etherealize` with
    /// `cleanup_in_progress` false.
    fn incarnate(&self, id: &ObjectId, adapter: &ObjectAdapter) -> Result<ServantHandle>;

    /// Release a servant whose id is being deactivated
    ///
    /// On `deactivate_object` this runs before the entry is removed, so the
    /// adapter still reports `id` as active during the call.
    ///
    /// `remaining_activations` is true when the servant is still bound
    /// under other ids of the same adapter.
    fn etherealize(
        &self,
        id: &ObjectId,
        adapter: &ObjectAdapter,
        servant: ServantHandle,
        cleanup_in_progress: bool,
        remaining_activations: bool,
    ) -> Result<()>;
}

/// Servant manager for adapters that do not retain servants
pub trait ServantLocator: Send + Sync {
    /// Supply a servant for one call
    fn preinvoke(
        &self,
        id: &ObjectId,
        adapter: &ObjectAdapter,
        operation: &str,
    ) -> Result<(ServantHandle, Cookie)>;

    /// Called exactly once after the call that `preinvoke` prepared
    fn postinvoke(
        &self,
        id: &ObjectId,
        adapter: &ObjectAdapter,
        operation: &str,
        servant: &ServantHandle,
        cookie: Cookie,
    );
}

/// The servant manager installed on an adapter
#[derive(Clone)]
pub enum ServantManager {
    Activator(Arc<dyn ServantActivator>),
    Locator(Arc<dyn ServantLocator>),
}

impl ServantManager {
    /// Wrap an activator
    pub fn activator<A: ServantActivator + 'static>(activator: A) -> Self {
        ServantManager::Activator(Arc::new(activator))
    }

    /// Wrap a locator
    pub fn locator<L: ServantLocator + 'static>(locator: L) -> Self {
        ServantManager::Locator(Arc::new(locator))
    }

    /// The retention policy this kind of manager requires
    pub fn required_retention(&self) -> ServantRetentionPolicy {
        match self {
            ServantManager::Activator(_) => ServantRetentionPolicy::Retain,
            ServantManager::Locator(_) => ServantRetentionPolicy::NonRetain,
        }
    }

    /// The activator, if this is one
    pub fn as_activator(&self) -> Option<&Arc<dyn ServantActivator>> {
        match self {
            ServantManager::Activator(a) => Some(a),
            ServantManager::Locator(_) => None,
        }
    }

    /// The locator, if this is one
    pub fn as_locator(&self) -> Option<&Arc<dyn ServantLocator>> {
        match self {
            ServantManager::Locator(l) => Some(l),
            ServantManager::Activator(_) => None,
        }
    }
}

impl fmt::Debug for ServantManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServantManager::Activator(_) => write!(f, "ServantManager::Activator"),
            ServantManager::Locator(_) => write!(f, "ServantManager::Locator"),
        }
    }
}

/// Creates child adapters on demand
pub trait AdapterActivator: Send + Sync {
    /// Called when `name` is not a child of `parent`
    ///
    /// Returns true if the adapter now exists (typically created via
    /// `parent.create_child`). No adapter lock is held during the call.
    fn unknown_adapter(&self, parent: &Arc<ObjectAdapter>, name: &str) -> bool;
}
