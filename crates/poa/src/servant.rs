//! Servant trait and servant handles
//!
//! A servant is the in-process object that actually handles operations.
//! Adapters store servants as [`ServantHandle`]s, which compare and hash by
//! identity rather than by value.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use bytes::Bytes;
use crate::types::Result;

/// Result of an invocation
pub type CallResult = Result<Bytes>;

/// Future type for invocation results
pub type CallFuture = Pin<Box<dyn Future<Output = CallResult> + Send>>;

/// Trait for servant implementations
pub trait Servant: Send + Sync + 'static {
    /// Interface (repository) id implemented by this servant
    fn interface_id(&self) -> &str;

    /// Dispatch an operation by name with marshaled arguments
    fn invoke(&self, operation: &str, args: Bytes) -> CallFuture;

    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Shared, identity-compared handle to a servant
#[derive(Clone)]
pub struct ServantHandle(Arc<dyn Servant>);

impl ServantHandle {
    /// Wrap a servant
    pub fn new<S: Servant>(servant: S) -> Self {
        Self(Arc::new(servant))
    }

    /// Wrap an already shared servant
    pub fn from_arc(servant: Arc<dyn Servant>) -> Self {
        Self(servant)
    }

    /// The underlying shared servant
    pub fn as_arc(&self) -> &Arc<dyn Servant> {
        &self.0
    }

    /// Whether two handles refer to the same servant
    pub fn ptr_eq(&self, other: &ServantHandle) -> bool {
        self.addr() == other.addr()
    }

    /// Downcast to the concrete servant type
    pub fn downcast_ref<T: Servant>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<S: Servant> From<Arc<S>> for ServantHandle {
    fn from(servant: Arc<S>) -> Self {
        Self(servant)
    }
}

impl Deref for ServantHandle {
    type Target = dyn Servant;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for ServantHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ServantHandle {}

impl Hash for ServantHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for ServantHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServantHandle({}@{:#x})", self.0.interface_id(), self.addr())
    }
}
