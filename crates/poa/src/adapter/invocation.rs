//! Per-call servant bracket
//!
//! An [`Invocation`] holds the servant located for one call. When the
//! servant came from a locator, finishing or dropping the invocation runs
//! the matching `postinvoke` exactly once.

use std::fmt;
use std::sync::Arc;
use crate::servant::ServantHandle;
use crate::types::ObjectId;
use super::object_adapter::ObjectAdapter;
use super::servant_manager::{Cookie, ServantLocator};

struct LocatorCall {
    locator: Arc<dyn ServantLocator>,
    adapter: Arc<ObjectAdapter>,
    id: ObjectId,
    operation: String,
    cookie: Cookie,
}

/// Servant located for one call
pub struct Invocation {
    servant: ServantHandle,
    locator_call: Option<LocatorCall>,
}

impl Invocation {
    /// Servant found through the active object map, default servant or activator
    pub(crate) fn resolved(servant: ServantHandle) -> Self {
        Self {
            servant,
            locator_call: None,
        }
    }

    /// Servant supplied by a locator's `preinvoke`
    pub(crate) fn located(
        servant: ServantHandle,
        cookie: Cookie,
        locator: Arc<dyn ServantLocator>,
        adapter: Arc<ObjectAdapter>,
        id: ObjectId,
        operation: &str,
    ) -> Self {
        Self {
            servant,
            locator_call: Some(LocatorCall {
                locator,
                adapter,
                id,
                operation: operation.to_string(),
                cookie,
            }),
        }
    }

    /// The servant to invoke
    pub fn servant(&self) -> &ServantHandle {
        &self.servant
    }

    /// Whether a locator supplied the servant
    pub fn is_located(&self) -> bool {
        self.locator_call.is_some()
    }

    /// End the call, running `postinvoke` if a locator supplied the servant
    pub fn finish(mut self) {
        self.complete();
    }

    fn complete(&mut self) {
        if let Some(call) = self.locator_call.take() {
            call.locator.postinvoke(
                &call.id,
                &call.adapter,
                &call.operation,
                &self.servant,
                call.cookie,
            );
        }
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        self.complete();
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("servant", &self.servant)
            .field("located", &self.is_located())
            .finish()
    }
}
