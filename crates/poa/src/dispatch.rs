//! Inbound request dispatch
//!
//! The transport-facing entry point: an object key plus an operation name
//! and marshaled arguments go in, the servant's reply comes out.
//!
//! ```text
//!   ObjectKey ──▶ locate adapter ──▶ manager admission ──▶ adapter admission
//!                                                              │
//!      reply ◀── finish (postinvoke) ◀── servant.invoke ◀── locate servant
//! ```

use std::sync::Arc;
use bytes::Bytes;
use crate::adapter::ObjectAdapter;
use crate::servant::CallResult;
use crate::types::{ObjectKey, PoaError, Result};

/// Find the live adapter a key was issued by
///
/// Keys without a stamp (persistent adapters) may trigger adapter
/// activators along the path; stamped keys never do, since a re-created
/// adapter carries a different stamp. A missing adapter or a stamp from an
/// earlier incarnation fails with `ObjectNotExist`.
pub(crate) fn locate_adapter(root: &Arc<ObjectAdapter>, key: &ObjectKey) -> Result<Arc<ObjectAdapter>> {
    let adapter = root
        .descendant(&key.adapter_path, key.stamp.is_none())
        .map_err(|e| match e {
            PoaError::AdapterNonExistent(_) => PoaError::ObjectNotExist(key.to_string()),
            other => other,
        })?;

    if adapter.stamp() != key.stamp {
        return Err(PoaError::ObjectNotExist(key.to_string()));
    }
    Ok(adapter)
}

/// Routes inbound calls to servants
#[derive(Clone, Debug)]
pub struct RequestDispatcher {
    root: Arc<ObjectAdapter>,
}

impl RequestDispatcher {
    /// Create a dispatcher over the tree rooted at `root`
    pub fn new(root: Arc<ObjectAdapter>) -> Self {
        Self { root }
    }

    /// Dispatch one call
    ///
    /// Waits while the target's manager is Holding. Under a serializing
    /// thread policy, calls into the same adapter run one at a time. When a
    /// locator supplied the servant, its `postinvoke` runs exactly once
    /// whether or not the servant succeeded.
    pub async fn invoke(&self, key: &ObjectKey, operation: &str, args: Bytes) -> CallResult {
        let adapter = locate_adapter(&self.root, key)?;

        adapter.manager().admit().await?;
        let _request = adapter.admit()?;

        let _serialized = if adapter.policies().serializes_requests() {
            Some(adapter.serializer().lock().await)
        } else {
            None
        };

        let invocation = adapter.begin_invocation(&key.object_id, operation)?;
        let reply = invocation.servant().invoke(operation, args).await;
        invocation.finish();
        reply
    }
}
