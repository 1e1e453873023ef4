//! In-flight request tracking
//!
//! Each admitted request holds a [`RequestGuard`]. Deactivation with
//! `wait_for_completion` blocks the calling thread until the count drains
//! to zero; async callers await [`RequestTracker::drained`] instead.

use std::pin::pin;
use std::sync::Arc;
use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

/// Counts requests currently executing against one adapter
#[derive(Debug, Default)]
pub struct RequestTracker {
    active: Mutex<usize>,
    drained: Condvar,
    idle: Notify,
}

impl RequestTracker {
    /// Create a new tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a request
    pub fn begin(self: &Arc<Self>) -> RequestGuard {
        *self.active.lock() += 1;
        RequestGuard {
            tracker: self.clone(),
        }
    }

    /// Number of requests in flight
    pub fn in_flight(&self) -> usize {
        *self.active.lock()
    }

    /// Block the current thread until no request is in flight
    ///
    /// Must not be called from an async task whose runtime is needed to
    /// finish the tracked requests; use [`RequestTracker::drained`] there.
    pub fn wait_idle(&self) {
        let mut active = self.active.lock();
        while *active > 0 {
            self.drained.wait(&mut active);
        }
    }

    /// Wait asynchronously until no request is in flight
    pub async fn drained(&self) {
        loop {
            let mut notified = pin!(self.idle.notified());
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn end(&self) {
        let mut active = self.active.lock();
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.drained.notify_all();
            self.idle.notify_waiters();
        }
    }
}

/// Marks one in-flight request; dropping it ends the request
#[derive(Debug)]
pub struct RequestGuard {
    tracker: Arc<RequestTracker>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.tracker.end();
    }
}
