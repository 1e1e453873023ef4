//! Teardown reporting
//!
//! Deactivation and destruction never abort on a failing etherealize
//! callback; failures are collected here instead.

use crate::types::{ObjectId, PoaError};

/// One etherealize callback that failed during teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtherealizeFailure {
    /// Path of the adapter being torn down
    pub adapter: String,
    /// The object id being etherealized
    pub object_id: ObjectId,
    /// The error returned by the activator
    pub error: PoaError,
}

/// Outcome of a deactivate or destroy cascade
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Number of etherealize callbacks invoked
    pub etherealized: usize,
    /// Number of adapters destroyed
    pub adapters_destroyed: usize,
    /// Callbacks that failed
    pub failures: Vec<EtherealizeFailure>,
}

impl TeardownReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every callback succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: TeardownReport) {
        self.etherealized += other.etherealized;
        self.adapters_destroyed += other.adapters_destroyed;
        self.failures.extend(other.failures);
    }
}
