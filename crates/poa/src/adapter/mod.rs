//! Object adapters
//!
//! - Active object map: the per-adapter servant directory
//! - Servant managers: activators, locators and adapter activators
//! - ObjectAdapter: the adapter tree node and its operations
//! - Request tracking and per-call locator brackets

mod activation_gate;
mod active_object_map;
mod invocation;
mod object_adapter;
mod request_tracker;
mod servant_manager;
mod teardown;

pub use active_object_map::{ActiveObjectMap, RemovedEntry};
pub use invocation::Invocation;
pub use object_adapter::ObjectAdapter;
pub use request_tracker::{RequestGuard, RequestTracker};
pub use servant_manager::*;
pub use teardown::{EtherealizeFailure, TeardownReport};
