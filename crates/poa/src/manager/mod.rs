//! Adapter managers
//!
//! Bulk lifecycle and admission control for groups of adapters.

mod adapter_manager;

pub use adapter_manager::{AdapterManager, ManagerState, DEFAULT_HOLD_CAPACITY};
