//! Portable Object Adapter runtime
//!
//! This crate maps opaque object ids to in-process servants under a set of
//! lifecycle and concurrency policies, organizes adapters into a tree, and
//! gates request admission through adapter managers. It sits between a
//! transport layer (which turns wire requests into object keys) and the
//! servants that implement operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Transport layer (not provided)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Orb                  │  RequestDispatcher │  Registry      │
//! │  - root adapter       │  - key → adapter   │  - RootPOA     │
//! │  - root manager       │  - admission       │  - named refs  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ObjectAdapter tree   │  AdapterManager    │  Servant mgrs  │
//! │  - PolicySet          │  - Holding/Active  │  - Activator   │
//! │  - active object map  │  - Discarding      │  - Locator     │
//! │  - children           │  - Inactive        │  - AdapterAct. │
//! ├─────────────────────────────────────────────────────────────┤
//! │                Servants (user implementations)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! - **Servant**: the object that actually executes operations
//! - **Object id**: opaque bytes naming an object within one adapter
//! - **Object key**: adapter path + incarnation stamp + object id
//! - **Policy set**: the seven policies fixed at adapter creation
//! - **Adapter manager**: admission state shared by a group of adapters
//!
//! # Modules
//!
//! - [`types`]: Identifiers, policies, references and errors
//! - [`servant`]: The servant trait and identity-compared handles
//! - [`adapter`]: Object adapters, servant directories and servant managers
//! - [`manager`]: Adapter manager state machine
//! - [`registry`]: Initial reference registry
//! - [`dispatch`]: Inbound request dispatch

pub mod types;
pub mod servant;
pub mod adapter;
pub mod manager;
pub mod registry;
pub mod dispatch;

mod orb;

// Re-export main types and the broker API
pub use types::{
    PoaError, Result, ErrorKind,
    ObjectId, ObjectKey, ObjectReference, AdapterStamp,
    Policy, PolicyKind, PolicySet,
};
pub use servant::{CallFuture, CallResult, Servant, ServantHandle};
pub use adapter::{
    AdapterActivator, ObjectAdapter, ServantActivator, ServantLocator, ServantManager,
    TeardownReport,
};
pub use manager::{AdapterManager, ManagerState};
pub use registry::{InitialReference, InitialReferences};
pub use dispatch::RequestDispatcher;
pub use orb::{Orb, OrbConfig};

/// Name of the root adapter
pub const ROOT_ADAPTER_NAME: &str = types::initial_reference::ROOT_POA;

/// Default hold-queue capacity of adapter managers
pub const DEFAULT_HOLD_CAPACITY: usize = manager::DEFAULT_HOLD_CAPACITY;
