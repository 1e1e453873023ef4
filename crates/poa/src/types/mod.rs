//! Core object adapter types
//!
//! - Identifiers: ObjectId, AdapterStamp, ObjectKey
//! - Policies: the seven policy kinds and the resolved PolicySet
//! - Object references
//! - Errors

mod error;
mod identifiers;
mod policy;
mod reference;

pub use error::*;
pub use identifiers::{AdapterStamp, ObjectId, ObjectKey};
pub use policy::*;
pub use reference::ObjectReference;

/// Well-known initial reference names
pub mod initial_reference {
    /// The root adapter
    pub const ROOT_POA: &str = "RootPOA";
    /// The root adapter's manager
    pub const ROOT_POA_MANAGER: &str = "RootPOAManager";
}
