//! Object references
//!
//! A reference pairs an [`ObjectKey`] with the interface id of the object
//! it denotes. Encoding references for the wire is left to the transport.

use std::fmt;
use super::identifiers::{ObjectId, ObjectKey};

/// Reference to an object hosted by some adapter
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    key: ObjectKey,
    interface_id: String,
}

impl ObjectReference {
    /// Create a new reference
    pub fn new(key: ObjectKey, interface_id: impl Into<String>) -> Self {
        Self {
            key,
            interface_id: interface_id.into(),
        }
    }

    /// The object key
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// The object id within the issuing adapter
    pub fn object_id(&self) -> &ObjectId {
        &self.key.object_id
    }

    /// Interface (repository) id of the referenced object
    pub fn interface_id(&self) -> &str {
        &self.interface_id
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.key, self.interface_id)
    }
}
