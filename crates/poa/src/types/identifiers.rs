//! Object adapter identifier types
//!
//! - ObjectId: opaque per-adapter object identifier
//! - AdapterStamp: incarnation stamp of a transient adapter
//! - ObjectKey: adapter path plus object id, as seen by the transport

use bytes::Bytes;
use std::fmt;

/// Object Identifier
///
/// An opaque byte sequence, unique only within the namespace of the
/// adapter that activated it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId(Bytes);

impl ObjectId {
    /// Size of a system-generated object id in bytes
    pub const SYSTEM_ID_SIZE: usize = 16;

    /// Create an object id from raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Generate a random system-assigned object id
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        Self(Bytes::copy_from_slice(uuid.as_bytes()))
    }

    /// Raw bytes of this id
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the id has no bytes (never valid for activation)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn is_printable(&self) -> bool {
        self.0.iter().all(|b| b.is_ascii_graphic())
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<Vec<u8>> for ObjectId {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<&[u8]> for ObjectId {
    fn from(v: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(v))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_empty() && self.is_printable() {
            // Checked above: every byte is printable ASCII
            for &b in self.0.iter() {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            for b in self.0.iter() {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

/// Incarnation stamp of a transient adapter
///
/// Embedded in object keys issued by transient adapters so that keys
/// outlive neither the adapter nor a re-created adapter of the same name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AdapterStamp(pub u64);

impl AdapterStamp {
    /// Generate a random stamp
    pub fn generate() -> Self {
        let bits = uuid::Uuid::new_v4().as_u128();
        Self((bits >> 64) as u64 ^ bits as u64)
    }
}

impl fmt::Debug for AdapterStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdapterStamp({:016x})", self.0)
    }
}

impl fmt::Display for AdapterStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Key naming one object: the path of adapter names below the root
/// adapter, the adapter stamp (transient adapters only) and the object id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Adapter names from the root (exclusive) down to the target adapter
    pub adapter_path: Vec<String>,
    /// Stamp of the issuing adapter, `None` for persistent adapters
    pub stamp: Option<AdapterStamp>,
    /// Object id within the target adapter
    pub object_id: ObjectId,
}

impl ObjectKey {
    /// Create a new object key
    pub fn new(adapter_path: Vec<String>, stamp: Option<AdapterStamp>, object_id: ObjectId) -> Self {
        Self {
            adapter_path,
            stamp,
            object_id,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.adapter_path.is_empty() {
            write!(f, "/")?;
        }
        for name in &self.adapter_path {
            write!(f, "/{}", name)?;
        }
        if let Some(stamp) = self.stamp {
            write!(f, "@{}", stamp)?;
        }
        write!(f, "#{}", self.object_id)
    }
}
