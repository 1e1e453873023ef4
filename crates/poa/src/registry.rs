//! Initial reference registry
//!
//! Per-broker table of well-known names (`RootPOA`, `RootPOAManager`, ...)
//! resolved by bootstrap code. Names are registered once and never rebound.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::debug;
use crate::adapter::ObjectAdapter;
use crate::manager::AdapterManager;
use crate::types::{ObjectReference, PoaError, Result};

/// Something registered under a well-known name
#[derive(Clone)]
pub enum InitialReference {
    Adapter(Arc<ObjectAdapter>),
    Manager(Arc<AdapterManager>),
    Object(ObjectReference),
}

impl InitialReference {
    /// The adapter, if this is one
    pub fn as_adapter(&self) -> Option<&Arc<ObjectAdapter>> {
        match self {
            InitialReference::Adapter(a) => Some(a),
            _ => None,
        }
    }

    /// The manager, if this is one
    pub fn as_manager(&self) -> Option<&Arc<AdapterManager>> {
        match self {
            InitialReference::Manager(m) => Some(m),
            _ => None,
        }
    }

    /// The object reference, if this is one
    pub fn as_object(&self) -> Option<&ObjectReference> {
        match self {
            InitialReference::Object(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Debug for InitialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialReference::Adapter(a) => write!(f, "Adapter({})", a.display_path()),
            InitialReference::Manager(m) => write!(f, "Manager({})", m),
            InitialReference::Object(r) => write!(f, "Object({})", r),
        }
    }
}

/// Create-once name table
#[derive(Debug, Default)]
pub struct InitialReferences {
    entries: RwLock<BTreeMap<String, InitialReference>>,
}

impl InitialReferences {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name; fails if it is empty or already taken
    pub fn register(&self, name: &str, reference: InitialReference) -> Result<()> {
        if name.is_empty() {
            return Err(PoaError::InvalidName(name.to_string()));
        }
        let mut entries = self.entries.write();
        if entries.contains_key(name) {
            return Err(PoaError::AlreadyRegistered(name.to_string()));
        }
        debug!("Registered initial reference {} as {:?}", name, reference);
        entries.insert(name.to_string(), reference);
        Ok(())
    }

    /// Look up a name
    pub fn resolve(&self, name: &str) -> Result<InitialReference> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PoaError::InvalidName(name.to_string()))
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}
