//! Object adapter error types

use thiserror::Error;
use super::identifiers::ObjectId;

/// Result type for object adapter operations
pub type Result<T> = std::result::Result<T, PoaError>;

/// Object adapter errors
///
/// Every failure is returned synchronously to the immediate caller; the
/// adapter never retries or swallows them on the request path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoaError {
    /// A sibling adapter with this name already exists
    #[error("adapter already exists: {0}")]
    AdapterAlreadyExists(String),

    /// No adapter with this name (or the adapter has been destroyed)
    #[error("adapter does not exist: {0}")]
    AdapterNonExistent(String),

    /// The requested policy combination is inconsistent
    #[error("invalid policy at index {index}: {reason}")]
    InvalidPolicy { index: usize, reason: String },

    /// No servant is associated with the request or servant
    #[error("no servant")]
    NoServant,

    /// The object id is not bound to a servant
    #[error("object not active: {0}")]
    ObjectNotActive(ObjectId),

    /// The servant is already bound under a unique-id policy
    #[error("servant already active")]
    ServantAlreadyActive,

    /// The reference was not created by this adapter
    #[error("wrong adapter: reference belongs to {0}")]
    WrongAdapter(String),

    /// The operation is not permitted by the adapter's policies
    #[error("wrong policy: {0}")]
    WrongPolicy(String),

    /// The object id is already bound
    #[error("object already active: {0}")]
    ObjectAlreadyActive(ObjectId),

    /// The object id is malformed (e.g. empty)
    #[error("invalid object id")]
    InvalidObjectId,

    /// The adapter (or its manager) is not accepting requests
    #[error("adapter inactive: {0}")]
    AdapterInactive(String),

    /// The request was rejected but may succeed if retried later
    #[error("transient failure: {0}")]
    Transient(String),

    /// The reference names an object that no longer exists
    #[error("object does not exist: {0}")]
    ObjectNotExist(String),

    /// The operation is not valid in the current state
    #[error("bad invocation order: {0}")]
    BadInvOrder(String),

    /// Unknown initial reference name
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// An initial reference is already registered under this name
    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    /// A servant manager callback failed
    #[error("servant manager failure: {0}")]
    ServantManager(String),

    /// The servant itself failed while handling an operation
    #[error("servant failure: {0}")]
    Servant(String),
}

/// Broad classification of [`PoaError`] values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Misuse of the adapter tree API
    Structural,
    /// Configuration mismatch
    Policy,
    /// Data-dependent identity conflicts, expected in normal operation
    Identity,
    /// The adapter cannot service the request under its current configuration
    Capability,
    /// Admission was refused for now
    Transient,
    /// Raised by application code (servants, servant managers)
    Application,
}

impl PoaError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoaError::AdapterAlreadyExists(_)
            | PoaError::AdapterNonExistent(_)
            | PoaError::BadInvOrder(_)
            | PoaError::InvalidName(_)
            | PoaError::AlreadyRegistered(_) => ErrorKind::Structural,
            PoaError::InvalidPolicy { .. } | PoaError::WrongPolicy(_) => ErrorKind::Policy,
            PoaError::InvalidObjectId
            | PoaError::ObjectAlreadyActive(_)
            | PoaError::ServantAlreadyActive
            | PoaError::ObjectNotActive(_)
            | PoaError::ObjectNotExist(_) => ErrorKind::Identity,
            PoaError::NoServant | PoaError::WrongAdapter(_) | PoaError::AdapterInactive(_) => {
                ErrorKind::Capability
            }
            PoaError::Transient(_) => ErrorKind::Transient,
            PoaError::ServantManager(_) | PoaError::Servant(_) => ErrorKind::Application,
        }
    }

    /// Whether the caller may reasonably retry the same call later
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::Identity)
    }
}
