//! Adapter policies
//!
//! Each policy kind has its own closed enum; a [`Policy`] is one tagged
//! value and a [`PolicySet`] holds the resolved value of every kind.
//! Policy sets are immutable once an adapter has been created with them.

use std::fmt;
use super::error::{PoaError, Result};

/// Threading model for requests dispatched to one adapter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreadPolicy {
    /// Requests run concurrently on the broker's workers
    OrbCtrl,
    /// Requests are serialized per adapter
    SingleThread,
    /// Requests are serialized per adapter (no dedicated main thread here)
    MainThread,
}

/// Lifespan of object references issued by the adapter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifespanPolicy {
    /// References die with the adapter incarnation that issued them
    Transient,
    /// References outlive the adapter incarnation
    Persistent,
}

/// Whether a servant may be bound to several object ids
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdUniquenessPolicy {
    UniqueId,
    MultipleId,
}

/// Who assigns object ids
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdAssignmentPolicy {
    UserId,
    SystemId,
}

/// Whether unbound servants are activated on demand by `servant_to_id`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImplicitActivationPolicy {
    ImplicitActivation,
    NoImplicitActivation,
}

/// Whether resolved servants are kept in the active object map
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServantRetentionPolicy {
    Retain,
    NonRetain,
}

/// How a request finds its servant once the active object map misses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestProcessingPolicy {
    UseActiveObjectMapOnly,
    UseDefaultServant,
    UseServantManager,
}

/// Policy kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Thread,
    Lifespan,
    IdUniqueness,
    IdAssignment,
    ImplicitActivation,
    ServantRetention,
    RequestProcessing,
}

impl PolicyKind {
    /// All policy kinds
    pub const ALL: [PolicyKind; 7] = [
        PolicyKind::Thread,
        PolicyKind::Lifespan,
        PolicyKind::IdUniqueness,
        PolicyKind::IdAssignment,
        PolicyKind::ImplicitActivation,
        PolicyKind::ServantRetention,
        PolicyKind::RequestProcessing,
    ];
}

/// One policy value, tagged with its kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Policy {
    Thread(ThreadPolicy),
    Lifespan(LifespanPolicy),
    IdUniqueness(IdUniquenessPolicy),
    IdAssignment(IdAssignmentPolicy),
    ImplicitActivation(ImplicitActivationPolicy),
    ServantRetention(ServantRetentionPolicy),
    RequestProcessing(RequestProcessingPolicy),
}

impl Policy {
    /// The kind of this policy
    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::Thread(_) => PolicyKind::Thread,
            Policy::Lifespan(_) => PolicyKind::Lifespan,
            Policy::IdUniqueness(_) => PolicyKind::IdUniqueness,
            Policy::IdAssignment(_) => PolicyKind::IdAssignment,
            Policy::ImplicitActivation(_) => PolicyKind::ImplicitActivation,
            Policy::ServantRetention(_) => PolicyKind::ServantRetention,
            Policy::RequestProcessing(_) => PolicyKind::RequestProcessing,
        }
    }
}

/// Resolved policies of one adapter
///
/// One field per kind, so reading a policy on the request path is a
/// plain field access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PolicySet {
    pub thread: ThreadPolicy,
    pub lifespan: LifespanPolicy,
    pub id_uniqueness: IdUniquenessPolicy,
    pub id_assignment: IdAssignmentPolicy,
    pub implicit_activation: ImplicitActivationPolicy,
    pub servant_retention: ServantRetentionPolicy,
    pub request_processing: RequestProcessingPolicy,
}

impl PolicySet {
    /// Policies of the root adapter
    ///
    /// Same as [`PolicySet::default`] except that implicit activation is on.
    pub fn root() -> Self {
        Self {
            implicit_activation: ImplicitActivationPolicy::ImplicitActivation,
            ..Self::default()
        }
    }

    /// Replace one policy value
    pub fn with(mut self, policy: Policy) -> Self {
        match policy {
            Policy::Thread(v) => self.thread = v,
            Policy::Lifespan(v) => self.lifespan = v,
            Policy::IdUniqueness(v) => self.id_uniqueness = v,
            Policy::IdAssignment(v) => self.id_assignment = v,
            Policy::ImplicitActivation(v) => self.implicit_activation = v,
            Policy::ServantRetention(v) => self.servant_retention = v,
            Policy::RequestProcessing(v) => self.request_processing = v,
        }
        self
    }

    /// Apply overrides on top of this set and validate the result
    ///
    /// Kinds not named in `overrides` keep their current value. Naming the
    /// same kind twice is rejected.
    pub fn with_overrides(self, overrides: &[Policy]) -> Result<Self> {
        let mut set = self;
        for (index, policy) in overrides.iter().enumerate() {
            if overrides[..index].iter().any(|p| p.kind() == policy.kind()) {
                return Err(PoaError::InvalidPolicy {
                    index,
                    reason: format!("{:?} given more than once", policy.kind()),
                });
            }
            set = set.with(*policy);
        }
        set.validate_against(overrides)?;
        Ok(set)
    }

    /// Look up the value of one kind
    pub fn get(&self, kind: PolicyKind) -> Policy {
        match kind {
            PolicyKind::Thread => Policy::Thread(self.thread),
            PolicyKind::Lifespan => Policy::Lifespan(self.lifespan),
            PolicyKind::IdUniqueness => Policy::IdUniqueness(self.id_uniqueness),
            PolicyKind::IdAssignment => Policy::IdAssignment(self.id_assignment),
            PolicyKind::ImplicitActivation => Policy::ImplicitActivation(self.implicit_activation),
            PolicyKind::ServantRetention => Policy::ServantRetention(self.servant_retention),
            PolicyKind::RequestProcessing => Policy::RequestProcessing(self.request_processing),
        }
    }

    /// All values, in [`PolicyKind::ALL`] order
    pub fn to_vec(&self) -> Vec<Policy> {
        PolicyKind::ALL.iter().map(|k| self.get(*k)).collect()
    }

    /// Check that the combination is consistent
    pub fn validate(&self) -> Result<()> {
        self.validate_against(&[])
    }

    /// Validate, blaming the offending override when there is one
    fn validate_against(&self, overrides: &[Policy]) -> Result<()> {
        let blame = |kind: PolicyKind, reason: &str| {
            let index = overrides
                .iter()
                .position(|p| p.kind() == kind)
                .unwrap_or(0);
            Err(PoaError::InvalidPolicy {
                index,
                reason: reason.to_string(),
            })
        };

        if self.implicit_activation == ImplicitActivationPolicy::ImplicitActivation {
            if self.id_assignment != IdAssignmentPolicy::SystemId {
                return blame(
                    PolicyKind::ImplicitActivation,
                    "IMPLICIT_ACTIVATION requires SYSTEM_ID",
                );
            }
            if !self.retains() {
                return blame(
                    PolicyKind::ImplicitActivation,
                    "IMPLICIT_ACTIVATION requires RETAIN",
                );
            }
        }

        match self.request_processing {
            RequestProcessingPolicy::UseActiveObjectMapOnly if !self.retains() => blame(
                PolicyKind::RequestProcessing,
                "USE_ACTIVE_OBJECT_MAP_ONLY requires RETAIN",
            ),
            RequestProcessingPolicy::UseDefaultServant
                if self.id_uniqueness != IdUniquenessPolicy::MultipleId =>
            {
                blame(
                    PolicyKind::RequestProcessing,
                    "USE_DEFAULT_SERVANT requires MULTIPLE_ID",
                )
            }
            _ => Ok(()),
        }
    }

    /// ServantRetention = Retain
    pub fn retains(&self) -> bool {
        self.servant_retention == ServantRetentionPolicy::Retain
    }

    /// IdAssignment = SystemId
    pub fn system_ids(&self) -> bool {
        self.id_assignment == IdAssignmentPolicy::SystemId
    }

    /// IdUniqueness = UniqueId
    pub fn unique_ids(&self) -> bool {
        self.id_uniqueness == IdUniquenessPolicy::UniqueId
    }

    /// ImplicitActivation enabled
    pub fn implicit_activation(&self) -> bool {
        self.implicit_activation == ImplicitActivationPolicy::ImplicitActivation
    }

    /// Lifespan = Persistent
    pub fn is_persistent(&self) -> bool {
        self.lifespan == LifespanPolicy::Persistent
    }

    /// Whether requests to the adapter must be serialized
    pub fn serializes_requests(&self) -> bool {
        self.thread != ThreadPolicy::OrbCtrl
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            thread: ThreadPolicy::OrbCtrl,
            lifespan: LifespanPolicy::Transient,
            id_uniqueness: IdUniquenessPolicy::UniqueId,
            id_assignment: IdAssignmentPolicy::SystemId,
            implicit_activation: ImplicitActivationPolicy::NoImplicitActivation,
            servant_retention: ServantRetentionPolicy::Retain,
            request_processing: RequestProcessingPolicy::UseActiveObjectMapOnly,
        }
    }
}

impl fmt::Display for PolicySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}/{:?}/{:?}/{:?}/{:?}",
            self.thread,
            self.lifespan,
            self.id_uniqueness,
            self.id_assignment,
            self.implicit_activation,
            self.servant_retention,
            self.request_processing
        )
    }
}
