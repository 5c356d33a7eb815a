use crate::Tier;
use downcast_rs::{impl_downcast, DowncastSync};
use std::{
    any::{Any, TypeId},
    borrow::Cow,
    error::Error,
    fmt::{Display, Formatter},
};
use thiserror::Error;

/// A reference-counted pointer holding a service.
///
/// Services are shared between concurrent flows, so the pointer is always an
/// [`Arc<T>`](std::sync::Arc).
pub type Svc<T> = std::sync::Arc<T>;

/// A service pointer holding an instance of `dyn Service`.
pub type DynSvc = Svc<dyn Service>;

/// Implemented automatically on types that are capable of being a service.
pub trait Service: DowncastSync {}
impl<T: ?Sized + DowncastSync> Service for T {}

impl_downcast!(sync Service);

/// A boxed error returned by fallible factories and release hooks.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// An error from a factory or release hook, shared by every request that
/// waited on the same activation.
pub type SharedError = Svc<dyn Error + Send + Sync + 'static>;

/// A result from attempting to inject dependencies into a service and
/// construct an instance of it.
pub type InjectResult<T> = Result<T, InjectError>;

/// Type information about a service.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ServiceInfo {
    id: TypeId,
    name: &'static str,
}

impl ServiceInfo {
    /// Creates a [`ServiceInfo`] for the given type.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        ServiceInfo {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Gets the [`TypeId`] for this service.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Gets the type name of this service.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// The identity used to look up a provider: a service type, optionally paired
/// with a qualifier label to tell apart several providers of the same type.
///
/// ```
/// use scoped_injector::ServiceKey;
///
/// struct Database;
///
/// let primary = ServiceKey::of::<Database>().with_qualifier("primary");
/// assert_ne!(primary, ServiceKey::of::<Database>());
/// assert_eq!(Some("primary"), primary.qualifier());
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct ServiceKey {
    service_info: ServiceInfo,
    qualifier: Option<Cow<'static, str>>,
}

impl ServiceKey {
    /// Creates an unqualified key for the given type.
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        ServiceKey {
            service_info: ServiceInfo::of::<T>(),
            qualifier: None,
        }
    }

    /// Replaces the qualifier of this key.
    #[must_use]
    pub fn with_qualifier(
        mut self,
        qualifier: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Type information about the keyed service.
    #[must_use]
    pub fn service_info(&self) -> ServiceInfo {
        self.service_info
    }

    /// The qualifier label, if any.
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}

impl Display for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(qualifier) => {
                write!(f, "{}[{:?}]", self.service_info.name(), qualifier)
            }
            None => f.write_str(self.service_info.name()),
        }
    }
}

/// Why a scope operation was rejected.
#[derive(Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum MisuseReason {
    /// The current task is not running inside a flow, so there is no scope
    /// stack to push to or pop from.
    NoFlow,

    /// A scope was exited while another scope entered after it was still
    /// active.
    OutOfOrder {
        /// The scope that was asked to exit.
        exiting: (Tier, u64),
        /// The innermost scope of the flow at that time.
        innermost: (Tier, u64),
    },

    /// The scope is not on the scope stack of the current flow.
    NotInFlow {
        /// The scope that was asked to exit.
        exiting: (Tier, u64),
    },

    /// A resolution needed a scope which has already exited.
    ScopeClosed {
        /// The exited scope.
        scope: (Tier, u64),
    },
}

impl Display for MisuseReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MisuseReason::NoFlow => {
                f.write_str("the current task is not running inside a flow")
            }
            MisuseReason::OutOfOrder {
                exiting: (tier, id),
                innermost: (innermost_tier, innermost_id),
            } => write!(
                f,
                "scope {tier}#{id} exited while {innermost_tier}#{innermost_id} is still active"
            ),
            MisuseReason::NotInFlow {
                exiting: (tier, id),
            } => write!(
                f,
                "scope {tier}#{id} is not active in the current flow"
            ),
            MisuseReason::ScopeClosed { scope: (tier, id) } => {
                write!(f, "scope {tier}#{id} has already exited")
            }
        }
    }
}

/// A release hook which failed while its scope was torn down.
#[derive(Clone, Debug)]
pub struct TeardownFailure {
    /// The service whose release hook failed.
    pub key: ServiceKey,
    /// The error returned by the hook.
    pub error: SharedError,
}

/// An error that has occurred during creation of a service or while managing
/// scopes.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum InjectError {
    /// No provider was found for the requested key in any reachable registry.
    #[error("{key} has no provider{}", fmt_required_by(.required_by))]
    NotRegistered {
        /// The service that was requested.
        key: ServiceKey,

        /// The service whose factory requested it, if any.
        required_by: Option<ServiceKey>,
    },

    /// A service depends on itself, directly or transitively.
    #[error(
        "a cycle was detected during activation of {key} [{}]",
        fmt_cycle(.cycle)
    )]
    CyclicDependency {
        /// The service that was requested.
        key: ServiceKey,

        /// The chain of services, starting and ending with the same key.
        cycle: Vec<ServiceKey>,
    },

    /// Scopes were used incorrectly by the caller.
    #[error("scope misuse: {reason}")]
    ScopeMisuse {
        /// What went wrong.
        reason: MisuseReason,
    },

    /// No scope is active and the request could not be satisfied by a
    /// process-wide singleton.
    #[error("{key} was requested outside of any active scope")]
    NoActiveScope {
        /// The service that was requested.
        key: ServiceKey,
    },

    /// The registered provider returned the wrong service type.
    #[error("the registered provider for {key} returned the wrong type")]
    InvalidProvider {
        /// The service that was requested.
        key: ServiceKey,
    },

    /// A factory failed while creating a service.
    #[error("an error occurred during activation of {key}")]
    ActivationFailed {
        /// The service that was requested.
        key: ServiceKey,

        /// The error returned by the factory.
        #[source]
        source: SharedError,
    },

    /// One or more release hooks failed. Every other hook still ran.
    #[error(
        "release hooks failed while closing {}: {}",
        fmt_owner(.tier),
        fmt_failures(.failures)
    )]
    TeardownFailed {
        /// The tier of the scope being closed, or `None` for process-wide
        /// singletons.
        tier: Option<Tier>,

        /// Each failed hook, in the order the hooks ran.
        failures: Vec<TeardownFailure>,
    },

    /// Injection has been turned off through the injector's configuration.
    #[error("dependency injection is disabled")]
    Disabled,
}

impl InjectError {
    pub(crate) fn misuse(reason: MisuseReason) -> Self {
        InjectError::ScopeMisuse { reason }
    }

    /// Attributes an error raised while activating `dependent`: a missing
    /// top-level dependency is marked as required by it, and a failed
    /// activation reports its full key including any qualifier.
    pub(crate) fn required_by(self, dependent: &ServiceKey) -> Self {
        match self {
            InjectError::NotRegistered {
                key,
                required_by: None,
            } => InjectError::NotRegistered {
                key,
                required_by: Some(dependent.clone()),
            },
            InjectError::ActivationFailed { key, source }
                if key.service_info() == dependent.service_info() =>
            {
                InjectError::ActivationFailed {
                    key: dependent.clone(),
                    source,
                }
            }
            error => error,
        }
    }
}

#[allow(clippy::ref_option)]
fn fmt_required_by(required_by: &Option<ServiceKey>) -> String {
    required_by
        .as_ref()
        .map(|dependent| format!(" (required by {dependent})"))
        .unwrap_or_default()
}

fn fmt_cycle(cycle: &[ServiceKey]) -> String {
    let mut joined = String::new();
    for item in cycle {
        if !joined.is_empty() {
            joined.push_str(" -> ");
        }
        joined.push_str(&item.to_string());
    }
    joined
}

#[allow(clippy::ref_option)]
fn fmt_owner(tier: &Option<Tier>) -> String {
    match tier {
        Some(tier) => format!("a {tier} scope"),
        None => "the injector".to_owned(),
    }
}

fn fmt_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.key, failure.error))
        .collect::<Vec<_>>()
        .join("; ")
}
