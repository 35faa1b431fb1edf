//! Error types for the contextual dependency injection runtime.

use thiserror::Error;

use crate::contextual::{ContextualId, ScopeKind};

/// Contextual dependency injection errors.
///
/// Represents the error conditions that can occur during contextual instance
/// resolution, scope lifecycle management, conversation handling and
/// interception. The taxonomy distinguishes fatal usage errors (not-active,
/// illegal-state, argument errors) from recoverable conversation conditions
/// (busy, nonexistent), which always leave a valid transient conversation
/// active for the caller.
///
/// # Examples
///
/// ```rust
/// use contextual_di::{ContextError, ScopeKind};
///
/// let err = ContextError::NotActive(ScopeKind::Request);
/// assert_eq!(err.to_string(), "context not active for scope: request");
/// ```
#[derive(Debug, Error)]
pub enum ContextError {
    /// Operation attempted on an inactive scope. Fatal to the caller, never
    /// retried internally.
    #[error("context not active for scope: {0}")]
    NotActive(ScopeKind),

    /// Programmer-usage error: missing backing store, deactivate before
    /// associate, re-activation of an active context, parameter access during
    /// a lifecycle interception.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// No component is registered under the given identifier.
    #[error("no component registered for identifier: {0}")]
    UnknownContextual(ContextualId),

    /// `set_parameters` was called with the wrong number of arguments.
    #[error("wrong number of parameters: method declares {expected}, attempting to set {actual}")]
    WrongParameterCount {
        /// Parameter count declared by the intercepted method.
        expected: usize,
        /// Parameter count of the replacement argument array.
        actual: usize,
    },

    /// A replacement argument is not assignable to the declared parameter
    /// type, even after widening and boxing/unboxing conversions.
    #[error("incompatible parameter type on position {position}: {actual} (expected type was {expected})")]
    IncompatibleParameter {
        /// Zero-based position of the offending parameter.
        position: usize,
        /// Declared parameter type.
        expected: String,
        /// Type of the supplied argument.
        actual: String,
    },

    /// The conversation lock could not be acquired within the concurrent
    /// access timeout. Recoverable: a fresh transient conversation is active
    /// when this is raised.
    #[error("conversation lock timed out for cid: {0}")]
    BusyConversation(String),

    /// No conversation with the given id exists (or it expired or ended
    /// concurrently). Recoverable: a fresh transient conversation is active
    /// when this is raised.
    #[error("no conversation found to restore for cid: {0}")]
    NonexistentConversation(String),

    /// Typed resolution found no matching component.
    #[error("no component satisfies type {ty} with qualifiers [{qualifiers}]")]
    UnsatisfiedDependency {
        /// Requested type name.
        ty: &'static str,
        /// Requested qualifier set, comma separated.
        qualifiers: String,
    },

    /// Typed resolution found more than one matching component.
    #[error("multiple components satisfy type {ty} with qualifiers [{qualifiers}]: {candidates:?}")]
    AmbiguousDependency {
        /// Requested type name.
        ty: &'static str,
        /// Requested qualifier set, comma separated.
        qualifiers: String,
        /// Identifiers of all matching components.
        candidates: Vec<ContextualId>,
    },

    /// A built-in facade was resolved while no injection point was active on
    /// the resolution stack.
    #[error("dynamic lookup of a built-in component requires an active injection point")]
    DynamicLookupOutsideInjectionPoint,

    /// A target method or interceptor failed. The original cause is carried
    /// as-is, not wrapped in reflection-style layers.
    #[error("invocation failed: {0}")]
    Invocation(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ContextError {
    /// Wraps an application-level failure raised by a target method or an
    /// interceptor.
    pub fn invocation<E>(cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ContextError::Invocation(Box::new(cause))
    }
}

/// Result type for contextual DI operations.
///
/// A convenience alias for `Result<T, ContextError>` used throughout the
/// crate, following the common Rust pattern of a crate-specific result type.
pub type ContextResult<T> = Result<T, ContextError>;
