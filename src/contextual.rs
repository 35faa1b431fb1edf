//! Contextual component descriptions and managed instance records.
//!
//! A [`Contextual`] describes something instantiable and destroyable by
//! identity. Scope contexts store the created instances as
//! [`ContextualInstance`] records, pairing each instance with its owning
//! contextual and the creational context that produced it.

use std::fmt;
use std::sync::Arc;

use crate::container::Resolution;
use crate::creational::CreationalContext;
use crate::error::ContextResult;
use crate::injection::QualifierSet;
use crate::key::TypeKey;

/// Type-erased shared instance handle used for storage.
pub type AnyArc = Arc<dyn std::any::Any + Send + Sync>;

/// Lifecycle policy grouping contextual instances.
///
/// Each scope defines a common activation/deactivation boundary for the
/// instances it holds:
///
/// - **Application**: shared across all threads for the container lifetime
/// - **Session**: bound to a session attribute map, survives requests
/// - **Request**: thread-confined, destroyed at request end
/// - **Conversation**: request-backed, promotable to span multiple requests
/// - **Dependent**: no storage; instances live and die with their owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Single shared store for the whole container, multithreaded access.
    Application,
    /// Bound to a session attribute map, reattached across requests.
    Session,
    /// One logical request per thread, destroyed at request end.
    Request,
    /// Long-running conversational state propagated via a `cid` identifier.
    Conversation,
    /// Pseudo-scope: instances are registered with their owner's creational
    /// context and destroyed together with it.
    Dependent,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeKind::Application => "application",
            ScopeKind::Session => "session",
            ScopeKind::Request => "request",
            ScopeKind::Conversation => "conversation",
            ScopeKind::Dependent => "dependent",
        };
        f.write_str(name)
    }
}

/// Stable, opaque identifier of a contextual type.
///
/// Identifiers must be derivable deterministically and stay stable across a
/// process run; they key every bean store lookup. Two lookups with equal
/// identifiers within the same active scope instance return the same
/// instance until it is destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextualId(Arc<str>);

impl ContextualId {
    /// Creates an identifier from a stable string key.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextualId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Description of something instantiable/destroyable by identity.
///
/// This is the narrow contract the runtime needs from the (external)
/// component-metadata layer: a stable identifier, a factory and a destroy
/// callback. Factories receive the creational context for dependent
/// bookkeeping and a [`Resolution`] handle for resolving their own
/// dependencies.
pub trait Contextual: Send + Sync {
    /// The stable identifier of this contextual.
    fn id(&self) -> &ContextualId;

    /// Creates a new instance, resolving dependencies through `resolution`.
    fn create(
        &self,
        ctx: &Arc<CreationalContext>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<AnyArc>;

    /// Destroys an instance previously returned by [`Contextual::create`].
    ///
    /// Implementations release the creational context after their own
    /// teardown so the dependent-instance cascade runs exactly once.
    fn destroy(&self, instance: &AnyArc, ctx: &Arc<CreationalContext>);
}

/// A created instance together with its owner and creation bookkeeping.
///
/// Entries of this shape are what bean stores hold. The owning scope context
/// exclusively owns the record; no other component mutates it.
#[derive(Clone)]
pub struct ContextualInstance {
    contextual: Arc<dyn Contextual>,
    instance: AnyArc,
    creational: Arc<CreationalContext>,
}

impl ContextualInstance {
    /// Bundles an instance with its contextual and creational context.
    pub fn new(
        contextual: Arc<dyn Contextual>,
        instance: AnyArc,
        creational: Arc<CreationalContext>,
    ) -> Self {
        Self {
            contextual,
            instance,
            creational,
        }
    }

    /// The owning contextual.
    pub fn contextual(&self) -> &Arc<dyn Contextual> {
        &self.contextual
    }

    /// The stored instance.
    pub fn instance(&self) -> &AnyArc {
        &self.instance
    }

    /// The creational context the instance was produced with.
    pub fn creational(&self) -> &Arc<CreationalContext> {
        &self.creational
    }

    /// Pointer identity of the stored instance, used to guarantee
    /// exactly-once destruction across overlapping cleanup paths.
    pub(crate) fn instance_ptr(&self) -> usize {
        Arc::as_ptr(&self.instance) as *const () as usize
    }

    /// Invokes the contextual's destroy callback for this instance.
    pub fn destroy(&self) {
        self.contextual.destroy(&self.instance, &self.creational);
    }
}

impl fmt::Debug for ContextualInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualInstance")
            .field("contextual", &self.contextual.id())
            .finish_non_exhaustive()
    }
}

/// Immutable bean attributes of a registered component.
///
/// Pre-computed by the metadata layer and consumed read-only by the runtime:
/// the exposed type closure, the qualifier set and the declared scope.
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    /// Stable identifier.
    pub id: ContextualId,
    /// Type keys this component satisfies.
    pub types: Vec<TypeKey>,
    /// Qualifiers declared on the component.
    pub qualifiers: QualifierSet,
    /// Declared scope.
    pub scope: ScopeKind,
}

impl ComponentDescriptor {
    /// Creates a descriptor exposing a single type with the given scope and
    /// qualifiers.
    pub fn new(
        id: impl Into<ContextualId>,
        ty: TypeKey,
        scope: ScopeKind,
        qualifiers: QualifierSet,
    ) -> Self {
        Self {
            id: id.into(),
            types: vec![ty],
            qualifiers,
            scope,
        }
    }

    /// Adds a further satisfied type.
    pub fn with_type(mut self, ty: TypeKey) -> Self {
        self.types.push(ty);
        self
    }

    /// Whether this component satisfies the requested type and qualifiers.
    ///
    /// A component carrying the `any` qualifier matches every requested
    /// qualifier set (built-in facades use this: their qualifiers constrain
    /// the type argument, not the facade component).
    pub fn satisfies(&self, ty: &TypeKey, qualifiers: &QualifierSet) -> bool {
        self.types.contains(ty)
            && (self.qualifiers.contains(&crate::injection::Qualifier::new("any"))
                || qualifiers.is_subset_of(&self.qualifiers))
    }
}

type CreateFn =
    dyn for<'a> Fn(&Arc<CreationalContext>, &Resolution<'a>) -> ContextResult<AnyArc> + Send + Sync;
type DestroyFn = dyn Fn(&AnyArc) + Send + Sync;

/// Closure-backed [`Contextual`] implementation.
///
/// This is the standard way components are registered: a factory closure
/// producing the instance and an optional destroy callback. The destroy path
/// releases the creational context after the callback, cascading dependent
/// destruction.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use contextual_di::{Component, Contextual};
///
/// struct Clock;
///
/// let component = Component::new("app.clock", |_, _| Ok(Arc::new(Clock)));
/// assert_eq!(component.id().as_str(), "app.clock");
/// ```
pub struct Component {
    id: ContextualId,
    create: Box<CreateFn>,
    destroy: Option<Box<DestroyFn>>,
}

impl Component {
    /// Creates a component from a typed factory closure.
    pub fn new<T, F>(id: impl Into<ContextualId>, create: F) -> Self
    where
        T: Send + Sync + 'static,
        F: for<'a> Fn(&Arc<CreationalContext>, &Resolution<'a>) -> ContextResult<Arc<T>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: id.into(),
            create: Box::new(move |ctx, resolution| {
                create(ctx, resolution).map(|instance| instance as AnyArc)
            }),
            destroy: None,
        }
    }

    /// Attaches a destroy callback invoked before the creational release.
    pub fn with_destroy<T, F>(mut self, destroy: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        self.destroy = Some(Box::new(move |instance| {
            if let Ok(typed) = instance.clone().downcast::<T>() {
                destroy(&typed);
            }
        }));
        self
    }
}

impl Contextual for Component {
    fn id(&self) -> &ContextualId {
        &self.id
    }

    fn create(
        &self,
        ctx: &Arc<CreationalContext>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<AnyArc> {
        (self.create)(ctx, resolution)
    }

    fn destroy(&self, instance: &AnyArc, ctx: &Arc<CreationalContext>) {
        if let Some(destroy) = &self.destroy {
            destroy(instance);
        }
        ctx.release();
    }
}

/// Downcasts a stored instance to a concrete type.
///
/// Helper for callers that resolved through the type-erased API.
pub fn downcast<T: Send + Sync + 'static>(instance: &AnyArc) -> Option<Arc<T>> {
    instance.clone().downcast::<T>().ok()
}
