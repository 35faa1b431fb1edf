//! The `Instance` facade: programmatic, narrowable typed lookup.

use std::fmt;
use std::sync::Arc;

use crate::container::{Container, Resolution};
use crate::contextual::AnyArc;
use crate::error::ContextResult;
use crate::injection::{Qualifier, QualifierSet};
use crate::key::TypeKey;

/// A call-site-parameterized handle for programmatic typed resolution.
///
/// An `InstanceHandle` captures the type and qualifiers of the injection
/// point that requested it. Re-selection returns a *new* facade narrowing
/// the request; the original is never mutated. Equality and hashing are
/// structural over `(resolved type, qualifiers)`, so two facades requesting
/// the same effective type and qualifiers compare equal regardless of how
/// they were obtained.
#[derive(Clone)]
pub struct InstanceHandle {
    container: Container,
    ty: TypeKey,
    qualifiers: QualifierSet,
}

impl InstanceHandle {
    pub(crate) fn new(container: Container, ty: TypeKey, qualifiers: QualifierSet) -> Self {
        Self {
            container,
            ty,
            qualifiers,
        }
    }

    /// The requested type.
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    /// The requested qualifiers.
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// Returns a new facade for type `T`, keeping this facade's qualifiers.
    pub fn select<T: 'static>(&self) -> InstanceHandle {
        InstanceHandle {
            container: self.container.clone(),
            ty: TypeKey::of::<T>(),
            qualifiers: self.qualifiers.clone(),
        }
    }

    /// Returns a new facade with an additional qualifier.
    pub fn select_qualifier(&self, qualifier: Qualifier) -> InstanceHandle {
        InstanceHandle {
            container: self.container.clone(),
            ty: self.ty,
            qualifiers: self.qualifiers.clone().with(qualifier),
        }
    }

    /// Returns a new facade for type `T` with merged qualifiers.
    pub fn select_with<T: 'static>(&self, qualifiers: &QualifierSet) -> InstanceHandle {
        InstanceHandle {
            container: self.container.clone(),
            ty: TypeKey::of::<T>(),
            qualifiers: self.qualifiers.merged_with(qualifiers),
        }
    }

    /// Whether no component satisfies the request.
    pub fn is_unsatisfied(&self) -> bool {
        self.container.candidates(&self.ty, &self.qualifiers).is_empty()
    }

    /// Whether more than one component satisfies the request.
    pub fn is_ambiguous(&self) -> bool {
        self.container.candidates(&self.ty, &self.qualifiers).len() > 1
    }

    /// Resolves the contextual instance for the captured request against the
    /// currently active contexts.
    pub fn get(&self, resolution: &Resolution<'_>) -> ContextResult<AnyArc> {
        resolution.resolve_by_type(self.ty, &self.qualifiers)
    }

    /// Resolves and downcasts to the requested concrete type.
    pub fn get_as<T: Send + Sync + 'static>(
        &self,
        resolution: &Resolution<'_>,
    ) -> ContextResult<Arc<T>> {
        let instance = self.get(resolution)?;
        instance
            .downcast::<T>()
            .map_err(|_| crate::error::ContextError::UnsatisfiedDependency {
                ty: std::any::type_name::<T>(),
                qualifiers: self.qualifiers.render(),
            })
    }
}

impl PartialEq for InstanceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.qualifiers == other.qualifiers
    }
}

impl Eq for InstanceHandle {}

impl std::hash::Hash for InstanceHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        self.qualifiers.hash(state);
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("ty", &self.ty.name())
            .field("qualifiers", &self.qualifiers)
            .finish()
    }
}
