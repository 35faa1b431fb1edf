//! The dependent pseudo-scope.

use std::sync::Arc;

use crate::container::Resolution;
use crate::context::Context;
use crate::contextual::{AnyArc, Contextual, ContextualInstance, ScopeKind};
use crate::creational::CreationalContext;
use crate::error::{ContextError, ContextResult};

/// Dependent pseudo-context: nothing is stored, every `get` with a
/// creational context produces a fresh instance registered with its owner's
/// creational context, so the whole graph is destroyed together when the
/// owner is released.
pub struct DependentContext;

impl DependentContext {
    pub(crate) fn new() -> Self {
        Self
    }
}

impl Context for DependentContext {
    fn scope(&self) -> ScopeKind {
        ScopeKind::Dependent
    }

    fn is_active(&self) -> bool {
        true
    }

    fn get(
        &self,
        contextual: &Arc<dyn Contextual>,
        creational: Option<&Arc<CreationalContext>>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<Option<AnyArc>> {
        let creational = match creational {
            Some(creational) => creational,
            None => return Ok(None),
        };
        let instance = contextual.create(creational, resolution)?;
        creational.add_dependent(ContextualInstance::new(
            Arc::clone(contextual),
            instance.clone(),
            Arc::clone(creational),
        ));
        Ok(Some(instance))
    }

    fn destroy(&self, _contextual: &Arc<dyn Contextual>) -> ContextResult<()> {
        // Dependent instances are destroyed through their owner's creational
        // release, never individually by identifier.
        Err(ContextError::IllegalState(
            "dependent instances are destroyed via their creational context",
        ))
    }
}
