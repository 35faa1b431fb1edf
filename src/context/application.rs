//! The shared application scope.

use std::sync::Arc;

use crate::container::Resolution;
use crate::context::{Context, ContextCore};
use crate::contextual::{AnyArc, Contextual, ScopeKind};
use crate::creational::CreationalContext;
use crate::error::{ContextError, ContextResult};
use crate::store::{HashMapBeanStore, LockStore};

/// Application-scoped context: one shared store for the container lifetime,
/// explicitly multithreaded.
///
/// Concurrent misses on the same identifier are serialized through a
/// per-identifier creation lock, so exactly one `create` call happens no
/// matter how many threads race the first resolution.
pub struct ApplicationContext {
    core: ContextCore,
}

impl ApplicationContext {
    pub(crate) fn new() -> Self {
        let core = ContextCore::new(ScopeKind::Application, Some(Arc::new(LockStore::new())));
        core.set_store(Some(Box::new(HashMapBeanStore::new())));
        Self { core }
    }

    /// Activates the context. Fails when already active.
    pub(crate) fn activate(&self) -> ContextResult<()> {
        if self.core.is_active() {
            return Err(ContextError::IllegalState("application context already active"));
        }
        self.core.set_active(true);
        Ok(())
    }

    /// Destroys every stored instance and deactivates the context.
    pub(crate) fn invalidate(&self) -> ContextResult<()> {
        if !self.core.is_active() {
            return Err(ContextError::IllegalState(
                "application context is not active",
            ));
        }
        self.core.destroy_all()?;
        self.core.set_active(false);
        Ok(())
    }

    /// Idempotent single-instance destroy, safe to race with shutdown.
    pub fn destroy_if_present(&self, contextual: &Arc<dyn Contextual>) {
        self.core.destroy_if_present(contextual);
    }
}

impl Context for ApplicationContext {
    fn scope(&self) -> ScopeKind {
        ScopeKind::Application
    }

    fn is_active(&self) -> bool {
        self.core.is_active()
    }

    fn get(
        &self,
        contextual: &Arc<dyn Contextual>,
        creational: Option<&Arc<CreationalContext>>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<Option<AnyArc>> {
        self.core.get(contextual, creational, resolution)
    }

    fn destroy(&self, contextual: &Arc<dyn Contextual>) -> ContextResult<()> {
        self.core.destroy_one(contextual)
    }
}
