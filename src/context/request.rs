//! The thread-confined request scope.

use std::sync::Arc;

use crate::container::Resolution;
use crate::context::{Context, ContextCore};
use crate::contextual::{AnyArc, Contextual, ScopeKind};
use crate::creational::CreationalContext;
use crate::error::{ContextError, ContextResult};
use crate::store::{HashMapBeanStore, LockStore};

/// Request-scoped context: one logical request per thread, destroyed at
/// request end.
///
/// Thread-confined by convention, so creation skips locking unless the
/// context is constructed with `creation_lock_required` for callers that
/// share a request across workers.
pub struct RequestContext {
    core: ContextCore,
}

impl RequestContext {
    pub(crate) fn new(creation_lock_required: bool) -> Self {
        let locks = creation_lock_required.then(|| Arc::new(LockStore::new()));
        Self {
            core: ContextCore::new(ScopeKind::Request, locks),
        }
    }

    /// Attaches a fresh store and activates the context.
    pub(crate) fn activate(&self) -> ContextResult<()> {
        if self.core.is_active() {
            return Err(ContextError::IllegalState("request context already active"));
        }
        self.core.set_store(Some(Box::new(HashMapBeanStore::new())));
        self.core.set_active(true);
        Ok(())
    }

    /// Destroys all stored instances.
    pub(crate) fn invalidate(&self) -> ContextResult<()> {
        if !self.core.is_active() {
            return Err(ContextError::NotActive(ScopeKind::Request));
        }
        self.core.destroy_all()
    }

    /// Deactivates the context and drops the store.
    pub(crate) fn deactivate(&self) -> ContextResult<()> {
        if !self.core.is_active() {
            return Err(ContextError::IllegalState(
                "request context is not active",
            ));
        }
        self.core.set_active(false);
        self.core.set_store(None);
        Ok(())
    }

    /// Idempotent single-instance destroy, safe to race with request end.
    pub fn destroy_if_present(&self, contextual: &Arc<dyn Contextual>) {
        self.core.destroy_if_present(contextual);
    }
}

impl Context for RequestContext {
    fn scope(&self) -> ScopeKind {
        ScopeKind::Request
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
