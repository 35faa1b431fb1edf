//! The session scope, bound to a session attribute map.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::container::Resolution;
use crate::context::conversation::Session;
use crate::context::{Context, ContextCore};
use crate::contextual::{AnyArc, Contextual, ScopeKind};
use crate::creational::CreationalContext;
use crate::error::{ContextError, ContextResult};
use crate::store::{AttributeBeanStore, BeanStore, NamingScheme};

const SESSION_STORE_PREFIX: &str = "contextual.session";

/// Session-scoped context bound to a [`Session`] attribute map.
///
/// Instances are written through to the session attributes under a
/// naming-scheme prefix, so they survive between requests and can be
/// reattached by the next request bound to the same session. The scope is
/// multithreaded: concurrent requests of one session share the session's
/// creation-lock registry.
pub struct SessionContext {
    core: ContextCore,
    session: Mutex<Option<Arc<Session>>>,
}

impl SessionContext {
    pub(crate) fn new() -> Self {
        Self {
            core: ContextCore::new(ScopeKind::Session, None),
            session: Mutex::new(None),
        }
    }

    /// Binds the context to a session, attaching a write-through store over
    /// its attributes. Returns `false` when already associated.
    pub(crate) fn associate(&self, session: Arc<Session>) -> bool {
        let mut current = self.session.lock();
        if current.is_some() {
            return false;
        }
        let mut store = AttributeBeanStore::new(
            Arc::new(NamingScheme::new(SESSION_STORE_PREFIX)),
            Arc::clone(&session) as _,
        );
        store.attach();
        self.core.set_store(Some(Box::new(store)));
        self.core.set_locks(Some(session.creation_locks()));
        *current = Some(session);
        true
    }

    /// Unbinds the context from its session. Returns `false` when not
    /// associated.
    pub(crate) fn dissociate(&self) -> bool {
        let mut current = self.session.lock();
        if current.is_none() {
            return false;
        }
        self.core.set_store(None);
        self.core.set_locks(None);
        *current = None;
        true
    }

    pub(crate) fn activate(&self) -> ContextResult<()> {
        if self.session.lock().is_none() {
            return Err(ContextError::IllegalState(
                "must associate a session before activating the session context",
            ));
        }
        if self.core.is_active() {
            return Err(ContextError::IllegalState("session context already active"));
        }
        self.core.set_active(true);
        Ok(())
    }

    pub(crate) fn deactivate(&self) -> ContextResult<()> {
        if !self.core.is_active() {
            return Err(ContextError::IllegalState(
                "session context is not active",
            ));
        }
        self.core.set_active(false);
        Ok(())
    }

    /// Destroys every session-scoped instance held by `session`.
    ///
    /// Used at session end, outside any request: the context temporarily
    /// attaches the session's store, destroys all instances, then restores
    /// its previous association.
    pub(crate) fn destroy_session(&self, session: &Arc<Session>) -> ContextResult<()> {
        let previously_active = self.core.is_active();
        let mut store = AttributeBeanStore::new(
            Arc::new(NamingScheme::new(SESSION_STORE_PREFIX)),
            Arc::clone(session) as _,
        );
        store.attach();
        self.core.set_store(Some(Box::new(store)));
        self.core.set_active(true);
        let result = self.core.destroy_all();
        self.core.set_active(previously_active);
        self.core.set_store(None);
        result
    }

    /// Idempotent single-instance destroy, safe to race with session end.
    pub fn destroy_if_present(&self, contextual: &Arc<dyn Contextual>) {
        self.core.destroy_if_present(contextual);
    }
}

impl Context for SessionContext {
    fn scope(&self) -> ScopeKind {
        ScopeKind::Session
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
