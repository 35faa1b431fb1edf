//! Scope contexts: activation state plus a bean store per scope.
//!
//! Each context variant delegates the shared get-or-create/destroy logic to
//! [`ContextCore`], which enforces the not-active and missing-store error
//! semantics and the at-most-one-creation guarantee for multithreaded
//! scopes.

mod application;
mod conversation;
mod dependent;
mod request;
mod session;

pub use application::ApplicationContext;
pub use conversation::{
    ConversationContext, ConversationIdGenerator, ManagedConversation, Request, Session,
    DEFAULT_CONCURRENT_ACCESS_TIMEOUT_MS, DEFAULT_CONVERSATION_TIMEOUT_MS,
};
pub use dependent::DependentContext;
pub use request::RequestContext;
pub use session::SessionContext;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::container::Resolution;
use crate::contextual::{AnyArc, Contextual, ContextualInstance, ScopeKind};
use crate::creational::CreationalContext;
use crate::error::{ContextError, ContextResult};
use crate::store::{BeanStore, LockStore};

/// A scope context: get-or-create and destroy for one lifecycle policy.
///
/// `get` while the context is inactive fails with
/// [`ContextError::NotActive`]; a miss with a creational context creates
/// exactly once per identifier, even under concurrent callers when the scope
/// is multithreaded.
pub trait Context: Send + Sync {
    /// The scope this context manages.
    fn scope(&self) -> ScopeKind;

    /// Whether the context is currently active.
    fn is_active(&self) -> bool;

    /// Returns the existing instance for `contextual`, creating it when
    /// absent and a creational context is supplied. A miss without a
    /// creational context returns `None`.
    fn get(
        &self,
        contextual: &Arc<dyn Contextual>,
        creational: Option<&Arc<CreationalContext>>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<Option<AnyArc>>;

    /// Removes the instance for `contextual` and invokes its destroy
    /// callback. Fails when the context is inactive or has no backing store.
    fn destroy(&self, contextual: &Arc<dyn Contextual>) -> ContextResult<()>;
}

/// Shared state machine behind every context variant.
///
/// Holds the activation flag, the (swappable) backing store and the
/// creation-lock discipline. Thread-confined contexts skip locking; shared
/// contexts pass a [`LockStore`] so concurrent misses on one identifier
/// total-order a single creation.
pub(crate) struct ContextCore {
    scope: ScopeKind,
    active: AtomicBool,
    store: RwLock<Option<Box<dyn BeanStore>>>,
    locks: RwLock<Option<Arc<LockStore>>>,
}

impl ContextCore {
    pub(crate) fn new(scope: ScopeKind, locks: Option<Arc<LockStore>>) -> Self {
        Self {
            scope,
            active: AtomicBool::new(false),
            store: RwLock::new(None),
            locks: RwLock::new(locks),
        }
    }

    /// Swaps the creation-lock registry; bound multithreaded contexts pass
    /// the lock store of the storage they attach to.
    pub(crate) fn set_locks(&self, locks: Option<Arc<LockStore>>) {
        *self.locks.write() = locks;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub(crate) fn set_store(&self, store: Option<Box<dyn BeanStore>>) {
        *self.store.write() = store;
    }

    pub(crate) fn has_store(&self) -> bool {
        self.store.read().is_some()
    }

    /// Runs a closure against the backing store, if one is attached.
    pub(crate) fn with_store_mut<R>(
        &self,
        f: impl FnOnce(&mut dyn BeanStore) -> R,
    ) -> Option<R> {
        let mut guard = self.store.write();
        guard.as_mut().map(|store| f(store.as_mut()))
    }

    fn lookup(&self, contextual: &Arc<dyn Contextual>) -> Option<ContextualInstance> {
        self.store
            .read()
            .as_ref()
            .and_then(|store| store.get(contextual.id()))
    }

    /// The shared get-or-create path.
    pub(crate) fn get(
        &self,
        contextual: &Arc<dyn Contextual>,
        creational: Option<&Arc<CreationalContext>>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<Option<AnyArc>> {
        if !self.is_active() {
            return Err(ContextError::NotActive(self.scope));
        }
        if !self.has_store() {
            return Ok(None);
        }
        if let Some(existing) = self.lookup(contextual) {
            return Ok(Some(existing.instance().clone()));
        }
        let creational = match creational {
            Some(creational) => creational,
            None => return Ok(None),
        };

        // Multithreaded scopes hold the identifier's creation lock across
        // re-check, create and store, so every concurrent caller either sees
        // the created instance or is the single creator.
        let locks = self.locks.read().clone();
        let _creation_lock = locks.as_ref().map(|locks| locks.acquire(contextual.id()));
        if _creation_lock.is_some() {
            if let Some(existing) = self.lookup(contextual) {
                return Ok(Some(existing.instance().clone()));
            }
        }

        let instance = contextual.create(creational, resolution)?;
        let record = ContextualInstance::new(
            Arc::clone(contextual),
            instance.clone(),
            Arc::clone(creational),
        );
        self.with_store_mut(|store| store.put(contextual.id().clone(), record));
        Ok(Some(instance))
    }

    /// Removes and destroys a single instance. Missing store is an
    /// illegal-state error; an absent entry is a no-op.
    pub(crate) fn destroy_one(&self, contextual: &Arc<dyn Contextual>) -> ContextResult<()> {
        if !self.is_active() {
            return Err(ContextError::NotActive(self.scope));
        }
        let removed = self
            .with_store_mut(|store| store.remove(contextual.id()))
            .ok_or(ContextError::IllegalState("no backing store available"))?;
        if let Some(instance) = removed {
            debug!(contextual = %contextual.id(), scope = %self.scope, "contextual instance destroyed");
            instance.destroy();
        }
        Ok(())
    }

    /// Idempotent destroy variant safe to race with bulk cleanup paths.
    pub(crate) fn destroy_if_present(&self, contextual: &Arc<dyn Contextual>) {
        if !self.is_active() || !self.has_store() {
            return;
        }
        if let Some(Some(instance)) = self.with_store_mut(|store| store.remove(contextual.id())) {
            instance.destroy();
        }
    }

    /// Destroys every stored instance and clears the store.
    pub(crate) fn destroy_all(&self) -> ContextResult<()> {
        let records: Vec<ContextualInstance> = {
            let guard = self.store.read();
            let store = guard
                .as_ref()
                .ok_or(ContextError::IllegalState("no backing store available"))?;
            store
                .ids()
                .into_iter()
                .filter_map(|id| store.get(&id))
                .collect()
        };
        for record in records {
            record.destroy();
        }
        self.with_store_mut(|store| store.clear());
        debug!(scope = %self.scope, "context cleared");
        Ok(())
    }
}
