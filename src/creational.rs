//! Per-creation bookkeeping and the dependent-instance destruction cascade.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::contextual::{AnyArc, ContextualId, ContextualInstance};

/// Per-creation-request tree node tracking the object graph produced while
/// building one contextual instance.
///
/// A creational context serves two jobs:
///
/// - **Cycle breaking**: a factory may [`push_incomplete`] its half-built
///   instance so a circular dependency can fetch the partial reference via
///   [`incomplete_for`] instead of recursing forever. Children receive a
///   snapshot copy of the incomplete map, so sibling subtrees never observe
///   each other's half-built state.
/// - **Cascade destruction**: every dependent-scoped instance created while
///   producing the owner is registered with [`add_dependent`]; releasing the
///   owner's creational context destroys them all exactly once.
///
/// [`push_incomplete`]: CreationalContext::push_incomplete
/// [`incomplete_for`]: CreationalContext::incomplete_for
/// [`add_dependent`]: CreationalContext::add_dependent
///
/// # Destruction failure policy
///
/// Release is best-effort: a panicking destroy callback is caught and logged
/// and the remaining dependents are still destroyed. The first failure is not
/// re-raised.
pub struct CreationalContext {
    contextual_id: Option<ContextualId>,
    incomplete: Mutex<HashMap<ContextualId, AnyArc>>,
    /// Dependents registered *for* children of this node; released by us.
    own_dependents: Arc<Mutex<Vec<ContextualInstance>>>,
    /// The parent's dependent store; our own instance record goes there.
    parent_dependents: Arc<Mutex<Vec<ContextualInstance>>>,
    parent: Option<Arc<CreationalContext>>,
    destroyed: Mutex<HashSet<usize>>,
    released: AtomicBool,
}

impl CreationalContext {
    /// Creates the root creational context for a top-level resolution.
    pub fn root(contextual_id: impl Into<Option<ContextualId>>) -> Arc<Self> {
        Arc::new(Self {
            contextual_id: contextual_id.into(),
            incomplete: Mutex::new(HashMap::new()),
            own_dependents: Arc::new(Mutex::new(Vec::new())),
            parent_dependents: Arc::new(Mutex::new(Vec::new())),
            parent: None,
            destroyed: Mutex::new(HashSet::new()),
            released: AtomicBool::new(false),
        })
    }

    /// Creates the child context used to build a nested dependency.
    ///
    /// The child appends its dependents into this node's store (so the whole
    /// graph dies with its ultimate non-dependent owner) but starts from a
    /// snapshot of the incomplete-instances map.
    pub fn child(self: &Arc<Self>, contextual_id: ContextualId) -> Arc<CreationalContext> {
        Arc::new(CreationalContext {
            contextual_id: Some(contextual_id),
            incomplete: Mutex::new(self.incomplete.lock().clone()),
            own_dependents: Arc::new(Mutex::new(Vec::new())),
            parent_dependents: Arc::clone(&self.own_dependents),
            parent: Some(Arc::clone(self)),
            destroyed: Mutex::new(HashSet::new()),
            released: AtomicBool::new(false),
        })
    }

    /// The identifier of the contextual being created, if any.
    pub fn contextual_id(&self) -> Option<&ContextualId> {
        self.contextual_id.as_ref()
    }

    /// The parent creational context, or `None` for a root.
    pub fn parent(&self) -> Option<&Arc<CreationalContext>> {
        self.parent.as_ref()
    }

    /// Registers a not-yet-fully-constructed instance under this node's
    /// contextual key, enabling circular constructor injection.
    pub fn push_incomplete(&self, instance: AnyArc) {
        if let Some(id) = &self.contextual_id {
            self.incomplete.lock().insert(id.clone(), instance);
        }
    }

    /// Fetches a construction-in-progress instance registered for `id`.
    pub fn incomplete_for(&self, id: &ContextualId) -> Option<AnyArc> {
        self.incomplete.lock().get(id).cloned()
    }

    /// Appends a created dependent instance to the owner's store.
    ///
    /// Safe under concurrent appends: registration may race with the object's
    /// own method calls triggering further dependent creation.
    pub fn add_dependent(&self, instance: ContextualInstance) {
        self.parent_dependents.lock().push(instance);
    }

    /// Number of dependents this node would destroy on release.
    pub fn dependent_count(&self) -> usize {
        self.own_dependents.lock().len()
    }

    /// Destroys all registered dependent instances, each exactly once, then
    /// clears the incomplete-instances map. Idempotent: a second call is a
    /// safe no-op.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let dependents: Vec<ContextualInstance> = {
            let mut guard = self.own_dependents.lock();
            guard.drain(..).collect()
        };
        for dependent in dependents {
            if self.destroyed.lock().insert(dependent.instance_ptr()) {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| dependent.destroy()));
                if outcome.is_err() {
                    error!(
                        contextual = %dependent.contextual().id(),
                        "dependent destroy callback panicked, continuing cascade"
                    );
                }
            }
        }
        self.incomplete.lock().clear();
    }

    /// Whether this context has already been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CreationalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationalContext")
            .field("contextual", &self.contextual_id)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
