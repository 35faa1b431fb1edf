//! Bean store primitives: identifier → contextual instance storage.
//!
//! Every scope context is backed by a [`BeanStore`]. The plain
//! [`HashMapBeanStore`] serves thread-confined scopes; attribute-backed
//! bound stores (see [`attribute`]) serve session and conversation scopes
//! that must write through to an external attribute map; [`LockStore`]
//! provides the per-identifier creation locks multithreaded scopes use to
//! guarantee at-most-one creation.

mod attribute;

pub use attribute::{AttributeBeanStore, AttributeMap, Attributes, NamingScheme};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::contextual::{ContextualId, ContextualInstance};

/// Storage primitive mapping contextual identifiers to live instances
/// within one active scope.
///
/// Entries are exclusively owned by the owning scope context; mutation is
/// always funneled through it.
pub trait BeanStore: Send + Sync {
    /// Looks up the instance record stored under `id`.
    fn get(&self, id: &ContextualId) -> Option<ContextualInstance>;

    /// Stores an instance record under `id`, replacing any previous entry.
    fn put(&mut self, id: ContextualId, instance: ContextualInstance);

    /// Removes and returns the record stored under `id`.
    fn remove(&mut self, id: &ContextualId) -> Option<ContextualInstance>;

    /// All identifiers currently stored.
    fn ids(&self) -> Vec<ContextualId>;

    /// Removes every entry without destroying the instances.
    fn clear(&mut self);

    /// Attaches a bound store to its backing storage. Plain stores are
    /// always attached and return `false`.
    fn attach(&mut self) -> bool {
        false
    }

    /// Detaches a bound store from its backing storage. Plain stores are
    /// always attached and return `false`.
    fn detach(&mut self) -> bool {
        false
    }

    /// Whether updates currently reach the backing storage.
    fn is_attached(&self) -> bool {
        true
    }
}

/// In-memory bean store backed by a `HashMap`.
///
/// The default storage for thread-confined scopes (request) and the shared
/// application scope (which wraps access in its context's lock discipline).
#[derive(Default)]
pub struct HashMapBeanStore {
    delegate: HashMap<ContextualId, ContextualInstance>,
}

impl HashMapBeanStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.delegate.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.delegate.is_empty()
    }
}

impl BeanStore for HashMapBeanStore {
    fn get(&self, id: &ContextualId) -> Option<ContextualInstance> {
        self.delegate.get(id).cloned()
    }

    fn put(&mut self, id: ContextualId, instance: ContextualInstance) {
        self.delegate.insert(id, instance);
    }

    fn remove(&mut self, id: &ContextualId) -> Option<ContextualInstance> {
        self.delegate.remove(id)
    }

    fn ids(&self) -> Vec<ContextualId> {
        self.delegate.keys().cloned().collect()
    }

    fn clear(&mut self) {
        self.delegate.clear();
    }
}

#[derive(Default)]
struct IdMutex {
    held: Mutex<bool>,
    freed: Condvar,
}

/// Guard for a held per-identifier creation lock.
///
/// Dropping the guard releases the lock.
pub struct IdLock {
    lock: Arc<IdMutex>,
}

impl Drop for IdLock {
    fn drop(&mut self) {
        *self.lock.held.lock() = false;
        self.lock.freed.notify_one();
    }
}

/// Registry of per-identifier creation locks.
///
/// Multithreaded scopes acquire the identifier's lock before re-checking the
/// store and creating, so concurrent misses on the same identifier
/// total-order a single creation while unrelated identifiers stay
/// uncontended. The per-identifier lock is not reentrant; a same-thread
/// re-entry for the same identifier indicates a metadata-layer bug.
#[derive(Default)]
pub struct LockStore {
    locks: Mutex<HashMap<ContextualId, Arc<IdMutex>>>,
}

impl LockStore {
    /// Creates an empty lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the creation lock for `id`, blocking until it is free.
    pub fn acquire(&self, id: &ContextualId) -> IdLock {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        {
            let mut held = lock.held.lock();
            while *held {
                lock.freed.wait(&mut held);
            }
            *held = true;
        }
        IdLock { lock }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contextual::{Component, ContextualId};
    use crate::creational::CreationalContext;
    use std::sync::Arc;

    fn record(id: &str) -> ContextualInstance {
        let contextual = Arc::new(Component::new(id, |_, _| Ok(Arc::new(0u32))));
        ContextualInstance::new(
            contextual,
            Arc::new(0u32),
            CreationalContext::root(ContextualId::new(id)),
        )
    }

    #[test]
    fn put_get_remove_roundtrip() {
        let mut store = HashMapBeanStore::new();
        let id = ContextualId::new("beans.a");
        assert!(store.get(&id).is_none());

        store.put(id.clone(), record("beans.a"));
        assert!(store.get(&id).is_some());
        assert_eq!(store.ids(), vec![id.clone()]);

        assert!(store.remove(&id).is_some());
        assert!(store.get(&id).is_none());
        assert!(store.remove(&id).is_none());
    }

    #[test]
    fn clear_drops_all_entries() {
        let mut store = HashMapBeanStore::new();
        store.put(ContextualId::new("beans.a"), record("beans.a"));
        store.put(ContextualId::new("beans.b"), record("beans.b"));
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn lock_store_serializes_same_identifier() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let locks = Arc::new(LockStore::new());
        let id = ContextualId::new("beans.locked");
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let id = id.clone();
                let inside = Arc::clone(&inside);
                std::thread::spawn(move || {
                    let _held = locks.acquire(&id);
                    let now = inside.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(now, 0, "two threads inside the same identifier lock");
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
