//! Attribute-backed bound bean stores.
//!
//! Session and conversation scopes keep their instances in an external
//! attribute map (the host's session storage) under a naming-scheme prefix,
//! so the host can persist the map between requests. The store is
//! write-through while attached; detached modifications stay local until the
//! next attach.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::contextual::{AnyArc, ContextualId, ContextualInstance};
use crate::store::{BeanStore, HashMapBeanStore};

/// A mutable string-keyed attribute map, the backing storage contract for
/// bound bean stores.
///
/// Hosts provide request and session storage through this trait; the
/// in-memory [`AttributeMap`] is the default implementation.
pub trait Attributes: Send + Sync {
    /// Reads an attribute.
    fn get_attribute(&self, name: &str) -> Option<AnyArc>;

    /// Writes an attribute.
    fn set_attribute(&self, name: &str, value: AnyArc);

    /// Removes an attribute, returning the previous value.
    fn remove_attribute(&self, name: &str) -> Option<AnyArc>;

    /// All attribute names currently present.
    fn attribute_names(&self) -> Vec<String>;
}

/// In-memory [`Attributes`] implementation.
#[derive(Default)]
pub struct AttributeMap {
    map: Mutex<HashMap<String, AnyArc>>,
}

impl AttributeMap {
    /// Creates an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Attributes for AttributeMap {
    fn get_attribute(&self, name: &str) -> Option<AnyArc> {
        self.map.lock().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: AnyArc) {
        self.map.lock().insert(name.to_string(), value);
    }

    fn remove_attribute(&self, name: &str) -> Option<AnyArc> {
        self.map.lock().remove(name)
    }

    fn attribute_names(&self) -> Vec<String> {
        self.map.lock().keys().cloned().collect()
    }
}

const DELIMITER: char = '#';

/// Prefix scheme mapping contextual identifiers onto attribute names.
///
/// Keys take the form `<base>#<id>` or, with a conversation id set,
/// `<base>#<cid>#<id>`. Conversation promotion swaps the cid segment via
/// [`set_cid`](NamingScheme::set_cid) before the store attaches, so entries
/// land under the promoted conversation's prefix.
pub struct NamingScheme {
    base: String,
    cid: Mutex<Option<String>>,
}

impl NamingScheme {
    /// Creates a scheme with a fixed prefix and no cid segment.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            cid: Mutex::new(None),
        }
    }

    /// Creates a scheme with a cid segment, as used by conversation stores.
    pub fn with_cid(base: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            cid: Mutex::new(Some(cid.into())),
        }
    }

    /// Replaces the cid segment (conversation promotion).
    pub fn set_cid(&self, cid: impl Into<String>) {
        *self.cid.lock() = Some(cid.into());
    }

    /// The current cid segment, if any.
    pub fn cid(&self) -> Option<String> {
        self.cid.lock().clone()
    }

    fn prefix(&self) -> String {
        match &*self.cid.lock() {
            Some(cid) => format!("{}{}{}{}", self.base, DELIMITER, cid, DELIMITER),
            None => format!("{}{}", self.base, DELIMITER),
        }
    }

    /// Whether the attribute name belongs to this scheme.
    pub fn accepts(&self, name: &str) -> bool {
        name.starts_with(&self.prefix())
    }

    /// Maps an identifier to its attribute name.
    pub fn prefix_id(&self, id: &ContextualId) -> String {
        format!("{}{}", self.prefix(), id)
    }

    /// Recovers the identifier from a prefixed attribute name.
    pub fn de_prefix(&self, name: &str) -> ContextualId {
        ContextualId::new(&name[self.prefix().len()..])
    }
}

/// A bound bean store backed by an attribute map.
///
/// Write-through while attached: every `put`/`remove`/`clear` is mirrored to
/// the backing attributes immediately. While detached, modifications stay in
/// the local map; on (re)attach a non-empty local map is authoritative and is
/// flushed to the backing store, otherwise existing entries are fetched from
/// the backing store.
///
/// Not safe for concurrent writers; the owning context provides the locking
/// discipline.
pub struct AttributeBeanStore {
    delegate: HashMapBeanStore,
    scheme: Arc<NamingScheme>,
    backing: Arc<dyn Attributes>,
    attached: bool,
}

impl AttributeBeanStore {
    /// Creates a detached store over `backing` with the given scheme.
    pub fn new(scheme: Arc<NamingScheme>, backing: Arc<dyn Attributes>) -> Self {
        Self {
            delegate: HashMapBeanStore::new(),
            scheme,
            backing,
            attached: false,
        }
    }

    /// The naming scheme prefixing this store's attribute names.
    pub fn scheme(&self) -> &Arc<NamingScheme> {
        &self.scheme
    }

    /// Attaches the store. Local entries (if any) are flushed to the backing
    /// attributes; otherwise entries under this scheme's prefix are fetched.
    /// Returns `false` when already attached.
    fn attach_impl(&mut self) -> bool {
        if self.attached {
            return false;
        }
        self.attached = true;
        if !self.delegate.is_empty() {
            // Local state is authoritative, write it through.
            for id in self.delegate.ids() {
                if let Some(instance) = self.delegate.get(&id) {
                    self.backing
                        .set_attribute(&self.scheme.prefix_id(&id), Arc::new(instance));
                }
            }
        } else {
            for name in self.backing.attribute_names() {
                if self.scheme.accepts(&name) {
                    if let Some(value) = self.backing.get_attribute(&name) {
                        if let Some(instance) = value.downcast_ref::<ContextualInstance>() {
                            self.delegate
                                .put(self.scheme.de_prefix(&name), instance.clone());
                        }
                    }
                }
            }
        }
        debug!(prefix = %self.scheme.prefix(), "bean store attached");
        true
    }
}

impl BeanStore for AttributeBeanStore {
    fn get(&self, id: &ContextualId) -> Option<ContextualInstance> {
        if let Some(local) = self.delegate.get(id) {
            return Some(local);
        }
        if !self.attached {
            return None;
        }
        // Lazy fall-through to the backing attributes: another holder of the
        // same backing store (a concurrent request on one session) may have
        // written the entry after this store attached.
        self.backing
            .get_attribute(&self.scheme.prefix_id(id))
            .and_then(|value| value.downcast_ref::<ContextualInstance>().cloned())
    }

    fn put(&mut self, id: ContextualId, instance: ContextualInstance) {
        if self.attached {
            self.backing
                .set_attribute(&self.scheme.prefix_id(&id), Arc::new(instance.clone()));
        }
        self.delegate.put(id, instance);
    }

    fn remove(&mut self, id: &ContextualId) -> Option<ContextualInstance> {
        if self.attached {
            self.backing.remove_attribute(&self.scheme.prefix_id(id));
        }
        self.delegate.remove(id)
    }

    fn ids(&self) -> Vec<ContextualId> {
        self.delegate.ids()
    }

    fn clear(&mut self) {
        if self.attached {
            for id in self.delegate.ids() {
                self.backing.remove_attribute(&self.scheme.prefix_id(&id));
            }
        }
        self.delegate.clear();
    }

    fn attach(&mut self) -> bool {
        self.attach_impl()
    }

    fn detach(&mut self) -> bool {
        if !self.attached {
            return false;
        }
        self.attached = false;
        debug!(prefix = %self.scheme.prefix(), "bean store detached");
        true
    }

    fn is_attached(&self) -> bool {
        self.attached
    }
}
