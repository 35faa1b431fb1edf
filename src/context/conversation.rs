//! The conversation scope: long-running, lockable, timeout-bound state
//! propagated across requests via a `cid` identifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::container::Resolution;
use crate::context::{Context, ContextCore};
use crate::contextual::{AnyArc, Contextual, ScopeKind};
use crate::creational::CreationalContext;
use crate::error::{ContextError, ContextResult};
use crate::store::{AttributeBeanStore, AttributeMap, Attributes, BeanStore, LockStore, NamingScheme};

/// Default conversation inactivity timeout: 10 minutes.
pub const DEFAULT_CONVERSATION_TIMEOUT_MS: u64 = 600_000;

/// Default bounded wait for a busy conversation's lock: 1 second.
pub const DEFAULT_CONCURRENT_ACCESS_TIMEOUT_MS: u64 = 1_000;

const CONVERSATION_STORE_PREFIX: &str = "contextual.conversation";
const GENERATOR_ATTRIBUTE: &str = "contextual.conversation.generator";
const CONVERSATIONS_ATTRIBUTE: &str = "contextual.conversation.map";
const CURRENT_CONVERSATION_ATTRIBUTE: &str = "contextual.conversation.current";
const NAMING_SCHEME_ATTRIBUTE: &str = "contextual.conversation.naming";
const TRANSIENT_CID_MARKER: &str = "transient";

type ConversationMap = Mutex<HashMap<String, ManagedConversation>>;

/// A session: the attribute map conversations and session-scoped state write
/// through to, plus the session-wide creation-lock registry.
#[derive(Default)]
pub struct Session {
    attributes: AttributeMap,
    creation_locks: Arc<LockStore>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn creation_locks(&self) -> Arc<LockStore> {
        Arc::clone(&self.creation_locks)
    }
}

impl Attributes for Session {
    fn get_attribute(&self, name: &str) -> Option<AnyArc> {
        self.attributes.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: AnyArc) {
        self.attributes.set_attribute(name, value);
    }

    fn remove_attribute(&self, name: &str) -> Option<AnyArc> {
        self.attributes.remove_attribute(name)
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.attribute_names()
    }
}

/// A physical request: its own attribute map and an optional session.
#[derive(Default)]
pub struct Request {
    attributes: AttributeMap,
    session: Option<Arc<Session>>,
}

impl Request {
    /// Creates a request without a session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request bound to a session.
    pub fn with_session(session: Arc<Session>) -> Self {
        Self {
            attributes: AttributeMap::new(),
            session: Some(session),
        }
    }

    /// The session the request belongs to, if any.
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }
}

impl Attributes for Request {
    fn get_attribute(&self, name: &str) -> Option<AnyArc> {
        self.attributes.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: AnyArc) {
        self.attributes.set_attribute(name, value);
    }

    fn remove_attribute(&self, name: &str) -> Option<AnyArc> {
        self.attributes.remove_attribute(name)
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.attribute_names()
    }
}

/// Monotonic conversation id generator, stored in the session so ids stay
/// unique across the requests of one session.
#[derive(Default)]
pub struct ConversationIdGenerator {
    next: AtomicU64,
}

impl ConversationIdGenerator {
    /// Creates a generator starting at id `"1"`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces the next conversation id.
    pub fn next_id(&self) -> String {
        (self.next.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

#[derive(Default)]
struct LockState {
    holder: Option<ThreadId>,
    count: u32,
}

/// Bounded-wait reentrant lock guarding one conversation.
///
/// Only one thread may hold a conversation at a time; acquisition attempts
/// beyond the timeout fail instead of blocking indefinitely.
struct BoundedLock {
    state: Mutex<LockState>,
    available: Condvar,
}

impl BoundedLock {
    fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            available: Condvar::new(),
        }
    }

    fn try_lock(&self, timeout: Duration) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.holder == Some(me) {
            state.count += 1;
            return true;
        }
        let deadline = Instant::now() + timeout;
        while state.holder.is_some() {
            if self.available.wait_until(&mut state, deadline).timed_out() {
                if state.holder.is_some() {
                    return false;
                }
                break;
            }
        }
        state.holder = Some(me);
        state.count = 1;
        true
    }

    fn unlock(&self) -> UnlockOutcome {
        let me = thread::current().id();
        let mut state = self.state.lock();
        match state.holder {
            None => UnlockOutcome::NotHeld,
            Some(holder) if holder != me => UnlockOutcome::HeldByOther,
            Some(_) => {
                state.count -= 1;
                if state.count == 0 {
                    state.holder = None;
                    self.available.notify_one();
                }
                UnlockOutcome::Released
            }
        }
    }
}

#[derive(PartialEq, Eq)]
enum UnlockOutcome {
    Released,
    NotHeld,
    HeldByOther,
}

struct ConversationInner {
    id: Mutex<Option<String>>,
    transient: AtomicBool,
    timeout_ms: AtomicU64,
    last_used: Mutex<Instant>,
    lock: BoundedLock,
}

/// A long-running, lockable unit of conversational state.
///
/// Conversations start transient; [`begin`](ManagedConversation::begin)
/// promotes them to long-running, [`end`](ManagedConversation::end) demotes
/// them back, and the conversation context destroys demoted conversations
/// once they expire.
#[derive(Clone)]
pub struct ManagedConversation {
    inner: Arc<ConversationInner>,
}

impl ManagedConversation {
    pub(crate) fn new(timeout_ms: u64) -> Self {
        Self {
            inner: Arc::new(ConversationInner {
                id: Mutex::new(None),
                transient: AtomicBool::new(true),
                timeout_ms: AtomicU64::new(timeout_ms),
                last_used: Mutex::new(Instant::now()),
                lock: BoundedLock::new(),
            }),
        }
    }

    /// The assigned conversation id, once long-running.
    pub fn id(&self) -> Option<String> {
        self.inner.id.lock().clone()
    }

    /// Whether the conversation is transient (not promoted, or ended).
    pub fn is_transient(&self) -> bool {
        self.inner.transient.load(Ordering::Acquire)
    }

    /// The inactivity timeout in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        self.inner.timeout_ms.load(Ordering::Relaxed)
    }

    /// Overrides the inactivity timeout.
    pub fn set_timeout_ms(&self, timeout_ms: u64) {
        self.inner.timeout_ms.store(timeout_ms, Ordering::Relaxed);
    }

    /// Updates the last-used timestamp.
    pub fn touch(&self) {
        *self.inner.last_used.lock() = Instant::now();
    }

    /// Whether the conversation has outlived its timeout.
    pub fn is_expired(&self) -> bool {
        self.inner.last_used.lock().elapsed() > Duration::from_millis(self.timeout_ms())
    }

    /// Promotes the conversation to long-running, assigning a generated id
    /// when none was set. Fails when already long-running.
    pub fn begin(&self, generator: &ConversationIdGenerator) -> ContextResult<String> {
        if !self.is_transient() {
            return Err(ContextError::IllegalState(
                "conversation is already long-running",
            ));
        }
        let mut id = self.inner.id.lock();
        let assigned = match &*id {
            Some(existing) => existing.clone(),
            None => {
                let fresh = generator.next_id();
                *id = Some(fresh.clone());
                fresh
            }
        };
        self.inner.transient.store(false, Ordering::Release);
        debug!(cid = %assigned, "conversation promoted to long-running");
        Ok(assigned)
    }

    /// Promotes the conversation with an explicit id. Fails when already
    /// long-running or when the id is taken by another conversation.
    pub fn begin_with_id(&self, id: impl Into<String>) -> ContextResult<String> {
        if !self.is_transient() {
            return Err(ContextError::IllegalState(
                "conversation is already long-running",
            ));
        }
        let id = id.into();
        *self.inner.id.lock() = Some(id.clone());
        self.inner.transient.store(false, Ordering::Release);
        Ok(id)
    }

    /// Demotes a long-running conversation back to transient, scheduling its
    /// state for destruction once expired. Fails on a transient conversation.
    pub fn end(&self) -> ContextResult<()> {
        if self.is_transient() {
            return Err(ContextError::IllegalState(
                "attempt to end a transient conversation",
            ));
        }
        self.inner.transient.store(true, Ordering::Release);
        Ok(())
    }

    /// Attempts to take the conversation's lock within `timeout`.
    pub fn lock(&self, timeout: Duration) -> bool {
        self.inner.lock.try_lock(timeout)
    }

    /// Releases the conversation's lock. Unlocking an unheld conversation is
    /// a silent no-op; an unlock attempt against another thread's hold is
    /// refused and logged.
    pub fn unlock(&self) -> bool {
        match self.inner.lock.unlock() {
            UnlockOutcome::Released => true,
            UnlockOutcome::NotHeld => false,
            UnlockOutcome::HeldByOther => {
                warn!(cid = ?self.id(), "illegal conversation unlock attempt ignored");
                false
            }
        }
    }

    fn same_as(&self, other: &ManagedConversation) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ManagedConversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedConversation")
            .field("id", &self.id())
            .field("transient", &self.is_transient())
            .finish()
    }
}

/// Conversation-scoped context.
///
/// Layered on request-backed storage: a transient conversation keeps its
/// instances local to the request; promotion attaches the store to the
/// session attributes under the assigned `cid` prefix and registers the
/// conversation in the session's conversation map, making it restorable by
/// the next request carrying the same `cid`.
///
/// The lifecycle is `associate` → `activate(cid?)` → ... → `deactivate` →
/// `dissociate`, one pass per request.
pub struct ConversationContext {
    core: ContextCore,
    associated: Mutex<Option<Arc<Request>>>,
    current: Mutex<Option<ManagedConversation>>,
    default_timeout_ms: AtomicU64,
    concurrent_access_timeout_ms: AtomicU64,
}

impl ConversationContext {
    pub(crate) fn new() -> Self {
        Self {
            core: ContextCore::new(ScopeKind::Conversation, None),
            associated: Mutex::new(None),
            current: Mutex::new(None),
            default_timeout_ms: AtomicU64::new(DEFAULT_CONVERSATION_TIMEOUT_MS),
            concurrent_access_timeout_ms: AtomicU64::new(DEFAULT_CONCURRENT_ACCESS_TIMEOUT_MS),
        }
    }

    /// The inactivity timeout new conversations start with.
    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms.load(Ordering::Relaxed)
    }

    /// Overrides the default inactivity timeout.
    pub fn set_default_timeout_ms(&self, timeout_ms: u64) {
        self.default_timeout_ms.store(timeout_ms, Ordering::Relaxed);
    }

    /// The bounded wait applied when restoring a locked conversation.
    pub fn concurrent_access_timeout_ms(&self) -> u64 {
        self.concurrent_access_timeout_ms.load(Ordering::Relaxed)
    }

    /// Overrides the bounded lock wait.
    pub fn set_concurrent_access_timeout_ms(&self, timeout_ms: u64) {
        self.concurrent_access_timeout_ms
            .store(timeout_ms, Ordering::Relaxed);
    }

    /// Attaches the context to a request, loading or creating the
    /// conversation id generator and conversation map. Returns `false` when
    /// already associated.
    pub fn associate(&self, request: Arc<Request>) -> bool {
        let mut associated = self.associated.lock();
        if associated.is_some() {
            return false;
        }

        // The generator and map may already live in the session; otherwise
        // fresh ones are created. They are always mirrored into the request
        // for the duration of this pass; dissociate stores them back into
        // the session if it gains them in the meantime.
        let generator: AnyArc = match request
            .session()
            .and_then(|session| session.get_attribute(GENERATOR_ATTRIBUTE))
        {
            Some(existing) => existing,
            None => {
                let fresh: AnyArc = Arc::new(ConversationIdGenerator::new());
                if let Some(session) = request.session() {
                    session.set_attribute(GENERATOR_ATTRIBUTE, fresh.clone());
                }
                fresh
            }
        };
        request.set_attribute(GENERATOR_ATTRIBUTE, generator);

        let conversations: AnyArc = match request
            .session()
            .and_then(|session| session.get_attribute(CONVERSATIONS_ATTRIBUTE))
        {
            Some(existing) => existing,
            None => {
                let fresh: AnyArc = Arc::new(ConversationMap::new(HashMap::new()));
                if let Some(session) = request.session() {
                    session.set_attribute(CONVERSATIONS_ATTRIBUTE, fresh.clone());
                }
                fresh
            }
        };
        request.set_attribute(CONVERSATIONS_ATTRIBUTE, conversations);

        *associated = Some(request);
        true
    }

    /// Activates the context, restoring the conversation identified by
    /// `cid` or starting a fresh transient one.
    ///
    /// Restoration failures are recoverable: on a lock timeout
    /// ([`ContextError::BusyConversation`]) or an unknown/expired id
    /// ([`ContextError::NonexistentConversation`]) a fresh transient
    /// conversation is activated before the error is returned, so downstream
    /// code always finds an active conversation.
    pub fn activate(&self, cid: Option<&str>) -> ContextResult<()> {
        let request = self.request()?;
        if self.core.is_active() {
            warn!("conversation context already active");
        } else {
            self.core.set_active(true);
        }

        let cid = cid.filter(|cid| !cid.is_empty());
        let Some(cid) = cid else {
            self.associate_transient(&request);
            return Ok(());
        };

        let found = self
            .conversation_map(&request)
            .lock()
            .get(cid)
            .cloned()
            .filter(|conversation| !conversation.is_expired());
        match found {
            Some(conversation) => {
                let timeout = Duration::from_millis(self.concurrent_access_timeout_ms());
                if conversation.lock(timeout) {
                    if conversation.is_transient() {
                        // Ended concurrently between lookup and lock.
                        conversation.unlock();
                        self.associate_transient(&request);
                        return Err(ContextError::NonexistentConversation(cid.to_string()));
                    }
                    self.associate_long_running(&request, cid, conversation);
                    Ok(())
                } else {
                    self.associate_transient(&request);
                    Err(ContextError::BusyConversation(cid.to_string()))
                }
            }
            None => {
                self.associate_transient(&request);
                Err(ContextError::NonexistentConversation(cid.to_string()))
            }
        }
    }

    /// Deactivates the context: destroys transient state, promotes a
    /// newly-begun conversation into the session map, unlocks the current
    /// conversation and sweeps expired transient conversations.
    pub fn deactivate(&self) -> ContextResult<()> {
        if !self.core.has_store() {
            return Err(ContextError::IllegalState(
                "conversation context is not active",
            ));
        }
        let request = self.request()?;
        let current = self
            .current
            .lock()
            .clone()
            .ok_or(ContextError::IllegalState("no current conversation"))?;

        let outcome = (|| -> ContextResult<()> {
            if current.is_transient() && request.get_attribute(NAMING_SCHEME_ATTRIBUTE).is_some() {
                // Still transient at the end of the request: destroy its
                // state outright. Ended long-running conversations are
                // destroyed by the synchronized sweep instead.
                self.core.destroy_all()
            } else {
                current.touch();
                let attached = self
                    .core
                    .with_store_mut(|store| store.is_attached())
                    .unwrap_or(false);
                if !attached {
                    // The conversation was transient at the start of this
                    // request: re-prefix its store with the assigned cid,
                    // attach it and publish it in the conversation map.
                    let scheme = request
                        .get_attribute(NAMING_SCHEME_ATTRIBUTE)
                        .and_then(|value| value.downcast::<NamingScheme>().ok())
                        .ok_or(ContextError::IllegalState(
                            "conversation was not transient at the start of the request",
                        ))?;
                    let cid = current.id().ok_or(ContextError::IllegalState(
                        "long-running conversation has no id",
                    ))?;
                    scheme.set_cid(&cid);
                    self.core.with_store_mut(|store| store.attach());
                    self.conversation_map(&request)
                        .lock()
                        .insert(cid, current.clone());
                }
                Ok(())
            }
        })();

        // Cleanup always runs, mirroring a finally block.
        current.unlock();
        self.core.set_store(None);
        self.sweep_expired_transients(&request);
        self.core.set_active(false);
        outcome
    }

    /// Ends every non-current long-running conversation whose timeout has
    /// elapsed. Ended conversations are destroyed later by the deactivation
    /// sweep.
    pub fn invalidate(&self) -> ContextResult<()> {
        let request = self.request()?;
        let current = self.current.lock().clone();
        let map = self.conversation_map(&request);
        let guard = map.lock();
        for (cid, conversation) in guard.iter() {
            let is_current = current
                .as_ref()
                .map(|c| c.same_as(conversation))
                .unwrap_or(false);
            if !is_current && !conversation.is_transient() && conversation.is_expired() {
                if !conversation.lock(Duration::ZERO) {
                    warn!(cid = %cid, "ending a locked conversation");
                }
                let _ = conversation.end();
            }
        }
        Ok(())
    }

    /// Detaches the context from its request, storing the id generator and
    /// conversation map back into the session if absent there (first
    /// dissociation wins). Returns `false` when not associated.
    pub fn dissociate(&self, request: &Arc<Request>) -> bool {
        let mut associated = self.associated.lock();
        if associated.is_none() {
            return false;
        }
        if let Some(session) = request.session() {
            if session.get_attribute(GENERATOR_ATTRIBUTE).is_none() {
                if let Some(generator) = request.get_attribute(GENERATOR_ATTRIBUTE) {
                    session.set_attribute(GENERATOR_ATTRIBUTE, generator);
                }
            }
            if session.get_attribute(CONVERSATIONS_ATTRIBUTE).is_none() {
                if let Some(conversations) = request.get_attribute(CONVERSATIONS_ATTRIBUTE) {
                    session.set_attribute(CONVERSATIONS_ATTRIBUTE, conversations);
                }
            }
        }
        *associated = None;
        *self.current.lock() = None;
        self.core.set_store(None);
        true
    }

    /// Destroys every conversation known to `session`, ending long-running
    /// ones first. Used at session end, outside any request.
    pub(crate) fn destroy_session(&self, session: &Arc<Session>) {
        let Some(map) = session
            .get_attribute(CONVERSATIONS_ATTRIBUTE)
            .and_then(|value| value.downcast::<ConversationMap>().ok())
        else {
            return;
        };
        let previously_active = self.core.is_active();
        self.core.set_active(true);
        let drained: Vec<(String, ManagedConversation)> = map.lock().drain().collect();
        for (cid, conversation) in drained {
            if !conversation.is_transient() {
                let _ = conversation.end();
            }
            self.destroy_conversation_state(Arc::clone(session) as _, &cid);
        }
        self.core.set_active(previously_active);
        session.remove_attribute(CONVERSATIONS_ATTRIBUTE);
        session.remove_attribute(GENERATOR_ATTRIBUTE);
    }

    /// The conversation attached to the current request, if any.
    pub fn current_conversation(&self) -> Option<ManagedConversation> {
        self.current.lock().clone()
    }

    /// Looks up a conversation by id in the conversation map.
    pub fn conversation(&self, cid: &str) -> Option<ManagedConversation> {
        let request = self.associated.lock().clone()?;
        let map = self.conversation_map(&request);
        let found = map.lock().get(cid).cloned();
        found
    }

    /// Promotes the current conversation to long-running, returning its id.
    pub fn begin(&self) -> ContextResult<String> {
        let request = self.request()?;
        let current = self
            .current
            .lock()
            .clone()
            .ok_or(ContextError::NotActive(ScopeKind::Conversation))?;
        let generator = self.generator(&request);
        current.begin(&generator)
    }

    /// Demotes the current conversation back to transient.
    pub fn end(&self) -> ContextResult<()> {
        let current = self
            .current
            .lock()
            .clone()
            .ok_or(ContextError::NotActive(ScopeKind::Conversation))?;
        current.end()
    }

    fn request(&self) -> ContextResult<Arc<Request>> {
        self.associated.lock().clone().ok_or(ContextError::IllegalState(
            "must call associate() before using the conversation context",
        ))
    }

    fn generator(&self, request: &Arc<Request>) -> Arc<ConversationIdGenerator> {
        request
            .get_attribute(GENERATOR_ATTRIBUTE)
            .and_then(|value| value.downcast::<ConversationIdGenerator>().ok())
            .expect("conversation id generator attached at associate()")
    }

    fn conversation_map(&self, request: &Arc<Request>) -> Arc<ConversationMap> {
        request
            .get_attribute(CONVERSATIONS_ATTRIBUTE)
            .and_then(|value| value.downcast::<ConversationMap>().ok())
            .expect("conversation map attached at associate()")
    }

    /// Conversation state writes through to the session when one exists,
    /// falling back to request attributes for sessionless passes.
    fn store_backing(&self, request: &Arc<Request>) -> Arc<dyn Attributes> {
        match request.session() {
            Some(session) => Arc::clone(session) as _,
            None => Arc::clone(request) as _,
        }
    }

    fn associate_transient(&self, request: &Arc<Request>) {
        let conversation = ManagedConversation::new(self.default_timeout_ms());
        request.set_attribute(
            CURRENT_CONVERSATION_ATTRIBUTE,
            Arc::new(conversation.clone()),
        );
        *self.current.lock() = Some(conversation);

        let scheme = Arc::new(NamingScheme::with_cid(
            CONVERSATION_STORE_PREFIX,
            TRANSIENT_CID_MARKER,
        ));
        request.set_attribute(NAMING_SCHEME_ATTRIBUTE, Arc::clone(&scheme) as AnyArc);
        // Detached until a promotion at deactivation decides the real cid.
        let store = AttributeBeanStore::new(scheme, self.store_backing(request));
        self.core.set_store(Some(Box::new(store)));
    }

    fn associate_long_running(
        &self,
        request: &Arc<Request>,
        cid: &str,
        conversation: ManagedConversation,
    ) {
        request.set_attribute(
            CURRENT_CONVERSATION_ATTRIBUTE,
            Arc::new(conversation.clone()),
        );
        *self.current.lock() = Some(conversation);

        let scheme = Arc::new(NamingScheme::with_cid(CONVERSATION_STORE_PREFIX, cid));
        let mut store = AttributeBeanStore::new(scheme, self.store_backing(request));
        store.attach();
        self.core.set_store(Some(Box::new(store)));
        debug!(cid = %cid, "conversation restored");
    }

    /// Destroys conversations that ended and have outlived their timeout.
    fn sweep_expired_transients(&self, request: &Arc<Request>) {
        let map = self.conversation_map(request);
        let mut guard = map.lock();
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, conversation)| conversation.is_transient() && conversation.is_expired())
            .map(|(cid, _)| cid.clone())
            .collect();
        for cid in expired {
            guard.remove(&cid);
            self.destroy_conversation_state(self.store_backing(request), &cid);
            debug!(cid = %cid, "expired conversation destroyed");
        }
    }

    fn destroy_conversation_state(&self, backing: Arc<dyn Attributes>, cid: &str) {
        let mut store = AttributeBeanStore::new(
            Arc::new(NamingScheme::with_cid(CONVERSATION_STORE_PREFIX, cid)),
            backing,
        );
        store.attach();
        for id in store.ids() {
            if let Some(instance) = store.get(&id) {
                instance.destroy();
            }
        }
        store.clear();
    }
}

impl Context for ConversationContext {
    fn scope(&self) -> ScopeKind {
        ScopeKind::Conversation
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
