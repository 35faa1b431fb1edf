//! Conversation lifecycle: promotion, restoration, locking, expiry.

use contextual_di::{
    Component, ComponentDescriptor, Container, ContextError, ContextualId, QualifierSet, Request,
    ScopeKind, Session, TypeKey,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Cart {
    serial: usize,
}

fn cart_container(destroyed: &Arc<AtomicUsize>) -> (Container, Arc<AtomicUsize>) {
    let created = Arc::new(AtomicUsize::new(0));
    let created_in_factory = Arc::clone(&created);
    let destroyed = Arc::clone(destroyed);

    let mut builder = Container::builder();
    let component = Component::new("conv.cart", move |_, _| {
        Ok(Arc::new(Cart {
            serial: created_in_factory.fetch_add(1, Ordering::SeqCst),
        }))
    })
    .with_destroy::<Cart, _>(move |_| {
        destroyed.fetch_add(1, Ordering::SeqCst);
    });
    builder.register(
        ComponentDescriptor::new(
            "conv.cart",
            TypeKey::of::<Cart>(),
            ScopeKind::Conversation,
            QualifierSet::default_set(),
        ),
        Arc::new(component),
    );
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();
    (container, created)
}

fn request_for(session: &Arc<Session>) -> Arc<Request> {
    Arc::new(Request::with_session(Arc::clone(session)))
}

#[test]
fn test_transient_conversation_state_dies_with_the_request() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let (container, _created) = cart_container(&destroyed);
    let session = Arc::new(Session::new());

    let controller = container.lifecycle().begin_request(request_for(&session)).unwrap();
    controller.restore_conversation(None).unwrap();

    let conversation = controller
        .conversation_context()
        .current_conversation()
        .unwrap();
    assert!(conversation.is_transient());
    assert!(conversation.id().is_none());

    controller
        .resolution()
        .get_as::<Cart>(&ContextualId::new("conv.cart"))
        .unwrap();

    controller.teardown_conversation().unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    controller.end_request().unwrap();
}

#[test]
fn test_promoted_conversation_survives_and_restores() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let (container, created) = cart_container(&destroyed);
    let session = Arc::new(Session::new());

    // First request: begin a long-running conversation and touch state.
    let first = container.lifecycle().begin_request(request_for(&session)).unwrap();
    first.restore_conversation(None).unwrap();
    let cid = first.conversation_context().begin().unwrap();
    let a = first
        .resolution()
        .get_as::<Cart>(&ContextualId::new("conv.cart"))
        .unwrap();
    first.end_request().unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);

    // Second request: restore by cid; the same instance is attached.
    let second = container.lifecycle().begin_request(request_for(&session)).unwrap();
    second.restore_conversation(Some(&cid)).unwrap();
    let restored = second
        .conversation_context()
        .current_conversation()
        .unwrap();
    assert!(!restored.is_transient());
    assert_eq!(restored.id().as_deref(), Some(cid.as_str()));

    let b = second
        .resolution()
        .get_as::<Cart>(&ContextualId::new("conv.cart"))
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(created.load(Ordering::SeqCst), 1);
    second.end_request().unwrap();
}

#[test]
fn test_nonexistent_cid_falls_back_to_a_fresh_transient_conversation() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let (container, _created) = cart_container(&destroyed);
    let session = Arc::new(Session::new());

    let controller = container.lifecycle().begin_request(request_for(&session)).unwrap();
    let err = controller.restore_conversation(Some("999")).unwrap_err();
    assert!(matches!(err, ContextError::NonexistentConversation(cid) if cid == "999"));

    // The fallback transient conversation is live and usable.
    let conversation = controller
        .conversation_context()
        .current_conversation()
        .unwrap();
    assert!(conversation.is_transient());
    controller
        .resolution()
        .get_as::<Cart>(&ContextualId::new("conv.cart"))
        .unwrap();
    controller.end_request().unwrap();
}

#[test]
fn test_busy_conversation_lock_timeout() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let (container, _created) = cart_container(&destroyed);
    let container = Arc::new(container);
    let session = Arc::new(Session::new());

    // Request A promotes a conversation and keeps it locked (no teardown
    // yet).
    let holder = container.lifecycle().begin_request(request_for(&session)).unwrap();
    holder.restore_conversation(None).unwrap();
    let cid = holder.conversation_context().begin().unwrap();
    holder.end_request().unwrap();

    let holder = container.lifecycle().begin_request(request_for(&session)).unwrap();
    holder.restore_conversation(Some(&cid)).unwrap();

    // Request B races the held lock from another thread with a short
    // bounded wait.
    let thread_container = Arc::clone(&container);
    let thread_session = Arc::clone(&session);
    let thread_cid = cid.clone();
    let outcome = thread::spawn(move || {
        let controller = thread_container
            .lifecycle()
            .begin_request(request_for(&thread_session))
            .unwrap();
        controller
            .conversation_context()
            .set_concurrent_access_timeout_ms(100);
        let result = controller.restore_conversation(Some(&thread_cid));
        let fallback = controller
            .conversation_context()
            .current_conversation()
            .unwrap();
        let fallback_live = fallback.is_transient();
        let cart_ok = controller
            .resolution()
            .get_as::<Cart>(&ContextualId::new("conv.cart"))
            .is_ok();
        controller.end_request().unwrap();
        (result, fallback_live, cart_ok)
    })
    .join()
    .unwrap();

    let (result, fallback_live, cart_ok) = outcome;
    assert!(matches!(
        result,
        Err(ContextError::BusyConversation(busy)) if busy == cid
    ));
    assert!(fallback_live, "loser keeps a live transient conversation");
    assert!(cart_ok, "conversation-scoped state works in the fallback");

    holder.end_request().unwrap();
}

#[test]
fn test_deactivation_sweeps_only_expired_ended_conversations() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let (container, _created) = cart_container(&destroyed);
    let session = Arc::new(Session::new());

    // Promote two conversations, each holding one cart instance.
    let mut cids = Vec::new();
    for _ in 0..2 {
        let controller = container.lifecycle().begin_request(request_for(&session)).unwrap();
        controller.restore_conversation(None).unwrap();
        let cid = controller.conversation_context().begin().unwrap();
        controller
            .resolution()
            .get_as::<Cart>(&ContextualId::new("conv.cart"))
            .unwrap();
        controller.end_request().unwrap();
        cids.push(cid);
    }

    // Third request: end both conversations, but only the first expires.
    let controller = container.lifecycle().begin_request(request_for(&session)).unwrap();
    controller.restore_conversation(None).unwrap();

    let expired = controller.conversation_context().conversation(&cids[0]).unwrap();
    expired.end().unwrap();
    expired.set_timeout_ms(0);
    thread::sleep(Duration::from_millis(5));

    let fresh = controller.conversation_context().conversation(&cids[1]).unwrap();
    fresh.end().unwrap();
    fresh.touch();

    controller.end_request().unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1, "only the expired conversation is destroyed");

    // The surviving conversation is still registered in the session map.
    let next = container.lifecycle().begin_request(request_for(&session)).unwrap();
    assert!(next.conversation_context().conversation(&cids[0]).is_none());
    assert!(next.conversation_context().conversation(&cids[1]).is_some());
    next.end_request().unwrap();
}

#[test]
fn test_invalidate_ends_expired_long_running_conversations() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let (container, _created) = cart_container(&destroyed);
    let session = Arc::new(Session::new());

    let controller = container.lifecycle().begin_request(request_for(&session)).unwrap();
    controller.restore_conversation(None).unwrap();
    let cid = controller.conversation_context().begin().unwrap();
    controller.end_request().unwrap();

    let controller = container.lifecycle().begin_request(request_for(&session)).unwrap();
    controller.restore_conversation(None).unwrap();

    let stale = controller.conversation_context().conversation(&cid).unwrap();
    stale.set_timeout_ms(0);
    thread::sleep(Duration::from_millis(5));
    assert!(!stale.is_transient());

    controller.conversation_context().invalidate().unwrap();
    assert!(stale.is_transient(), "expired conversation was ended");
    controller.end_request().unwrap();
}

#[test]
fn test_end_session_destroys_all_conversation_state() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let (container, _created) = cart_container(&destroyed);
    let session = Arc::new(Session::new());

    let controller = container.lifecycle().begin_request(request_for(&session)).unwrap();
    controller.restore_conversation(None).unwrap();
    controller.conversation_context().begin().unwrap();
    controller
        .resolution()
        .get_as::<Cart>(&ContextualId::new("conv.cart"))
        .unwrap();
    controller.end_request().unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);

    container.lifecycle().end_session(&session).unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_begin_twice_is_an_illegal_state() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let (container, _created) = cart_container(&destroyed);
    let session = Arc::new(Session::new());

    let controller = container.lifecycle().begin_request(request_for(&session)).unwrap();
    controller.restore_conversation(None).unwrap();
    controller.conversation_context().begin().unwrap();
    let err = controller.conversation_context().begin().unwrap_err();
    assert!(matches!(err, ContextError::IllegalState(_)));
    controller.end_request().unwrap();
}
