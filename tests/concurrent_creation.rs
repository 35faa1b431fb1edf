//! Concurrency properties of shared scopes.
//!
//! Verifies the at-most-one-creation guarantee: for any number of threads
//! racing a miss on the same identifier, exactly one create call happens and
//! every caller observes the same instance.

use contextual_di::{Container, ContextualId, Request, ScopeKind, Session};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct SharedService {
    serial: usize,
}

#[test]
fn test_at_most_one_creation_under_concurrent_misses() {
    let created = Arc::new(AtomicUsize::new(0));
    let created_in_factory = Arc::clone(&created);

    let mut builder = Container::builder();
    builder.component::<SharedService, _>(
        "app.shared",
        ScopeKind::Application,
        move |_, _| {
            let serial = created_in_factory.fetch_add(1, Ordering::SeqCst);
            // Widen the race window: losers must wait, not create.
            thread::sleep(Duration::from_millis(20));
            Ok(Arc::new(SharedService { serial }))
        },
    );
    let container = Arc::new(builder.build());
    container.lifecycle().begin_application().unwrap();

    let thread_count = 8;
    let barrier = Arc::new(Barrier::new(thread_count));
    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let container = Arc::clone(&container);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let scope = container.resolution_scope();
                let service = scope
                    .resolution()
                    .get_as::<SharedService>(&ContextualId::new("app.shared"))
                    .unwrap();
                Arc::as_ptr(&service) as usize
            })
        })
        .collect();

    let pointers: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(created.load(Ordering::SeqCst), 1, "exactly one create call");
    assert!(
        pointers.windows(2).all(|w| w[0] == w[1]),
        "all callers observed the same instance"
    );
}

#[test]
fn test_session_scope_creates_once_across_concurrent_requests() {
    let created = Arc::new(AtomicUsize::new(0));
    let created_in_factory = Arc::clone(&created);

    let mut builder = Container::builder();
    builder.component::<SharedService, _>("sess.shared", ScopeKind::Session, move |_, _| {
        let serial = created_in_factory.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(Arc::new(SharedService { serial }))
    });
    let container = Arc::new(builder.build());
    container.lifecycle().begin_application().unwrap();
    let session = Arc::new(Session::new());

    let thread_count = 6;
    let barrier = Arc::new(Barrier::new(thread_count));
    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let container = Arc::clone(&container);
            let barrier = Arc::clone(&barrier);
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let controller = container
                    .lifecycle()
                    .begin_request(Arc::new(Request::with_session(session)))
                    .unwrap();
                controller.restore_session().unwrap();
                barrier.wait();
                let service = controller
                    .resolution()
                    .get_as::<SharedService>(&ContextualId::new("sess.shared"))
                    .unwrap();
                let ptr = Arc::as_ptr(&service) as usize;
                controller.end_request().unwrap();
                ptr
            })
        })
        .collect();

    let pointers: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(pointers.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_unrelated_identifiers_do_not_contend() {
    let created = Arc::new(AtomicUsize::new(0));

    let mut builder = Container::builder();
    for index in 0..4 {
        let created_in_factory = Arc::clone(&created);
        builder.component::<SharedService, _>(
            format!("app.shared.{index}").as_str(),
            ScopeKind::Application,
            move |_, _| {
                Ok(Arc::new(SharedService {
                    serial: created_in_factory.fetch_add(1, Ordering::SeqCst),
                }))
            },
        );
    }
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();

    let barrier = Barrier::new(4);
    crossbeam_utils::thread::scope(|s| {
        for index in 0..4 {
            let container = &container;
            let barrier = &barrier;
            s.spawn(move |_| {
                barrier.wait();
                let scope = container.resolution_scope();
                for _ in 0..50 {
                    scope
                        .resolution()
                        .get_as::<SharedService>(&ContextualId::new(
                            format!("app.shared.{index}").as_str(),
                        ))
                        .unwrap();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 4);
}
