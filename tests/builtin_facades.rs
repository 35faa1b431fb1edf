//! Call-site-dependent resolution of the built-in facades.

use contextual_di::{
    Container, ContextError, ContextualId, EventHandle, InjectionPoint, InstanceHandle, Qualifier,
    QualifierSet, ScopeKind, TypeKey,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Foo;
struct Bar;

struct Consumer {
    instance: Arc<InstanceHandle>,
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn facade_container() -> Container {
    let mut builder = Container::builder();
    builder.component::<Foo, _>("app.foo", ScopeKind::Application, |_, _| Ok(Arc::new(Foo)));
    builder.component::<Bar, _>("app.bar", ScopeKind::Application, |_, _| Ok(Arc::new(Bar)));
    builder.component::<Consumer, _>("app.consumer", ScopeKind::Application, |cc, res| {
        let point = InjectionPoint::of::<InstanceHandle>("Consumer.instance")
            .with_type_argument(TypeKey::of::<Foo>())
            .with_owner(ContextualId::new("app.consumer"));
        let instance = res.inject_as::<InstanceHandle>(cc, point)?;
        Ok(Arc::new(Consumer { instance }))
    });
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();
    container
}

#[test]
fn test_instance_facade_captures_the_callers_injection_point() {
    let container = facade_container();
    let scope = container.resolution_scope();
    let consumer = scope
        .resolution()
        .get_as::<Consumer>(&ContextualId::new("app.consumer"))
        .unwrap();

    assert_eq!(consumer.instance.ty(), TypeKey::of::<Foo>());
    let foo = consumer.instance.get(&scope.resolution()).unwrap();
    assert!(foo.downcast_ref::<Foo>().is_some());
}

#[test]
fn test_select_returns_a_new_facade_without_mutating_the_original() {
    let container = facade_container();
    let scope = container.resolution_scope();
    let consumer = scope
        .resolution()
        .get_as::<Consumer>(&ContextualId::new("app.consumer"))
        .unwrap();

    let original = Arc::clone(&consumer.instance);
    let narrowed = original.select::<Bar>();

    // The narrowed facade targets Bar with the same qualifiers; the
    // original is untouched.
    assert_eq!(narrowed.ty(), TypeKey::of::<Bar>());
    assert_eq!(narrowed.qualifiers(), original.qualifiers());
    assert_eq!(original.ty(), TypeKey::of::<Foo>());

    let bar = narrowed.get(&scope.resolution()).unwrap();
    assert!(bar.downcast_ref::<Bar>().is_some());
    let foo = original.get(&scope.resolution()).unwrap();
    assert!(foo.downcast_ref::<Foo>().is_some());
}

#[test]
fn test_facade_equality_is_structural() {
    let container = facade_container();
    let scope = container.resolution_scope();
    let consumer = scope
        .resolution()
        .get_as::<Consumer>(&ContextualId::new("app.consumer"))
        .unwrap();

    // Two facades for the same effective (type, qualifiers) compare equal
    // even when obtained via different paths.
    let via_select = consumer.instance.select::<Bar>().select::<Foo>();
    assert_eq!(*consumer.instance, via_select);
    assert_eq!(hash_of(&*consumer.instance), hash_of(&via_select));

    let qualified = consumer.instance.select_qualifier(Qualifier::new("replica"));
    assert_ne!(*consumer.instance, qualified);
}

#[test]
fn test_unsatisfied_and_ambiguous_probes() {
    struct Unregistered;

    let container = facade_container();
    let scope = container.resolution_scope();
    let consumer = scope
        .resolution()
        .get_as::<Consumer>(&ContextualId::new("app.consumer"))
        .unwrap();

    assert!(!consumer.instance.is_unsatisfied());
    assert!(!consumer.instance.is_ambiguous());
    assert!(consumer.instance.select::<Unregistered>().is_unsatisfied());
}

#[test]
fn test_dynamic_lookup_outside_an_injection_point_is_rejected() {
    let container = facade_container();
    let scope = container.resolution_scope();

    let err = scope
        .resolution()
        .get(&ContextualId::new("builtin.instance"))
        .unwrap_err();
    assert!(matches!(
        err,
        ContextError::DynamicLookupOutsideInjectionPoint
    ));
}

#[test]
fn test_injection_point_metadata_reflects_the_declaring_member() {
    struct Inspector {
        point: Arc<InjectionPoint>,
    }

    let mut builder = Container::builder();
    builder.component::<Inspector, _>("app.inspector", ScopeKind::Application, |cc, res| {
        let request = InjectionPoint::of::<InjectionPoint>("Inspector.point")
            .with_owner(ContextualId::new("app.inspector"));
        let point = res.inject_as::<InjectionPoint>(cc, request)?;
        Ok(Arc::new(Inspector { point }))
    });
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();

    let scope = container.resolution_scope();
    let inspector = scope
        .resolution()
        .get_as::<Inspector>(&ContextualId::new("app.inspector"))
        .unwrap();
    assert_eq!(inspector.point.member, "Inspector.point");
    assert_eq!(
        inspector.point.owner,
        Some(ContextualId::new("app.inspector"))
    );
}

#[test]
fn test_bean_metadata_describes_the_declaring_component() {
    struct Reflective {
        metadata: Arc<contextual_di::BeanMetadataHandle>,
    }

    let mut builder = Container::builder();
    builder.component::<Reflective, _>("app.reflective", ScopeKind::Application, |cc, res| {
        let request = InjectionPoint::of::<contextual_di::BeanMetadataHandle>("Reflective.metadata")
            .with_owner(ContextualId::new("app.reflective"));
        let metadata = res.inject_as::<contextual_di::BeanMetadataHandle>(cc, request)?;
        Ok(Arc::new(Reflective { metadata }))
    });
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();

    let scope = container.resolution_scope();
    let reflective = scope
        .resolution()
        .get_as::<Reflective>(&ContextualId::new("app.reflective"))
        .unwrap();
    let descriptor = reflective.metadata.descriptor();
    assert_eq!(descriptor.id, ContextualId::new("app.reflective"));
    assert_eq!(descriptor.scope, ScopeKind::Application);
}

#[derive(Debug)]
struct OrderPlaced {
    #[allow(dead_code)]
    total: u32,
}

#[test]
fn test_event_facade_notifies_matching_observers() {
    let plain = Arc::new(AtomicUsize::new(0));
    let priority = Arc::new(AtomicUsize::new(0));

    struct Publisher {
        events: Arc<EventHandle>,
    }

    let mut builder = Container::builder();
    {
        let plain = Arc::clone(&plain);
        builder.observe::<OrderPlaced>(QualifierSet::default_set(), move |_| {
            plain.fetch_add(1, Ordering::SeqCst);
        });
    }
    {
        let priority = Arc::clone(&priority);
        builder.observe::<OrderPlaced>(
            QualifierSet::new().with(Qualifier::new("priority")),
            move |_| {
                priority.fetch_add(1, Ordering::SeqCst);
            },
        );
    }
    builder.component::<Publisher, _>("app.publisher", ScopeKind::Application, |cc, res| {
        let point = InjectionPoint::of::<EventHandle>("Publisher.events")
            .with_type_argument(TypeKey::of::<OrderPlaced>());
        let events = res.inject_as::<EventHandle>(cc, point)?;
        Ok(Arc::new(Publisher { events }))
    });
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();

    let scope = container.resolution_scope();
    let publisher = scope
        .resolution()
        .get_as::<Publisher>(&ContextualId::new("app.publisher"))
        .unwrap();

    // Default-qualified fire reaches only the default observer.
    let notified = publisher.events.fire(Arc::new(OrderPlaced { total: 9 }));
    assert_eq!(notified, 1);
    assert_eq!(plain.load(Ordering::SeqCst), 1);
    assert_eq!(priority.load(Ordering::SeqCst), 0);

    // A narrowed handle carrying the extra qualifier reaches both.
    let urgent = publisher.events.select_qualifier(Qualifier::new("priority"));
    let notified = urgent.fire(Arc::new(OrderPlaced { total: 11 }));
    assert_eq!(notified, 2);
    assert_eq!(priority.load(Ordering::SeqCst), 1);

    // Selection produced a new handle; the original still targets the
    // default qualifiers.
    assert_ne!(*publisher.events, urgent);
    let notified = publisher.events.fire(Arc::new(OrderPlaced { total: 3 }));
    assert_eq!(notified, 1);
}
