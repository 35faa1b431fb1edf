use contextual_di::{
    Container, ContextError, ContextualId, InjectionPoint, Qualifier, QualifierSet, Request,
    ScopeKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Config {
    url: String,
}

struct Repository {
    url: String,
}

#[test]
fn test_application_scoped_instances_are_shared() {
    let created = Arc::new(AtomicUsize::new(0));
    let created_in_factory = Arc::clone(&created);

    let mut builder = Container::builder();
    builder.component::<Config, _>("app.config", ScopeKind::Application, move |_, _| {
        created_in_factory.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Config {
            url: "postgres://localhost".to_string(),
        }))
    });
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();

    let scope = container.resolution_scope();
    let first = scope
        .resolution()
        .get_as::<Config>(&ContextualId::new("app.config"))
        .unwrap();
    let second = scope
        .resolution()
        .get_as::<Config>(&ContextualId::new("app.config"))
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(first.url, "postgres://localhost");
}

#[test]
fn test_dependency_injection_through_factories() {
    let mut builder = Container::builder();
    builder.component::<Config, _>("app.config", ScopeKind::Application, |_, _| {
        Ok(Arc::new(Config {
            url: "postgres://localhost".to_string(),
        }))
    });
    builder.component::<Repository, _>("req.repository", ScopeKind::Request, |cc, res| {
        let config =
            res.inject_as::<Config>(cc, InjectionPoint::of::<Config>("Repository.config"))?;
        Ok(Arc::new(Repository {
            url: config.url.clone(),
        }))
    });
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();

    let controller = container
        .lifecycle()
        .begin_request(Arc::new(Request::new()))
        .unwrap();
    let repository = controller
        .resolution()
        .get_as::<Repository>(&ContextualId::new("req.repository"))
        .unwrap();
    assert_eq!(repository.url, "postgres://localhost");
    controller.end_request().unwrap();
}

#[test]
fn test_unknown_identifier_is_an_argument_error() {
    let container = Container::builder().build();
    container.lifecycle().begin_application().unwrap();

    let scope = container.resolution_scope();
    let err = scope
        .resolution()
        .get(&ContextualId::new("app.missing"))
        .unwrap_err();
    assert!(matches!(err, ContextError::UnknownContextual(_)));
}

#[test]
fn test_typed_resolution_unsatisfied_and_ambiguous() {
    let mut builder = Container::builder();
    builder.component::<Config, _>("app.a", ScopeKind::Application, |_, _| {
        Ok(Arc::new(Config {
            url: "a".to_string(),
        }))
    });
    builder.component::<Config, _>("app.b", ScopeKind::Application, |_, _| {
        Ok(Arc::new(Config {
            url: "b".to_string(),
        }))
    });
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();

    let scope = container.resolution_scope();
    let resolution = scope.resolution();

    let ambiguous = resolution
        .resolve_by_type(
            contextual_di::TypeKey::of::<Config>(),
            &QualifierSet::default_set(),
        )
        .unwrap_err();
    match ambiguous {
        ContextError::AmbiguousDependency { candidates, .. } => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected ambiguous resolution, got {other}"),
    }

    let unsatisfied = resolution
        .resolve_by_type(
            contextual_di::TypeKey::of::<Repository>(),
            &QualifierSet::default_set(),
        )
        .unwrap_err();
    assert!(matches!(
        unsatisfied,
        ContextError::UnsatisfiedDependency { .. }
    ));
}

#[test]
fn test_qualified_resolution_picks_the_matching_component() {
    let mut builder = Container::builder();
    builder.qualified_component::<Config, _>(
        "app.primary",
        ScopeKind::Application,
        QualifierSet::default_set(),
        |_, _| {
            Ok(Arc::new(Config {
                url: "primary".to_string(),
            }))
        },
    );
    builder.qualified_component::<Config, _>(
        "app.replica",
        ScopeKind::Application,
        QualifierSet::new().with(Qualifier::new("replica")),
        |_, _| {
            Ok(Arc::new(Config {
                url: "replica".to_string(),
            }))
        },
    );
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();

    let scope = container.resolution_scope();
    let resolution = scope.resolution();

    let replica = resolution
        .resolve_by_type(
            contextual_di::TypeKey::of::<Config>(),
            &QualifierSet::new().with(Qualifier::new("replica")),
        )
        .unwrap();
    let replica = contextual_di::downcast::<Config>(&replica).unwrap();
    assert_eq!(replica.url, "replica");
}

#[test]
fn test_end_application_destroys_instances() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let destroyed_in_callback = Arc::clone(&destroyed);

    let mut builder = Container::builder();
    let component = contextual_di::Component::new("app.config", |_, _| {
        Ok(Arc::new(Config {
            url: "x".to_string(),
        }))
    })
    .with_destroy::<Config, _>(move |_| {
        destroyed_in_callback.fetch_add(1, Ordering::SeqCst);
    });
    builder.register(
        contextual_di::ComponentDescriptor::new(
            "app.config",
            contextual_di::TypeKey::of::<Config>(),
            ScopeKind::Application,
            QualifierSet::default_set(),
        ),
        Arc::new(component),
    );
    let container = builder.build();
    container.lifecycle().begin_application().unwrap();

    let scope = container.resolution_scope();
    scope
        .resolution()
        .get_as::<Config>(&ContextualId::new("app.config"))
        .unwrap();

    container.lifecycle().end_application().unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    // The application scope is inactive after end_application.
    let err = scope
        .resolution()
        .get(&ContextualId::new("app.config"))
        .unwrap_err();
    assert!(matches!(err, ContextError::NotActive(ScopeKind::Application)));
}
