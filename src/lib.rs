//! # contextual-di
//!
//! Contextual dependency injection for Rust, inspired by Jakarta CDI:
//! typed, qualified component requests resolved to managed instances,
//! scoped to contextual lifecycles, with interception and decoration around
//! component invocations.
//!
//! ## Features
//!
//! - **Contextual lifecycles**: application, session, request, conversation
//!   and dependent scopes with activation/deactivation/destruction ordering
//! - **Creation-once guarantee**: per-identifier creation locks for shared
//!   scopes; every concurrent caller sees the same instance
//! - **Conversations**: long-running, lockable, timeout-bound state
//!   propagated across requests via a `cid` identifier
//! - **Interception & decoration**: ordered around-invoke and lifecycle
//!   chains with repeatable `proceed()` and re-entrancy handling
//! - **Call-site facades**: `Instance`, `Event`, `InjectionPoint` and
//!   `BeanMetadata` resolved against the caller's injection point
//! - **No global state**: an explicit [`Container`] handle instead of a
//!   process-wide singleton
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use contextual_di::{Container, InjectionPoint, Request, ScopeKind};
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Repository {
//!     url: String,
//! }
//!
//! // Register components (normally done by a metadata layer)
//! let mut builder = Container::builder();
//! builder.component::<Config, _>("app.config", ScopeKind::Application, |_, _| {
//!     Ok(Arc::new(Config {
//!         url: "postgres://localhost".to_string(),
//!     }))
//! });
//! builder.component::<Repository, _>("req.repository", ScopeKind::Request, |cc, res| {
//!     let config =
//!         res.inject_as::<Config>(cc, InjectionPoint::of::<Config>("Repository.config"))?;
//!     Ok(Arc::new(Repository {
//!         url: config.url.clone(),
//!     }))
//! });
//! let container = builder.build();
//!
//! // Drive the lifecycle the way request-handling glue would
//! container.lifecycle().begin_application().unwrap();
//! let controller = container
//!     .lifecycle()
//!     .begin_request(Arc::new(Request::new()))
//!     .unwrap();
//!
//! let repo = controller
//!     .resolution()
//!     .get_as::<Repository>(&"req.repository".into())
//!     .unwrap();
//! assert_eq!(repo.url, "postgres://localhost");
//!
//! controller.end_request().unwrap();
//! container.lifecycle().end_application().unwrap();
//! ```
//!
//! ## Scopes
//!
//! - **Application**: one shared store for the container lifetime,
//!   multithreaded with per-identifier creation locks
//! - **Session**: bound to a session attribute map, reattached across
//!   requests
//! - **Request**: thread-confined, destroyed at request end
//! - **Conversation**: request-backed, promotable to span requests; see
//!   [`ConversationContext`]
//! - **Dependent**: no storage; instances die with their owner's
//!   [`CreationalContext`]

// Module declarations
pub mod builtin;
pub mod container;
pub mod context;
pub mod contextual;
pub mod creational;
pub mod error;
pub mod injection;
pub mod interception;
pub mod key;
pub mod lifecycle;
pub mod store;

// Re-export core types
pub use builtin::{BeanMetadataHandle, EventHandle, InstanceHandle};
pub use container::{
    Container, ContainerBuilder, ContextSource, Resolution, StandaloneResolution,
};
pub use context::{
    ApplicationContext, Context, ConversationContext, ConversationIdGenerator, DependentContext,
    ManagedConversation, Request, RequestContext, Session, SessionContext,
    DEFAULT_CONCURRENT_ACCESS_TIMEOUT_MS, DEFAULT_CONVERSATION_TIMEOUT_MS,
};
pub use contextual::{
    downcast, AnyArc, Component, ComponentDescriptor, Contextual, ContextualId,
    ContextualInstance, ScopeKind,
};
pub use creational::CreationalContext;
pub use error::{ContextError, ContextResult};
pub use injection::{InjectionPoint, InjectionPointStack, Qualifier, QualifierSet};
pub use interception::{
    build_invocation_chain, validate_parameters, ChainEntry, Decorator, DelegateHandle,
    InterceptionContext, InterceptionHandler, InterceptionModel, InterceptionModelBuilder,
    InterceptionType, Interceptor, InvocationContext, InvocationStack, Invokable,
    MethodDescriptor, ParamType, ParamValue,
};
pub use key::TypeKey;
pub use lifecycle::{ContainerLifecycle, RequestController};
pub use store::{
    AttributeBeanStore, AttributeMap, Attributes, BeanStore, HashMapBeanStore, LockStore,
    NamingScheme,
};
