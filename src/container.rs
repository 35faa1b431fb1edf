//! The container: the explicit runtime handle threaded through every
//! component.
//!
//! There is no global `instance()`-style lookup: everything that needs
//! cross-cutting services (the component registry, contexts, observers,
//! interception models) receives a [`Container`] handle, which keeps
//! multi-container and test-isolation scenarios tractable.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builtin::{
    BeanMetadataComponent, EventComponent, InjectionPointComponent, InstanceComponent,
    ObserverRegistry, BEAN_METADATA_COMPONENT_ID, EVENT_COMPONENT_ID,
    INJECTION_POINT_COMPONENT_ID, INSTANCE_COMPONENT_ID,
};
use crate::builtin::{BeanMetadataHandle, EventHandle, InstanceHandle};
use crate::context::{ApplicationContext, Context, DependentContext};
use crate::contextual::{
    AnyArc, Component, ComponentDescriptor, Contextual, ContextualId, ScopeKind,
};
use crate::creational::CreationalContext;
use crate::error::{ContextError, ContextResult};
use crate::injection::{InjectionPoint, InjectionPointStack, Qualifier, QualifierSet};
use crate::interception::{
    Decorator, InterceptionContext, InterceptionHandler, InterceptionModel, Interceptor,
};
use crate::key::TypeKey;
use crate::lifecycle::ContainerLifecycle;

type InterceptorFactory = Box<
    dyn for<'a> Fn(&Arc<CreationalContext>, &Resolution<'a>) -> ContextResult<Arc<dyn Interceptor>>
        + Send
        + Sync,
>;
type DecoratorFactory = Box<
    dyn for<'a> Fn(&Arc<CreationalContext>, &Resolution<'a>) -> ContextResult<Arc<dyn Decorator>>
        + Send
        + Sync,
>;

pub(crate) struct RegisteredComponent {
    descriptor: Arc<ComponentDescriptor>,
    contextual: Arc<dyn Contextual>,
    interception_model: Arc<InterceptionModel>,
    decorators: Vec<ContextualId>,
}

/// Finds the active context for a scope.
///
/// Implemented by the request controller (request/session/conversation
/// scopes live on it) and by standalone resolution scopes (application and
/// dependent only).
pub trait ContextSource: Send + Sync {
    /// The active context for `scope`, or a not-active error.
    fn context(&self, scope: ScopeKind) -> ContextResult<&dyn Context>;
}

struct ContainerInner {
    components: HashMap<ContextualId, RegisteredComponent>,
    by_type: HashMap<TypeKey, Vec<ContextualId>>,
    interceptors: HashMap<ContextualId, InterceptorFactory>,
    decorators: HashMap<ContextualId, DecoratorFactory>,
    observers: ObserverRegistry,
    application: ApplicationContext,
    dependent: DependentContext,
}

/// The immutable runtime container.
///
/// Built once from a [`ContainerBuilder`]; cheap to clone (a shared handle).
/// Resolution happens through a [`Resolution`] obtained from a request
/// controller ([`crate::lifecycle::RequestController::resolution`]) or a
/// standalone scope ([`Container::resolution_scope`]).
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Starts building a container.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// The lifecycle orchestrator for this container.
    pub fn lifecycle(&self) -> ContainerLifecycle {
        ContainerLifecycle::new(self.clone())
    }

    /// The shared application context.
    pub fn application_context(&self) -> &ApplicationContext {
        &self.inner.application
    }

    /// The dependent pseudo-context.
    pub fn dependent_context(&self) -> &DependentContext {
        &self.inner.dependent
    }

    /// The descriptor registered under `id`.
    pub fn descriptor(&self, id: &ContextualId) -> Option<Arc<ComponentDescriptor>> {
        self.inner
            .components
            .get(id)
            .map(|component| Arc::clone(&component.descriptor))
    }

    /// The contextual registered under `id`.
    pub fn contextual(&self, id: &ContextualId) -> Option<Arc<dyn Contextual>> {
        self.inner
            .components
            .get(id)
            .map(|component| Arc::clone(&component.contextual))
    }

    /// The interception model bound to a component (empty when none was).
    pub fn interception_model(&self, id: &ContextualId) -> Arc<InterceptionModel> {
        self.inner
            .components
            .get(id)
            .map(|component| Arc::clone(&component.interception_model))
            .unwrap_or_else(InterceptionModel::empty)
    }

    /// Identifiers of all components satisfying `(ty, qualifiers)`.
    pub fn candidates(&self, ty: &TypeKey, qualifiers: &QualifierSet) -> Vec<ContextualId> {
        self.inner
            .by_type
            .get(ty)
            .map(|ids| {
                ids.iter()
                    .filter(|id| {
                        self.inner.components[*id]
                            .descriptor
                            .satisfies(ty, qualifiers)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A standalone resolution scope over the application and dependent
    /// contexts, for use outside any request.
    pub fn resolution_scope(&self) -> StandaloneResolution {
        StandaloneResolution {
            container: self.clone(),
            stack: InjectionPointStack::new(),
        }
    }

    /// Builds the interception handler for a managed instance of the given
    /// component: instantiates its interceptors and decorators and wires
    /// them around the target.
    pub fn handler_for(
        &self,
        component_id: &ContextualId,
        target: Arc<dyn crate::interception::Invokable>,
        creational: &Arc<CreationalContext>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<InterceptionHandler> {
        let registered = self
            .inner
            .components
            .get(component_id)
            .ok_or_else(|| ContextError::UnknownContextual(component_id.clone()))?;
        let interceptors =
            InterceptionContext::of(&registered.interception_model, creational, resolution)?;
        let mut decorators = Vec::with_capacity(registered.decorators.len());
        for id in &registered.decorators {
            decorators.push(self.create_decorator(id, creational, resolution)?);
        }
        Ok(InterceptionHandler::new(
            target,
            Arc::clone(&registered.interception_model),
            interceptors,
            decorators,
        ))
    }

    pub(crate) fn observers(&self) -> &ObserverRegistry {
        &self.inner.observers
    }

    pub(crate) fn create_interceptor(
        &self,
        id: &ContextualId,
        creational: &Arc<CreationalContext>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<Arc<dyn Interceptor>> {
        let factory = self
            .inner
            .interceptors
            .get(id)
            .ok_or_else(|| ContextError::UnknownContextual(id.clone()))?;
        factory(creational, resolution)
    }

    pub(crate) fn create_decorator(
        &self,
        id: &ContextualId,
        creational: &Arc<CreationalContext>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<Arc<dyn Decorator>> {
        let factory = self
            .inner
            .decorators
            .get(id)
            .ok_or_else(|| ContextError::UnknownContextual(id.clone()))?;
        factory(creational, resolution)
    }

    fn registered(&self, id: &ContextualId) -> ContextResult<&RegisteredComponent> {
        self.inner
            .components
            .get(id)
            .ok_or_else(|| ContextError::UnknownContextual(id.clone()))
    }

    fn unique(&self, ty: &TypeKey, qualifiers: &QualifierSet) -> ContextResult<&RegisteredComponent> {
        let candidates = self.candidates(ty, qualifiers);
        match candidates.len() {
            0 => Err(ContextError::UnsatisfiedDependency {
                ty: ty.name(),
                qualifiers: qualifiers.render(),
            }),
            1 => self.registered(&candidates[0]),
            _ => Err(ContextError::AmbiguousDependency {
                ty: ty.name(),
                qualifiers: qualifiers.render(),
                candidates,
            }),
        }
    }
}

/// A resolution scope usable outside any request: only the application and
/// dependent contexts are reachable.
pub struct StandaloneResolution {
    container: Container,
    stack: InjectionPointStack,
}

impl StandaloneResolution {
    /// The resolution handle for this scope.
    pub fn resolution(&self) -> Resolution<'_> {
        Resolution::new(&self.container, self, &self.stack)
    }
}

impl ContextSource for StandaloneResolution {
    fn context(&self, scope: ScopeKind) -> ContextResult<&dyn Context> {
        match scope {
            ScopeKind::Application => Ok(self.container.application_context() as &dyn Context),
            ScopeKind::Dependent => Ok(self.container.dependent_context() as &dyn Context),
            other => Err(ContextError::NotActive(other)),
        }
    }
}

/// The call-scoped resolution handle: the container, the active context set
/// and the injection-point stack, passed explicitly through every factory.
#[derive(Clone, Copy)]
pub struct Resolution<'a> {
    container: &'a Container,
    source: &'a dyn ContextSource,
    stack: &'a InjectionPointStack,
}

impl<'a> Resolution<'a> {
    pub(crate) fn new(
        container: &'a Container,
        source: &'a dyn ContextSource,
        stack: &'a InjectionPointStack,
    ) -> Self {
        Self {
            container,
            source,
            stack,
        }
    }

    /// The owning container.
    pub fn container(&self) -> &Container {
        self.container
    }

    /// The active context for `scope`.
    pub fn context(&self, scope: ScopeKind) -> ContextResult<&dyn Context> {
        self.source.context(scope)
    }

    /// The injection point currently being resolved, if any.
    pub fn current_injection_point(&self) -> Option<InjectionPoint> {
        self.stack.peek()
    }

    /// Resolves a contextual instance by identifier (a top-level request
    /// with a fresh creational context).
    pub fn get(&self, id: &ContextualId) -> ContextResult<AnyArc> {
        let registered = self.container.registered(id)?;
        self.reference(registered, None)
    }

    /// Resolves by identifier and downcasts.
    pub fn get_as<T: Send + Sync + 'static>(&self, id: &ContextualId) -> ContextResult<Arc<T>> {
        self.get(id)?
            .downcast::<T>()
            .map_err(|_| ContextError::UnknownContextual(id.clone()))
    }

    /// Resolves one dependency for an injection point, on behalf of the
    /// component being created with `parent`.
    ///
    /// The injection point is pushed onto the stack for the duration of the
    /// resolution, so built-in facades observe their caller. A construction
    /// in progress registered for the resolved component (circular
    /// injection) is returned as-is.
    pub fn inject(
        &self,
        parent: &Arc<CreationalContext>,
        point: InjectionPoint,
    ) -> ContextResult<AnyArc> {
        let registered = self
            .container
            .unique(&point.requested_type, &point.qualifiers)?;
        if let Some(incomplete) = parent.incomplete_for(&registered.descriptor.id) {
            return Ok(incomplete);
        }
        let _frame = self.stack.push(point);
        self.reference(registered, Some(parent))
    }

    /// Resolves one dependency and downcasts.
    pub fn inject_as<T: Send + Sync + 'static>(
        &self,
        parent: &Arc<CreationalContext>,
        point: InjectionPoint,
    ) -> ContextResult<Arc<T>> {
        let qualifiers = point.qualifiers.clone();
        self.inject(parent, point)?
            .downcast::<T>()
            .map_err(|_| ContextError::UnsatisfiedDependency {
                ty: std::any::type_name::<T>(),
                qualifiers: qualifiers.render(),
            })
    }

    /// Resolves the unique component for `(ty, qualifiers)` as a top-level
    /// request. Backs the `Instance` facade.
    pub fn resolve_by_type(&self, ty: TypeKey, qualifiers: &QualifierSet) -> ContextResult<AnyArc> {
        let registered = self.container.unique(&ty, qualifiers)?;
        self.reference(registered, None)
    }

    fn reference(
        &self,
        registered: &RegisteredComponent,
        parent: Option<&Arc<CreationalContext>>,
    ) -> ContextResult<AnyArc> {
        let descriptor = &registered.descriptor;
        let contextual = Arc::clone(&registered.contextual);
        let creational = match (descriptor.scope, parent) {
            // Dependent instances join their owner's graph; everything else
            // owns an independent lifecycle.
            (ScopeKind::Dependent, Some(parent)) => parent.child(descriptor.id.clone()),
            _ => CreationalContext::root(descriptor.id.clone()),
        };
        let context = self.context(descriptor.scope)?;
        context
            .get(&contextual, Some(&creational), self)?
            .ok_or(ContextError::IllegalState(
                "no backing store available for scope",
            ))
    }
}

/// Builder assembling the immutable component registry of a [`Container`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use contextual_di::{Container, ScopeKind};
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// let mut builder = Container::builder();
/// builder.component::<Greeter, _>("app.greeter", ScopeKind::Application, |_, _| {
///     Ok(Arc::new(Greeter {
///         greeting: "hello".to_string(),
///     }))
/// });
/// let container = builder.build();
///
/// container.lifecycle().begin_application().unwrap();
/// let scope = container.resolution_scope();
/// let greeter = scope
///     .resolution()
///     .get_as::<Greeter>(&"app.greeter".into())
///     .unwrap();
/// assert_eq!(greeter.greeting, "hello");
/// ```
pub struct ContainerBuilder {
    components: HashMap<ContextualId, RegisteredComponent>,
    interceptors: HashMap<ContextualId, InterceptorFactory>,
    decorators: HashMap<ContextualId, DecoratorFactory>,
    pending_models: HashMap<ContextualId, Arc<InterceptionModel>>,
    pending_decorators: HashMap<ContextualId, Vec<ContextualId>>,
    observers: ObserverRegistry,
}

impl ContainerBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
            interceptors: HashMap::new(),
            decorators: HashMap::new(),
            pending_models: HashMap::new(),
            pending_decorators: HashMap::new(),
            observers: ObserverRegistry::new(),
        }
    }

    /// Registers a component from its pre-computed descriptor and
    /// contextual.
    pub fn register(
        &mut self,
        descriptor: ComponentDescriptor,
        contextual: Arc<dyn Contextual>,
    ) -> &mut Self {
        self.components.insert(
            descriptor.id.clone(),
            RegisteredComponent {
                descriptor: Arc::new(descriptor),
                contextual,
                interception_model: InterceptionModel::empty(),
                decorators: Vec::new(),
            },
        );
        self
    }

    /// Registers a component exposing type `T` with default qualifiers.
    pub fn component<T, F>(
        &mut self,
        id: impl Into<ContextualId>,
        scope: ScopeKind,
        factory: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: for<'r> Fn(&Arc<CreationalContext>, &Resolution<'r>) -> ContextResult<Arc<T>>
            + Send
            + Sync
            + 'static,
    {
        let id = id.into();
        let descriptor = ComponentDescriptor::new(
            id.clone(),
            TypeKey::of::<T>(),
            scope,
            QualifierSet::default_set(),
        );
        self.register(descriptor, Arc::new(Component::new::<T, F>(id, factory)))
    }

    /// Registers a component with explicit qualifiers.
    pub fn qualified_component<T, F>(
        &mut self,
        id: impl Into<ContextualId>,
        scope: ScopeKind,
        qualifiers: QualifierSet,
        factory: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: for<'r> Fn(&Arc<CreationalContext>, &Resolution<'r>) -> ContextResult<Arc<T>>
            + Send
            + Sync
            + 'static,
    {
        let id = id.into();
        let descriptor =
            ComponentDescriptor::new(id.clone(), TypeKey::of::<T>(), scope, qualifiers);
        self.register(descriptor, Arc::new(Component::new::<T, F>(id, factory)))
    }

    /// Registers an interceptor factory under `id`.
    pub fn interceptor<F>(&mut self, id: impl Into<ContextualId>, factory: F) -> &mut Self
    where
        F: for<'r> Fn(&Arc<CreationalContext>, &Resolution<'r>) -> ContextResult<Arc<dyn Interceptor>>
            + Send
            + Sync
            + 'static,
    {
        self.interceptors.insert(id.into(), Box::new(factory));
        self
    }

    /// Registers a decorator factory under `id`.
    pub fn decorator<F>(&mut self, id: impl Into<ContextualId>, factory: F) -> &mut Self
    where
        F: for<'r> Fn(&Arc<CreationalContext>, &Resolution<'r>) -> ContextResult<Arc<dyn Decorator>>
            + Send
            + Sync
            + 'static,
    {
        self.decorators.insert(id.into(), Box::new(factory));
        self
    }

    /// Binds a pre-computed interception model to a component.
    pub fn interception_model(
        &mut self,
        component_id: impl Into<ContextualId>,
        model: Arc<InterceptionModel>,
    ) -> &mut Self {
        self.pending_models.insert(component_id.into(), model);
        self
    }

    /// Binds an ordered decorator chain to a component.
    pub fn bind_decorators(
        &mut self,
        component_id: impl Into<ContextualId>,
        decorator_ids: Vec<ContextualId>,
    ) -> &mut Self {
        self.pending_decorators
            .insert(component_id.into(), decorator_ids);
        self
    }

    /// Registers an observer method notified for events of type `T` whose
    /// qualifiers satisfy `qualifiers`.
    pub fn observe<T: Send + Sync + 'static>(
        &mut self,
        qualifiers: QualifierSet,
        observer: impl Fn(Arc<T>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.observers.register(qualifiers, observer);
        self
    }

    /// Finishes the container, wiring pending bindings and the built-in
    /// facade components.
    pub fn build(mut self) -> Container {
        self.register_builtin::<InstanceHandle>(INSTANCE_COMPONENT_ID, Arc::new(InstanceComponent::new()));
        self.register_builtin::<EventHandle>(EVENT_COMPONENT_ID, Arc::new(EventComponent::new()));
        self.register_builtin::<InjectionPoint>(
            INJECTION_POINT_COMPONENT_ID,
            Arc::new(InjectionPointComponent::new()),
        );
        self.register_builtin::<BeanMetadataHandle>(
            BEAN_METADATA_COMPONENT_ID,
            Arc::new(BeanMetadataComponent::new()),
        );

        for (id, model) in self.pending_models {
            if let Some(component) = self.components.get_mut(&id) {
                component.interception_model = model;
            }
        }
        for (id, decorators) in self.pending_decorators {
            if let Some(component) = self.components.get_mut(&id) {
                component.decorators = decorators;
            }
        }

        let mut by_type: HashMap<TypeKey, Vec<ContextualId>> = HashMap::new();
        let mut ids: Vec<&ContextualId> = self.components.keys().collect();
        ids.sort();
        for id in ids {
            let component = &self.components[id];
            for ty in &component.descriptor.types {
                by_type.entry(*ty).or_default().push(id.clone());
            }
        }

        Container {
            inner: Arc::new(ContainerInner {
                components: self.components,
                by_type,
                interceptors: self.interceptors,
                decorators: self.decorators,
                observers: self.observers,
                application: ApplicationContext::new(),
                dependent: DependentContext::new(),
            }),
        }
    }

    fn register_builtin<T: 'static>(&mut self, id: &str, contextual: Arc<dyn Contextual>) {
        // Built-in facades match any qualifier set: the qualifiers of a
        // facade injection point constrain the type argument, not the facade
        // component itself.
        let descriptor = ComponentDescriptor::new(
            id,
            TypeKey::of::<T>(),
            ScopeKind::Dependent,
            QualifierSet::new().with(Qualifier::new("any")),
        );
        self.components.insert(
            descriptor.id.clone(),
            RegisteredComponent {
                descriptor: Arc::new(descriptor),
                contextual,
                interception_model: InterceptionModel::empty(),
                decorators: Vec::new(),
            },
        );
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
