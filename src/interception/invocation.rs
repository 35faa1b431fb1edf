//! Invocation chains and the immutable-position invocation context.
//!
//! A chain is an ordered list of interceptor entries followed, implicitly,
//! by the terminal target dispatch (decorators, then the real method). Each
//! [`InvocationContext`] captures its chain position immutably: `proceed()`
//! invokes the next entry with a fresh context, so a context can be called
//! repeatedly (or resumed from another thread) without shared-cursor races.
//! Proceeding past the end of the chain re-invokes the terminal target
//! dispatch; repeated terminal proceeds are the documented idempotent repeat
//! policy.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::contextual::AnyArc;
use crate::error::{ContextError, ContextResult};
use crate::interception::decorator::{dispatch_decorated, Decorator};
use crate::interception::model::InterceptionType;
use crate::interception::params::{validate_parameters, MethodDescriptor, ParamValue};

/// The opaque routing contract standing in for a generated forwarding proxy:
/// a managed instance the pipeline can dispatch dynamic method calls and
/// lifecycle callbacks to.
pub trait Invokable: Send + Sync {
    /// Invokes a business method on the real instance.
    fn invoke(&self, method: &MethodDescriptor, args: &[ParamValue]) -> ContextResult<ParamValue>;

    /// The target's own post-construct callback.
    fn post_construct(&self) -> ContextResult<()> {
        Ok(())
    }

    /// The target's own pre-destroy callback.
    fn pre_destroy(&self) -> ContextResult<()> {
        Ok(())
    }

    /// Target-class self-interception: an interceptor implemented by the
    /// managed type itself, running after all declared interceptors.
    fn self_interceptor(&self) -> Option<Arc<dyn Interceptor>> {
        None
    }
}

/// A cross-cutting unit invoked around method calls or lifecycle events.
pub trait Interceptor: Send + Sync {
    /// Whether this interceptor participates in the given interception type.
    fn intercepts(&self, ty: InterceptionType) -> bool;

    /// Runs the interceptor. Implementations call `ctx.proceed()` to
    /// continue down the chain and may do so more than once.
    fn intercept(&self, ty: InterceptionType, ctx: &InvocationContext)
        -> ContextResult<ParamValue>;
}

/// One position in an invocation chain.
#[derive(Clone)]
pub struct ChainEntry {
    pub(crate) interceptor: Arc<dyn Interceptor>,
    pub(crate) interception_type: InterceptionType,
}

enum InvocationKind {
    Method(MethodDescriptor),
    Lifecycle(InterceptionType),
}

struct InvocationShared {
    kind: InvocationKind,
    target: Arc<dyn Invokable>,
    decorators: Arc<[Arc<dyn Decorator>]>,
    chain: Arc<[ChainEntry]>,
    parameters: Mutex<Vec<ParamValue>>,
    context_data: Mutex<HashMap<String, AnyArc>>,
}

impl InvocationShared {
    fn dispatch_target(&self) -> ContextResult<ParamValue> {
        match &self.kind {
            InvocationKind::Method(method) => {
                let args = self.parameters.lock().clone();
                if self.decorators.is_empty() {
                    self.target.invoke(method, &args)
                } else {
                    dispatch_decorated(&self.decorators, &self.target, method, &args)
                }
            }
            InvocationKind::Lifecycle(ty) => {
                match ty {
                    InterceptionType::PostConstruct => self.target.post_construct()?,
                    InterceptionType::PreDestroy => self.target.pre_destroy()?,
                    _ => {}
                }
                Ok(ParamValue::Null)
            }
        }
    }
}

/// The context handed to each interceptor in a chain.
///
/// The position is immutable per context object; [`proceed`] advances by
/// constructing the next context, never by mutating shared state. Mutable
/// invocation state (the parameter array, the context-data map) is shared
/// across the whole logical invocation, so a parameter replacement is
/// visible downstream.
///
/// [`proceed`]: InvocationContext::proceed
#[derive(Clone)]
pub struct InvocationContext {
    shared: Arc<InvocationShared>,
    position: usize,
}

impl InvocationContext {
    /// Advances to the next chain entry, or performs the terminal target
    /// dispatch when the chain is exhausted.
    ///
    /// Calling `proceed()` again on the terminal context re-invokes the
    /// target (idempotent repeat).
    pub fn proceed(&self) -> ContextResult<ParamValue> {
        match self.shared.chain.get(self.position) {
            Some(entry) => {
                let next = InvocationContext {
                    shared: Arc::clone(&self.shared),
                    position: self.position + 1,
                };
                entry.interceptor.intercept(entry.interception_type, &next)
            }
            None => self.shared.dispatch_target(),
        }
    }

    /// The intercepted method, or `None` during lifecycle interception.
    pub fn method(&self) -> Option<&MethodDescriptor> {
        match &self.shared.kind {
            InvocationKind::Method(method) => Some(method),
            InvocationKind::Lifecycle(_) => None,
        }
    }

    /// The interception type this chain was built for.
    pub fn interception_type(&self) -> InterceptionType {
        match &self.shared.kind {
            InvocationKind::Method(_) => InterceptionType::AroundInvoke,
            InvocationKind::Lifecycle(ty) => *ty,
        }
    }

    /// The managed target instance.
    pub fn target(&self) -> &Arc<dyn Invokable> {
        &self.shared.target
    }

    /// The current argument array. Illegal during lifecycle interception.
    pub fn parameters(&self) -> ContextResult<Vec<ParamValue>> {
        match &self.shared.kind {
            InvocationKind::Method(_) => Ok(self.shared.parameters.lock().clone()),
            InvocationKind::Lifecycle(_) => Err(ContextError::IllegalState(
                "parameters are not available during lifecycle interception",
            )),
        }
    }

    /// Replaces the argument array after validating each element against the
    /// declared parameter types (widening and boxing conversions allowed).
    /// Illegal during lifecycle interception.
    pub fn set_parameters(&self, params: Vec<ParamValue>) -> ContextResult<()> {
        match &self.shared.kind {
            InvocationKind::Method(method) => {
                validate_parameters(method, &params)?;
                *self.shared.parameters.lock() = params;
                Ok(())
            }
            InvocationKind::Lifecycle(_) => Err(ContextError::IllegalState(
                "parameters are not available during lifecycle interception",
            )),
        }
    }

    /// Stores a context-data entry shared along the chain.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.shared
            .context_data
            .lock()
            .insert(key.into(), Arc::new(value));
    }

    /// Reads a context-data entry stored by an earlier chain position.
    pub fn data<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.shared
            .context_data
            .lock()
            .get(key)
            .and_then(|value| value.clone().downcast::<T>().ok())
    }
}

/// Executes a built chain around a business-method call.
///
/// This is the pure chain-execution entry point; the per-instance handler
/// adds caching and the empty-chain shortcut on top.
pub fn execute_method_chain(
    chain: Arc<[ChainEntry]>,
    target: Arc<dyn Invokable>,
    decorators: Arc<[Arc<dyn Decorator>]>,
    method: MethodDescriptor,
    args: Vec<ParamValue>,
) -> ContextResult<ParamValue> {
    let shared = Arc::new(InvocationShared {
        kind: InvocationKind::Method(method),
        target,
        decorators,
        chain,
        parameters: Mutex::new(args),
        context_data: Mutex::new(HashMap::new()),
    });
    InvocationContext { shared, position: 0 }.proceed()
}

/// Executes a built chain around a lifecycle event. Lifecycle chains take no
/// parameters; the terminal dispatch invokes the target's own callback.
pub fn execute_lifecycle_chain(
    chain: Arc<[ChainEntry]>,
    target: Arc<dyn Invokable>,
    ty: InterceptionType,
) -> ContextResult<()> {
    let shared = Arc::new(InvocationShared {
        kind: InvocationKind::Lifecycle(ty),
        target,
        decorators: Vec::new().into(),
        chain,
        parameters: Mutex::new(Vec::new()),
        context_data: Mutex::new(HashMap::new()),
    });
    InvocationContext { shared, position: 0 }.proceed().map(|_| ())
}
