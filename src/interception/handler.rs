//! The per-managed-instance method handler and the call-scoped invocation
//! stack.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ContextError, ContextResult};
use crate::interception::context::InterceptionContext;
use crate::interception::decorator::Decorator;
use crate::interception::invocation::{
    execute_lifecycle_chain, execute_method_chain, ChainEntry, Invokable,
};
use crate::interception::model::{InterceptionModel, InterceptionType};
use crate::interception::params::{MethodDescriptor, ParamValue};

/// Call-scoped stack tracking which handlers are mid-invocation.
///
/// When an interceptor or decorator invokes another routed method on the
/// same managed instance, the handler is already on top of this stack and
/// the re-entrant call dispatches straight to the target: interceptors that
/// already ran for the logical invocation are not re-applied. The stack is
/// an explicit object owned by the request controller (or created
/// standalone), not an ambient thread-local, so cross-thread continuations
/// stay type-checked.
#[derive(Default)]
pub struct InvocationStack {
    frames: Mutex<Vec<usize>>,
}

impl InvocationStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `key` unless it is already on top. Returns `None` for the
    /// re-entrant case.
    fn push_if_not_top(&self, key: usize) -> Option<StackFrame<'_>> {
        let mut frames = self.frames.lock();
        if frames.last() == Some(&key) {
            return None;
        }
        frames.push(key);
        Some(StackFrame { stack: self })
    }

    /// Depth of in-flight handler invocations.
    pub fn depth(&self) -> usize {
        self.frames.lock().len()
    }
}

struct StackFrame<'a> {
    stack: &'a InvocationStack,
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        self.stack.frames.lock().pop();
    }
}

/// Builds the ordered invocation chain for `(ty, method)`: declared
/// interceptors first, target-class self-interception last.
///
/// Pure with respect to the handler: chains depend only on the static model
/// and the per-instance interceptor set, which makes them cacheable per
/// method.
pub fn build_invocation_chain(
    model: &InterceptionModel,
    interceptors: &InterceptionContext,
    target: &Arc<dyn Invokable>,
    ty: InterceptionType,
    method: Option<&MethodDescriptor>,
) -> ContextResult<Arc<[ChainEntry]>> {
    let mut entries = Vec::new();
    for id in model.interceptors_for(ty, method) {
        let interceptor = interceptors
            .instance(&id)
            .ok_or(ContextError::UnknownContextual(id))?;
        if interceptor.intercepts(ty) {
            entries.push(ChainEntry {
                interceptor,
                interception_type: ty,
            });
        }
    }
    if let Some(self_interceptor) = target.self_interceptor() {
        if self_interceptor.intercepts(ty) {
            entries.push(ChainEntry {
                interceptor: self_interceptor,
                interception_type: ty,
            });
        }
    }
    Ok(entries.into())
}

/// The explicit per-managed-instance dispatch state machine: ordered
/// interceptor instances, decorator instances and the target, behind a
/// single `invoke(method, args)` entry point.
///
/// This is what a generated forwarding proxy routes every business call
/// into. Chains are cached per `(interception type, method)`; a method with
/// no applicable interceptors and no decorators short-circuits to the target
/// without allocating any invocation context.
pub struct InterceptionHandler {
    target: Arc<dyn Invokable>,
    model: Arc<InterceptionModel>,
    interceptors: InterceptionContext,
    decorators: Arc<[Arc<dyn Decorator>]>,
    chains: Mutex<HashMap<(InterceptionType, Option<MethodDescriptor>), Arc<[ChainEntry]>>>,
}

impl InterceptionHandler {
    /// Creates a handler over a target with its model, instantiated
    /// interceptors and decorator chain.
    pub fn new(
        target: Arc<dyn Invokable>,
        model: Arc<InterceptionModel>,
        interceptors: InterceptionContext,
        decorators: Vec<Arc<dyn Decorator>>,
    ) -> Self {
        Self {
            target,
            model,
            interceptors,
            decorators: decorators.into(),
            chains: Mutex::new(HashMap::new()),
        }
    }

    /// The managed target instance.
    pub fn target(&self) -> &Arc<dyn Invokable> {
        &self.target
    }

    fn stack_key(&self) -> usize {
        self as *const InterceptionHandler as usize
    }

    fn chain_for(
        &self,
        ty: InterceptionType,
        method: Option<&MethodDescriptor>,
    ) -> ContextResult<Arc<[ChainEntry]>> {
        let key = (ty, method.cloned());
        if let Some(chain) = self.chains.lock().get(&key) {
            return Ok(Arc::clone(chain));
        }
        let chain = build_invocation_chain(&self.model, &self.interceptors, &self.target, ty, method)?;
        self.chains.lock().insert(key, Arc::clone(&chain));
        Ok(chain)
    }

    /// Routes a business-method call through interception and decoration.
    pub fn invoke(
        &self,
        stack: &InvocationStack,
        method: &MethodDescriptor,
        args: Vec<ParamValue>,
    ) -> ContextResult<ParamValue> {
        let frame = match stack.push_if_not_top(self.stack_key()) {
            Some(frame) => frame,
            // Re-entrant self-call from an interceptor or decorator of the
            // in-flight invocation: the pipeline already ran, go straight to
            // the target.
            None => return self.target.invoke(method, &args),
        };

        let chain = self.chain_for(InterceptionType::AroundInvoke, Some(method))?;
        let decorated = self.decorators.iter().any(|d| d.decorates(method));
        let result = if chain.is_empty() && !decorated {
            // Non-intercepted fast path: exactly one underlying call, no
            // invocation-context allocation.
            self.target.invoke(method, &args)
        } else {
            let decorators = if decorated {
                Arc::clone(&self.decorators)
            } else {
                Vec::new().into()
            };
            execute_method_chain(
                chain,
                Arc::clone(&self.target),
                decorators,
                method.clone(),
                args,
            )
        };
        drop(frame);
        result
    }

    /// Runs post-construct interception, ending with the target's own
    /// callback.
    pub fn post_construct(&self, stack: &InvocationStack) -> ContextResult<()> {
        self.lifecycle(stack, InterceptionType::PostConstruct)
    }

    /// Runs pre-destroy interception, ending with the target's own callback.
    pub fn pre_destroy(&self, stack: &InvocationStack) -> ContextResult<()> {
        self.lifecycle(stack, InterceptionType::PreDestroy)
    }

    fn lifecycle(&self, stack: &InvocationStack, ty: InterceptionType) -> ContextResult<()> {
        let frame = match stack.push_if_not_top(self.stack_key()) {
            Some(frame) => frame,
            None => {
                return match ty {
                    InterceptionType::PostConstruct => self.target.post_construct(),
                    InterceptionType::PreDestroy => self.target.pre_destroy(),
                    _ => Ok(()),
                };
            }
        };
        let chain = self.chain_for(ty, None)?;
        let result = if chain.is_empty() {
            match ty {
                InterceptionType::PostConstruct => self.target.post_construct(),
                InterceptionType::PreDestroy => self.target.pre_destroy(),
                _ => Ok(()),
            }
        } else {
            execute_lifecycle_chain(chain, Arc::clone(&self.target), ty)
        };
        drop(frame);
        result
    }
}
