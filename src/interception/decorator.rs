//! Decorators: type-preserving wrappers around business methods.

use std::sync::Arc;

use crate::error::ContextResult;
use crate::interception::invocation::Invokable;
use crate::interception::params::{MethodDescriptor, ParamValue};

/// A unit wrapping a target's business-method implementation while
/// preserving its call signature.
///
/// Decorators run after all interceptors and before the target. Each
/// decorator receives a [`DelegateHandle`] carrying its own chain position;
/// invoking the delegate resumes at the next decorator (or the target)
/// rather than restarting the chain.
pub trait Decorator: Send + Sync {
    /// Whether this decorator wraps the given method.
    fn decorates(&self, method: &MethodDescriptor) -> bool;

    /// Invokes the decorator's wrapping logic. Implementations call
    /// `delegate.invoke(..)` to proceed to the wrapped implementation.
    fn invoke(
        &self,
        method: &MethodDescriptor,
        args: &[ParamValue],
        delegate: &DelegateHandle<'_>,
    ) -> ContextResult<ParamValue>;
}

/// The injected delegate of a decorator: forwards to the next decorator in
/// the chain that wraps the method, or to the target itself.
///
/// The position is captured per handle, so a decorator may invoke its
/// delegate repeatedly without affecting other decorators.
pub struct DelegateHandle<'a> {
    decorators: &'a [Arc<dyn Decorator>],
    position: usize,
    target: &'a Arc<dyn Invokable>,
}

impl<'a> DelegateHandle<'a> {
    pub(crate) fn new(
        decorators: &'a [Arc<dyn Decorator>],
        position: usize,
        target: &'a Arc<dyn Invokable>,
    ) -> Self {
        Self {
            decorators,
            position,
            target,
        }
    }

    /// Invokes the wrapped implementation: the next applicable decorator,
    /// or the target method when none remain.
    pub fn invoke(&self, method: &MethodDescriptor, args: &[ParamValue]) -> ContextResult<ParamValue> {
        for (index, decorator) in self
            .decorators
            .iter()
            .enumerate()
            .skip(self.position)
        {
            if decorator.decorates(method) {
                let next = DelegateHandle::new(self.decorators, index + 1, self.target);
                return decorator.invoke(method, args, &next);
            }
        }
        self.target.invoke(method, args)
    }
}

/// Dispatches a method call through the full decorator chain.
pub(crate) fn dispatch_decorated(
    decorators: &[Arc<dyn Decorator>],
    target: &Arc<dyn Invokable>,
    method: &MethodDescriptor,
    args: &[ParamValue],
) -> ContextResult<ParamValue> {
    DelegateHandle::new(decorators, 0, target).invoke(method, args)
}
