//! The interception and decoration invocation pipeline.
//!
//! Given a target instance and a method, this module builds an ordered
//! chain of interceptor invocations (plus an optional decorator chain) and
//! executes it with proceed/re-entrancy semantics:
//!
//! - chain positions are immutable per [`InvocationContext`], so `proceed()`
//!   can be called repeatedly and resumed from other threads;
//! - a method with no applicable interceptors or decorators dispatches
//!   directly with no context allocation;
//! - a re-entrant call on the same managed instance (an interceptor or
//!   decorator invoking another routed method) skips the already-running
//!   pipeline via the call-scoped [`InvocationStack`].

mod context;
mod decorator;
mod handler;
mod invocation;
mod model;
mod params;

pub use context::InterceptionContext;
pub use decorator::{Decorator, DelegateHandle};
pub use handler::{build_invocation_chain, InterceptionHandler, InvocationStack};
pub use invocation::{
    execute_lifecycle_chain, execute_method_chain, ChainEntry, Interceptor, InvocationContext,
    Invokable,
};
pub use model::{InterceptionModel, InterceptionModelBuilder, InterceptionType};
pub use params::{validate_parameters, MethodDescriptor, ParamType, ParamValue};
