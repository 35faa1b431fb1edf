//! The context lifecycle orchestrator.
//!
//! Sequences activation and deactivation of the nested scopes per
//! application/session/request/conversation boundary. Every `begin*`/
//! `restore*` call must be matched by its `end*`/`teardown*` counterpart;
//! skipping an end call leaks the bound stores and is a caller bug, not a
//! recoverable condition.

use std::sync::Arc;

use tracing::debug;

use crate::container::{Container, ContextSource, Resolution};
use crate::context::{
    Context, ConversationContext, Request, RequestContext, Session, SessionContext,
};
use crate::contextual::ScopeKind;
use crate::error::{ContextError, ContextResult};
use crate::injection::InjectionPointStack;
use crate::interception::InvocationStack;

/// Orchestrates scope activation for one container.
pub struct ContainerLifecycle {
    container: Container,
}

impl ContainerLifecycle {
    pub(crate) fn new(container: Container) -> Self {
        Self { container }
    }

    /// Activates the application context. Must be called once before any
    /// resolution; fails when already begun.
    pub fn begin_application(&self) -> ContextResult<()> {
        debug!("application context begun");
        self.container.application_context().activate()
    }

    /// Destroys all application-scoped instances and deactivates the
    /// application context.
    pub fn end_application(&self) -> ContextResult<()> {
        debug!("application context ended");
        self.container.application_context().invalidate()
    }

    /// Begins a request pass: activates the request context and associates
    /// the conversation context with the request.
    ///
    /// The session and conversation scopes stay inactive until
    /// [`RequestController::restore_session`] and
    /// [`RequestController::restore_conversation`] are called.
    pub fn begin_request(&self, request: Arc<Request>) -> ContextResult<RequestController> {
        let controller = RequestController {
            container: self.container.clone(),
            request_ctx: RequestContext::new(false),
            session_ctx: SessionContext::new(),
            conversation_ctx: ConversationContext::new(),
            injection_points: InjectionPointStack::new(),
            invocations: InvocationStack::new(),
            request,
        };
        controller.request_ctx.activate()?;
        controller
            .conversation_ctx
            .associate(Arc::clone(&controller.request));
        debug!("request begun");
        Ok(controller)
    }

    /// Ends a session outside any request: destroys every conversation it
    /// knows about, then every session-scoped instance.
    pub fn end_session(&self, session: &Arc<Session>) -> ContextResult<()> {
        ConversationContext::new().destroy_session(session);
        SessionContext::new().destroy_session(session)?;
        debug!("session ended");
        Ok(())
    }
}

/// The per-request handle bundling the request-confined contexts, the
/// injection-point stack and the invocation stack.
///
/// This is the explicit replacement for thread-local scope storage: the
/// controller is passed (not ambient), so execution models that hop threads
/// remain correct as long as one logical request uses the controller from
/// one thread at a time. Deactivating a controller from a non-owning thread
/// while the owner is mid-resolution is undefined behavior and a caller
/// bug.
pub struct RequestController {
    container: Container,
    request: Arc<Request>,
    request_ctx: RequestContext,
    session_ctx: SessionContext,
    conversation_ctx: ConversationContext,
    injection_points: InjectionPointStack,
    invocations: InvocationStack,
}

impl RequestController {
    /// The owning container.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The request this controller manages.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// The conversation context of this request pass.
    pub fn conversation_context(&self) -> &ConversationContext {
        &self.conversation_ctx
    }

    /// The call-scoped invocation stack for intercepted components resolved
    /// through this request.
    pub fn invocation_stack(&self) -> &InvocationStack {
        &self.invocations
    }

    /// The resolution handle over this request's active contexts.
    pub fn resolution(&self) -> Resolution<'_> {
        Resolution::new(&self.container, self, &self.injection_points)
    }

    /// Binds and activates the session context for this pass. The request
    /// must carry a session.
    pub fn restore_session(&self) -> ContextResult<()> {
        let session = self
            .request
            .session()
            .ok_or(ContextError::IllegalState("request carries no session"))?;
        self.session_ctx.associate(Arc::clone(session));
        self.session_ctx.activate()
    }

    /// Deactivates the session context; session-scoped state stays in the
    /// session attributes for the next request.
    pub fn release_session(&self) -> ContextResult<()> {
        self.session_ctx.deactivate()?;
        self.session_ctx.dissociate();
        Ok(())
    }

    /// Activates the conversation context, restoring the conversation `cid`
    /// names or starting a fresh transient one. See
    /// [`ConversationContext::activate`] for the busy/nonexistent error
    /// semantics.
    pub fn restore_conversation(&self, cid: Option<&str>) -> ContextResult<()> {
        self.conversation_ctx.activate(cid)
    }

    /// Deactivates and dissociates the conversation context.
    pub fn teardown_conversation(&self) -> ContextResult<()> {
        let outcome = self.conversation_ctx.deactivate();
        self.conversation_ctx.dissociate(&self.request);
        outcome
    }

    /// Ends the request pass, tearing contexts down in reverse dependency
    /// order: conversation, then request-scoped instances, then the session
    /// binding. Teardown continues past individual failures; the first error
    /// is returned.
    pub fn end_request(self) -> ContextResult<()> {
        let mut first_error: Option<ContextError> = None;
        let mut record = |outcome: ContextResult<()>| {
            if let Err(error) = outcome {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        };

        if self.conversation_ctx.is_active() {
            record(self.conversation_ctx.deactivate());
        }
        self.conversation_ctx.dissociate(&self.request);

        record(self.request_ctx.invalidate());
        record(self.request_ctx.deactivate());

        if self.session_ctx.is_active() {
            record(self.session_ctx.deactivate());
        }
        self.session_ctx.dissociate();

        debug!("request ended");
        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }
}

impl ContextSource for RequestController {
    fn context(&self, scope: ScopeKind) -> ContextResult<&dyn Context> {
        match scope {
            ScopeKind::Application => Ok(self.container.application_context() as &dyn Context),
            ScopeKind::Dependent => Ok(self.container.dependent_context() as &dyn Context),
            ScopeKind::Request => Ok(&self.request_ctx as &dyn Context),
            ScopeKind::Session => Ok(&self.session_ctx as &dyn Context),
            ScopeKind::Conversation => Ok(&self.conversation_ctx as &dyn Context),
        }
    }
}
