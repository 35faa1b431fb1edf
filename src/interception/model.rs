//! The static interception model: which interceptors apply where.
//!
//! The model is computed by the (external) metadata layer at discovery time
//! and consumed immutably by the runtime. Chains built from it are therefore
//! safely cacheable per method.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::contextual::ContextualId;
use crate::interception::params::MethodDescriptor;

/// The kinds of interception a chain can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptionType {
    /// Around a business-method invocation.
    AroundInvoke,
    /// Around a timer callback.
    AroundTimeout,
    /// After construction, before first use.
    PostConstruct,
    /// Before destruction.
    PreDestroy,
    /// Before passivation of a passivating scope.
    PrePassivate,
    /// After activation from a passivating scope.
    PostActivate,
}

impl InterceptionType {
    /// Whether this type intercepts a lifecycle event rather than a call.
    pub fn is_lifecycle(&self) -> bool {
        !matches!(
            self,
            InterceptionType::AroundInvoke | InterceptionType::AroundTimeout
        )
    }
}

impl fmt::Display for InterceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterceptionType::AroundInvoke => "around-invoke",
            InterceptionType::AroundTimeout => "around-timeout",
            InterceptionType::PostConstruct => "post-construct",
            InterceptionType::PreDestroy => "pre-destroy",
            InterceptionType::PrePassivate => "pre-passivate",
            InterceptionType::PostActivate => "post-activate",
        };
        f.write_str(name)
    }
}

/// Immutable mapping `(interception type, method) → ordered interceptor
/// identifiers` for one managed type.
///
/// Method-level interceptors are appended after the type-level ones unless
/// the method excludes type-level interception entirely.
#[derive(Debug, Default)]
pub struct InterceptionModel {
    global: HashMap<InterceptionType, Vec<ContextualId>>,
    per_method: HashMap<MethodDescriptor, Vec<ContextualId>>,
    excluded_global: HashSet<MethodDescriptor>,
    all: Vec<ContextualId>,
}

impl InterceptionModel {
    /// Starts building a model.
    pub fn builder() -> InterceptionModelBuilder {
        InterceptionModelBuilder {
            model: InterceptionModel::default(),
        }
    }

    /// An empty model: nothing is intercepted.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The ordered interceptor identifiers applying to `(ty, method)`.
    pub fn interceptors_for(
        &self,
        ty: InterceptionType,
        method: Option<&MethodDescriptor>,
    ) -> Vec<ContextualId> {
        let mut out: Vec<ContextualId> = Vec::new();
        let globals_excluded = method
            .map(|m| self.excluded_global.contains(m))
            .unwrap_or(false);
        if !globals_excluded {
            if let Some(ids) = self.global.get(&ty) {
                out.extend(ids.iter().cloned());
            }
        }
        if ty == InterceptionType::AroundInvoke {
            if let Some(method) = method {
                if let Some(ids) = self.per_method.get(method) {
                    for id in ids {
                        if !out.contains(id) {
                            out.push(id.clone());
                        }
                    }
                }
            }
        }
        out
    }

    /// Every interceptor referenced anywhere in the model, in registration
    /// order; the per-instance interception context instantiates these once.
    pub fn all_interceptors(&self) -> &[ContextualId] {
        &self.all
    }

    /// Whether the model references no interceptors at all.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Builder for [`InterceptionModel`].
pub struct InterceptionModelBuilder {
    model: InterceptionModel,
}

impl InterceptionModelBuilder {
    /// Applies interceptors of `ty` to every eligible method or lifecycle
    /// event of the managed type.
    pub fn intercept_all(
        mut self,
        ty: InterceptionType,
        ids: impl IntoIterator<Item = ContextualId>,
    ) -> Self {
        for id in ids {
            self.record(&id);
            self.model.global.entry(ty).or_default().push(id);
        }
        self
    }

    /// Adds around-invoke interceptors applying to one method only.
    pub fn intercept_method(
        mut self,
        method: MethodDescriptor,
        ids: impl IntoIterator<Item = ContextualId>,
    ) -> Self {
        for id in ids {
            self.record(&id);
            self.model
                .per_method
                .entry(method.clone())
                .or_default()
                .push(id);
        }
        self
    }

    /// Excludes type-level around-invoke interceptors from one method.
    pub fn exclude_global_interceptors(mut self, method: MethodDescriptor) -> Self {
        self.model.excluded_global.insert(method);
        self
    }

    /// Finishes the model.
    pub fn build(self) -> Arc<InterceptionModel> {
        Arc::new(self.model)
    }

    fn record(&mut self, id: &ContextualId) {
        if !self.model.all.contains(id) {
            self.model.all.push(id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::params::ParamType;

    fn id(name: &str) -> ContextualId {
        ContextualId::new(name)
    }

    fn method(name: &str) -> MethodDescriptor {
        MethodDescriptor::new(name, vec![ParamType::Int])
    }

    #[test]
    fn method_level_interceptors_append_after_global() {
        let model = InterceptionModel::builder()
            .intercept_all(InterceptionType::AroundInvoke, [id("ix.tx")])
            .intercept_method(method("charge"), [id("ix.audit")])
            .build();

        let charge = model.interceptors_for(InterceptionType::AroundInvoke, Some(&method("charge")));
        assert_eq!(charge, vec![id("ix.tx"), id("ix.audit")]);

        let refund = model.interceptors_for(InterceptionType::AroundInvoke, Some(&method("refund")));
        assert_eq!(refund, vec![id("ix.tx")]);
    }

    #[test]
    fn excluded_method_skips_global_interceptors() {
        let model = InterceptionModel::builder()
            .intercept_all(InterceptionType::AroundInvoke, [id("ix.tx")])
            .intercept_method(method("status"), [id("ix.audit")])
            .exclude_global_interceptors(method("status"))
            .build();

        let status = model.interceptors_for(InterceptionType::AroundInvoke, Some(&method("status")));
        assert_eq!(status, vec![id("ix.audit")]);
    }

    #[test]
    fn lifecycle_lists_are_separate_from_around_invoke() {
        let model = InterceptionModel::builder()
            .intercept_all(InterceptionType::PostConstruct, [id("ix.init")])
            .intercept_all(InterceptionType::AroundInvoke, [id("ix.tx")])
            .build();

        assert_eq!(
            model.interceptors_for(InterceptionType::PostConstruct, None),
            vec![id("ix.init")]
        );
        assert_eq!(model.all_interceptors().len(), 2);
    }
}
