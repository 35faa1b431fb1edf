//! Per-managed-instance interceptor instances.

use std::collections::HashMap;
use std::sync::Arc;

use crate::container::Resolution;
use crate::contextual::ContextualId;
use crate::creational::CreationalContext;
use crate::error::ContextResult;
use crate::interception::invocation::Interceptor;
use crate::interception::model::InterceptionModel;

/// The interceptor instances backing one managed instance.
///
/// Built once per managed instance, not per call: every interceptor class
/// referenced by the interception model is instantiated exactly once through
/// container resolution and cached by its identifier. Instances are reused
/// for every subsequent call against that managed instance and are never
/// shared across different managed instances.
pub struct InterceptionContext {
    instances: HashMap<ContextualId, Arc<dyn Interceptor>>,
}

impl InterceptionContext {
    /// Instantiates every interceptor the model references.
    ///
    /// Interceptor creation is itself a contextual creation: factories
    /// resolve their own dependencies through `resolution` against the
    /// owner's creational context.
    pub fn of(
        model: &InterceptionModel,
        creational: &Arc<CreationalContext>,
        resolution: &Resolution<'_>,
    ) -> ContextResult<Self> {
        let mut instances = HashMap::new();
        for id in model.all_interceptors() {
            if instances.contains_key(id) {
                continue;
            }
            let instance = resolution
                .container()
                .create_interceptor(id, creational, resolution)?;
            instances.insert(id.clone(), instance);
        }
        Ok(Self { instances })
    }

    /// A context with no interceptor instances.
    pub fn empty() -> Self {
        Self {
            instances: HashMap::new(),
        }
    }

    /// The cached instance for an interceptor identifier.
    pub fn instance(&self, id: &ContextualId) -> Option<Arc<dyn Interceptor>> {
        self.instances.get(id).cloned()
    }

    /// Number of instantiated interceptors.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether no interceptors were instantiated.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
