//! The `BeanMetadata` facade.

use std::sync::Arc;

use crate::contextual::ComponentDescriptor;

/// Read-only metadata of the component declaring the current injection
/// point: its identifier, satisfied types, qualifiers and scope.
#[derive(Debug, Clone)]
pub struct BeanMetadataHandle {
    descriptor: Arc<ComponentDescriptor>,
}

impl BeanMetadataHandle {
    pub(crate) fn new(descriptor: Arc<ComponentDescriptor>) -> Self {
        Self { descriptor }
    }

    /// The declaring component's descriptor.
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }
}
