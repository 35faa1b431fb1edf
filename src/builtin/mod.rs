//! Built-in injectable facades.
//!
//! `Instance`, `Event`, `InjectionPoint` metadata and `BeanMetadata` are
//! themselves contextual components, but their create operation does not
//! return a fixed value: it inspects the currently active injection point on
//! the resolution stack and returns a facade parameterized by what the
//! *caller* requested. Resolving a facade with no active injection point is
//! an error, never silently-null garbage.

mod event;
mod instance;
mod metadata;

pub use event::{EventHandle, ObserverRegistry};
pub use instance::InstanceHandle;
pub use metadata::BeanMetadataHandle;

use std::sync::Arc;

use tracing::error;

use crate::container::Resolution;
use crate::contextual::{AnyArc, Contextual, ContextualId};
use crate::creational::CreationalContext;
use crate::error::{ContextError, ContextResult};
use crate::injection::InjectionPoint;
use crate::key::TypeKey;

/// Identifier of the built-in `Instance` facade component.
pub const INSTANCE_COMPONENT_ID: &str = "builtin.instance";
/// Identifier of the built-in `Event` facade component.
pub const EVENT_COMPONENT_ID: &str = "builtin.event";
/// Identifier of the built-in `InjectionPoint` metadata component.
pub const INJECTION_POINT_COMPONENT_ID: &str = "builtin.injection-point";
/// Identifier of the built-in `BeanMetadata` component.
pub const BEAN_METADATA_COMPONENT_ID: &str = "builtin.bean-metadata";

fn active_injection_point(resolution: &Resolution<'_>) -> ContextResult<InjectionPoint> {
    resolution.current_injection_point().ok_or_else(|| {
        error!("dynamic lookup of a built-in component outside any injection point");
        ContextError::DynamicLookupOutsideInjectionPoint
    })
}

fn facade_type_argument(point: &InjectionPoint) -> ContextResult<TypeKey> {
    point.type_argument.ok_or(ContextError::IllegalState(
        "facade injection point carries no type argument",
    ))
}

macro_rules! builtin_component {
    ($name:ident, $id:expr, $doc:literal, |$cc:ident, $res:ident| $create:block) => {
        #[doc = $doc]
        pub(crate) struct $name {
            id: ContextualId,
        }

        impl $name {
            pub(crate) fn new() -> Self {
                Self {
                    id: ContextualId::new($id),
                }
            }
        }

        impl Contextual for $name {
            fn id(&self) -> &ContextualId {
                &self.id
            }

            fn create(
                &self,
                $cc: &Arc<CreationalContext>,
                $res: &Resolution<'_>,
            ) -> ContextResult<AnyArc> {
                let _ = $cc;
                $create
            }

            fn destroy(&self, _instance: &AnyArc, ctx: &Arc<CreationalContext>) {
                ctx.release();
            }
        }
    };
}

builtin_component!(
    InstanceComponent,
    INSTANCE_COMPONENT_ID,
    "The built-in `Instance` facade component.",
    |_cc, resolution| {
        let point = active_injection_point(resolution)?;
        let ty = facade_type_argument(&point)?;
        Ok(Arc::new(InstanceHandle::new(
            resolution.container().clone(),
            ty,
            point.qualifiers,
        )) as AnyArc)
    }
);

builtin_component!(
    EventComponent,
    EVENT_COMPONENT_ID,
    "The built-in `Event` facade component.",
    |_cc, resolution| {
        let point = active_injection_point(resolution)?;
        let ty = facade_type_argument(&point)?;
        Ok(Arc::new(EventHandle::new(
            resolution.container().clone(),
            ty,
            point.qualifiers,
        )) as AnyArc)
    }
);

builtin_component!(
    InjectionPointComponent,
    INJECTION_POINT_COMPONENT_ID,
    "The built-in `InjectionPoint` metadata component.",
    |_cc, resolution| {
        let point = active_injection_point(resolution)?;
        Ok(Arc::new(point) as AnyArc)
    }
);

builtin_component!(
    BeanMetadataComponent,
    BEAN_METADATA_COMPONENT_ID,
    "The built-in `BeanMetadata` component.",
    |_cc, resolution| {
        let point = active_injection_point(resolution)?;
        let owner = point.owner.clone().ok_or(ContextError::IllegalState(
            "bean metadata requested outside a component's injection point",
        ))?;
        let descriptor = resolution
            .container()
            .descriptor(&owner)
            .ok_or(ContextError::UnknownContextual(owner))?;
        Ok(Arc::new(BeanMetadataHandle::new(descriptor)) as AnyArc)
    }
);
