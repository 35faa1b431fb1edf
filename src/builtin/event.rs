//! The `Event` facade and the observer registry backing it.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::container::Container;
use crate::contextual::AnyArc;
use crate::injection::{Qualifier, QualifierSet};
use crate::key::TypeKey;

type NotifyFn = dyn Fn(&AnyArc) + Send + Sync;

struct ObserverMethod {
    event_type: TypeKey,
    qualifiers: QualifierSet,
    notify: Box<NotifyFn>,
}

/// Registry of observer methods, fixed at container build time.
///
/// An observer is notified when the fired event's type matches its observed
/// type and the observer's qualifiers are a subset of the event's.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<ObserverMethod>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register<T: Send + Sync + 'static>(
        &mut self,
        qualifiers: QualifierSet,
        observer: impl Fn(Arc<T>) + Send + Sync + 'static,
    ) {
        self.observers.push(ObserverMethod {
            event_type: TypeKey::of::<T>(),
            qualifiers,
            notify: Box::new(move |payload| {
                if let Ok(typed) = payload.clone().downcast::<T>() {
                    observer(typed);
                }
            }),
        });
    }

    pub(crate) fn notify(
        &self,
        event_type: TypeKey,
        event_qualifiers: &QualifierSet,
        payload: &AnyArc,
    ) -> usize {
        let mut notified = 0;
        for observer in &self.observers {
            if observer.event_type == event_type
                && observer.qualifiers.is_subset_of(event_qualifiers)
            {
                (observer.notify)(payload);
                notified += 1;
            }
        }
        debug!(event = %event_type, notified, "event fired");
        notified
    }
}

/// A call-site-parameterized handle for firing events.
///
/// Captures the payload type and qualifiers of the injection point that
/// requested it; [`fire`](EventHandle::fire) notifies every matching
/// observer synchronously. Re-selection narrows into a new handle without
/// touching the original; equality is structural over `(type, qualifiers)`.
#[derive(Clone)]
pub struct EventHandle {
    container: Container,
    ty: TypeKey,
    qualifiers: QualifierSet,
}

impl EventHandle {
    pub(crate) fn new(container: Container, ty: TypeKey, qualifiers: QualifierSet) -> Self {
        Self {
            container,
            ty,
            qualifiers,
        }
    }

    /// The event payload type.
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    /// The event qualifiers.
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// Returns a new handle for payload type `T`, keeping the qualifiers.
    pub fn select<T: 'static>(&self) -> EventHandle {
        EventHandle {
            container: self.container.clone(),
            ty: TypeKey::of::<T>(),
            qualifiers: self.qualifiers.clone(),
        }
    }

    /// Returns a new handle with an additional qualifier.
    pub fn select_qualifier(&self, qualifier: Qualifier) -> EventHandle {
        EventHandle {
            container: self.container.clone(),
            ty: self.ty,
            qualifiers: self.qualifiers.clone().with(qualifier),
        }
    }

    /// Fires an event, synchronously notifying every observer whose observed
    /// type matches `T` and whose qualifiers are satisfied by this handle's.
    /// Returns the number of observers notified.
    pub fn fire<T: Send + Sync + 'static>(&self, payload: Arc<T>) -> usize {
        let payload: AnyArc = payload;
        self.container
            .observers()
            .notify(TypeKey::of::<T>(), &self.qualifiers, &payload)
    }
}

impl PartialEq for EventHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.qualifiers == other.qualifiers
    }
}

impl Eq for EventHandle {}

impl std::hash::Hash for EventHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        self.qualifiers.hash(state);
    }
}

impl fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandle")
            .field("ty", &self.ty.name())
            .field("qualifiers", &self.qualifiers)
            .finish()
    }
}
