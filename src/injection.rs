//! Injection point metadata and the call-scoped injection point stack.
//!
//! Built-in facades resolve against the injection point of the *caller*, so
//! every dependency resolution pushes its injection point onto a stack and
//! pops it when done. The stack is an explicit, call-scoped object carried by
//! the resolution handle, not an ambient thread-local, which keeps the
//! concurrency model auditable.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::contextual::ContextualId;
use crate::key::TypeKey;

/// A qualifier narrowing which component satisfies a typed request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier(Arc<str>);

impl Qualifier {
    /// Creates a qualifier from its name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The built-in default qualifier carried by unqualified components and
    /// requests.
    pub fn default_qualifier() -> Self {
        Self::new("default")
    }

    /// The qualifier name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered set of qualifiers.
///
/// Matching is subset-based: a request is satisfied by a component whose
/// qualifier set contains every requested qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QualifierSet(BTreeSet<Qualifier>);

impl QualifierSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The set holding only the default qualifier.
    pub fn default_set() -> Self {
        Self::new().with(Qualifier::default_qualifier())
    }

    /// Adds a qualifier, returning the extended set.
    pub fn with(mut self, qualifier: Qualifier) -> Self {
        self.0.insert(qualifier);
        self
    }

    /// Union of this set and `other`.
    pub fn merged_with(&self, other: &QualifierSet) -> QualifierSet {
        let mut merged = self.clone();
        for qualifier in &other.0 {
            merged.0.insert(qualifier.clone());
        }
        merged
    }

    /// Whether every qualifier of this set appears in `other`.
    pub fn is_subset_of(&self, other: &QualifierSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Whether the set contains the qualifier.
    pub fn contains(&self, qualifier: &Qualifier) -> bool {
        self.0.contains(qualifier)
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-separated rendering for error messages.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(Qualifier::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<Qualifier> for QualifierSet {
    fn from_iter<I: IntoIterator<Item = Qualifier>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Metadata describing one injection request: what the caller asked for and
/// where.
///
/// For facade requests (`Instance<T>`, `Event<T>`) the `type_argument`
/// carries the facade's type parameter, since the erased `requested_type` is
/// the facade type itself.
#[derive(Debug, Clone)]
pub struct InjectionPoint {
    /// The type the injection point requests.
    pub requested_type: TypeKey,
    /// Type argument for parameterized facade requests.
    pub type_argument: Option<TypeKey>,
    /// Qualifiers on the injection point.
    pub qualifiers: QualifierSet,
    /// Human-readable member description, e.g. `OrderService.repository`.
    pub member: String,
    /// Identifier of the component declaring the injection point, if any.
    pub owner: Option<ContextualId>,
}

impl InjectionPoint {
    /// Creates an injection point for a plain typed request.
    pub fn of<T: 'static>(member: impl Into<String>) -> Self {
        Self {
            requested_type: TypeKey::of::<T>(),
            type_argument: None,
            qualifiers: QualifierSet::default_set(),
            member: member.into(),
            owner: None,
        }
    }

    /// Sets the facade type argument.
    pub fn with_type_argument(mut self, ty: TypeKey) -> Self {
        self.type_argument = Some(ty);
        self
    }

    /// Replaces the qualifier set.
    pub fn with_qualifiers(mut self, qualifiers: QualifierSet) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    /// Records the declaring component.
    pub fn with_owner(mut self, owner: ContextualId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Call-scoped stack of active injection points.
///
/// One stack exists per resolution scope (request controller or standalone
/// application resolution); resolutions push before creating and pop after,
/// so a facade created mid-graph observes the injection point that requested
/// it.
#[derive(Default)]
pub struct InjectionPointStack {
    frames: Mutex<Vec<InjectionPoint>>,
}

impl InjectionPointStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an injection point, returning a guard that pops it on drop.
    pub fn push(&self, point: InjectionPoint) -> InjectionPointFrame<'_> {
        self.frames.lock().push(point);
        InjectionPointFrame { stack: self }
    }

    /// The injection point currently being resolved, if any.
    pub fn peek(&self) -> Option<InjectionPoint> {
        self.frames.lock().last().cloned()
    }

    /// Whether no resolution is in progress.
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

/// Guard popping an injection point when the resolution finishes.
pub struct InjectionPointFrame<'a> {
    stack: &'a InjectionPointStack,
}

impl Drop for InjectionPointFrame<'_> {
    fn drop(&mut self) {
        self.stack.frames.lock().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifier_matching_is_subset_based() {
        let component = QualifierSet::default_set().with(Qualifier::new("payments"));
        let unqualified = QualifierSet::default_set();
        let qualified = QualifierSet::new().with(Qualifier::new("payments"));
        let other = QualifierSet::new().with(Qualifier::new("shipping"));

        assert!(unqualified.is_subset_of(&component));
        assert!(qualified.is_subset_of(&component));
        assert!(!other.is_subset_of(&component));
    }

    #[test]
    fn stack_pops_on_frame_drop() {
        let stack = InjectionPointStack::new();
        assert!(stack.peek().is_none());
        {
            let _outer = stack.push(InjectionPoint::of::<u32>("Outer.field"));
            {
                let _inner = stack.push(InjectionPoint::of::<String>("Inner.field"));
                assert_eq!(stack.peek().unwrap().member, "Inner.field");
            }
            assert_eq!(stack.peek().unwrap().member, "Outer.field");
        }
        assert!(stack.is_empty());
    }
}
