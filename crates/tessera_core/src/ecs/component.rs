//! # Component System
//!
//! Components are plain data. A value is inert until the
//! [`Manager`](crate::Manager) stores it: only then does it get a kind id,
//! a slot, a sequence number and (once attached) an owner.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::entity::EntityId;

/// Marker trait for registry components.
///
/// Any `'static` type can be a component. Kinds are told apart by
/// [`TypeId`], so there is nothing to implement.
///
/// # Example
///
/// ```rust
/// use tessera_core::Component;
///
/// struct Health {
///     hp: i32,
/// }
///
/// impl Component for Health {}
/// ```
pub trait Component: 'static {}

/// Stable small integer naming one component kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct KindId(u16);

impl KindId {
    /// Reserved invalid kind.
    pub const INVALID: Self = Self(u16::MAX);

    /// Wraps a raw kind index.
    #[inline]
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw index, usable as a signature bit or dense array index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks if this is the invalid kind.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == u16::MAX
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-kind sequence number of a stored component.
///
/// 64 bits wide so the counter does not wrap in practice. After a wrap,
/// allocation skips sequences held by live components, at the cost of a
/// scan of the kind's storage per insert.
pub type Sequence = u64;

/// Reserved sequence value, never handed out.
pub const INVALID_SEQUENCE: Sequence = Sequence::MAX;

/// Handle to a stored component.
///
/// A handle stays valid while its slot holds the component it was issued
/// for; once the component is removed the slot may be reused, but the new
/// occupant carries a different sequence and the old handle stops matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentHandle {
    /// Kind of the component.
    pub kind: KindId,
    /// Slot inside the kind's pool.
    pub slot: u32,
    /// Sequence assigned when the component was stored.
    pub sequence: Sequence,
}

/// Bookkeeping attached to every stored component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentMeta {
    /// Kind of the component.
    pub kind: KindId,
    /// Per-kind sequence, unique among live components of the kind.
    pub sequence: Sequence,
    /// Slot inside the kind's pool.
    pub slot: u32,
    /// Owning entity, or [`EntityId::INVALID`] while detached.
    pub owner: EntityId,
}

impl ComponentMeta {
    /// Returns `true` while attached to an entity.
    #[inline]
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        !self.owner.is_invalid()
    }

    /// Handle addressing this component.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> ComponentHandle {
        ComponentHandle {
            kind: self.kind,
            slot: self.slot,
            sequence: self.sequence,
        }
    }
}

/// Lazily assigns kind ids to component types.
#[derive(Debug)]
pub struct KindRegistry {
    ids: HashMap<TypeId, KindId>,
    names: Vec<&'static str>,
    max_kinds: usize,
}

impl KindRegistry {
    /// Creates a registry handing out at most `max_kinds` ids.
    #[must_use]
    pub fn new(max_kinds: usize) -> Self {
        Self {
            ids: HashMap::new(),
            names: Vec::new(),
            max_kinds,
        }
    }

    /// Kind of `T`, if already registered.
    #[inline]
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<KindId> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    /// Kind of `T`, registering it on first sight.
    ///
    /// Returns `None` once the limit is reached.
    pub fn resolve<T: Component>(&mut self) -> Option<KindId> {
        if let Some(kind) = self.get::<T>() {
            return Some(kind);
        }
        if self.names.len() >= self.max_kinds {
            return None;
        }
        let kind = KindId::new(self.names.len() as u16);
        self.ids.insert(TypeId::of::<T>(), kind);
        self.names.push(type_name::<T>());
        tracing::debug!(kind = %kind, name = type_name::<T>(), "registered component kind");
        Some(kind)
    }

    /// Diagnostic name of a kind.
    #[must_use]
    pub fn name(&self, kind: KindId) -> Option<&'static str> {
        self.names.get(kind.index()).copied()
    }

    /// Number of registered kinds.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no kind is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Configured limit.
    #[inline]
    #[must_use]
    pub const fn max_kinds(&self) -> usize {
        self.max_kinds
    }

    /// Forgets every kind; numbering restarts at zero.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    impl Component for A {}
    struct B;
    impl Component for B {}
    struct C;
    impl Component for C {}

    #[test]
    fn test_lazy_kind_ids() {
        let mut kinds = KindRegistry::new(8);
        assert_eq!(kinds.get::<A>(), None);

        let a = kinds.resolve::<A>().unwrap();
        let b = kinds.resolve::<B>().unwrap();
        assert_ne!(a, b);
        assert_eq!(kinds.resolve::<A>(), Some(a)); // Stable
        assert_eq!(kinds.len(), 2);
        assert!(kinds.name(b).unwrap().ends_with("B"));
    }

    #[test]
    fn test_kind_limit() {
        let mut kinds = KindRegistry::new(2);
        kinds.resolve::<A>().unwrap();
        kinds.resolve::<B>().unwrap();
        assert_eq!(kinds.resolve::<C>(), None);
        assert!(kinds.resolve::<A>().is_some());
    }

    #[test]
    fn test_clear_restarts_numbering() {
        let mut kinds = KindRegistry::new(4);
        kinds.resolve::<A>();
        kinds.resolve::<B>();
        kinds.clear();
        assert_eq!(kinds.resolve::<B>(), Some(KindId::new(0)));
    }
}
