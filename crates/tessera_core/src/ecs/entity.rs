//! # Entity Management
//!
//! Entities are slots in a named pool. Each one has:
//! - An identity, unique among alive entities and reused after death
//! - A fixed slot index inside its pool
//! - A membership map of the component slots it owns, mirrored by a signature

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::component::KindId;
use super::signature::Signature;

/// Identity of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Null/invalid entity ID.
    pub const INVALID: Self = Self(u64::MAX);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            f.write_str("<invalid>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Identity of an entity pool, fixed for the manager's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PoolId(pub(crate) u32);

impl PoolId {
    /// The default pool.
    pub const DEFAULT: Self = Self(0);

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Copyable reference to an entity: which pool, which slot, which identity.
///
/// Handles never borrow the registry. A handle goes stale when the entity
/// dies, when the pool leaves the registry, or when the entity is moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    /// Pool holding the entity.
    pub pool: PoolId,
    /// Slot inside the pool.
    pub index: u32,
    /// Identity at the time the handle was issued.
    pub id: EntityId,
}

/// Entity record.
///
/// Read-only from the outside; the [`Manager`](crate::Manager) is the only
/// thing that mutates it.
#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityId,
    alive: bool,
    index: u32,
    pool_name: Arc<str>,
    signature: Signature,
    membership: BTreeMap<KindId, BTreeSet<u32>>,
}

impl Entity {
    /// Creates a dead slot record.
    pub(crate) fn dead(index: u32, pool_name: Arc<str>) -> Self {
        Self {
            id: EntityId::INVALID,
            alive: false,
            index,
            pool_name,
            signature: Signature::EMPTY,
            membership: BTreeMap::new(),
        }
    }

    /// Identity, or [`EntityId::INVALID`] while dead.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Slot inside the pool.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Name of the pool this slot belongs to.
    #[inline]
    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// Whether this entity slot is currently alive.
    #[inline]
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Kinds owned, one bit each.
    #[inline]
    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Checks if this entity owns a component of `kind`.
    #[inline]
    #[must_use]
    pub fn has_kind(&self, kind: KindId) -> bool {
        self.signature.has(kind)
    }

    /// Component slots of `kind` owned by this entity, ascending.
    pub fn component_slots(&self, kind: KindId) -> impl Iterator<Item = u32> + '_ {
        self.membership.get(&kind).into_iter().flatten().copied()
    }

    /// Smallest component slot of `kind`, if any.
    #[must_use]
    pub fn first_component_slot(&self, kind: KindId) -> Option<u32> {
        self.membership.get(&kind)?.first().copied()
    }

    /// Checks whether `slot` of `kind` belongs to this entity.
    #[must_use]
    pub fn owns_slot(&self, kind: KindId, slot: u32) -> bool {
        self.membership.get(&kind).is_some_and(|s| s.contains(&slot))
    }

    /// Kinds with at least one owned component, ascending.
    pub fn component_kinds(&self) -> impl Iterator<Item = KindId> + '_ {
        self.membership.keys().copied()
    }

    /// Total number of owned components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.membership.values().map(BTreeSet::len).sum()
    }

    /// Handle addressing this slot in pool `pool`.
    #[inline]
    #[must_use]
    pub const fn handle(&self, pool: PoolId) -> EntityHandle {
        EntityHandle {
            pool,
            index: self.index,
            id: self.id,
        }
    }

    pub(crate) fn revive(&mut self, id: EntityId) {
        self.id = id;
        self.alive = true;
        self.signature.reset();
        self.membership.clear();
    }

    /// Wipes identity and bookkeeping. Returns the membership it held.
    pub(crate) fn wipe(&mut self) -> BTreeMap<KindId, BTreeSet<u32>> {
        self.id = EntityId::INVALID;
        self.alive = false;
        self.signature.reset();
        std::mem::take(&mut self.membership)
    }

    /// Moves identity and bookkeeping of `other` into this dead slot.
    pub(crate) fn take_from(&mut self, other: &mut Entity) {
        self.id = other.id;
        self.alive = other.alive;
        self.signature = other.signature;
        self.membership = other.wipe();
    }

    /// Records `slot` of `kind` as owned and sets the signature bit.
    pub(crate) fn insert_component(&mut self, kind: KindId, slot: u32) -> bool {
        let inserted = self.membership.entry(kind).or_default().insert(slot);
        self.signature.set(kind);
        inserted
    }

    /// Forgets `slot` of `kind`; clears the bit once no slot of the kind remains.
    pub(crate) fn remove_component(&mut self, kind: KindId, slot: u32) -> bool {
        let Some(slots) = self.membership.get_mut(&kind) else {
            return false;
        };
        let removed = slots.remove(&slot);
        if slots.is_empty() {
            self.membership.remove(&kind);
            self.signature.clear(kind);
        }
        removed
    }

    /// Forgets every slot of `kind` and clears its bit.
    pub(crate) fn remove_kind(&mut self, kind: KindId) -> BTreeSet<u32> {
        self.signature.clear(kind);
        self.membership.remove(&kind).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> Entity {
        Entity::dead(3, Arc::from("DEFAULT"))
    }

    #[test]
    fn test_revive_and_wipe() {
        let mut entity = slot();
        assert!(!entity.is_alive());
        assert!(entity.id().is_invalid());

        entity.revive(EntityId::new(5));
        assert!(entity.is_alive());
        assert_eq!(entity.id(), EntityId::new(5));
        assert_eq!(entity.index(), 3);

        entity.insert_component(KindId::new(1), 0);
        let membership = entity.wipe();
        assert_eq!(membership.len(), 1);
        assert!(entity.signature().is_empty());
        assert!(entity.id().is_invalid());
    }

    #[test]
    fn test_signature_mirrors_membership() {
        let kind = KindId::new(2);
        let mut entity = slot();
        entity.revive(EntityId::new(0));

        entity.insert_component(kind, 4);
        entity.insert_component(kind, 1);
        assert!(entity.has_kind(kind));
        assert_eq!(entity.first_component_slot(kind), Some(1));

        assert!(entity.remove_component(kind, 1));
        assert!(entity.has_kind(kind)); // Slot 4 still owned

        assert!(entity.remove_component(kind, 4));
        assert!(!entity.has_kind(kind));
        assert!(!entity.remove_component(kind, 4));
        assert_eq!(entity.component_count(), 0);
    }

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId::new(12).to_string(), "12");
        assert_eq!(EntityId::INVALID.to_string(), "<invalid>");
        assert_eq!(EntityId::default(), EntityId::INVALID);
    }
}
