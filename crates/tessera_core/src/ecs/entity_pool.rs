//! # Entity Pools
//!
//! A named, fixed-capacity slab of entity slots.
//! Slots are allocated once; killing an entity only recycles its slot.

use std::sync::Arc;

use super::component::KindId;
use super::entity::{Entity, EntityHandle, EntityId, PoolId};
use crate::memory::{normalize_capacity, FreeList, MAX_POOL_CAPACITY};

/// Outcome of a rejected resize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResizeError {
    /// Zero capacity requested, or more than [`MAX_POOL_CAPACITY`] slots.
    InvalidCapacity,
    /// An alive entity sits at this slot inside the truncated range.
    LiveEntity(u32),
}

/// A named slab of entity slots.
///
/// Pools are created, resized and destroyed through the
/// [`Manager`](crate::Manager). A pool taken out with
/// [`Manager::detach_entity_pool`](crate::Manager::detach_entity_pool) can
/// still be inspected, and handed back with
/// [`Manager::attach_entity_pool`](crate::Manager::attach_entity_pool).
#[derive(Debug)]
pub struct EntityPool {
    id: PoolId,
    name: Arc<str>,
    /// All entity slots (pre-allocated).
    slots: Vec<Entity>,
    /// Free list of slot indices for reuse.
    free: FreeList,
    /// Number of currently alive entities.
    alive_count: usize,
}

impl EntityPool {
    /// Creates a pool with `capacity` rounded up to a power of two.
    ///
    /// Returns `None` for zero capacity or one past [`MAX_POOL_CAPACITY`].
    pub(crate) fn new(id: PoolId, name: &str, capacity: usize) -> Option<Self> {
        normalize_capacity(capacity).map(|capacity| Self::with_exact_capacity(id, name, capacity))
    }

    /// Creates a pool with exactly `capacity` slots, already normalized.
    pub(crate) fn with_exact_capacity(id: PoolId, name: &str, capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two() && capacity <= MAX_POOL_CAPACITY);
        let name: Arc<str> = Arc::from(name);
        let slots = (0..capacity as u32)
            .map(|index| Entity::dead(index, Arc::clone(&name)))
            .collect();

        Self {
            id,
            name,
            slots,
            free: FreeList::seeded(capacity as u32),
            alive_count: 0,
        }
    }

    /// Identity of this pool.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> PoolId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: PoolId) {
        self.id = id;
    }

    /// Name of this pool.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots (always a power of two).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Number of entities, alive only or every slot.
    #[must_use]
    pub fn entity_count(&self, only_alive: bool) -> usize {
        if only_alive {
            self.alive_count
        } else {
            self.slots.len()
        }
    }

    /// Returns `true` when no slot is free.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Slot record at `index`, alive or not.
    #[inline]
    #[must_use]
    pub fn slot(&self, index: u32) -> Option<&Entity> {
        self.slots.get(index as usize)
    }

    /// Alive entity addressed by `handle`.
    #[must_use]
    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        if handle.pool != self.id || handle.id.is_invalid() {
            return None;
        }
        self.slots
            .get(handle.index as usize)
            .filter(|e| e.is_alive() && e.id() == handle.id)
    }

    pub(crate) fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        if handle.pool != self.id || handle.id.is_invalid() {
            return None;
        }
        self.slots
            .get_mut(handle.index as usize)
            .filter(|e| e.is_alive() && e.id() == handle.id)
    }

    /// Alive entity carrying `id`.
    #[must_use]
    pub fn find(&self, id: EntityId) -> Option<&Entity> {
        if id.is_invalid() {
            return None;
        }
        self.slots.iter().find(|e| e.is_alive() && e.id() == id)
    }

    pub(crate) fn find_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if id.is_invalid() {
            return None;
        }
        self.slots.iter_mut().find(|e| e.is_alive() && e.id() == id)
    }

    /// Iterates over alive entities in slot order.
    pub fn iter_alive(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter(|e| e.is_alive())
    }

    /// Handles of alive entities in slot order.
    #[must_use]
    pub fn handles(&self) -> Vec<EntityHandle> {
        self.iter_alive().map(|e| e.handle(self.id)).collect()
    }

    /// Pops a free slot and revives it with `id`.
    ///
    /// Returns `None` when the pool is full.
    pub(crate) fn create(&mut self, id: EntityId) -> Option<EntityHandle> {
        let index = self.free.acquire()?;
        let entity = &mut self.slots[index as usize];
        entity.revive(id);
        self.alive_count += 1;
        Some(entity.handle(self.id))
    }

    /// Pops a free slot and moves `source` into it.
    pub(crate) fn adopt(&mut self, source: &mut Entity) -> Option<EntityHandle> {
        let index = self.free.acquire()?;
        let entity = &mut self.slots[index as usize];
        entity.take_from(source);
        self.alive_count += 1;
        Some(entity.handle(self.id))
    }

    /// Kills the entity at `index` and recycles the slot.
    ///
    /// Returns the entity taken out (identity and membership intact), or
    /// `None` if the slot was not alive.
    pub(crate) fn kill(&mut self, index: u32) -> Option<Entity> {
        let entity = self.slots.get_mut(index as usize).filter(|e| e.is_alive())?;
        let mut taken = Entity::dead(index, Arc::clone(&self.name));
        taken.take_from(entity);
        self.free.release(index);
        self.alive_count -= 1;
        Some(taken)
    }

    /// Grows or shrinks the pool.
    ///
    /// Shrinking is rejected while any alive entity sits in the truncated range.
    pub(crate) fn resize(&mut self, capacity: usize) -> Result<usize, ResizeError> {
        let capacity = normalize_capacity(capacity).ok_or(ResizeError::InvalidCapacity)?;
        let current = self.slots.len();

        if capacity > current {
            self.slots.extend(
                (current as u32..capacity as u32).map(|index| Entity::dead(index, Arc::clone(&self.name))),
            );
            self.free.extend_range(current as u32, capacity as u32);
        } else if capacity < current {
            if let Some(live) = self.slots[capacity..].iter().find(|e| e.is_alive()) {
                return Err(ResizeError::LiveEntity(live.index()));
            }
            self.slots.truncate(capacity);
            self.free.truncate_above(capacity as u32);
        }
        Ok(capacity)
    }

    /// Kills everything and reseeds the free list. Capacity is kept.
    pub(crate) fn reset(&mut self) {
        for entity in &mut self.slots {
            entity.wipe();
        }
        self.free = FreeList::seeded(self.slots.len() as u32);
        self.alive_count = 0;
    }

    /// `(owner, kind, slot)` of every component linked to an alive entity.
    pub(crate) fn owned_components(&self) -> Vec<(EntityId, KindId, u32)> {
        self.iter_alive()
            .flat_map(|e| {
                e.component_kinds().flat_map(move |kind| {
                    e.component_slots(kind).map(move |slot| (e.id(), kind, slot))
                })
            })
            .collect()
    }

    /// Drops every membership `keep` rejects. Returns how many were dropped.
    pub(crate) fn retain_components(
        &mut self,
        mut keep: impl FnMut(EntityId, KindId, u32) -> bool,
    ) -> usize {
        let mut dropped = 0;
        for entity in self.slots.iter_mut().filter(|e| e.is_alive()) {
            let id = entity.id();
            let owned: Vec<(KindId, u32)> = {
                let e: &Entity = entity;
                e.component_kinds()
                    .flat_map(move |kind| e.component_slots(kind).map(move |slot| (kind, slot)))
                    .collect()
            };
            for (kind, slot) in owned {
                if !keep(id, kind, slot) {
                    entity.remove_component(kind, slot);
                    dropped += 1;
                }
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: usize) -> EntityPool {
        EntityPool::new(PoolId(1), "TEST", capacity).unwrap()
    }

    #[test]
    fn test_capacity_rounds_up() {
        assert_eq!(pool(6).capacity(), 8);
        assert_eq!(pool(200).capacity(), 256);
        assert_eq!(pool(4096).capacity(), 4096);
        assert!(EntityPool::new(PoolId(1), "ZERO", 0).is_none());
        assert!(EntityPool::new(PoolId(1), "HUGE", MAX_POOL_CAPACITY + 1).is_none());
    }

    #[test]
    fn test_full_pool_and_reuse() {
        let mut pool = pool(2);

        let a = pool.create(EntityId::new(0)).unwrap();
        let b = pool.create(EntityId::new(1)).unwrap();
        assert!(pool.create(EntityId::new(2)).is_none());
        assert!(pool.is_full());

        let dead = pool.kill(a.index).unwrap();
        assert_eq!(dead.id(), EntityId::new(0));
        assert!(pool.get(a).is_none());
        assert_eq!(pool.alive_count(), 1);

        let c = pool.create(EntityId::new(2)).unwrap();
        assert_eq!(c.index, a.index); // Same slot
        assert!(pool.get(b).is_some());
        assert_eq!(pool.slot(c.index).unwrap().pool_name(), "TEST");
    }

    #[test]
    fn test_resize_grow_then_shrink() {
        let mut pool = pool(2);
        let a = pool.create(EntityId::new(0)).unwrap();
        let b = pool.create(EntityId::new(1)).unwrap();

        assert_eq!(pool.resize(3), Ok(4));
        let c = pool.create(EntityId::new(2)).unwrap();
        assert_eq!(c.index, 2);

        assert_eq!(pool.resize(2), Err(ResizeError::LiveEntity(2)));
        assert_eq!(pool.capacity(), 4);

        pool.kill(c.index);
        assert_eq!(pool.resize(2), Ok(2));
        assert!(pool.get(a).is_some());
        assert!(pool.get(b).is_some());
        assert!(pool.create(EntityId::new(3)).is_none());
        assert_eq!(pool.resize(0), Err(ResizeError::InvalidCapacity));
        assert_eq!(
            pool.resize(MAX_POOL_CAPACITY + 1),
            Err(ResizeError::InvalidCapacity)
        );
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn test_retain_components() {
        let mut pool = pool(2);
        let a = pool.create(EntityId::new(0)).unwrap();
        let entity = pool.get_mut(a).unwrap();
        entity.insert_component(KindId::new(0), 0);
        entity.insert_component(KindId::new(0), 1);
        entity.insert_component(KindId::new(1), 0);

        let dropped = pool.retain_components(|_, kind, slot| kind == KindId::new(0) && slot == 1);
        assert_eq!(dropped, 2);
        assert_eq!(
            pool.owned_components(),
            vec![(EntityId::new(0), KindId::new(0), 1)]
        );
        assert!(!pool.get(a).unwrap().has_kind(KindId::new(1)));
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut pool = pool(4);
        pool.create(EntityId::new(0));
        pool.create(EntityId::new(1));
        pool.reset();

        assert_eq!(pool.alive_count(), 0);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.create(EntityId::new(0)).unwrap().index, 0);
    }
}
