//! # Component Storage
//!
//! One growable slab per component kind.
//!
//! The storage uses a slot strategy:
//! - A removed component frees its slot, the next insert reuses it
//! - New slots are appended only when nothing is free
//! - Every stored value carries its [`ComponentMeta`]

use std::any::{type_name, Any};

use super::component::{Component, ComponentHandle, ComponentMeta, KindId, Sequence, INVALID_SEQUENCE};
use super::entity::EntityId;
use crate::memory::SlotPool;

/// A stored component and its bookkeeping.
#[derive(Debug)]
struct Stored<C> {
    meta: ComponentMeta,
    value: C,
}

/// Storage for every live component of one kind.
///
/// # Type Parameters
///
/// * `C` - The component type to store
#[derive(Debug)]
pub struct ComponentPool<C: Component> {
    /// Kind stored here.
    kind: KindId,
    /// The slab itself.
    storage: SlotPool<Stored<C>>,
    /// Sequence handed to the next insert.
    next_sequence: Sequence,
    /// Set once the sequence counter has wrapped.
    wrapped: bool,
}

impl<C: Component> ComponentPool<C> {
    /// Creates empty storage for `kind`.
    #[must_use]
    pub fn new(kind: KindId) -> Self {
        Self {
            kind,
            storage: SlotPool::new(),
            next_sequence: 0,
            wrapped: false,
        }
    }

    /// Number of live components.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if no component is stored.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    fn take_sequence(&mut self) -> Sequence {
        loop {
            let sequence = self.next_sequence;
            self.next_sequence = sequence.wrapping_add(1);
            if self.next_sequence == INVALID_SEQUENCE {
                self.next_sequence = 0;
                self.wrapped = true;
            }
            // After a wrap, skip sequences still held by live components.
            if !self.wrapped || !self.storage.iter().any(|(_, s)| s.meta.sequence == sequence) {
                return sequence;
            }
        }
    }

    /// Stores a detached component and returns its bookkeeping.
    pub fn insert(&mut self, value: C) -> ComponentMeta {
        let sequence = self.take_sequence();
        let slot = self.storage.peek_next_slot();
        let meta = ComponentMeta {
            kind: self.kind,
            sequence,
            slot,
            owner: EntityId::INVALID,
        };
        let stored_at = self.storage.insert(Stored { meta, value });
        debug_assert_eq!(stored_at, slot);
        meta
    }

    fn stored(&self, handle: ComponentHandle) -> Option<&Stored<C>> {
        if handle.kind != self.kind {
            return None;
        }
        self.storage
            .get(handle.slot)
            .filter(|s| s.meta.sequence == handle.sequence)
    }

    fn stored_mut(&mut self, handle: ComponentHandle) -> Option<&mut Stored<C>> {
        if handle.kind != self.kind {
            return None;
        }
        self.storage
            .get_mut(handle.slot)
            .filter(|s| s.meta.sequence == handle.sequence)
    }

    /// Gets a component by handle.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: ComponentHandle) -> Option<&C> {
        self.stored(handle).map(|s| &s.value)
    }

    /// Gets a mutable component by handle.
    #[inline]
    pub fn get_mut(&mut self, handle: ComponentHandle) -> Option<&mut C> {
        self.stored_mut(handle).map(|s| &mut s.value)
    }

    /// Gets whatever component occupies `slot`.
    #[inline]
    #[must_use]
    pub fn get_slot(&self, slot: u32) -> Option<&C> {
        self.storage.get(slot).map(|s| &s.value)
    }

    /// Gets whatever component occupies `slot`, mutably.
    #[inline]
    pub fn get_slot_mut(&mut self, slot: u32) -> Option<&mut C> {
        self.storage.get_mut(slot).map(|s| &mut s.value)
    }

    /// Removes a component, releasing its slot.
    pub fn remove(&mut self, handle: ComponentHandle) -> Option<(ComponentMeta, C)> {
        self.stored(handle)?;
        self.storage.remove(handle.slot).map(|s| (s.meta, s.value))
    }

    /// Removes whatever component occupies `slot`.
    pub fn remove_slot(&mut self, slot: u32) -> Option<(ComponentMeta, C)> {
        self.storage.remove(slot).map(|s| (s.meta, s.value))
    }

    /// Iterates over live components in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&ComponentMeta, &C)> {
        self.storage.iter().map(|(_, s)| (&s.meta, &s.value))
    }
}

/// Kind-independent view of a [`ComponentPool`].
///
/// Lets the registry keep every kind in one dense array and still release
/// slots or rewrite owners without knowing the concrete type.
pub trait ErasedComponentPool: Any {
    /// Diagnostic type name.
    fn kind_name(&self) -> &'static str;
    /// Number of live components.
    fn len(&self) -> usize;
    /// Bookkeeping of a live component.
    fn meta(&self, handle: ComponentHandle) -> Option<ComponentMeta>;
    /// Bookkeeping of whatever occupies `slot`.
    fn meta_at(&self, slot: u32) -> Option<ComponentMeta>;
    /// Rewrites the owner of a live component. Returns `false` for a stale handle.
    fn set_owner(&mut self, handle: ComponentHandle, owner: EntityId) -> bool;
    /// Drops a live component. Returns `false` for a stale handle.
    fn release(&mut self, handle: ComponentHandle) -> bool;
    /// Upcast for downcasting to the concrete pool.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting to the concrete pool.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> ErasedComponentPool for ComponentPool<C> {
    fn kind_name(&self) -> &'static str {
        type_name::<C>()
    }

    fn len(&self) -> usize {
        self.storage.len()
    }

    fn meta(&self, handle: ComponentHandle) -> Option<ComponentMeta> {
        self.stored(handle).map(|s| s.meta)
    }

    fn meta_at(&self, slot: u32) -> Option<ComponentMeta> {
        self.storage.get(slot).map(|s| s.meta)
    }

    fn set_owner(&mut self, handle: ComponentHandle, owner: EntityId) -> bool {
        match self.stored_mut(handle) {
            Some(stored) => {
                stored.meta.owner = owner;
                true
            }
            None => false,
        }
    }

    fn release(&mut self, handle: ComponentHandle) -> bool {
        self.remove(handle).is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
