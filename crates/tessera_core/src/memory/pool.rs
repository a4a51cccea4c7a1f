//! # Slot Pools
//!
//! Slot allocators shared by entity pools and component pools.
//!
//! Every pool in the registry hands out integer slot indices and takes them
//! back through a [`FreeList`]. The free list is a stack: the most recently
//! released slot is the next one handed out, which keeps hot slots hot.

/// Largest pool capacity. Slot indices are `u32`.
pub const MAX_POOL_CAPACITY: usize = 1 << 31;

/// Rounds a requested capacity up to the next power of two.
///
/// Returns `None` for zero and for anything that rounds past
/// [`MAX_POOL_CAPACITY`].
///
/// ```rust
/// use tessera_core::memory::{normalize_capacity, MAX_POOL_CAPACITY};
///
/// assert_eq!(normalize_capacity(6), Some(8));
/// assert_eq!(normalize_capacity(4096), Some(4096));
/// assert_eq!(normalize_capacity(0), None);
/// assert_eq!(normalize_capacity(MAX_POOL_CAPACITY + 1), None);
/// ```
#[inline]
#[must_use]
pub fn normalize_capacity(requested: usize) -> Option<usize> {
    if requested == 0 {
        return None;
    }
    requested
        .checked_next_power_of_two()
        .filter(|&capacity| capacity <= MAX_POOL_CAPACITY)
}

/// Stack of reusable slot indices.
#[derive(Clone, Debug, Default)]
pub struct FreeList {
    /// Top of the stack is the last element.
    indices: Vec<u32>,
}

impl FreeList {
    /// Creates an empty free list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a free list holding `0..count`, with index 0 on top.
    #[must_use]
    pub fn seeded(count: u32) -> Self {
        Self {
            indices: (0..count).rev().collect(),
        }
    }

    /// Takes the most recently released index.
    #[inline]
    pub fn acquire(&mut self) -> Option<u32> {
        self.indices.pop()
    }

    /// Returns an index to the list.
    #[inline]
    pub fn release(&mut self, index: u32) {
        debug_assert!(
            !self.indices.contains(&index),
            "slot {index} released twice"
        );
        self.indices.push(index);
    }

    /// Makes the contiguous range `start..end` available, lowest index first.
    pub fn extend_range(&mut self, start: u32, end: u32) {
        self.indices.extend((start..end).rev());
    }

    /// Drops every index at or above `bound`.
    pub fn truncate_above(&mut self, bound: u32) {
        self.indices.retain(|&index| index < bound);
    }

    /// Number of free indices.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` when nothing can be acquired.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns `true` if `index` is currently free.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.indices.contains(&index)
    }

    /// Forgets every index.
    pub fn clear(&mut self) {
        self.indices.clear();
    }
}

/// A growable slab of optional values.
///
/// `insert` reuses a released slot when one exists and appends otherwise,
/// so slot indices stay stable for as long as the value lives.
///
/// # Example
///
/// ```rust
/// use tessera_core::memory::SlotPool;
///
/// let mut pool: SlotPool<&str> = SlotPool::new();
/// let a = pool.insert("a");
/// let b = pool.insert("b");
/// assert_eq!(pool.remove(a), Some("a"));
///
/// // The freed slot is handed out again.
/// assert_eq!(pool.insert("c"), a);
/// assert_eq!(pool.get(b), Some(&"b"));
/// ```
#[derive(Clone, Debug)]
pub struct SlotPool<T> {
    /// The storage array.
    storage: Vec<Option<T>>,
    /// Indices of empty slots inside `storage`.
    free_list: FreeList,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self {
            storage: Vec::new(),
            free_list: FreeList::new(),
            len: 0,
        }
    }
}

impl<T> SlotPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated (occupied or free).
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.storage.len()
    }

    /// Index the next `insert` will use.
    #[must_use]
    pub fn peek_next_slot(&self) -> u32 {
        self.free_list
            .indices
            .last()
            .copied()
            .unwrap_or(self.storage.len() as u32)
    }

    /// Stores a value and returns its slot.
    pub fn insert(&mut self, value: T) -> u32 {
        self.len += 1;
        if let Some(slot) = self.free_list.acquire() {
            self.storage[slot as usize] = Some(value);
            return slot;
        }
        let slot = self.storage.len() as u32;
        self.storage.push(Some(value));
        slot
    }

    /// Takes the value out of `slot` and releases the slot.
    pub fn remove(&mut self, slot: u32) -> Option<T> {
        let value = self.storage.get_mut(slot as usize)?.take()?;
        self.free_list.release(slot);
        self.len -= 1;
        Some(value)
    }

    /// Gets a reference to the value in `slot`.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: u32) -> Option<&T> {
        self.storage.get(slot as usize)?.as_ref()
    }

    /// Gets a mutable reference to the value in `slot`.
    #[inline]
    pub fn get_mut(&mut self, slot: u32) -> Option<&mut T> {
        self.storage.get_mut(slot as usize)?.as_mut()
    }

    /// Drops every value and forgets every slot.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.free_list.clear();
        self.len = 0;
    }

    /// Iterates over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.storage
            .iter()
            .enumerate()
            .filter_map(|(slot, value)| value.as_ref().map(|v| (slot as u32, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_capacity() {
        assert_eq!(normalize_capacity(1), Some(1));
        assert_eq!(normalize_capacity(2), Some(2));
        assert_eq!(normalize_capacity(6), Some(8));
        assert_eq!(normalize_capacity(200), Some(256));
        assert_eq!(normalize_capacity(4096), Some(4096));
        assert_eq!(normalize_capacity(0), None);
        assert_eq!(normalize_capacity(MAX_POOL_CAPACITY), Some(MAX_POOL_CAPACITY));
        assert_eq!(normalize_capacity(MAX_POOL_CAPACITY - 1), Some(MAX_POOL_CAPACITY));
        assert_eq!(normalize_capacity(MAX_POOL_CAPACITY + 1), None);
        assert_eq!(normalize_capacity(usize::MAX), None);
    }

    #[test]
    fn test_free_list_is_stack_like() {
        let mut free = FreeList::seeded(4);
        assert_eq!(free.acquire(), Some(0));
        assert_eq!(free.acquire(), Some(1));

        free.release(0);
        assert_eq!(free.acquire(), Some(0)); // Most recent release first
        assert_eq!(free.acquire(), Some(2));
        assert_eq!(free.len(), 1);
    }

    #[test]
    fn test_free_list_range_and_truncate() {
        let mut free = FreeList::new();
        free.extend_range(2, 6);
        assert_eq!(free.acquire(), Some(2));

        free.truncate_above(4);
        assert!(free.contains(3));
        assert!(!free.contains(4));
        assert!(!free.contains(5));
    }

    #[test]
    fn test_slot_pool_reuse() {
        let mut pool: SlotPool<u32> = SlotPool::new();

        let a = pool.insert(1);
        let b = pool.insert(2);
        assert_eq!((a, b), (0, 1));
        assert_eq!(pool.len(), 2);

        assert_eq!(pool.remove(a), Some(1));
        assert_eq!(pool.remove(a), None);
        assert_eq!(pool.peek_next_slot(), a);

        let c = pool.insert(3);
        assert_eq!(c, a); // Same slot reused
        assert_eq!(pool.slot_count(), 2);
        assert_eq!(pool.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    fn test_slot_pool_clear() {
        let mut pool: SlotPool<u8> = SlotPool::new();
        pool.insert(1);
        pool.insert(2);
        pool.clear();

        assert!(pool.is_empty());
        assert_eq!(pool.insert(9), 0);
    }
}
