//! # Memory Management
//!
//! Slot allocators backing every pool in the registry.
//!
//! ## Design Philosophy
//!
//! Storage is never freed slot by slot. Released slots go back to a free
//! list and are handed out again:
//! - Entity pools pre-allocate a power-of-two number of slots
//! - Component pools grow by one slot only when nothing is free

mod pool;

pub use pool::{normalize_capacity, FreeList, SlotPool, MAX_POOL_CAPACITY};
