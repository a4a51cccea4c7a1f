//! # Entity Component System
//!
//! A registry of entities, components and systems owned by one [`Manager`].
//!
//! ## Design Philosophy
//!
//! - Entities live in named, fixed-capacity pools; slots are recycled
//! - Components are stored per kind and addressed by copyable handles
//! - Each entity carries a signature bitset mirroring the kinds it owns
//! - Systems select entities by signature and run in priority order

mod component;
mod entity;
mod entity_pool;
mod manager;
mod signature;
mod storage;
mod system;

pub use component::{
    Component, ComponentHandle, ComponentMeta, KindId, KindRegistry, Sequence, INVALID_SEQUENCE,
};
pub use entity::{Entity, EntityHandle, EntityId, PoolId};
pub use entity_pool::EntityPool;
pub use manager::Manager;
pub use signature::{Signature, SIGNATURE_BITS};
pub use storage::{ComponentPool, ErasedComponentPool};
pub use system::{Priority, System, SystemEditor, SystemId, SystemRecord};
