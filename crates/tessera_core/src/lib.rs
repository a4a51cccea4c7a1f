//! # Tessera Core
//!
//! Entity/component/system registry for simulation loops:
//! - Named entity pools with fixed, power-of-two capacity
//! - Per-kind component storage with recycled slots and stale-proof handles
//! - Priority-ordered systems selecting entities by signature
//!
//! ## Architecture Rules
//!
//! 1. **One owner** - the [`Manager`] owns every pool, component and system
//! 2. **Handles, not references** - entities and components are addressed by `Copy` handles
//! 3. **Report, then return** - every failure is logged, passed to the error callback and returned
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{Component, EntityHandle, Manager, Priority, System};
//!
//! struct Health(i32);
//! impl Component for Health {}
//!
//! struct Regen;
//!
//! impl System for Regen {
//!     fn priority(&self) -> Priority {
//!         0
//!     }
//!
//!     fn update(&mut self, manager: &mut Manager, _: f32, entities: &[EntityHandle]) {
//!         for &entity in entities {
//!             if let Some(health) = manager.get_component_mut::<Health>(entity) {
//!                 health.0 += 1;
//!             }
//!         }
//!     }
//! }
//!
//! let mut manager = Manager::new();
//! manager.create_system(Regen).unwrap();
//! manager.system_mut::<Regen>().unwrap().require::<Health>().unwrap();
//!
//! let entity = manager.create_entity().unwrap();
//! manager.add_component(entity, Health(10)).unwrap();
//! manager.update(0.016);
//!
//! assert_eq!(manager.get_component::<Health>(entity).map(|h| h.0), Some(11));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::{ManagerConfig, DEFAULT_POOL_CAPACITY, DEFAULT_POOL_NAME};
pub use ecs::{
    Component, ComponentHandle, ComponentMeta, Entity, EntityHandle, EntityId, EntityPool,
    KindId, Manager, PoolId, Priority, Signature, System, SystemEditor, SystemId, SystemRecord,
    SIGNATURE_BITS,
};
pub use error::{EcsError, EcsResult, ErrorCallback, ErrorCode};
