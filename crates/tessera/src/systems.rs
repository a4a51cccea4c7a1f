//! # Sample Systems
//!
//! Run order, lowest priority first:
//!
//! 1. [`MovementSystem`] integrates velocity into position
//! 2. [`DecaySystem`] drains health
//! 3. [`ReaperSystem`] kills whatever reached zero health

use tessera_core::{EntityHandle, Manager, Priority, System};

use crate::components::{Health, Position, Velocity};

/// Moves every entity owning a [`Position`] and a [`Velocity`].
#[derive(Debug, Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn priority(&self) -> Priority {
        0
    }

    fn update(&mut self, manager: &mut Manager, delta_time: f32, entities: &[EntityHandle]) {
        for &entity in entities {
            let Some(velocity) = manager.get_component::<Velocity>(entity).copied() else {
                continue;
            };
            if let Some(position) = manager.get_component_mut::<Position>(entity) {
                position.x += velocity.dx * delta_time;
                position.y += velocity.dy * delta_time;
            }
        }
    }
}

/// Removes `amount` hit points per tick.
#[derive(Debug)]
pub struct DecaySystem {
    /// Hit points lost per tick.
    pub amount: i32,
}

impl Default for DecaySystem {
    fn default() -> Self {
        Self { amount: 1 }
    }
}

impl System for DecaySystem {
    fn priority(&self) -> Priority {
        10
    }

    fn update(&mut self, manager: &mut Manager, _: f32, entities: &[EntityHandle]) {
        for &entity in entities {
            if let Some(health) = manager.get_component_mut::<Health>(entity) {
                health.0 -= self.amount;
            }
        }
    }
}

/// Kills entities whose [`Health`] dropped to zero or below.
#[derive(Debug, Default)]
pub struct ReaperSystem {
    /// Entities killed since creation.
    pub reaped: usize,
}

impl System for ReaperSystem {
    fn priority(&self) -> Priority {
        20
    }

    fn update(&mut self, manager: &mut Manager, _: f32, entities: &[EntityHandle]) {
        for &entity in entities {
            let dead = manager
                .get_component::<Health>(entity)
                .is_some_and(|health| health.0 <= 0);
            if dead && manager.kill_entity(entity).is_ok() {
                self.reaped += 1;
                tracing::trace!(entity = %entity.id, "reaped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(entities: &[(i32, Option<Velocity>)]) -> (Manager, Vec<EntityHandle>) {
        let mut manager = Manager::new();
        let handles = entities
            .iter()
            .map(|&(hp, velocity)| {
                let entity = manager.create_entity().unwrap();
                manager.add_component(entity, Health(hp)).unwrap();
                manager.add_component(entity, Position::default()).unwrap();
                if let Some(velocity) = velocity {
                    manager.add_component(entity, velocity).unwrap();
                }
                entity
            })
            .collect();
        (manager, handles)
    }

    #[test]
    fn test_movement_skips_entities_without_velocity() {
        let (mut manager, handles) =
            manager_with(&[(5, Some(Velocity::new(4.0, 2.0))), (5, None)]);
        let mut system = MovementSystem;

        system.update(&mut manager, 0.5, &handles);

        assert_eq!(
            manager.get_component::<Position>(handles[0]),
            Some(&Position::new(2.0, 1.0))
        );
        assert_eq!(
            manager.get_component::<Position>(handles[1]),
            Some(&Position::default())
        );
    }

    #[test]
    fn test_decay_then_reap() {
        let (mut manager, handles) = manager_with(&[(1, None), (3, None)]);
        let mut decay = DecaySystem::default();
        let mut reaper = ReaperSystem::default();

        decay.update(&mut manager, 0.0, &handles);
        reaper.update(&mut manager, 0.0, &handles);

        assert_eq!(reaper.reaped, 1);
        assert!(!manager.is_alive(handles[0]));
        assert_eq!(manager.get_component::<Health>(handles[1]), Some(&Health(2)));
        assert_eq!(manager.component_count::<Position>(), 1);
    }

    #[test]
    fn test_priorities_are_distinct() {
        let priorities = [
            MovementSystem.priority(),
            DecaySystem::default().priority(),
            ReaperSystem::default().priority(),
        ];
        assert!(priorities.windows(2).all(|w| w[0] < w[1]));
    }
}
