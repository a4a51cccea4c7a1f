//! # Registry Benchmark
//!
//! Measures the hot operations of the registry:
//! - Entity create/kill cycles on a warm pool
//! - Component add/remove with slot reuse
//! - A full `update` tick over matching entities
//!
//! Run with: `cargo bench --package tessera_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_core::{Component, EntityHandle, Manager, ManagerConfig, Priority, System};

/// Entities per benchmark world.
const ENTITY_COUNT: usize = 16_384;

#[derive(Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Clone, Copy)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {}

struct Movement;

impl System for Movement {
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

fn manager_with_capacity(capacity: usize) -> Manager {
    let config = ManagerConfig {
        default_pool_capacity: capacity,
        ..ManagerConfig::default()
    };
    Manager::with_config(config).unwrap()
}

/// Benchmark: Fill a pool, then kill everything.
fn bench_create_kill(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_kill");

    for count in [1_024, ENTITY_COUNT] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut manager = manager_with_capacity(count);
            let mut handles = Vec::with_capacity(count);
            b.iter(|| {
                for _ in 0..count {
                    handles.push(manager.create_entity().unwrap());
                }
                for handle in handles.drain(..) {
                    manager.kill_entity(handle).unwrap();
                }
                black_box(manager.entity_count("DEFAULT", true).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark: Add and remove one component per entity; slots are recycled.
fn bench_component_churn(c: &mut Criterion) {
    let mut manager = manager_with_capacity(ENTITY_COUNT);
    let entities: Vec<EntityHandle> = (0..ENTITY_COUNT)
        .map(|_| manager.create_entity().unwrap())
        .collect();

    c.bench_function("component_add_remove_16K", |b| {
        b.iter(|| {
            for &entity in &entities {
                let handle = manager
                    .add_component(entity, Position { x: 0.0, y: 0.0 })
                    .unwrap();
                black_box(manager.remove_component::<Position>(entity, handle).unwrap());
            }
        });
    });
}

/// Benchmark: One tick of a movement system over every entity.
fn bench_update_tick(c: &mut Criterion) {
    let mut manager = manager_with_capacity(ENTITY_COUNT);
    manager.create_system(Movement).unwrap();
    {
        let mut editor = manager.system_mut::<Movement>().unwrap();
        editor.require::<Position>().unwrap();
        editor.require::<Velocity>().unwrap();
    }
    for i in 0..ENTITY_COUNT {
        let entity = manager.create_entity().unwrap();
        let f = i as f32;
        manager.add_component(entity, Position { x: f, y: f }).unwrap();
        manager
            .add_component(entity, Velocity { dx: 0.1, dy: 0.2 })
            .unwrap();
    }

    c.bench_function("update_tick_16K", |b| {
        b.iter(|| {
            manager.update(black_box(0.016));
        });
    });
}

criterion_group!(
    benches,
    bench_create_kill,
    bench_component_churn,
    bench_update_tick,
);

criterion_main!(benches);
