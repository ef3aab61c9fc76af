//! Strata Runtime
//!
//! Small driver binary: loads settings, builds an entity storage and runs
//! a spawn/migrate/despawn workload over it, logging the resulting layout.
//!
//! Usage: `strata [settings.json]`

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use strata_core::define_component;
use strata_core::ecs::{ArchetypeSignature, Component, EntityStorage};
use strata_services::Settings;

#[derive(Clone, Copy, Debug, Default)]
struct Position {
    x: f32,
    y: f32,
}
define_component!(Position, 1, "Position");

#[derive(Clone, Copy, Debug, Default)]
struct Velocity {
    x: f32,
    y: f32,
}
define_component!(Velocity, 2, "Velocity");

#[derive(Clone, Copy, Debug, Default)]
struct Health(u32);
define_component!(Health, 3, "Health");

const SPAWN_COUNT: usize = 1000;

fn main() -> Result<()> {
    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(&path).with_context(|| format!("loading {path}"))?,
        None => Settings::default(),
    };
    let level: tracing::Level = settings
        .log_level
        .parse()
        .with_context(|| format!("bad log level `{}`", settings.log_level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::info!("Strata v{}", strata_core::VERSION);
    let mut storage = strata_services::init_storage(&settings);
    storage.register::<Position>()?;
    storage.register::<Velocity>()?;
    storage.register::<Health>()?;

    run_workload(&mut storage)?;
    report(&storage);
    Ok(())
}

fn run_workload(storage: &mut EntityStorage) -> Result<()> {
    let movers = ArchetypeSignature::new([Position::ID, Velocity::ID])?;
    let statics = ArchetypeSignature::new([Position::ID])?;

    let mut spawned = Vec::with_capacity(SPAWN_COUNT);
    for i in 0..SPAWN_COUNT {
        let signature = if i % 3 == 0 { &statics } else { &movers };
        let entity = storage.spawn(signature)?;
        storage.set(entity, Position { x: i as f32, y: 0.0 })?;
        if storage.has::<Velocity>(entity) {
            storage.set(entity, Velocity { x: 1.0, y: 0.5 })?;
        }
        spawned.push(entity);
    }

    // Every fifth entity gets health; every seventh dies.
    for (i, &entity) in spawned.iter().enumerate() {
        if i % 5 == 0 {
            storage.add_component(entity, Health(100))?;
        }
    }
    for (i, &entity) in spawned.iter().enumerate() {
        if i % 7 == 0 {
            storage.despawn(entity)?;
        } else if i % 11 == 0 && storage.has::<Velocity>(entity) {
            storage.remove_component::<Velocity>(entity)?;
        }
    }

    // One integration step over everything that still moves.
    for &entity in &spawned {
        if !storage.has::<Velocity>(entity) {
            continue;
        }
        let velocity = *storage.get::<Velocity>(entity)?;
        let position = storage.get_mut::<Position>(entity)?;
        position.x += velocity.x;
        position.y += velocity.y;
    }

    let released = storage.release_empty_archetypes();
    tracing::info!(live = storage.len(), released, "workload finished");
    Ok(())
}

fn report(storage: &EntityStorage) {
    let with_position = ArchetypeSignature::new([Position::ID]).unwrap_or_default();
    let rows = AtomicUsize::new(0);
    storage.par_for_each_chunk(&with_position, |_, chunk| {
        rows.fetch_add(chunk.count(), Ordering::Relaxed);
    });
    tracing::info!(rows = rows.load(Ordering::Relaxed), "rows with Position");

    let with_health = ArchetypeSignature::new([Health::ID]).unwrap_or_default();
    let total_health = AtomicUsize::new(0);
    storage.par_for_each_chunk(&with_health, |archetype, chunk| {
        let Some(column) = archetype.column_of::<Health>() else {
            return;
        };
        if let Ok(values) = chunk.column::<Health>(column) {
            let sum: u32 = values.iter().map(|health| health.0).sum();
            total_health.fetch_add(sum as usize, Ordering::Relaxed);
        }
    });
    tracing::info!(total = total_health.load(Ordering::Relaxed), "total health");

    let furthest = storage
        .chunks_matching(&with_position)
        .filter_map(|(archetype, chunk)| {
            let column = archetype.column_of::<Position>()?;
            chunk.column::<Position>(column).ok()
        })
        .flatten()
        .map(|position| position.x.max(position.y))
        .fold(f32::MIN, f32::max);
    tracing::info!(furthest, "furthest position");

    for (archetype, chunk) in storage.chunks_matching(&ArchetypeSignature::empty()) {
        tracing::info!(
            archetype = %format!("{:016x}", archetype.id().value()),
            components = ?archetype.signature().type_ids(),
            chunk = chunk.id().value(),
            count = chunk.count(),
            capacity = chunk.capacity(),
            "chunk"
        );
    }

    for (name, value) in storage.counters().snapshot() {
        tracing::info!(counter = %name, value, "storage counter");
    }
}
