// entity_storage.rs - Entity manager over archetype/chunk storage
//
// Owns the entity table, the archetype registry and the buffer pool, and
// keeps every entity's location in sync with the chunk it lives in across
// spawns, removals and archetype migrations.

use rayon::prelude::*;
use strata_metrics::Counter;

use crate::ecs::storage::{
    Chunk, PooledColumnFactory, StorageError, StoragePolicies, StorageRemovalPolicy,
};
use crate::ecs::{
    Archetype, ArchetypeId, ArchetypeRegistry, ArchetypeSignature, Component, ComponentRegistry,
    Entity, EntityLocation, EntityTable,
};
use crate::pool::BufferPool;

/// Entity manager for one world of archetype storage.
///
/// Single mutator: every structural change takes `&mut self`. Read-only
/// chunk visits (including [`par_for_each_chunk`](Self::par_for_each_chunk))
/// take `&self`, so they can never overlap a mutation.
pub struct EntityStorage {
    policies: StoragePolicies,
    components: ComponentRegistry,
    archetypes: ArchetypeRegistry,
    entities: EntityTable,
    pool: BufferPool,
    counters: Counter,
}

struct Placement {
    location: EntityLocation,
    archetype_created: bool,
    chunk_created: bool,
}

impl EntityStorage {
    pub fn new(policies: StoragePolicies) -> Self {
        Self {
            policies,
            components: ComponentRegistry::new(),
            archetypes: ArchetypeRegistry::new(),
            entities: EntityTable::new(),
            pool: BufferPool::new(),
            counters: Counter::new(),
        }
    }

    pub fn policies(&self) -> &StoragePolicies {
        &self.policies
    }

    /// Make component `T` storable.
    pub fn register<T: Component>(&mut self) -> Result<(), StorageError> {
        self.components.register::<T>()
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn archetypes(&self) -> &ArchetypeRegistry {
        &self.archetypes
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.location(entity).is_some()
    }

    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        self.entities.location(entity)
    }

    /// Create an entity with every component in `signature` set to its
    /// default value.
    pub fn spawn(&mut self, signature: &ArchetypeSignature) -> Result<Entity, StorageError> {
        let entity = self.entities.allocate();
        let placement = match self.place(entity, signature) {
            Ok(placement) => placement,
            Err(err) => {
                self.entities.free(entity);
                return Err(err);
            }
        };
        self.entities.set_location(entity, placement.location);
        self.record_placement(&placement);
        Ok(entity)
    }

    /// Destroy an entity, honoring the configured removal policy.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), StorageError> {
        let location = self.location_of(entity)?;
        let archetype = self
            .archetypes
            .get_mut(location.archetype)
            .ok_or(StorageError::ArchetypeNotFound {
                id: location.archetype,
            })?;
        let moved = remove_row(
            archetype,
            entity,
            location,
            self.policies.removal(),
            &mut self.entities,
        )?;
        self.entities.free(entity);

        self.counters.increment("rows_removed", 1);
        self.counters.increment("rows_swapped", moved);
        Ok(())
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, StorageError> {
        let location = self.location_of(entity)?;
        let archetype = self.archetype_of(location)?;
        let column = archetype
            .column_of::<T>()
            .ok_or(StorageError::MissingComponent {
                entity,
                component: T::ID,
            })?;
        Ok(archetype.chunk(location.chunk)?.get::<T>(column, location.row)?)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, StorageError> {
        let location = self.location_of(entity)?;
        let archetype = self
            .archetypes
            .get_mut(location.archetype)
            .ok_or(StorageError::ArchetypeNotFound {
                id: location.archetype,
            })?;
        let column = archetype
            .column_of::<T>()
            .ok_or(StorageError::MissingComponent {
                entity,
                component: T::ID,
            })?;
        Ok(archetype
            .chunk_mut(location.chunk)?
            .get_mut::<T>(column, location.row)?)
    }

    /// Overwrite a component the entity already has.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), StorageError> {
        *self.get_mut::<T>(entity)? = value;
        Ok(())
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.location(entity)
            .and_then(|location| self.archetypes.get(location.archetype))
            .is_some_and(|archetype| archetype.contains(T::ID))
    }

    /// Give the entity component `T`, moving it to the matching archetype.
    /// If it already has `T` the value is simply overwritten.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), StorageError> {
        let location = self.location_of(entity)?;
        let signature = self.archetype_of(location)?.signature().clone();
        if !signature.contains(T::ID) {
            self.migrate(entity, location, &signature.with_added(T::ID))?;
        }
        self.set(entity, value)
    }

    /// Strip component `T`, moving the entity to the matching archetype.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<(), StorageError> {
        let location = self.location_of(entity)?;
        let signature = self.archetype_of(location)?.signature().clone();
        if !signature.contains(T::ID) {
            return Err(StorageError::MissingComponent {
                entity,
                component: T::ID,
            });
        }
        self.migrate(entity, location, &signature.with_removed(T::ID))?;
        Ok(())
    }

    /// Non-empty chunks of every archetype that has all of `required`, in
    /// deterministic archetype order.
    pub fn chunks_matching<'a>(
        &'a self,
        required: &ArchetypeSignature,
    ) -> impl Iterator<Item = (&'a Archetype, &'a Chunk)> + 'a {
        self.archetypes
            .matching(required)
            .into_iter()
            .flat_map(|archetype| {
                archetype
                    .chunks()
                    .iter()
                    .filter(|chunk| !chunk.is_empty())
                    .map(move |chunk| (archetype, chunk))
            })
    }

    /// Visit matching chunks in parallel. Read-only by construction.
    pub fn par_for_each_chunk<F>(&self, required: &ArchetypeSignature, f: F)
    where
        F: Fn(&Archetype, &Chunk) + Send + Sync,
    {
        let work: Vec<(&Archetype, &Chunk)> = self.chunks_matching(required).collect();
        work.par_iter().for_each(|&(archetype, chunk)| f(archetype, chunk));
    }

    /// Tear down archetypes with no live rows, returning their buffers to
    /// the pool. Returns how many were removed.
    pub fn release_empty_archetypes(&mut self) -> usize {
        let released = self.archetypes.release_empty(&mut self.pool);
        if released > 0 {
            tracing::debug!(released, "released empty archetypes");
        }
        strata_metrics::metrics! {
            self.counters.set("live_archetypes", self.archetypes.len());
            self.counters.set("pooled_buffers", self.pool.pooled());
        }
        released
    }

    fn location_of(&self, entity: Entity) -> Result<EntityLocation, StorageError> {
        self.entities
            .location(entity)
            .ok_or(StorageError::EntityNotFound { entity })
    }

    fn archetype_of(&self, location: EntityLocation) -> Result<&Archetype, StorageError> {
        self.archetypes
            .get(location.archetype)
            .ok_or(StorageError::ArchetypeNotFound {
                id: location.archetype,
            })
    }

    /// Reserve a row for `entity` in the archetype for `signature`.
    fn place(
        &mut self,
        entity: Entity,
        signature: &ArchetypeSignature,
    ) -> Result<Placement, StorageError> {
        let archetype_created = !self.archetypes.contains(ArchetypeId::from_signature(signature));
        let archetype = self.archetypes.get_or_create(signature)?;
        let chunks_before = archetype.chunk_count();

        let mut factory = PooledColumnFactory::new(&self.components, &mut self.pool);
        let chunk = archetype.get_or_create_chunk_with_space(
            self.policies.chunk_capacity(),
            self.policies.allocation(),
            &mut factory,
        )?;
        let row = chunk.add_entity(entity)?;
        let chunk_id = chunk.id();

        Ok(Placement {
            location: EntityLocation::new(archetype.id(), chunk_id, row),
            archetype_created,
            chunk_created: archetype.chunk_count() > chunks_before,
        })
    }

    /// Move `entity` from its current archetype into the one for `target`,
    /// carrying over every component both archetypes share.
    fn migrate(
        &mut self,
        entity: Entity,
        location: EntityLocation,
        target: &ArchetypeSignature,
    ) -> Result<EntityLocation, StorageError> {
        if ArchetypeId::from_signature(target) == location.archetype {
            let existing = self.archetype_of(location)?.signature().clone();
            return Err(StorageError::ArchetypeCollision {
                id: location.archetype,
                existing,
                requested: target.clone(),
            });
        }

        // Detach the source so source and destination chunks can be
        // borrowed at the same time.
        let mut source = self
            .archetypes
            .remove(location.archetype)
            .ok_or(StorageError::ArchetypeNotFound {
                id: location.archetype,
            })?;
        let result = self.migrate_from(&mut source, entity, location, target);
        let restored = self.archetypes.insert(source);
        let placement = result?;
        restored?;

        self.record_placement(&placement);
        self.counters.increment("rows_migrated", 1);
        Ok(placement.location)
    }

    fn migrate_from(
        &mut self,
        source: &mut Archetype,
        entity: Entity,
        location: EntityLocation,
        target: &ArchetypeSignature,
    ) -> Result<Placement, StorageError> {
        let source_chunk = source.chunk(location.chunk)?;
        let found = source_chunk.entity_at(location.row);
        if found != Some(entity) {
            return Err(StorageError::LocationMismatch { entity, found });
        }

        let archetype_created = !self.archetypes.contains(ArchetypeId::from_signature(target));
        let destination = self.archetypes.get_or_create(target)?;
        let destination_id = destination.id();
        let chunks_before = destination.chunk_count();

        // (source column, destination column) for every shared component
        let shared: Vec<(usize, usize)> = source
            .signature()
            .type_ids()
            .iter()
            .enumerate()
            .filter_map(|(src, &component)| {
                destination
                    .column_index_fast(component)
                    .map(|dst| (src, dst))
            })
            .collect();

        let mut factory = PooledColumnFactory::new(&self.components, &mut self.pool);
        let chunk = destination.get_or_create_chunk_with_space(
            self.policies.chunk_capacity(),
            self.policies.allocation(),
            &mut factory,
        )?;
        let row = chunk.count();
        for &(src, dst) in &shared {
            source_chunk
                .column_dyn(src)?
                .copy_element_to(location.row, chunk.column_dyn_mut(dst)?, row)?;
        }
        chunk.add_entity(entity)?;
        let new_location = EntityLocation::new(destination_id, chunk.id(), row);
        let chunk_created = destination.chunk_count() > chunks_before;

        tracing::trace!(
            entity = entity.to_bits(),
            from = location.archetype.value(),
            to = destination_id.value(),
            "migrated entity"
        );

        remove_row(
            source,
            entity,
            location,
            self.policies.removal(),
            &mut self.entities,
        )?;
        self.entities.set_location(entity, new_location);

        Ok(Placement {
            location: new_location,
            archetype_created,
            chunk_created,
        })
    }

    fn record_placement(&mut self, placement: &Placement) {
        self.counters.increment("rows_added", 1);
        if placement.archetype_created {
            self.counters.increment("archetypes_created", 1);
        }
        if placement.chunk_created {
            self.counters.increment("chunks_created", 1);
        }
    }
}

impl Default for EntityStorage {
    fn default() -> Self {
        Self::new(StoragePolicies::default())
    }
}

impl Drop for EntityStorage {
    fn drop(&mut self) {
        let archetypes: Vec<ArchetypeId> = self.archetypes.iter().map(Archetype::id).collect();
        for id in archetypes {
            if let Some(archetype) = self.archetypes.remove(id) {
                archetype.release(&mut self.pool);
            }
        }
        if self.pool.outstanding() != 0 {
            tracing::warn!(
                outstanding = self.pool.outstanding(),
                "buffers still rented at teardown"
            );
        }
    }
}

/// Remove `entity`'s row from its chunk and fix up the rows of every
/// entity that moved as a result. Returns how many entities moved.
fn remove_row(
    archetype: &mut Archetype,
    entity: Entity,
    location: EntityLocation,
    policy: StorageRemovalPolicy,
    entities: &mut EntityTable,
) -> Result<usize, StorageError> {
    let chunk = archetype.chunk_mut(location.chunk)?;
    let found = chunk.entity_at(location.row);
    if found != Some(entity) {
        return Err(StorageError::LocationMismatch { entity, found });
    }

    match policy {
        StorageRemovalPolicy::SwapBack => {
            let removal = chunk.remove_at_swap_back(location.row)?;
            if removal.did_swap {
                entities.set_row(removal.swapped_entity, location.row);
                return Ok(1);
            }
            Ok(0)
        }
        StorageRemovalPolicy::Stable => {
            let count = chunk.count();
            for from in location.row + 1..count {
                chunk.move_row(from, from - 1)?;
                if let Some(moved) = chunk.entity_at(from - 1) {
                    entities.set_row(moved, from - 1);
                }
            }
            chunk.truncate(count - 1)?;
            Ok(count - 1 - location.row)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;
    use crate::ecs::storage::{ChunkAllocationPolicy, ChunkId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Position {
        x: i32,
        y: i32,
    }
    define_component!(Position, 1, "Position");

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Velocity {
        x: i32,
        y: i32,
    }
    define_component!(Velocity, 3, "Velocity");

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Name(String);
    define_component!(Name, 7, "Name");

    fn storage(capacity: usize, removal: StorageRemovalPolicy) -> EntityStorage {
        let policies =
            StoragePolicies::new(capacity, ChunkAllocationPolicy::TrackLastWithSpace, removal)
                .unwrap();
        let mut storage = EntityStorage::new(policies);
        storage.register::<Position>().unwrap();
        storage.register::<Velocity>().unwrap();
        storage.register::<Name>().unwrap();
        storage
    }

    fn sig(ids: &[u32]) -> ArchetypeSignature {
        ArchetypeSignature::new(ids.iter().copied()).unwrap()
    }

    /// Every live entity's recorded location must point back at it.
    fn assert_locations_consistent(storage: &EntityStorage, entities: &[Entity]) {
        for &entity in entities {
            let location = storage.location(entity).unwrap();
            let archetype = storage.archetypes().get(location.archetype).unwrap();
            let chunk = archetype.chunk(location.chunk).unwrap();
            assert_eq!(chunk.entity_at(location.row), Some(entity));
        }
    }

    #[test]
    fn test_spawn_set_get() {
        let mut storage = storage(2, StorageRemovalPolicy::SwapBack);
        let movers = sig(&[1, 3]);
        let e = storage.spawn(&movers).unwrap();
        assert_eq!(storage.get::<Position>(e).unwrap(), &Position::default());

        storage.set(e, Position { x: 4, y: 5 }).unwrap();
        storage.get_mut::<Velocity>(e).unwrap().x = 9;
        assert_eq!(storage.get::<Position>(e).unwrap(), &Position { x: 4, y: 5 });
        assert_eq!(storage.get::<Velocity>(e).unwrap().x, 9);
        assert!(storage.has::<Velocity>(e));
        assert!(!storage.has::<Name>(e));
        assert!(matches!(
            storage.get::<Name>(e),
            Err(StorageError::MissingComponent { component: 7, .. })
        ));
    }

    #[test]
    fn test_spawn_fills_chunks_and_reports_locations() {
        let mut storage = storage(2, StorageRemovalPolicy::SwapBack);
        let movers = sig(&[1, 3]);
        let spawned: Vec<Entity> = (0..3).map(|_| storage.spawn(&movers).unwrap()).collect();

        let rows: Vec<(ChunkId, usize)> = spawned
            .iter()
            .map(|&e| {
                let location = storage.location(e).unwrap();
                (location.chunk, location.row)
            })
            .collect();
        assert_eq!(
            rows,
            vec![(ChunkId::new(0), 0), (ChunkId::new(0), 1), (ChunkId::new(1), 0)]
        );
        let archetype = storage.archetypes().find(&movers).unwrap();
        assert_eq!(archetype.chunk_count(), 2);
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn test_swap_back_despawn_updates_swapped_location() {
        let mut storage = storage(4, StorageRemovalPolicy::SwapBack);
        let movers = sig(&[1, 3]);
        let spawned: Vec<Entity> = (0..4).map(|_| storage.spawn(&movers).unwrap()).collect();
        for (i, &e) in spawned.iter().enumerate() {
            storage.set(e, Position { x: i as i32, y: 0 }).unwrap();
        }

        storage.despawn(spawned[1]).unwrap();
        assert!(!storage.contains(spawned[1]));
        assert_eq!(storage.location(spawned[3]).unwrap().row, 1);
        assert_eq!(storage.get::<Position>(spawned[3]).unwrap().x, 3);
        assert!(matches!(
            storage.despawn(spawned[1]),
            Err(StorageError::EntityNotFound { .. })
        ));
        assert_locations_consistent(&storage, &[spawned[0], spawned[2], spawned[3]]);
    }

    #[test]
    fn test_stable_despawn_preserves_order() {
        let mut storage = storage(8, StorageRemovalPolicy::Stable);
        let movers = sig(&[1]);
        let spawned: Vec<Entity> = (0..5).map(|_| storage.spawn(&movers).unwrap()).collect();
        for (i, &e) in spawned.iter().enumerate() {
            storage.set(e, Position { x: i as i32, y: 0 }).unwrap();
        }

        storage.despawn(spawned[1]).unwrap();
        let archetype = storage.archetypes().find(&movers).unwrap();
        let chunk = archetype.chunk(ChunkId::new(0)).unwrap();
        assert_eq!(chunk.entities(), &[spawned[0], spawned[2], spawned[3], spawned[4]]);
        let xs: Vec<i32> = chunk.column::<Position>(0).unwrap().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0, 2, 3, 4]);
        assert_locations_consistent(&storage, &[spawned[0], spawned[2], spawned[3], spawned[4]]);
    }

    #[test]
    fn test_add_component_migrates_and_keeps_values() {
        let mut storage = storage(4, StorageRemovalPolicy::SwapBack);
        let positioned = sig(&[1]);
        let a = storage.spawn(&positioned).unwrap();
        let b = storage.spawn(&positioned).unwrap();
        storage.set(a, Position { x: 1, y: 2 }).unwrap();
        storage.set(b, Position { x: 3, y: 4 }).unwrap();

        storage.add_component(a, Velocity { x: 7, y: 8 }).unwrap();

        let location = storage.location(a).unwrap();
        assert_eq!(location.archetype, ArchetypeId::from_signature(&sig(&[1, 3])));
        assert_eq!(storage.get::<Position>(a).unwrap(), &Position { x: 1, y: 2 });
        assert_eq!(storage.get::<Velocity>(a).unwrap(), &Velocity { x: 7, y: 8 });
        // b was swapped into a's old row
        assert_eq!(storage.location(b).unwrap().row, 0);
        assert_eq!(storage.get::<Position>(b).unwrap(), &Position { x: 3, y: 4 });
        assert_locations_consistent(&storage, &[a, b]);

        // adding again only overwrites
        storage.add_component(a, Velocity { x: 0, y: 1 }).unwrap();
        assert_eq!(storage.location(a).unwrap().archetype, location.archetype);
        assert_eq!(storage.get::<Velocity>(a).unwrap(), &Velocity { x: 0, y: 1 });
    }

    #[test]
    fn test_remove_component_migrates_and_old_archetype_releases() {
        let mut storage = storage(4, StorageRemovalPolicy::SwapBack);
        let e = storage.spawn(&sig(&[1, 3, 7])).unwrap();
        storage.set(e, Name("walker".to_string())).unwrap();
        storage.set(e, Position { x: 5, y: 6 }).unwrap();

        storage.remove_component::<Velocity>(e).unwrap();
        assert!(!storage.has::<Velocity>(e));
        assert_eq!(storage.get::<Name>(e).unwrap(), &Name("walker".to_string()));
        assert_eq!(storage.get::<Position>(e).unwrap(), &Position { x: 5, y: 6 });
        assert!(matches!(
            storage.remove_component::<Velocity>(e),
            Err(StorageError::MissingComponent { component: 3, .. })
        ));

        let old = storage.archetypes().find(&sig(&[1, 3, 7])).unwrap();
        assert!(old.is_empty());
        assert_eq!(storage.release_empty_archetypes(), 1);
        assert!(storage.archetypes().find(&sig(&[1, 3, 7])).is_none());
        assert_eq!(storage.get::<Position>(e).unwrap().x, 5);
    }

    #[test]
    fn test_unregistered_component_does_not_leak_entity() {
        let mut storage = storage(4, StorageRemovalPolicy::SwapBack);
        let err = storage.spawn(&sig(&[1, 99])).unwrap_err();
        assert!(matches!(err, StorageError::UnregisteredComponent { component: 99 }));
        assert!(storage.is_empty());
        assert_eq!(storage.pool().outstanding(), 0);
    }

    #[test]
    fn test_parallel_visit_sees_every_matching_row() {
        let mut storage = storage(3, StorageRemovalPolicy::SwapBack);
        for _ in 0..5 {
            storage.spawn(&sig(&[1, 3])).unwrap();
        }
        for _ in 0..4 {
            storage.spawn(&sig(&[1])).unwrap();
        }
        storage.spawn(&sig(&[3])).unwrap();

        let rows = AtomicUsize::new(0);
        storage.par_for_each_chunk(&sig(&[1]), |archetype, chunk| {
            assert!(archetype.contains(1));
            rows.fetch_add(chunk.count(), Ordering::Relaxed);
        });
        assert_eq!(rows.load(Ordering::Relaxed), 9);

        let chunk_counts: Vec<usize> = storage
            .chunks_matching(&sig(&[1]))
            .map(|(_, chunk)| chunk.count())
            .collect();
        // [1] sorts before [1, 3]
        assert_eq!(chunk_counts, vec![3, 1, 3, 2]);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_counters_track_structure_changes() {
        let mut storage = storage(2, StorageRemovalPolicy::SwapBack);
        let a = storage.spawn(&sig(&[1])).unwrap();
        storage.spawn(&sig(&[1])).unwrap();
        storage.spawn(&sig(&[1])).unwrap();
        storage.add_component(a, Velocity::default()).unwrap();
        storage.despawn(a).unwrap();

        let counters = storage.counters();
        assert_eq!(counters.get("archetypes_created"), 2);
        assert_eq!(counters.get("chunks_created"), 3);
        assert_eq!(counters.get("rows_added"), 4);
        assert_eq!(counters.get("rows_migrated"), 1);
        assert_eq!(counters.get("rows_removed"), 1);
    }
}
