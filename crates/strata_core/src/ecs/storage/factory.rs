use crate::ecs::{ComponentId, ComponentRegistry, Entity};
use crate::pool::BufferPool;

use super::{ChunkColumn, StorageError};

/// Supplies the backing arrays for a new chunk.
///
/// Whatever a factory hands out must eventually come back through the
/// matching `release_*` call (or [`Chunk::release`](super::Chunk::release)
/// against the same pool) so rents and returns stay paired.
pub trait ColumnFactory {
    /// Build an empty column of `capacity` rows for `component`.
    fn create_column(
        &mut self,
        component: ComponentId,
        capacity: usize,
    ) -> Result<Box<dyn ChunkColumn>, StorageError>;

    /// Rent the entity-handle array for a chunk of `capacity` rows.
    fn rent_entities(&mut self, capacity: usize) -> Vec<Entity>;

    fn release_column(&mut self, column: Box<dyn ChunkColumn>);

    fn release_entities(&mut self, entities: Vec<Entity>);
}

/// Factory that resolves column types through a [`ComponentRegistry`] and
/// rents every buffer from a [`BufferPool`].
pub struct PooledColumnFactory<'a> {
    registry: &'a ComponentRegistry,
    pool: &'a mut BufferPool,
}

impl<'a> PooledColumnFactory<'a> {
    pub fn new(registry: &'a ComponentRegistry, pool: &'a mut BufferPool) -> Self {
        Self { registry, pool }
    }
}

impl ColumnFactory for PooledColumnFactory<'_> {
    fn create_column(
        &mut self,
        component: ComponentId,
        capacity: usize,
    ) -> Result<Box<dyn ChunkColumn>, StorageError> {
        let ctor = self
            .registry
            .ctor_of(component)
            .ok_or(StorageError::UnregisteredComponent { component })?;
        Ok(ctor(component, capacity, self.pool))
    }

    fn rent_entities(&mut self, capacity: usize) -> Vec<Entity> {
        self.pool.rent(capacity)
    }

    fn release_column(&mut self, column: Box<dyn ChunkColumn>) {
        column.release(self.pool);
    }

    fn release_entities(&mut self, entities: Vec<Entity>) {
        self.pool.release(entities);
    }
}
