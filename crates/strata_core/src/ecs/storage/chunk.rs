// chunk.rs - Fixed-capacity SoA block
//
// A chunk holds up to `capacity` entities of one archetype: a parallel
// entity-handle array plus one column per signature member, in signature
// order. Rows [0, count) are live; everything past `count` is free and is
// kept at default values.

use std::any::type_name;

use crate::ecs::{ComponentId, Entity};
use crate::pool::BufferPool;

use super::{ChunkColumn, ColumnError, ColumnFactory, ColumnValue, StorageError, TypedColumn};

/// Chunk identifier, assigned sequentially by the owning archetype.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u32);

impl ChunkId {
    pub const INVALID: ChunkId = ChunkId(u32::MAX);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Outcome of [`Chunk::remove_at_swap_back`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SwapBackRemoval {
    /// The entity that now occupies the removed row when `did_swap` is
    /// set; otherwise the entity that was removed.
    pub swapped_entity: Entity,
    /// True when the former last row was moved into the removed row.
    pub did_swap: bool,
}

pub struct Chunk {
    id: ChunkId,
    count: usize,
    entities: Vec<Entity>,
    columns: Vec<Box<dyn ChunkColumn>>,
}

impl Chunk {
    /// Assemble a chunk from pre-built buffers. The entity array length is
    /// the capacity; every column must match it.
    pub fn new(
        id: ChunkId,
        entities: Vec<Entity>,
        columns: Vec<Box<dyn ChunkColumn>>,
    ) -> Result<Self, StorageError> {
        let capacity = entities.len();
        if capacity == 0 {
            return Err(StorageError::InvalidChunkCapacity { capacity });
        }
        if let Some(column) = columns.iter().find(|c| c.capacity() != capacity) {
            return Err(StorageError::ColumnCapacityMismatch {
                component: column.component_id(),
                expected: capacity,
                found: column.capacity(),
            });
        }

        Ok(Self {
            id,
            count: 0,
            entities,
            columns,
        })
    }

    /// Build a chunk with one column per id in `components`, renting every
    /// buffer from `factory`. On failure, buffers already rented go back.
    pub fn with_factory(
        id: ChunkId,
        capacity: usize,
        components: &[ComponentId],
        factory: &mut dyn ColumnFactory,
    ) -> Result<Self, StorageError> {
        if capacity == 0 {
            return Err(StorageError::InvalidChunkCapacity { capacity });
        }

        let entities = factory.rent_entities(capacity);
        let mut columns = Vec::with_capacity(components.len());
        for &component in components {
            let built = factory.create_column(component, capacity).and_then(|column| {
                if column.capacity() == capacity {
                    Ok(column)
                } else {
                    let err = StorageError::ColumnCapacityMismatch {
                        component,
                        expected: capacity,
                        found: column.capacity(),
                    };
                    factory.release_column(column);
                    Err(err)
                }
            });
            match built {
                Ok(column) => columns.push(column),
                Err(err) => {
                    for column in columns {
                        factory.release_column(column);
                    }
                    factory.release_entities(entities);
                    return Err(err);
                }
            }
        }

        Self::new(id, entities, columns)
    }

    #[inline]
    pub fn id(&self) -> ChunkId {
        self.id
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.entities.len()
    }

    /// Number of live rows.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn has_space(&self) -> bool {
        self.count < self.capacity()
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Live entity handles, row-indexed.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities[..self.count]
    }

    pub fn entity_at(&self, row: usize) -> Option<Entity> {
        self.entities().get(row).copied()
    }

    /// Append `entity` at row `count` and return that row.
    ///
    /// Fails with [`StorageError::ChunkFull`] when no space is left; callers
    /// are expected to check [`has_space`](Self::has_space) first. Column
    /// values for the row are written separately, before or after.
    pub fn add_entity(&mut self, entity: Entity) -> Result<usize, StorageError> {
        if !self.has_space() {
            return Err(StorageError::ChunkFull {
                chunk: self.id,
                capacity: self.capacity(),
            });
        }
        let row = self.count;
        self.entities[row] = entity;
        self.count += 1;
        Ok(row)
    }

    /// Remove `row` by moving the last live row into it.
    ///
    /// Row order is not preserved. The vacated last slot is reset to
    /// [`Entity::INVALID`] and default column values.
    pub fn remove_at_swap_back(&mut self, row: usize) -> Result<SwapBackRemoval, StorageError> {
        self.check_live(row)?;
        let last = self.count - 1;
        let removed = self.entities[row];
        let did_swap = row != last;

        if did_swap {
            self.entities[row] = self.entities[last];
            for column in &mut self.columns {
                column.move_element(last, row)?;
            }
            tracing::trace!(chunk = self.id.value(), from = last, to = row, "swap-back row move");
        }
        self.clear_row(last)?;
        self.count -= 1;

        Ok(SwapBackRemoval {
            swapped_entity: if did_swap { self.entities[row] } else { removed },
            did_swap,
        })
    }

    /// Move a live row's entity and component values to another live row,
    /// overwriting it. The source row keeps default values afterwards.
    pub fn move_row(&mut self, from: usize, to: usize) -> Result<(), StorageError> {
        self.check_live(from)?;
        self.check_live(to)?;
        if from == to {
            return Ok(());
        }
        self.entities[to] = self.entities[from];
        self.entities[from] = Entity::INVALID;
        for column in &mut self.columns {
            column.move_element(from, to)?;
        }
        Ok(())
    }

    /// Shrink the live count, clearing every vacated row.
    ///
    /// This is the count hook for removal strategies that shift rows
    /// themselves (stable removal) instead of using swap-back.
    pub fn truncate(&mut self, new_count: usize) -> Result<(), StorageError> {
        if new_count > self.count {
            return Err(StorageError::InvalidCount {
                requested: new_count,
                count: self.count,
            });
        }
        for row in new_count..self.count {
            self.clear_row(row)?;
        }
        self.count = new_count;
        Ok(())
    }

    pub fn column_dyn(&self, index: usize) -> Result<&(dyn ChunkColumn + 'static), ColumnError> {
        let column_count = self.columns.len();
        self.columns
            .get(index)
            .map(|column| column.as_ref())
            .ok_or(ColumnError::ColumnOutOfRange {
                column: index,
                column_count,
            })
    }

    pub fn column_dyn_mut(
        &mut self,
        index: usize,
    ) -> Result<&mut (dyn ChunkColumn + 'static), ColumnError> {
        let column_count = self.columns.len();
        match self.columns.get_mut(index) {
            Some(column) => Ok(column.as_mut()),
            None => Err(ColumnError::ColumnOutOfRange {
                column: index,
                column_count,
            }),
        }
    }

    /// Live values of column `index` as a typed slice.
    pub fn column<T: ColumnValue>(&self, index: usize) -> Result<&[T], ColumnError> {
        let count = self.count;
        Ok(&self.typed::<T>(index)?.as_slice()[..count])
    }

    /// Live values of column `index` as a mutable typed slice.
    pub fn column_mut<T: ColumnValue>(&mut self, index: usize) -> Result<&mut [T], ColumnError> {
        let count = self.count;
        Ok(&mut self.typed_mut::<T>(index)?.as_mut_slice()[..count])
    }

    pub fn get<T: ColumnValue>(&self, index: usize, row: usize) -> Result<&T, ColumnError> {
        self.column::<T>(index)?
            .get(row)
            .ok_or(ColumnError::RowOutOfRange {
                row,
                bound: self.count,
            })
    }

    pub fn get_mut<T: ColumnValue>(
        &mut self,
        index: usize,
        row: usize,
    ) -> Result<&mut T, ColumnError> {
        let bound = self.count;
        self.column_mut::<T>(index)?
            .get_mut(row)
            .ok_or(ColumnError::RowOutOfRange { row, bound })
    }

    /// Write one value. `row` may be any row below capacity so callers can
    /// populate a row before or after [`add_entity`](Self::add_entity).
    pub fn write<T: ColumnValue>(
        &mut self,
        index: usize,
        row: usize,
        value: T,
    ) -> Result<(), ColumnError> {
        self.typed_mut::<T>(index)?.write(row, value)
    }

    /// Return the entity array and every column buffer to `pool`.
    pub fn release(self, pool: &mut BufferPool) {
        pool.release(self.entities);
        for column in self.columns {
            column.release(pool);
        }
    }

    fn typed<T: ColumnValue>(&self, index: usize) -> Result<&TypedColumn<T>, ColumnError> {
        let column = self.column_dyn(index)?;
        column
            .as_any()
            .downcast_ref::<TypedColumn<T>>()
            .ok_or(ColumnError::TypeMismatch {
                component: column.component_id(),
                requested: type_name::<T>(),
            })
    }

    fn typed_mut<T: ColumnValue>(
        &mut self,
        index: usize,
    ) -> Result<&mut TypedColumn<T>, ColumnError> {
        let column = self.column_dyn_mut(index)?;
        let component = column.component_id();
        column
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
            .ok_or(ColumnError::TypeMismatch {
                component,
                requested: type_name::<T>(),
            })
    }

    fn check_live(&self, row: usize) -> Result<(), ColumnError> {
        if row < self.count {
            Ok(())
        } else {
            Err(ColumnError::RowOutOfRange {
                row,
                bound: self.count,
            })
        }
    }

    fn clear_row(&mut self, row: usize) -> Result<(), ColumnError> {
        self.entities[row] = Entity::INVALID;
        for column in &mut self.columns {
            column.set_default(row)?;
        }
        Ok(())
    }
}
