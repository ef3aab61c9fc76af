use std::any::{type_name, Any};

use crate::ecs::ComponentId;
use crate::pool::BufferPool;

use super::ColumnError;

/// Values that can be stored in a [`TypedColumn`].
pub trait ColumnValue: Default + Clone + Send + Sync + 'static {}

impl<T: Default + Clone + Send + Sync + 'static> ColumnValue for T {}

/// Type-erased view of one component column inside a chunk.
///
/// Chunks hold heterogeneous columns behind this trait so row moves and
/// resets can be applied to every column without knowing `T`. All row
/// arguments are bounded by the column capacity, not the chunk count;
/// the chunk decides which rows are live.
pub trait ChunkColumn: Any + Send + Sync {
    fn component_id(&self) -> ComponentId;

    /// Name of the stored Rust type, for diagnostics.
    fn type_name(&self) -> &'static str;

    fn capacity(&self) -> usize;

    /// Move the value at `from` into `to`, leaving the default at `from`.
    fn move_element(&mut self, from: usize, to: usize) -> Result<(), ColumnError>;

    /// Clone the value at `src_row` into `dst_row` of `dst`, which must hold
    /// the same element type.
    fn copy_element_to(
        &self,
        src_row: usize,
        dst: &mut dyn ChunkColumn,
        dst_row: usize,
    ) -> Result<(), ColumnError>;

    /// Reset one row to the type's default value.
    fn set_default(&mut self, row: usize) -> Result<(), ColumnError>;

    /// Hand the backing buffer back to the pool it was rented from.
    fn release(self: Box<Self>, pool: &mut BufferPool);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Fixed-capacity backing array for a single component type.
pub struct TypedColumn<T> {
    component: ComponentId,
    data: Vec<T>,
}

impl<T: ColumnValue> TypedColumn<T> {
    /// Rent a buffer of `capacity` default values from `pool`.
    pub fn rent(component: ComponentId, capacity: usize, pool: &mut BufferPool) -> Self {
        Self {
            component,
            data: pool.rent(capacity),
        }
    }

    pub(crate) fn create_boxed(
        component: ComponentId,
        capacity: usize,
        pool: &mut BufferPool,
    ) -> Box<dyn ChunkColumn> {
        Box::new(Self::rent(component, capacity, pool))
    }

    #[inline]
    pub fn get(&self, row: usize) -> Option<&T> {
        self.data.get(row)
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize) -> Option<&mut T> {
        self.data.get_mut(row)
    }

    pub fn write(&mut self, row: usize, value: T) -> Result<(), ColumnError> {
        let bound = self.data.len();
        let slot = self
            .data
            .get_mut(row)
            .ok_or(ColumnError::RowOutOfRange { row, bound })?;
        *slot = value;
        Ok(())
    }

    /// The whole backing array, including rows the chunk considers free.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    fn check_row(&self, row: usize) -> Result<(), ColumnError> {
        if row < self.data.len() {
            Ok(())
        } else {
            Err(ColumnError::RowOutOfRange {
                row,
                bound: self.data.len(),
            })
        }
    }
}

impl<T: ColumnValue> ChunkColumn for TypedColumn<T> {
    fn component_id(&self) -> ComponentId {
        self.component
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn move_element(&mut self, from: usize, to: usize) -> Result<(), ColumnError> {
        self.check_row(from)?;
        self.check_row(to)?;
        if from != to {
            self.data[to] = std::mem::take(&mut self.data[from]);
        }
        Ok(())
    }

    fn copy_element_to(
        &self,
        src_row: usize,
        dst: &mut dyn ChunkColumn,
        dst_row: usize,
    ) -> Result<(), ColumnError> {
        self.check_row(src_row)?;
        let dst_component = dst.component_id();
        let dst = dst
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
            .ok_or(ColumnError::TypeMismatch {
                component: dst_component,
                requested: type_name::<T>(),
            })?;
        dst.write(dst_row, self.data[src_row].clone())
    }

    fn set_default(&mut self, row: usize) -> Result<(), ColumnError> {
        self.check_row(row)?;
        self.data[row] = T::default();
        Ok(())
    }

    fn release(self: Box<Self>, pool: &mut BufferPool) {
        pool.release(self.data);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
