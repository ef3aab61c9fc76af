// component.rs - Component registration
//
// Components are identified by u32 IDs, not Rust TypeIds. Signatures,
// archetype ids and column layout are all derived from these ids, so the
// same assignment must be used across runs for ids to be stable.

use std::any::TypeId;
use std::collections::HashMap;
use std::mem::{align_of, size_of};

use crate::ecs::storage::{ChunkColumn, StorageError, TypedColumn};
use crate::pool::BufferPool;

pub type ComponentId = u32;

/// Builds an empty column of a fixed capacity for one registered component.
pub(crate) type ColumnCtor = fn(ComponentId, usize, &mut BufferPool) -> Box<dyn ChunkColumn>;

/// Metadata describing a component's memory layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentMeta {
    pub id: ComponentId,
    pub name: String,
    pub size: usize,
    pub align: usize,
}

/// Trait for components that can live in chunk columns.
///
/// `Default` supplies the value written into vacated rows and freshly
/// rented buffers; `Clone` backs cross-chunk copies.
pub trait Component: 'static + Sized + Send + Sync + Default + Clone {
    /// Globally unique component ID.
    const ID: ComponentId;

    /// Human-readable name for debugging.
    const NAME: &'static str;

    fn meta() -> ComponentMeta {
        ComponentMeta {
            id: Self::ID,
            name: Self::NAME.to_string(),
            size: size_of::<Self>(),
            align: align_of::<Self>(),
        }
    }
}

/// Helper macro to implement Component trait.
///
/// # Example
/// ```ignore
/// #[derive(Clone, Copy, Default)]
/// struct Position { x: f32, y: f32 }
///
/// define_component!(Position, 1, "Position");
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $id:expr, $name:expr) => {
        impl $crate::ecs::Component for $ty {
            const ID: $crate::ecs::ComponentId = $id;
            const NAME: &'static str = $name;
        }
    };
}

struct RegisteredComponent {
    meta: ComponentMeta,
    type_id: TypeId,
    ctor: ColumnCtor,
}

/// Registry for every component type a storage instance can hold.
///
/// Owns the id -> layout mapping plus a constructor that knows the
/// concrete column type, so chunks can be built from bare ids.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: HashMap<ComponentId, RegisteredComponent>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`. Registering the same type twice is a no-op; a second
    /// type claiming an already registered id is rejected.
    pub fn register<T: Component>(&mut self) -> Result<(), StorageError> {
        let meta = T::meta();
        if let Some(prev) = self.entries.get(&T::ID) {
            if prev.meta.size != meta.size || prev.meta.align != meta.align {
                return Err(StorageError::ComponentLayoutMismatch {
                    component: T::ID,
                    existing: prev.meta.name.clone(),
                    requested: meta.name,
                });
            }
            if prev.type_id != TypeId::of::<T>() {
                return Err(StorageError::ComponentTypeConflict {
                    component: T::ID,
                    existing: prev.meta.name.clone(),
                    requested: meta.name,
                });
            }
            return Ok(());
        }

        tracing::debug!(component = T::ID, name = T::NAME, "registered component");
        self.entries.insert(
            T::ID,
            RegisteredComponent {
                meta,
                type_id: TypeId::of::<T>(),
                ctor: TypedColumn::<T>::create_boxed,
            },
        );
        Ok(())
    }

    /// Look up component metadata by ID.
    pub fn meta_of(&self, id: ComponentId) -> Option<&ComponentMeta> {
        self.entries.get(&id).map(|entry| &entry.meta)
    }

    pub fn is_registered(&self, id: ComponentId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn ctor_of(&self, id: ComponentId) -> Option<ColumnCtor> {
        self.entries.get(&id).map(|entry| entry.ctor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    define_component!(Position, 1, "Position");

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Impostor {
        value: u8,
    }
    define_component!(Impostor, 1, "Impostor");

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Heading {
        yaw: f32,
        pitch: f32,
    }
    define_component!(Heading, 1, "Heading");

    #[test]
    fn test_register_records_layout() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Position>().unwrap();
        registry.register::<Position>().unwrap();

        let meta = registry.meta_of(Position::ID).unwrap();
        assert_eq!(meta.name, "Position");
        assert_eq!(meta.size, 8);
        assert_eq!(meta.align, 4);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistration_with_other_layout_fails() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Position>().unwrap();
        let err = registry.register::<Impostor>().unwrap_err();
        assert!(matches!(
            err,
            StorageError::ComponentLayoutMismatch { component: 1, .. }
        ));
    }

    #[test]
    fn test_same_layout_different_type_under_one_id_fails() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Position>().unwrap();
        let err = registry.register::<Heading>().unwrap_err();
        match err {
            StorageError::ComponentTypeConflict { component, existing, requested } => {
                assert_eq!(component, 1);
                assert_eq!(existing, "Position");
                assert_eq!(requested, "Heading");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.meta_of(1).unwrap().name, "Position");
    }
}
