//! Archetype-based component storage.
//!
//! Entities that share a component set share an archetype. Each archetype
//! owns fixed-capacity chunks laid out structure-of-arrays: one entity
//! array plus one column per component, in signature order. Signatures
//! are immutable, sorted and hashed deterministically, so archetype ids
//! are stable across runs.

mod archetype;
mod component;
mod entity;
mod entity_storage;
mod registry;
mod signature;
pub mod storage;

pub use archetype::{Archetype, ArchetypeId};
pub use component::{Component, ComponentId, ComponentMeta, ComponentRegistry};
pub use entity::{Entity, EntityLocation, EntityTable};
pub use entity_storage::EntityStorage;
pub use registry::ArchetypeRegistry;
pub use signature::{ArchetypeSignature, ComponentMask, SignatureError};
pub use storage::{
    Chunk, ChunkAllocationPolicy, ChunkColumn, ChunkId, ColumnError, ColumnFactory, ColumnValue,
    PooledColumnFactory, StorageError, StoragePolicies, StorageRemovalPolicy, SwapBackRemoval,
    TypedColumn,
};
