use thiserror::Error;

use crate::ecs::{ArchetypeId, ArchetypeSignature, ChunkId, ComponentId, Entity, SignatureError};

/// Row-level failures inside a single chunk or column.
///
/// These all mean the caller's row bookkeeping has drifted from what the
/// chunk actually holds; retrying cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("row {row} is out of range (bound {bound})")]
    RowOutOfRange { row: usize, bound: usize },

    #[error("column index {column} is out of range ({column_count} columns)")]
    ColumnOutOfRange { column: usize, column_count: usize },

    #[error("column for component {component} does not hold `{requested}`")]
    TypeMismatch {
        component: ComponentId,
        requested: &'static str,
    },
}

/// Errors raised by chunk, archetype and storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("chunk capacity must be positive, got {capacity}")]
    InvalidChunkCapacity { capacity: usize },

    #[error("chunk {chunk:?} is out of range ({chunk_count} chunks)")]
    ChunkOutOfRange { chunk: ChunkId, chunk_count: usize },

    #[error("chunk slot holds {found:?}, expected {expected:?}")]
    ChunkIdMismatch { expected: ChunkId, found: ChunkId },

    #[error("chunk {chunk:?} is full (capacity {capacity})")]
    ChunkFull { chunk: ChunkId, capacity: usize },

    #[error("chunk count can only shrink: {requested} > {count}")]
    InvalidCount { requested: usize, count: usize },

    #[error("column for component {component} has capacity {found}, chunk expects {expected}")]
    ColumnCapacityMismatch {
        component: ComponentId,
        expected: usize,
        found: usize,
    },

    #[error("component {component} is not registered")]
    UnregisteredComponent { component: ComponentId },

    #[error("component {component} re-registered as `{requested}` with a different layout than `{existing}`")]
    ComponentLayoutMismatch {
        component: ComponentId,
        existing: String,
        requested: String,
    },

    #[error("component {component} is already registered as `{existing}`, not `{requested}`")]
    ComponentTypeConflict {
        component: ComponentId,
        existing: String,
        requested: String,
    },

    #[error("archetype id {id:?} already belongs to {existing:?}, cannot reuse it for {requested:?}")]
    ArchetypeCollision {
        id: ArchetypeId,
        existing: ArchetypeSignature,
        requested: ArchetypeSignature,
    },

    #[error("archetype {id:?} is not registered")]
    ArchetypeNotFound { id: ArchetypeId },

    #[error("entity {entity:?} is not alive")]
    EntityNotFound { entity: Entity },

    #[error("entity {entity:?} recorded at row that holds {found:?}")]
    LocationMismatch { entity: Entity, found: Option<Entity> },

    #[error("entity {entity:?} has no component {component}")]
    MissingComponent {
        entity: Entity,
        component: ComponentId,
    },

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Column(#[from] ColumnError),
}
