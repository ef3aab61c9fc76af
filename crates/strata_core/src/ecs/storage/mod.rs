// mod.rs - Storage module exports

mod chunk;
mod column;
mod error;
mod factory;
mod policies;

pub use chunk::{Chunk, ChunkId, SwapBackRemoval};
pub use column::{ChunkColumn, ColumnValue, TypedColumn};
pub use error::{ColumnError, StorageError};
pub use factory::{ColumnFactory, PooledColumnFactory};
pub use policies::{ChunkAllocationPolicy, StoragePolicies, StorageRemovalPolicy};
