// archetype.rs - Archetype identification and chunk ownership
//
// An archetype is a unique set of component types. Entities with the same
// component types share the same archetype, and the archetype owns every
// chunk those entities live in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ecs::storage::{Chunk, ChunkAllocationPolicy, ChunkId, ColumnFactory, StorageError};
use crate::ecs::{ArchetypeSignature, Component, ComponentId};
use crate::pool::BufferPool;

/// Stable archetype key derived from the signature's 64-bit hash.
///
/// The same component set maps to the same id on every run, provided
/// component ids are assigned identically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchetypeId(u64);

impl ArchetypeId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn from_signature(signature: &ArchetypeSignature) -> Self {
        Self(signature.stable_hash64())
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Highest component id covered by the direct column lookup table.
const DENSE_LOOKUP_LIMIT: ComponentId = 1024;
const NO_COLUMN: u32 = u32::MAX;

/// Storage for all entities of a single component set.
pub struct Archetype {
    id: ArchetypeId,
    signature: ArchetypeSignature,
    chunks: Vec<Chunk>,
    next_chunk_id: u32,
    column_lookup: HashMap<ComponentId, usize>,
    // Indexed by component id. Only built when every id is small enough.
    dense_lookup: Option<Box<[u32]>>,
    last_with_space: Option<usize>,
}

impl Archetype {
    /// Create an archetype whose id is derived from `signature`.
    pub fn new(signature: ArchetypeSignature) -> Self {
        let id = ArchetypeId::from_signature(&signature);
        Self::with_id(signature, id)
    }

    pub fn with_id(signature: ArchetypeSignature, id: ArchetypeId) -> Self {
        let ids = signature.type_ids();
        let column_lookup = ids
            .iter()
            .enumerate()
            .map(|(column, &component)| (component, column))
            .collect();

        let dense_lookup = match ids.last() {
            Some(&max) if max < DENSE_LOOKUP_LIMIT => {
                let mut table = vec![NO_COLUMN; max as usize + 1];
                for (column, &component) in ids.iter().enumerate() {
                    table[component as usize] = column as u32;
                }
                Some(table.into_boxed_slice())
            }
            _ => None,
        };

        Self {
            id,
            signature,
            chunks: Vec::new(),
            next_chunk_id: 0,
            column_lookup,
            dense_lookup,
            last_with_space: None,
        }
    }

    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    #[inline]
    pub fn signature(&self) -> &ArchetypeSignature {
        &self.signature
    }

    #[inline]
    pub fn contains(&self, component: ComponentId) -> bool {
        self.signature.contains(component)
    }

    /// Column position of `component` in this archetype's chunks.
    pub fn column_index(&self, component: ComponentId) -> Option<usize> {
        self.column_lookup.get(&component).copied()
    }

    /// Same answer as [`column_index`](Self::column_index), via a direct
    /// table when ids are small and a binary search otherwise. Meant for
    /// per-entity hot loops.
    #[inline]
    pub fn column_index_fast(&self, component: ComponentId) -> Option<usize> {
        match &self.dense_lookup {
            Some(table) => table
                .get(component as usize)
                .copied()
                .filter(|&column| column != NO_COLUMN)
                .map(|column| column as usize),
            None => self.signature.position(component),
        }
    }

    /// Column position of component type `T`.
    #[inline]
    pub fn column_of<T: Component>(&self) -> Option<usize> {
        self.column_index_fast(T::ID)
    }

    /// Return a chunk with at least one free row, creating one through
    /// `factory` if every existing chunk is full.
    ///
    /// `capacity` only applies to newly created chunks. New chunks get the
    /// next sequential id, which is never reused by this archetype.
    pub fn get_or_create_chunk_with_space(
        &mut self,
        capacity: usize,
        policy: ChunkAllocationPolicy,
        factory: &mut dyn ColumnFactory,
    ) -> Result<&mut Chunk, StorageError> {
        if policy == ChunkAllocationPolicy::TrackLastWithSpace {
            // The hint may be stale; trust it only if it still has room.
            if let Some(hint) = self.last_with_space {
                if self.chunks.get(hint).is_some_and(Chunk::has_space) {
                    return Ok(&mut self.chunks[hint]);
                }
            }
        }

        let index = match self.chunks.iter().position(Chunk::has_space) {
            Some(index) => index,
            None => self.create_chunk(capacity, factory)?,
        };
        if policy == ChunkAllocationPolicy::TrackLastWithSpace {
            self.last_with_space = Some(index);
        }
        Ok(&mut self.chunks[index])
    }

    fn create_chunk(
        &mut self,
        capacity: usize,
        factory: &mut dyn ColumnFactory,
    ) -> Result<usize, StorageError> {
        let id = ChunkId::new(self.next_chunk_id);
        let chunk = Chunk::with_factory(id, capacity, self.signature.type_ids(), factory)?;
        self.next_chunk_id += 1;
        self.chunks.push(chunk);

        tracing::debug!(
            archetype = self.id.value(),
            chunk = id.value(),
            capacity,
            "created chunk"
        );
        Ok(self.chunks.len() - 1)
    }

    /// Look up a chunk by id.
    ///
    /// An out-of-range id or a slot holding a different id means the
    /// caller's bookkeeping is corrupt; both are reported as errors.
    pub fn chunk(&self, id: ChunkId) -> Result<&Chunk, StorageError> {
        let chunk_count = self.chunks.len();
        let chunk = self
            .chunks
            .get(id.index())
            .ok_or(StorageError::ChunkOutOfRange { chunk: id, chunk_count })?;
        if chunk.id() != id {
            return Err(StorageError::ChunkIdMismatch {
                expected: id,
                found: chunk.id(),
            });
        }
        Ok(chunk)
    }

    pub fn chunk_mut(&mut self, id: ChunkId) -> Result<&mut Chunk, StorageError> {
        let chunk_count = self.chunks.len();
        let chunk = self
            .chunks
            .get_mut(id.index())
            .ok_or(StorageError::ChunkOutOfRange { chunk: id, chunk_count })?;
        if chunk.id() != id {
            return Err(StorageError::ChunkIdMismatch {
                expected: id,
                found: chunk.id(),
            });
        }
        Ok(chunk)
    }

    /// All chunks in creation order, including empty ones.
    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Live rows across every chunk.
    pub fn entity_count(&self) -> usize {
        self.chunks.iter().map(Chunk::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Chunk::is_empty)
    }

    /// Tear down the archetype, returning every chunk's buffers to `pool`.
    pub fn release(self, pool: &mut BufferPool) {
        for chunk in self.chunks {
            chunk.release(pool);
        }
    }
}
