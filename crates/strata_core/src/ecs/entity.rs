//! Entity handles and their storage locations
//!
//! Entities are lightweight handles (8 bytes). Where an entity's data
//! physically lives is tracked separately as an [`EntityLocation`]; the
//! chunk layer produces locations but never stores them.

use crate::ecs::{ArchetypeId, ChunkId};

/// Entity handle (generation-indexed for safety)
///
/// Format: [32-bit index | 32-bit generation]
/// - Index: Position in the entity table
/// - Generation: Incremented on entity destruction (prevents use-after-free)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Sentinel written into vacated chunk rows.
    pub const INVALID: Entity = Entity {
        index: u32::MAX,
        generation: u32::MAX,
    };

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }

    /// Serialize to 64-bit integer (for networking/save files)
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Deserialize from 64-bit integer
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Physical slot of one entity: archetype, chunk within it, row within that.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntityLocation {
    pub archetype: ArchetypeId,
    pub chunk: ChunkId,
    pub row: usize,
}

impl EntityLocation {
    /// Tombstone value for entities without storage.
    pub const INVALID: EntityLocation = EntityLocation {
        archetype: ArchetypeId::from_raw(0),
        chunk: ChunkId::INVALID,
        row: usize::MAX,
    };

    pub const fn new(archetype: ArchetypeId, chunk: ChunkId, row: usize) -> Self {
        Self {
            archetype,
            chunk,
            row,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.chunk != ChunkId::INVALID && self.row != usize::MAX
    }
}

impl Default for EntityLocation {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Debug, Clone)]
struct EntitySlot {
    generation: u32,
    alive: bool,
    location: EntityLocation,
}

/// Generational entity allocator holding one location per live entity.
///
/// This is the table an entity manager keeps in sync with chunk moves:
/// every swap-back or migration must be mirrored here.
#[derive(Debug, Default)]
pub struct EntityTable {
    slots: Vec<EntitySlot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle; its location starts out invalid.
    pub fn allocate(&mut self) -> Entity {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            slot.location = EntityLocation::INVALID;
            return Entity::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(EntitySlot {
            generation: 0,
            alive: true,
            location: EntityLocation::INVALID,
        });
        Entity::new(index, 0)
    }

    /// Free a live handle, returning its last location.
    pub fn free(&mut self, entity: Entity) -> Option<EntityLocation> {
        let slot = self.live_slot_mut(entity)?;
        let location = slot.location;
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.location = EntityLocation::INVALID;
        self.free.push(entity.index);
        self.live -= 1;
        Some(location)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.live_slot(entity).is_some()
    }

    /// Location of a live entity that has been placed in storage.
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        self.live_slot(entity)
            .map(|slot| slot.location)
            .filter(EntityLocation::is_valid)
    }

    /// Record where a live entity now lives. Returns false for stale handles.
    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) -> bool {
        match self.live_slot_mut(entity) {
            Some(slot) => {
                slot.location = location;
                true
            }
            None => false,
        }
    }

    /// Patch only the row, used after swap-back and stable removal shifts.
    pub fn set_row(&mut self, entity: Entity, row: usize) -> bool {
        match self.live_slot_mut(entity) {
            Some(slot) => {
                slot.location.row = row;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn live_slot(&self, entity: Entity) -> Option<&EntitySlot> {
        self.slots
            .get(entity.index as usize)
            .filter(|slot| slot.alive && slot.generation == entity.generation)
    }

    fn live_slot_mut(&mut self, entity: Entity) -> Option<&mut EntitySlot> {
        self.slots
            .get_mut(entity.index as usize)
            .filter(|slot| slot.alive && slot.generation == entity.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_round_trip() {
        let entity = Entity::new(7, 3);
        assert_eq!(entity.to_bits(), (3u64 << 32) | 7);
        assert_eq!(Entity::from_bits(entity.to_bits()), entity);
    }

    #[test]
    fn test_invalid_location_is_not_valid() {
        assert!(!EntityLocation::INVALID.is_valid());
        assert!(!EntityLocation::default().is_valid());
        let loc = EntityLocation::new(ArchetypeId::from_raw(5), ChunkId::new(0), 0);
        assert!(loc.is_valid());
    }

    #[test]
    fn test_freed_handles_become_stale() {
        let mut table = EntityTable::new();
        let a = table.allocate();
        let loc = EntityLocation::new(ArchetypeId::from_raw(1), ChunkId::new(2), 3);
        assert!(table.set_location(a, loc));
        assert_eq!(table.location(a), Some(loc));

        assert_eq!(table.free(a), Some(loc));
        assert!(!table.is_alive(a));
        assert_eq!(table.location(a), None);
        assert_eq!(table.free(a), None);

        let b = table.allocate();
        assert_eq!(b.index(), a.index());
        assert_eq!(b.generation(), a.generation() + 1);
        assert!(!table.set_row(a, 0));
        assert_eq!(table.location(b), None);
        assert_eq!(table.len(), 1);
    }
}
