// registry.rs - Archetype lookup by id
//
// Archetype ids are 64-bit signature hashes, so two different component
// sets could in principle share one. Every id hit is checked against the
// stored signature and a mismatch is reported instead of silently merging
// the two sets.

use std::collections::hash_map::{Entry, HashMap};

use crate::ecs::storage::StorageError;
use crate::ecs::{Archetype, ArchetypeId, ArchetypeSignature};
use crate::pool::BufferPool;

#[derive(Default)]
pub struct ArchetypeRegistry {
    archetypes: HashMap<ArchetypeId, Archetype>,
}

impl ArchetypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archetype for `signature`, created on first use.
    pub fn get_or_create(
        &mut self,
        signature: &ArchetypeSignature,
    ) -> Result<&mut Archetype, StorageError> {
        let id = ArchetypeId::from_signature(signature);
        match self.archetypes.entry(id) {
            Entry::Occupied(entry) => {
                check_signature(id, entry.get(), signature)?;
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                tracing::debug!(
                    archetype = id.value(),
                    components = ?signature.type_ids(),
                    "created archetype"
                );
                Ok(entry.insert(Archetype::with_id(signature.clone(), id)))
            }
        }
    }

    /// Register a pre-built archetype. Fails if its id is already taken.
    pub fn insert(&mut self, archetype: Archetype) -> Result<(), StorageError> {
        match self.archetypes.entry(archetype.id()) {
            Entry::Occupied(entry) => Err(StorageError::ArchetypeCollision {
                id: archetype.id(),
                existing: entry.get().signature().clone(),
                requested: archetype.signature().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(archetype);
                Ok(())
            }
        }
    }

    /// Existing archetype for exactly this signature.
    pub fn find(&self, signature: &ArchetypeSignature) -> Option<&Archetype> {
        self.archetypes
            .get(&ArchetypeId::from_signature(signature))
            .filter(|archetype| archetype.signature() == signature)
    }

    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(&id)
    }

    pub fn get_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        self.archetypes.get_mut(&id)
    }

    pub fn contains(&self, id: ArchetypeId) -> bool {
        self.archetypes.contains_key(&id)
    }

    /// Archetypes having every component of `required`, in lexicographic
    /// signature order so query results are deterministic.
    pub fn matching(&self, required: &ArchetypeSignature) -> Vec<&Archetype> {
        let mut found: Vec<&Archetype> = self
            .archetypes
            .values()
            .filter(|archetype| archetype.signature().contains_all(required))
            .collect();
        found.sort_unstable_by(|a, b| {
            ArchetypeSignature::compare_lexicographic(a.signature(), b.signature())
        });
        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.values()
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Remove an archetype without releasing its buffers.
    pub fn remove(&mut self, id: ArchetypeId) -> Option<Archetype> {
        self.archetypes.remove(&id)
    }

    /// Release every archetype without live rows back into `pool`.
    /// Returns how many were torn down.
    pub fn release_empty(&mut self, pool: &mut BufferPool) -> usize {
        let empty: Vec<ArchetypeId> = self
            .archetypes
            .values()
            .filter(|archetype| archetype.is_empty())
            .map(Archetype::id)
            .collect();
        for id in &empty {
            if let Some(archetype) = self.archetypes.remove(id) {
                archetype.release(pool);
            }
        }
        empty.len()
    }
}

fn check_signature(
    id: ArchetypeId,
    existing: &Archetype,
    requested: &ArchetypeSignature,
) -> Result<(), StorageError> {
    if existing.signature() == requested {
        return Ok(());
    }
    tracing::warn!(
        archetype = id.value(),
        existing = ?existing.signature().type_ids(),
        requested = ?requested.type_ids(),
        "archetype id collision"
    );
    Err(StorageError::ArchetypeCollision {
        id,
        existing: existing.signature().clone(),
        requested: requested.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentId;

    fn sig(ids: &[ComponentId]) -> ArchetypeSignature {
        ArchetypeSignature::new(ids.iter().copied()).unwrap()
    }

    #[test]
    fn test_same_signature_resolves_to_same_archetype() {
        let mut registry = ArchetypeRegistry::new();
        let id = registry.get_or_create(&sig(&[3, 1])).unwrap().id();
        let again = registry.get_or_create(&sig(&[1, 3])).unwrap().id();
        assert_eq!(id, again);
        assert_eq!(registry.len(), 1);
        assert!(registry.find(&sig(&[1, 3])).is_some());
        assert!(registry.find(&sig(&[1])).is_none());
    }

    #[test]
    fn test_colliding_id_is_reported() {
        let mut registry = ArchetypeRegistry::new();
        let a = sig(&[1, 2]);
        let b = sig(&[7]);
        // Simulate a hash collision: `a` stored under `b`'s id.
        registry
            .insert(Archetype::with_id(a.clone(), ArchetypeId::from_signature(&b)))
            .unwrap();

        let err = registry.get_or_create(&b).err().unwrap();
        match err {
            StorageError::ArchetypeCollision { existing, requested, .. } => {
                assert_eq!(existing, a);
                assert_eq!(requested, b);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.find(&b).is_none());
        assert!(registry.insert(Archetype::new(b)).is_err());
    }

    #[test]
    fn test_matching_is_ordered_and_filtered() {
        let mut registry = ArchetypeRegistry::new();
        for ids in [&[2, 5][..], &[1, 2, 5], &[5], &[1, 2], &[2, 3, 5]] {
            registry.get_or_create(&sig(ids)).unwrap();
        }
        let found: Vec<Vec<ComponentId>> = registry
            .matching(&sig(&[2, 5]))
            .iter()
            .map(|archetype| archetype.signature().type_ids().to_vec())
            .collect();
        assert_eq!(found, vec![vec![1, 2, 5], vec![2, 3, 5], vec![2, 5]]);
        assert_eq!(registry.matching(&ArchetypeSignature::empty()).len(), 5);
    }

    #[test]
    fn test_release_empty_drops_unused_archetypes() {
        let mut registry = ArchetypeRegistry::new();
        let mut pool = BufferPool::new();
        registry.get_or_create(&sig(&[1])).unwrap();
        registry.get_or_create(&sig(&[2])).unwrap();
        assert_eq!(registry.release_empty(&mut pool), 2);
        assert!(registry.is_empty());
    }
}
