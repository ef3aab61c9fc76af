use serde::{Deserialize, Serialize};

use super::StorageError;

/// How an archetype finds a chunk with a free row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkAllocationPolicy {
    /// Check the last chunk known to have space first, falling back to a
    /// full scan. Amortized O(1) under steady inserts.
    #[default]
    TrackLastWithSpace,
    /// Linear scan in creation order, first chunk with space wins.
    ScanFirstFit,
}

/// How a row is removed from its chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageRemovalPolicy {
    /// O(1): the chunk's last row fills the hole.
    #[default]
    SwapBack,
    /// O(rows): later rows shift down one, keeping insertion order.
    Stable,
}

/// Chunk sizing and placement strategy for a storage instance.
///
/// Constructed through [`StoragePolicies::new`] (or deserialized, which
/// goes through the same validation), so a zero capacity never reaches a
/// chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStoragePolicies")]
pub struct StoragePolicies {
    chunk_capacity: usize,
    allocation: ChunkAllocationPolicy,
    removal: StorageRemovalPolicy,
}

impl StoragePolicies {
    /// Rows per chunk when nothing else is configured.
    pub const DEFAULT_CHUNK_CAPACITY: usize = 128;

    pub fn new(
        chunk_capacity: usize,
        allocation: ChunkAllocationPolicy,
        removal: StorageRemovalPolicy,
    ) -> Result<Self, StorageError> {
        if chunk_capacity == 0 {
            return Err(StorageError::InvalidChunkCapacity {
                capacity: chunk_capacity,
            });
        }
        Ok(Self {
            chunk_capacity,
            allocation,
            removal,
        })
    }

    /// Default policies with a different chunk capacity.
    pub fn with_capacity(chunk_capacity: usize) -> Result<Self, StorageError> {
        Self::new(chunk_capacity, Default::default(), Default::default())
    }

    #[inline]
    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    #[inline]
    pub fn allocation(&self) -> ChunkAllocationPolicy {
        self.allocation
    }

    #[inline]
    pub fn removal(&self) -> StorageRemovalPolicy {
        self.removal
    }
}

impl Default for StoragePolicies {
    fn default() -> Self {
        Self {
            chunk_capacity: Self::DEFAULT_CHUNK_CAPACITY,
            allocation: ChunkAllocationPolicy::default(),
            removal: StorageRemovalPolicy::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawStoragePolicies {
    chunk_capacity: usize,
    allocation: ChunkAllocationPolicy,
    removal: StorageRemovalPolicy,
}

impl Default for RawStoragePolicies {
    fn default() -> Self {
        let policies = StoragePolicies::default();
        Self {
            chunk_capacity: policies.chunk_capacity,
            allocation: policies.allocation,
            removal: policies.removal,
        }
    }
}

impl TryFrom<RawStoragePolicies> for StoragePolicies {
    type Error = StorageError;

    fn try_from(raw: RawStoragePolicies) -> Result<Self, Self::Error> {
        Self::new(raw.chunk_capacity, raw.allocation, raw.removal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            StoragePolicies::with_capacity(0),
            Err(StorageError::InvalidChunkCapacity { capacity: 0 })
        ));
    }

    #[test]
    fn test_defaults() {
        let policies = StoragePolicies::default();
        assert_eq!(policies.chunk_capacity(), 128);
        assert_eq!(policies.allocation(), ChunkAllocationPolicy::TrackLastWithSpace);
        assert_eq!(policies.removal(), StorageRemovalPolicy::SwapBack);
    }

    #[test]
    fn test_deserialize_validates_and_fills_defaults() {
        let policies: StoragePolicies =
            serde_json::from_str(r#"{ "chunk_capacity": 16, "removal": "Stable" }"#).unwrap();
        assert_eq!(policies.chunk_capacity(), 16);
        assert_eq!(policies.allocation(), ChunkAllocationPolicy::TrackLastWithSpace);
        assert_eq!(policies.removal(), StorageRemovalPolicy::Stable);

        let err = serde_json::from_str::<StoragePolicies>(r#"{ "chunk_capacity": 0 }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let policies = StoragePolicies::new(
            8,
            ChunkAllocationPolicy::ScanFirstFit,
            StorageRemovalPolicy::Stable,
        )
        .unwrap();
        let json = serde_json::to_string(&policies).unwrap();
        let back: StoragePolicies = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policies);
    }
}
