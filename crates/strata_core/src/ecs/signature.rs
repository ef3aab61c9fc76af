// signature.rs - Canonical component sets
//
// A signature is the sorted, duplicate-free list of component ids shared
// by every entity of one archetype. Signatures are immutable; adding or
// removing an id produces a new signature and leaves the receiver alone,
// so they can be shared freely between archetypes, registries and caches.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use thiserror::Error;

use crate::ecs::ComponentId;

const FNV64_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01b3;
const FNV32_OFFSET: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// Signatures whose largest id is at or above this get no bitmask.
pub const MASK_ID_LIMIT: ComponentId = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("component {component} appears more than once in signature input")]
    DuplicateComponent { component: ComponentId },
}

/// Bitset over component ids (one bit per id, packed in 64-bit words).
///
/// Used for fast "does this archetype have all of these components" tests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask {
    words: Box<[u64]>,
}

impl ComponentMask {
    pub fn from_ids(ids: &[ComponentId]) -> Self {
        let word_count = ids
            .iter()
            .max()
            .map_or(0, |&max| max as usize / 64 + 1);
        let mut words = vec![0u64; word_count];
        for &id in ids {
            words[id as usize / 64] |= 1u64 << (id % 64);
        }
        Self {
            words: words.into_boxed_slice(),
        }
    }

    #[inline]
    fn word(&self, index: usize) -> u64 {
        self.words.get(index).copied().unwrap_or(0)
    }

    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.word(id as usize / 64) & (1u64 << (id % 64)) != 0
    }

    /// True if every bit set in `other` is also set in `self`.
    pub fn contains_all(&self, other: &ComponentMask) -> bool {
        other
            .words
            .iter()
            .enumerate()
            .all(|(i, &bits)| bits & !self.word(i) == 0)
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }
}

struct SignatureInner {
    type_ids: Box<[ComponentId]>,
    mask: Option<ComponentMask>,
    hash64: u64,
}

/// An immutable, sorted set of component type ids.
///
/// Cloning is cheap (reference counted). `with_added`/`with_removed`
/// return a clone of the receiver, sharing its storage, when nothing
/// would change; [`ArchetypeSignature::ptr_eq`] observes that sharing.
#[derive(Clone)]
pub struct ArchetypeSignature {
    inner: Arc<SignatureInner>,
}

impl ArchetypeSignature {
    /// Build a signature from ids in any order.
    ///
    /// Duplicate ids are rejected: a signature with a repeated id would
    /// describe fewer columns than its length claims.
    pub fn new<I>(ids: I) -> Result<Self, SignatureError>
    where
        I: IntoIterator<Item = ComponentId>,
    {
        let mut ids: Vec<ComponentId> = ids.into_iter().collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(SignatureError::DuplicateComponent {
                component: pair[0],
            });
        }
        Ok(Self::from_sorted(ids))
    }

    /// The signature with no components.
    pub fn empty() -> Self {
        Self::from_sorted(Vec::new())
    }

    fn from_sorted(ids: Vec<ComponentId>) -> Self {
        debug_assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        let hash64 = stable_hash64_of(&ids);
        let mask = match ids.last() {
            Some(&max) if max >= MASK_ID_LIMIT => None,
            _ => Some(ComponentMask::from_ids(&ids)),
        };
        Self {
            inner: Arc::new(SignatureInner {
                type_ids: ids.into_boxed_slice(),
                mask,
                hash64,
            }),
        }
    }

    /// Component ids in ascending order.
    #[inline]
    pub fn type_ids(&self) -> &[ComponentId] {
        &self.inner.type_ids
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.type_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.type_ids.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.inner.type_ids.binary_search(&id).is_ok()
    }

    /// Index of `id` within [`type_ids`](Self::type_ids).
    #[inline]
    pub fn position(&self, id: ComponentId) -> Option<usize> {
        self.inner.type_ids.binary_search(&id).ok()
    }

    /// Bitmask over the ids, present only when every id is below
    /// [`MASK_ID_LIMIT`].
    pub fn mask(&self) -> Option<&ComponentMask> {
        self.inner.mask.as_ref()
    }

    /// True if this signature has every component of `other`.
    pub fn contains_all(&self, other: &ArchetypeSignature) -> bool {
        match (&self.inner.mask, &other.inner.mask) {
            (Some(mine), Some(theirs)) => mine.contains_all(theirs),
            _ => sorted_contains_all(&self.inner.type_ids, &other.inner.type_ids),
        }
    }

    /// Signature with `id` added; shares the receiver when already present.
    pub fn with_added(&self, id: ComponentId) -> Self {
        match self.inner.type_ids.binary_search(&id) {
            Ok(_) => self.clone(),
            Err(at) => {
                let mut ids = Vec::with_capacity(self.len() + 1);
                ids.extend_from_slice(&self.inner.type_ids[..at]);
                ids.push(id);
                ids.extend_from_slice(&self.inner.type_ids[at..]);
                Self::from_sorted(ids)
            }
        }
    }

    /// Signature with `id` removed; shares the receiver when absent.
    pub fn with_removed(&self, id: ComponentId) -> Self {
        match self.inner.type_ids.binary_search(&id) {
            Err(_) => self.clone(),
            Ok(at) => {
                let mut ids = self.inner.type_ids.to_vec();
                ids.remove(at);
                Self::from_sorted(ids)
            }
        }
    }

    /// 64-bit FNV-1a over the element count followed by each id, all as
    /// little-endian u32 bytes. Identical on every platform and run.
    #[inline]
    pub fn stable_hash64(&self) -> u64 {
        self.inner.hash64
    }

    /// 32-bit FNV-1a over the same byte stream as [`stable_hash64`](Self::stable_hash64).
    pub fn stable_hash32(&self) -> u32 {
        let mut hash = FNV32_OFFSET;
        for byte in signature_bytes(&self.inner.type_ids) {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(FNV32_PRIME);
        }
        hash
    }

    /// Element-wise order up to the shorter length, then shorter first.
    pub fn compare_lexicographic(a: &ArchetypeSignature, b: &ArchetypeSignature) -> Ordering {
        a.type_ids().cmp(b.type_ids())
    }

    /// True if both handles share the same underlying storage.
    pub fn ptr_eq(a: &ArchetypeSignature, b: &ArchetypeSignature) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

/// Merge-walk over two ascending id lists.
fn sorted_contains_all(have: &[ComponentId], want: &[ComponentId]) -> bool {
    let mut have = have.iter().peekable();
    want.iter().all(|id| {
        while have.next_if(|&candidate| candidate < id).is_some() {}
        have.next_if_eq(&id).is_some()
    })
}

fn signature_bytes(ids: &[ComponentId]) -> impl Iterator<Item = u8> + '_ {
    (ids.len() as u32)
        .to_le_bytes()
        .into_iter()
        .chain(ids.iter().flat_map(|id| id.to_le_bytes()))
}

fn stable_hash64_of(ids: &[ComponentId]) -> u64 {
    let mut hash = FNV64_OFFSET;
    for byte in signature_bytes(ids) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV64_PRIME);
    }
    hash
}

impl PartialEq for ArchetypeSignature {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || self.type_ids() == other.type_ids()
    }
}

impl Eq for ArchetypeSignature {}

impl Hash for ArchetypeSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_ids().hash(state);
    }
}

impl PartialOrd for ArchetypeSignature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArchetypeSignature {
    fn cmp(&self, other: &Self) -> Ordering {
        Self::compare_lexicographic(self, other)
    }
}

impl fmt::Debug for ArchetypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArchetypeSignature")
            .field(&self.type_ids())
            .finish()
    }
}

impl Default for ArchetypeSignature {
    fn default() -> Self {
        Self::empty()
    }
}
