use std::any::{Any, TypeId};
use std::collections::HashMap;

type PooledBuffer = Box<dyn Any + Send + Sync>;

/// Rent/return pool of fixed-length `Vec<T>` buffers.
///
/// Buffers are bucketed by element type and length. Every rented buffer
/// holds `len` default values; returned buffers are reset to default
/// before they are stored, so stale component values never leak into a
/// new chunk. Each `rent` must be paired with exactly one `release`.
pub struct BufferPool {
    buckets: HashMap<(TypeId, usize), Vec<PooledBuffer>>,
    max_per_bucket: usize,
    rented: usize,
    released: usize,
}

impl BufferPool {
    /// Idle buffers kept per (type, length) bucket before extras are dropped.
    pub const DEFAULT_MAX_PER_BUCKET: usize = 32;

    pub fn new() -> Self {
        Self::with_max_per_bucket(Self::DEFAULT_MAX_PER_BUCKET)
    }

    pub fn with_max_per_bucket(max_per_bucket: usize) -> Self {
        Self {
            buckets: HashMap::new(),
            max_per_bucket,
            rented: 0,
            released: 0,
        }
    }

    /// Rent a buffer of exactly `len` default-initialized elements.
    pub fn rent<T>(&mut self, len: usize) -> Vec<T>
    where
        T: Default + Clone + Send + Sync + 'static,
    {
        self.rented += 1;
        let recycled = self
            .buckets
            .get_mut(&(TypeId::of::<T>(), len))
            .and_then(|bucket| bucket.pop())
            .and_then(|buffer| buffer.downcast::<Vec<T>>().ok());

        match recycled {
            Some(buffer) => *buffer,
            None => vec![T::default(); len],
        }
    }

    /// Return a buffer obtained from [`rent`](Self::rent).
    pub fn release<T>(&mut self, mut buffer: Vec<T>)
    where
        T: Default + Clone + Send + Sync + 'static,
    {
        self.released += 1;
        if self.released > self.rented {
            tracing::warn!(
                rented = self.rented,
                released = self.released,
                "buffer pool received more releases than rents"
            );
        }

        buffer.fill(T::default());
        let bucket = self
            .buckets
            .entry((TypeId::of::<T>(), buffer.len()))
            .or_default();
        if bucket.len() < self.max_per_bucket {
            bucket.push(Box::new(buffer));
        }
    }

    /// Buffers currently rented and not yet released.
    pub fn outstanding(&self) -> usize {
        self.rented.saturating_sub(self.released)
    }

    /// Idle buffers available for reuse.
    pub fn pooled(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Drop every idle buffer.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_returns_defaults() {
        let mut pool = BufferPool::new();
        let buffer: Vec<u32> = pool.rent(4);
        assert_eq!(buffer, vec![0; 4]);
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_released_buffer_is_reused_and_cleared() {
        let mut pool = BufferPool::new();
        let mut buffer: Vec<u32> = pool.rent(4);
        buffer[2] = 99;
        let ptr = buffer.as_ptr();
        pool.release(buffer);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.pooled(), 1);

        let again: Vec<u32> = pool.rent(4);
        assert_eq!(again.as_ptr(), ptr);
        assert_eq!(again, vec![0; 4]);
        assert_eq!(pool.pooled(), 0);
    }

    #[test]
    fn test_buckets_are_keyed_by_type_and_length() {
        let mut pool = BufferPool::new();
        let a: Vec<u32> = pool.rent(4);
        pool.release(a);

        let b: Vec<u64> = pool.rent(4);
        let c: Vec<u32> = pool.rent(8);
        assert_eq!(pool.pooled(), 1);
        pool.release(b);
        pool.release(c);
        assert_eq!(pool.pooled(), 3);
    }

    #[test]
    fn test_bucket_limit_drops_extras() {
        let mut pool = BufferPool::with_max_per_bucket(1);
        let a: Vec<u8> = pool.rent(2);
        let b: Vec<u8> = pool.rent(2);
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.pooled(), 1);
        assert_eq!(pool.outstanding(), 0);
    }
}
