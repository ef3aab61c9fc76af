//! Buffer pooling for chunk storage.
//!
//! Chunks rent their entity and column arrays here on creation and hand
//! them back on teardown, so archetype churn reuses allocations instead of
//! hitting the allocator every time.

mod buffer_pool;

pub use buffer_pool::BufferPool;
