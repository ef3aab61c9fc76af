//! Strata Core
//!
//! Archetype/chunk component storage:
//! - Component signatures and stable archetype ids
//! - Type-erased SoA chunk columns
//! - Entity placement, removal and migration
//! - Pooled buffers for chunk arrays

pub mod ecs;
pub mod pool;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
