//! Strata Services Layer
//!
//! Host-facing services around the storage core: settings loading and
//! storage construction.

pub mod settings;

use strata_core::ecs::EntityStorage;

pub use settings::{Settings, SettingsError};

/// Build an entity storage configured from `settings`.
pub fn init_storage(settings: &Settings) -> EntityStorage {
    tracing::info!(
        chunk_capacity = settings.storage.chunk_capacity(),
        allocation = ?settings.storage.allocation(),
        removal = ?settings.storage.removal(),
        "initializing entity storage"
    );
    EntityStorage::new(settings.storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_storage_uses_settings_policies() {
        let settings =
            Settings::from_json_str(r#"{ "storage": { "chunk_capacity": 4 } }"#).unwrap();
        let storage = init_storage(&settings);
        assert_eq!(storage.policies().chunk_capacity(), 4);
        assert!(storage.is_empty());
    }
}
