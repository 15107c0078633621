//! Storage abstractions for delivery records and subscriber preferences.
//!
//! Two backends implement the same traits:
//!
//! - `SqliteStore`: the persistent store. The `delivery_log.fingerprint`
//!   UNIQUE constraint is what keeps a listing from being recorded twice.
//! - `MemoryStore`: process-local fallback used when the database cannot be
//!   opened, and the test double for the pipeline.
//!
//! Checking and marking a fingerprint are two separate calls. With a single
//! orchestrator that is enough for at-most-once channel delivery; two
//! orchestrators sharing a database can both see a fingerprint as new.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DeliveryRecord, PreferenceUpdate, Recipient, RecipientId, StoreConfig};

// Re-export for convenience
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Append-only record of fingerprints already sent to the channel.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    /// Whether a delivery record exists for this fingerprint.
    async fn was_delivered(&self, fingerprint: &str) -> Result<bool>;

    /// Record a delivery. Recording an existing fingerprint is a no-op.
    async fn mark_delivered(&self, record: &DeliveryRecord) -> Result<()>;

    /// Number of delivery records.
    async fn delivery_count(&self) -> Result<usize>;
}

/// Per-recipient broadcast settings.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Create the recipient on first sight, otherwise refresh `last_activity` only.
    async fn upsert_recipient(&self, id: RecipientId, display_name: &str) -> Result<()>;

    async fn get_recipient(&self, id: RecipientId) -> Result<Option<Recipient>>;

    /// Recipients with notifications on and activity inside the retention window.
    async fn list_active_subscribers(&self) -> Result<Vec<Recipient>>;

    /// Apply a partial update; fields left as `None` are untouched.
    async fn set_preferences(&self, id: RecipientId, update: &PreferenceUpdate) -> Result<()>;
}

/// A backend providing both stores.
pub trait Store: DeliveryLog + PreferenceStore {}

impl<T: DeliveryLog + PreferenceStore> Store for T {}

/// Open the SQLite store, falling back to an in-memory store on failure.
///
/// The fallback keeps the process running without cross-restart dedup or
/// subscriber preferences.
pub fn open_or_degraded(config: &StoreConfig) -> Arc<dyn Store> {
    match SqliteStore::open(&config.database_url, config) {
        Ok(store) => {
            log::info!("Store opened at {}", config.database_url);
            Arc::new(store)
        }
        Err(e) => {
            log::warn!(
                "Store unavailable ({}): running degraded, without persistent dedup or subscriber preferences",
                e
            );
            Arc::new(MemoryStore::new(config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_or_degraded_falls_back() {
        let config = StoreConfig {
            database_url: "/nonexistent-dir/for/sure/dealcast.db".to_string(),
            ..StoreConfig::default()
        };
        let store = open_or_degraded(&config);

        // Degraded store still answers dedup queries.
        assert!(!store.was_delivered("abc").await.unwrap());
        assert!(store.list_active_subscribers().await.unwrap().is_empty());
    }
}
