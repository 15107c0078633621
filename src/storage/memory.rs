//! In-process storage implementation.
//!
//! Dedup holds only for the lifetime of the process. Used as the degraded
//! fallback when the database is unavailable, and in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::error::{AppError, Result};
use crate::models::{DeliveryRecord, PreferenceUpdate, Recipient, RecipientId, StoreConfig};
use crate::storage::{DeliveryLog, PreferenceStore};

#[derive(Default)]
struct State {
    delivered: HashMap<String, DeliveryRecord>,
    recipients: BTreeMap<RecipientId, Recipient>,
}

/// Memory-backed delivery log and preference store.
pub struct MemoryStore {
    state: Mutex<State>,
    retention: Duration,
    default_max_price: i64,
}

impl MemoryStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            retention: Duration::days(config.retention_days),
            default_max_price: config.default_max_price,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AppError::store("memory store lock poisoned"))
    }
}

#[async_trait]
impl DeliveryLog for MemoryStore {
    async fn was_delivered(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.lock()?.delivered.contains_key(fingerprint))
    }

    async fn mark_delivered(&self, record: &DeliveryRecord) -> Result<()> {
        self.lock()?
            .delivered
            .entry(record.fingerprint.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn delivery_count(&self) -> Result<usize> {
        Ok(self.lock()?.delivered.len())
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn upsert_recipient(&self, id: RecipientId, display_name: &str) -> Result<()> {
        let now = Utc::now();
        let default_max_price = self.default_max_price;
        self.lock()?
            .recipients
            .entry(id)
            .and_modify(|r| r.last_activity = now)
            .or_insert_with(|| Recipient {
                id,
                display_name: display_name.to_string(),
                notifications_enabled: true,
                max_price: default_max_price,
                categories: Vec::new(),
                last_activity: now,
            });
        Ok(())
    }

    async fn get_recipient(&self, id: RecipientId) -> Result<Option<Recipient>> {
        Ok(self.lock()?.recipients.get(&id).cloned())
    }

    async fn list_active_subscribers(&self) -> Result<Vec<Recipient>> {
        let cutoff = Utc::now() - self.retention;
        Ok(self
            .lock()?
            .recipients
            .values()
            .filter(|r| r.notifications_enabled && r.last_activity >= cutoff)
            .cloned()
            .collect())
    }

    async fn set_preferences(&self, id: RecipientId, update: &PreferenceUpdate) -> Result<()> {
        let mut state = self.lock()?;
        let recipient = state
            .recipients
            .get_mut(&id)
            .ok_or_else(|| AppError::validation(format!("unknown recipient {id}")))?;

        if let Some(enabled) = update.notifications {
            recipient.notifications_enabled = enabled;
        }
        if let Some(max_price) = update.max_price {
            recipient.max_price = max_price;
        }
        if let Some(categories) = &update.categories {
            recipient.categories = categories.clone();
        }
        recipient.last_activity = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fingerprint: &str, title: &str) -> DeliveryRecord {
        DeliveryRecord {
            fingerprint: fingerprint.to_string(),
            title: title.to_string(),
            price: "10 €".to_string(),
            url: "https://example.com".to_string(),
            sent_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mark_delivered_keeps_first_record() {
        let store = MemoryStore::new(&StoreConfig::default());
        store.mark_delivered(&record("f1", "first")).await.unwrap();
        store.mark_delivered(&record("f1", "second")).await.unwrap();

        assert_eq!(store.delivery_count().await.unwrap(), 1);
        let state = store.lock().unwrap();
        assert_eq!(state.delivered["f1"].title, "first");
    }

    #[tokio::test]
    async fn test_retention_window() {
        let store = MemoryStore::new(&StoreConfig::default());
        store.upsert_recipient(1, "recent").await.unwrap();
        store.upsert_recipient(2, "stale").await.unwrap();
        store
            .lock()
            .unwrap()
            .recipients
            .get_mut(&2)
            .unwrap()
            .last_activity = Utc::now() - Duration::days(45);

        let active = store.list_active_subscribers().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 1);
    }

    #[tokio::test]
    async fn test_partial_update_and_unknown_recipient() {
        let store = MemoryStore::new(&StoreConfig::default());
        store.upsert_recipient(5, "Luca").await.unwrap();
        store
            .set_preferences(
                5,
                &PreferenceUpdate {
                    categories: Some(vec!["audio".into()]),
                    ..PreferenceUpdate::default()
                },
            )
            .await
            .unwrap();

        let recipient = store.get_recipient(5).await.unwrap().unwrap();
        assert_eq!(recipient.categories, vec!["audio".to_string()]);
        assert_eq!(recipient.max_price, 100);

        assert!(store.set_preferences(6, &PreferenceUpdate::default()).await.is_err());
    }
}
