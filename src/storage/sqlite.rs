//! SQLite storage implementation.
//!
//! ## Schema
//!
//! ```text
//! recipients(id PK, display_name, notifications_enabled, max_price,
//!            categories JSON, created_at, last_activity)
//! delivery_log(id PK, fingerprint UNIQUE, title, price, url, sent_at)
//! ```
//!
//! Timestamps are RFC 3339 UTC strings with second precision, so they compare
//! correctly as text. Every call runs on the blocking pool and holds the
//! connection only for its own statement.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{AppError, Result};
use crate::models::{DeliveryRecord, PreferenceUpdate, Recipient, RecipientId, StoreConfig};
use crate::storage::{DeliveryLog, PreferenceStore};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS recipients (
        id INTEGER PRIMARY KEY,
        display_name TEXT NOT NULL DEFAULT '',
        notifications_enabled INTEGER NOT NULL DEFAULT 1,
        max_price INTEGER NOT NULL,
        categories TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        last_activity TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_recipients_active
        ON recipients(notifications_enabled, last_activity);

    CREATE TABLE IF NOT EXISTS delivery_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fingerprint TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        price TEXT NOT NULL,
        url TEXT NOT NULL,
        sent_at TEXT NOT NULL
    );
";

/// SQLite-backed delivery log and preference store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    retention: Duration,
    default_max_price: i64,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            AppError::store(format!(
                "failed to open database at {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::with_connection(conn, config)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::store)?;
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: &StoreConfig) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::store(format!("failed to create tables: {e}")))?;
        log::debug!("Database schema ensured");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            retention: Duration::days(config.retention_days),
            default_max_price: config.default_max_price,
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AppError::store("connection lock poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|e| AppError::store(format!("store worker failed: {e}")))?
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::validation(format!("invalid timestamp '{value}': {e}")))
}

/// Columns as stored, before JSON and timestamp decoding.
struct RecipientRow {
    id: RecipientId,
    display_name: String,
    notifications_enabled: bool,
    max_price: i64,
    categories: String,
    last_activity: String,
}

const RECIPIENT_COLUMNS: &str =
    "id, display_name, notifications_enabled, max_price, categories, last_activity";

impl RecipientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            display_name: row.get(1)?,
            notifications_enabled: row.get(2)?,
            max_price: row.get(3)?,
            categories: row.get(4)?,
            last_activity: row.get(5)?,
        })
    }

    fn into_recipient(self) -> Result<Recipient> {
        Ok(Recipient {
            id: self.id,
            display_name: self.display_name,
            notifications_enabled: self.notifications_enabled,
            max_price: self.max_price,
            categories: serde_json::from_str(&self.categories)?,
            last_activity: parse_timestamp(&self.last_activity)?,
        })
    }
}

#[async_trait]
impl DeliveryLog for SqliteStore {
    async fn was_delivered(&self, fingerprint: &str) -> Result<bool> {
        let fingerprint = fingerprint.to_string();
        self.call(move |conn| {
            let found = conn
                .prepare_cached("SELECT 1 FROM delivery_log WHERE fingerprint = ?1")?
                .query_row(params![fingerprint], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn mark_delivered(&self, record: &DeliveryRecord) -> Result<()> {
        let record = record.clone();
        self.call(move |conn| {
            let inserted = conn
                .prepare_cached(
                    "INSERT OR IGNORE INTO delivery_log (fingerprint, title, price, url, sent_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?
                .execute(params![
                    record.fingerprint,
                    record.title,
                    record.price,
                    record.url,
                    timestamp(record.sent_at),
                ])?;
            if inserted == 0 {
                log::debug!("Fingerprint {} already recorded", record.fingerprint);
            }
            Ok(())
        })
        .await
    }

    async fn delivery_count(&self) -> Result<usize> {
        self.call(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM delivery_log", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }
}

#[async_trait]
impl PreferenceStore for SqliteStore {
    async fn upsert_recipient(&self, id: RecipientId, display_name: &str) -> Result<()> {
        let display_name = display_name.to_string();
        let default_max_price = self.default_max_price;
        self.call(move |conn| {
            conn.prepare_cached(
                "INSERT INTO recipients
                     (id, display_name, notifications_enabled, max_price, categories, created_at, last_activity)
                 VALUES (?1, ?2, 1, ?3, '[]', ?4, ?4)
                 ON CONFLICT(id) DO UPDATE SET last_activity = excluded.last_activity",
            )?
            .execute(params![id, display_name, default_max_price, timestamp(Utc::now())])?;
            Ok(())
        })
        .await
    }

    async fn get_recipient(&self, id: RecipientId) -> Result<Option<Recipient>> {
        let row = self
            .call(move |conn| {
                let sql = format!("SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE id = ?1");
                Ok(conn
                    .prepare_cached(&sql)?
                    .query_row(params![id], RecipientRow::from_row)
                    .optional()?)
            })
            .await?;
        row.map(RecipientRow::into_recipient).transpose()
    }

    async fn list_active_subscribers(&self) -> Result<Vec<Recipient>> {
        let cutoff = timestamp(Utc::now() - self.retention);
        let rows = self
            .call(move |conn| {
                let sql = format!(
                    "SELECT {RECIPIENT_COLUMNS} FROM recipients
                     WHERE notifications_enabled = 1 AND last_activity >= ?1
                     ORDER BY id"
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt
                    .query_map(params![cutoff], RecipientRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        let mut recipients = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_recipient() {
                Ok(recipient) => recipients.push(recipient),
                Err(e) => log::warn!("Skipping recipient {} with unreadable row: {}", id, e),
            }
        }
        Ok(recipients)
    }

    async fn set_preferences(&self, id: RecipientId, update: &PreferenceUpdate) -> Result<()> {
        let categories = update
            .categories
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let notifications = update.notifications;
        let max_price = update.max_price;

        let changed = self
            .call(move |conn| {
                Ok(conn
                    .prepare_cached(
                        "UPDATE recipients SET
                             notifications_enabled = COALESCE(?2, notifications_enabled),
                             max_price = COALESCE(?3, max_price),
                             categories = COALESCE(?4, categories),
                             last_activity = ?5
                         WHERE id = ?1",
                    )?
                    .execute(params![
                        id,
                        notifications,
                        max_price,
                        categories,
                        timestamp(Utc::now())
                    ])?)
            })
            .await?;

        if changed == 0 {
            return Err(AppError::validation(format!("unknown recipient {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory(&StoreConfig::default()).unwrap()
    }

    fn record(fingerprint: &str) -> DeliveryRecord {
        DeliveryRecord {
            fingerprint: fingerprint.to_string(),
            title: "Echo Dot".to_string(),
            price: "29,99 €".to_string(),
            url: "https://www.amazon.it/dp/B09B8V1LZ3?tag=dealcast-21".to_string(),
            sent_at: Utc::now(),
        }
    }

    fn set_last_activity(store: &SqliteStore, id: RecipientId, at: DateTime<Utc>) {
        let conn = store.conn.lock().unwrap();
        conn.execute(
            "UPDATE recipients SET last_activity = ?2 WHERE id = ?1",
            params![id, timestamp(at)],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_mark_delivered_is_idempotent() {
        let store = store();
        assert!(!store.was_delivered("a1b2c3d4e5f60718").await.unwrap());

        store.mark_delivered(&record("a1b2c3d4e5f60718")).await.unwrap();
        store.mark_delivered(&record("a1b2c3d4e5f60718")).await.unwrap();

        assert!(store.was_delivered("a1b2c3d4e5f60718").await.unwrap());
        assert_eq!(store.delivery_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dealcast.db");
        let config = StoreConfig::default();

        {
            let store = SqliteStore::open(&path, &config).unwrap();
            store.mark_delivered(&record("ffff000011112222")).await.unwrap();
        }

        let reopened = SqliteStore::open(&path, &config).unwrap();
        assert!(reopened.was_delivered("ffff000011112222").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_creates_with_defaults() {
        let store = store();
        store.upsert_recipient(42, "Marco").await.unwrap();

        let recipient = store.get_recipient(42).await.unwrap().unwrap();
        assert_eq!(recipient.display_name, "Marco");
        assert!(recipient.notifications_enabled);
        assert_eq!(recipient.max_price, StoreConfig::default().default_max_price);
        assert!(recipient.categories.is_empty());
        assert!(store.get_recipient(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_preferences() {
        let store = store();
        store.upsert_recipient(42, "Marco").await.unwrap();
        store
            .set_preferences(
                42,
                &PreferenceUpdate {
                    notifications: Some(false),
                    categories: Some(vec!["lego".into()]),
                    max_price: Some(35),
                },
            )
            .await
            .unwrap();
        set_last_activity(&store, 42, Utc::now() - Duration::days(2));

        store.upsert_recipient(42, "Marco R.").await.unwrap();

        let recipient = store.get_recipient(42).await.unwrap().unwrap();
        assert!(!recipient.notifications_enabled);
        assert_eq!(recipient.max_price, 35);
        assert_eq!(recipient.categories, vec!["lego".to_string()]);
        assert_eq!(recipient.display_name, "Marco");
        assert!(Utc::now() - recipient.last_activity < Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let store = store();
        store.upsert_recipient(1, "Anna").await.unwrap();
        store
            .set_preferences(
                1,
                &PreferenceUpdate {
                    max_price: Some(250),
                    ..PreferenceUpdate::default()
                },
            )
            .await
            .unwrap();

        let recipient = store.get_recipient(1).await.unwrap().unwrap();
        assert_eq!(recipient.max_price, 250);
        assert!(recipient.notifications_enabled);
        assert!(recipient.categories.is_empty());
    }

    #[tokio::test]
    async fn test_set_preferences_unknown_recipient() {
        let store = store();
        let result = store
            .set_preferences(
                99,
                &PreferenceUpdate {
                    notifications: Some(true),
                    ..PreferenceUpdate::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_active_subscribers_filter() {
        let store = store();
        for (id, name) in [(1, "attivo"), (2, "disattivato"), (3, "inattivo")] {
            store.upsert_recipient(id, name).await.unwrap();
        }
        store
            .set_preferences(
                2,
                &PreferenceUpdate {
                    notifications: Some(false),
                    ..PreferenceUpdate::default()
                },
            )
            .await
            .unwrap();
        set_last_activity(&store, 3, Utc::now() - Duration::days(31));

        let active = store.list_active_subscribers().await.unwrap();
        let ids: Vec<RecipientId> = active.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
    }
}
