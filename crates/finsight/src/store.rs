//! SQLite document store standing in for the hosted database
//!
//! Every collection lives in one `documents` table as JSON bodies keyed by
//! `(collection, id)`. Writers notify per-collection watch channels after
//! commit; they never wait for anyone to recompute. Each write is also
//! appended to `activity_log`; a failed log write is reported and latches
//! the degraded flag but never fails the write itself.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::constants;

/// Full contents of one collection at a point in time
pub type Snapshot = Arc<Vec<Value>>;

/// Document store handle; clones share the pool and subscribers
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    watchers: Arc<Mutex<HashMap<String, watch::Sender<Option<Snapshot>>>>>,
    /// Serialises load-then-send so an older snapshot never overwrites a newer one
    publish: Arc<tokio::sync::Mutex<()>>,
    degraded: Arc<AtomicBool>,
}

impl Store {
    /// Open or create the store database
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // SQLx requires the file to exist for SQLite
        if !path.exists() {
            std::fs::File::create(path)?;
        }

        let url = format!("sqlite:{}", path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .with_context(|| format!("Failed to open store at {}", path.display()))?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout=5000")
            .execute(&pool)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory store (one connection so every query sees the same database)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory store")?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self {
            pool,
            watchers: Arc::new(Mutex::new(HashMap::new())),
            publish: Arc::new(tokio::sync::Mutex::new(())),
            degraded: Arc::new(AtomicBool::new(false)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "
            -- One JSON document per record
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            -- Write audit trail
            CREATE TABLE IF NOT EXISTS activity_log (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                at TEXT NOT NULL,
                action TEXT NOT NULL,
                collection TEXT NOT NULL,
                record_id TEXT NOT NULL
            );
            ",
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize store schema")?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Raw JSON bodies of a collection in id order
    pub async fn list_raw(&self, collection: &str) -> Result<Vec<Value>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = ? ORDER BY id")
                .bind(collection)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("Failed to list {}", collection))?;

        rows.into_iter()
            .map(|(id, body)| {
                serde_json::from_str(&body)
                    .with_context(|| format!("Corrupt document {}/{}", collection, id))
            })
            .collect()
    }

    pub async fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(body,)| {
            serde_json::from_str(&body)
                .with_context(|| format!("Corrupt document {}/{}", collection, id))
        })
        .transpose()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or replace one record
    pub async fn upsert<T: Serialize>(&self, collection: &str, id: &str, record: &T) -> Result<()> {
        let body = serde_json::to_string(record)?;
        sqlx::query(
            "INSERT INTO documents (collection, id, body, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(&body)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write {}/{}", collection, id))?;

        self.log_activity("upsert", collection, id).await;
        self.notify(collection).await;
        Ok(())
    }

    /// Insert or replace many records of one collection (in a transaction for atomicity)
    pub async fn upsert_many<T: Serialize>(
        &self,
        collection: &str,
        records: &[(String, T)],
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for (id, record) in records {
            sqlx::query(
                "INSERT INTO documents (collection, id, body, updated_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            )
            .bind(collection)
            .bind(id)
            .bind(serde_json::to_string(record)?)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit()
            .await
            .with_context(|| format!("Failed to write batch to {}", collection))?;

        for (id, _) in records {
            self.log_activity("upsert", collection, id).await;
        }
        self.notify(collection).await;
        Ok(records.len())
    }

    /// Remove a record; false when it did not exist
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.log_activity("delete", collection, id).await;
            self.notify(collection).await;
        }
        Ok(deleted)
    }

    async fn log_activity(&self, action: &str, collection: &str, id: &str) {
        let result = sqlx::query(
            "INSERT INTO activity_log (at, action, collection, record_id) VALUES (?, ?, ?, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(action)
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(%collection, %id, error = %e, "activity log write failed");
            self.degraded.store(true, Ordering::Relaxed);
        }
    }

    /// Whether any secondary write (activity log) has failed since opening
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Follow a collection. The receiver starts empty and gets the first full
    /// snapshot from a background load, then one after every write.
    pub fn subscribe(&self, collection: &str) -> watch::Receiver<Option<Snapshot>> {
        let receiver = {
            let mut watchers = self
                .watchers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            watchers
                .entry(collection.to_string())
                .or_insert_with(|| watch::channel(None).0)
                .subscribe()
        };

        let store = self.clone();
        let collection = collection.to_string();
        tokio::spawn(async move { store.notify(&collection).await });

        receiver
    }

    /// Publish the current contents of a collection to its subscribers
    async fn notify(&self, collection: &str) {
        let sender = {
            let watchers = self
                .watchers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match watchers.get(collection) {
                Some(sender) if sender.receiver_count() > 0 => sender.clone(),
                _ => return,
            }
        };

        let _guard = self.publish.lock().await;
        match self.list_raw(collection).await {
            Ok(records) => {
                debug!(%collection, records = records.len(), "publishing snapshot");
                sender.send_replace(Some(Arc::new(records)));
            }
            Err(e) => {
                warn!(%collection, error = %e, "snapshot load failed; subscribers keep the last one");
                self.degraded.store(true, Ordering::Relaxed);
            }
        }
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Get store statistics
    pub async fn stats(&self) -> Result<StoreStats> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT collection, COUNT(*) FROM documents GROUP BY collection")
                .fetch_all(&self.pool)
                .await?;
        let counts: HashMap<String, i64> = rows.into_iter().collect();

        let activity: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activity_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            collections: constants::COLLECTIONS
                .iter()
                .map(|c| (*c, counts.get(*c).copied().unwrap_or(0) as u64))
                .collect(),
            activity_entries: activity.0 as u64,
            degraded: self.is_degraded(),
        })
    }
}

/// Store statistics
#[derive(Debug)]
pub struct StoreStats {
    pub collections: Vec<(&'static str, u64)>,
    pub activity_entries: u64,
    pub degraded: bool,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (collection, count) in &self.collections {
            writeln!(f, "{:<24} {:>8}", collection, count)?;
        }
        write!(f, "{:<24} {:>8}", "activity log", self.activity_entries)?;
        if self.degraded {
            write!(f, "\n(degraded: some activity log writes failed)")?;
        }
        Ok(())
    }
}
