//! Offline cache
//!
//! Last-good table snapshots for display while the remote store is down, and
//! a queue of writes made offline, replayed in order once it is back.
//! Snapshots have no version and no expiry.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{generate_id, Cells};
use crate::store::{order_values, TabularStore};

mod storage;

pub use storage::{FileStorage, LocalStorage, MemoryStorage};

const QUEUE_KEY: &str = "pending_actions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Append,
    Update,
    Delete,
}

/// A write made while the remote store was unreachable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: String,
    pub kind: ActionKind,
    pub table: String,
    pub record_id: String,
    /// Full cells for appends, changed cells for updates, empty for deletes
    pub values: Cells,
    /// Column order used when the live header is empty
    pub columns: Vec<String>,
    pub queued_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(kind: ActionKind, table: &str, record_id: &str, values: Cells, columns: &[&str]) -> Self {
        Self {
            id: generate_id(),
            kind,
            table: table.to_string(),
            record_id: record_id.to_string(),
            values,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            queued_at: Utc::now(),
        }
    }
}

/// Result of replaying the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub replayed: usize,
    /// Updates and deletes whose row no longer exists; dropped
    pub skipped_missing: usize,
    /// Actions that failed; they stay queued
    pub failed: usize,
    /// Actions still queued, including later writes to a failed record
    pub remaining: usize,
}

/// Snapshot cache and pending-action queue over a [`LocalStorage`]
#[derive(Clone)]
pub struct OfflineCache {
    storage: Arc<dyn LocalStorage>,
    queue_lock: Arc<Mutex<()>>,
}

impl OfflineCache {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self {
            storage,
            queue_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn storage(&self) -> Arc<dyn LocalStorage> {
        self.storage.clone()
    }

    /// Overwrite the value under `key`
    pub async fn cache<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.storage.set(key, &json).await
    }

    /// Read the value under `key`, `None` when absent
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.storage.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.storage.remove(key).await
    }

    /// Queued actions, oldest first
    pub async fn pending(&self) -> Result<Vec<PendingAction>> {
        Ok(self.read(QUEUE_KEY).await?.unwrap_or_default())
    }

    pub async fn enqueue(&self, action: PendingAction) -> Result<()> {
        let _guard = self.queue_lock.lock().await;
        let mut queue = self.pending().await?;
        debug!(
            "Queueing {:?} of {} in {}",
            action.kind, action.record_id, action.table
        );
        queue.push(action);
        self.cache(QUEUE_KEY, &queue).await
    }

    /// Replay queued actions in FIFO order.
    ///
    /// Updates and deletes locate their row by id at replay time. When an
    /// action fails, later actions on the same record stay queued behind it
    /// so per-record order is kept.
    pub async fn drain(&self, remote: &dyn TabularStore) -> Result<DrainReport> {
        let _guard = self.queue_lock.lock().await;
        let queue = self.pending().await?;
        let mut report = DrainReport::default();
        if queue.is_empty() {
            return Ok(report);
        }

        let mut kept = Vec::new();
        let mut blocked: HashSet<(String, String)> = HashSet::new();

        for action in queue {
            let key = (action.table.clone(), action.record_id.clone());
            if blocked.contains(&key) {
                kept.push(action);
                continue;
            }

            match replay(remote, &action).await {
                Ok(true) => report.replayed += 1,
                Ok(false) => {
                    info!(
                        "Dropping queued {:?} of {}: no longer in {}",
                        action.kind, action.record_id, action.table
                    );
                    report.skipped_missing += 1;
                }
                Err(err) => {
                    warn!(
                        "Replay of {:?} {} in {} failed: {}",
                        action.kind, action.record_id, action.table, err
                    );
                    report.failed += 1;
                    blocked.insert(key);
                    kept.push(action);
                }
            }
        }

        report.remaining = kept.len();
        self.cache(QUEUE_KEY, &kept).await?;
        info!(
            "Replayed {} queued action(s), {} missing, {} remaining",
            report.replayed, report.skipped_missing, report.remaining
        );
        Ok(report)
    }
}

/// `Ok(false)` when the addressed row is gone
async fn replay(remote: &dyn TabularStore, action: &PendingAction) -> Result<bool> {
    let columns: Vec<&str> = action.columns.iter().map(String::as_str).collect();
    let table = remote.fetch(&action.table).await?;

    match action.kind {
        ActionKind::Append => {
            if table.find(&action.record_id).is_some() {
                // an earlier drain wrote it but could not clear the queue
                return Ok(true);
            }
            let values = order_values(&table.header, &columns, &action.values);
            remote.append(&action.table, values).await?;
        }
        ActionKind::Update => {
            let Some(row) = table.find(&action.record_id) else {
                return Ok(false);
            };
            let mut merged = row.cells.clone();
            merged.extend(action.values.clone());
            let values = order_values(&table.header, &columns, &merged);
            remote.update(&action.table, row.number, values).await?;
        }
        ActionKind::Delete => {
            let Some(row) = table.find(&action.record_id) else {
                return Ok(false);
            };
            remote.delete_row(&action.table, row.number).await?;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTables;

    fn cells(pairs: &[(&str, &str)]) -> Cells {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_cache_roundtrip() {
        let cache = OfflineCache::new(Arc::new(MemoryStorage::new()));
        assert_eq!(cache.read::<Vec<String>>("k").await.unwrap(), None);

        cache.cache("k", &vec!["a".to_string()]).await.unwrap();
        cache.cache("k", &vec!["b".to_string()]).await.unwrap();
        assert_eq!(cache.read::<Vec<String>>("k").await.unwrap(), Some(vec!["b".to_string()]));

        cache.remove("k").await.unwrap();
        assert_eq!(cache.read::<Vec<String>>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_drain_replays_in_order() {
        let tables = MemoryTables::new();
        tables.create_table("T", &["id", "name", "note"]).await;
        tables.append("T", vec!["old".into(), "Old".into(), "".into()]).await.unwrap();

        let cache = OfflineCache::new(Arc::new(MemoryStorage::new()));
        let columns = ["id", "name", "note"];
        cache
            .enqueue(PendingAction::new(ActionKind::Append, "T", "n1", cells(&[("id", "n1"), ("name", "New")]), &columns))
            .await
            .unwrap();
        cache
            .enqueue(PendingAction::new(ActionKind::Update, "T", "n1", cells(&[("note", "x")]), &columns))
            .await
            .unwrap();
        cache
            .enqueue(PendingAction::new(ActionKind::Delete, "T", "old", Cells::new(), &columns))
            .await
            .unwrap();
        cache
            .enqueue(PendingAction::new(ActionKind::Delete, "T", "ghost", Cells::new(), &columns))
            .await
            .unwrap();

        let report = cache.drain(&tables).await.unwrap();
        assert_eq!(report.replayed, 3);
        assert_eq!(report.skipped_missing, 1);
        assert_eq!(report.remaining, 0);
        assert!(cache.pending().await.unwrap().is_empty());

        let rows = tables.raw_rows("T").await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["n1", "New", "x"]);
    }

    #[tokio::test]
    async fn test_failed_replay_stays_queued() {
        let tables = MemoryTables::new();
        tables.create_table("T", &["id", "name"]).await;

        let cache = OfflineCache::new(Arc::new(MemoryStorage::new()));
        let action = PendingAction::new(ActionKind::Append, "T", "n1", cells(&[("id", "n1")]), &["id", "name"]);
        cache.enqueue(action.clone()).await.unwrap();

        tables.set_offline(true).await;
        let report = cache.drain(&tables).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(cache.pending().await.unwrap(), vec![action]);

        tables.set_offline(false).await;
        let report = cache.drain(&tables).await.unwrap();
        assert_eq!(report.replayed, 1);
        assert_eq!(tables.raw_rows("T").await.len(), 2);
    }
}
