//! Generic entity store
//!
//! Owns the in-memory list of one entity type and keeps it in step with the
//! remote table. Successful loads are snapshotted to the offline cache; when
//! the remote is unreachable, loads fall back to that snapshot and (if
//! enabled) writes are applied locally and queued for replay.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::tabular::{order_values, Row, Table, TabularStore};
use crate::cache::{ActionKind, OfflineCache, PendingAction};
use crate::error::{Error, Result};
use crate::models::{generate_id, Cells, Record};

/// Where a load got its data from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    /// Remote failed; the last-good snapshot was used
    Cache,
}

/// Result of a write addressed by id
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    /// The id is not in the remote table (anymore)
    NotFound,
    /// Remote unreachable; applied locally and queued for replay
    Queued(T),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Outcome::NotFound)
    }

    /// The written value, unless nothing was found
    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Done(value) | Outcome::Queued(value) => Some(value),
            Outcome::NotFound => None,
        }
    }
}

/// Snapshot of a store's state
#[derive(Debug, Clone)]
pub struct StoreState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    /// Fatal: the last load failed and nothing was cached
    pub error: Option<String>,
    /// Non-fatal: the list comes from the offline cache
    pub stale: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl<T> Default for StoreState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            stale: None,
            loaded_at: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(bound = "T: Record")]
struct PersistedSnapshot<T> {
    items: Vec<T>,
    saved_at: DateTime<Utc>,
}

/// CRUD over one table with an in-memory list. Clones share state.
pub struct EntityStore<T: Record> {
    remote: Arc<dyn TabularStore>,
    cache: OfflineCache,
    queue_offline_writes: bool,
    state: Arc<RwLock<StoreState<T>>>,
    _marker: PhantomData<T>,
}

impl<T: Record> Clone for EntityStore<T> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            cache: self.cache.clone(),
            queue_offline_writes: self.queue_offline_writes,
            state: self.state.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Record> EntityStore<T> {
    pub fn new(remote: Arc<dyn TabularStore>, cache: OfflineCache) -> Self {
        Self {
            remote,
            cache,
            queue_offline_writes: false,
            state: Arc::new(RwLock::new(StoreState::default())),
            _marker: PhantomData,
        }
    }

    /// Queue writes that fail for lack of network instead of failing them
    pub fn with_offline_writes(mut self, value: bool) -> Self {
        self.queue_offline_writes = value;
        self
    }

    pub fn table(&self) -> &'static str {
        T::TABLE
    }

    pub(crate) fn remote(&self) -> &Arc<dyn TabularStore> {
        &self.remote
    }

    /// Cache key of the last-good snapshot used as offline fallback
    pub fn snapshot_key() -> String {
        format!("snapshot:{}", T::TABLE)
    }

    /// Key of the persisted store state restored on start
    pub fn persisted_key() -> String {
        format!("store:{}", T::TABLE)
    }

    /// Copy of the current list, newest first
    pub async fn items(&self) -> Vec<T> {
        self.state.read().await.items.clone()
    }

    pub async fn state(&self) -> StoreState<T> {
        self.state.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Items matching a predicate, newest first
    pub async fn filter<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.state
            .read()
            .await
            .items
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    /// Load when nothing has been loaded or restored yet
    pub async fn ensure_loaded(&self) -> Result<LoadSource> {
        if self.state.read().await.loaded_at.is_some() {
            return Ok(LoadSource::Remote);
        }
        self.load().await
    }

    /// Replace the list with the remote table, falling back to the offline
    /// snapshot when the remote call fails.
    pub async fn load(&self) -> Result<LoadSource> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
        }

        match self.remote.fetch(T::TABLE).await {
            Ok(table) => {
                let (items, skipped) = decode_table::<T>(&table);
                debug!("Loaded {} item(s) from {}", items.len(), T::TABLE);
                if let Err(e) = self.cache.cache(&Self::snapshot_key(), &items).await {
                    warn!("Could not cache {} snapshot: {}", T::TABLE, e);
                }
                let items = self.with_pending(items).await;
                {
                    let mut state = self.state.write().await;
                    state.items = items;
                    state.loading = false;
                    state.error = None;
                    state.stale = skipped_warning(&skipped);
                    state.loaded_at = Some(Utc::now());
                }
                self.persist().await;
                Ok(LoadSource::Remote)
            }
            Err(err) => {
                warn!("Loading {} failed: {}", T::TABLE, err);
                let cached = match self.cache.read::<Vec<T>>(&Self::snapshot_key()).await {
                    Ok(cached) => cached,
                    Err(e) => {
                        warn!("Unreadable {} snapshot: {}", T::TABLE, e);
                        None
                    }
                };
                let cached = match cached {
                    Some(items) => Some(self.with_pending(items).await),
                    None => None,
                };

                let mut state = self.state.write().await;
                state.loading = false;
                match cached {
                    Some(items) => {
                        state.items = items;
                        state.error = None;
                        state.stale = Some(format!("Showing cached data: {}", err));
                        state.loaded_at = Some(Utc::now());
                        Ok(LoadSource::Cache)
                    }
                    None => {
                        state.items.clear();
                        state.stale = None;
                        state.error = Some(err.to_string());
                        Err(err)
                    }
                }
            }
        }
    }

    /// Lay the queued writes for this table over loaded items, so records
    /// written offline stay visible until they are replayed.
    async fn with_pending(&self, mut items: Vec<T>) -> Vec<T> {
        let pending = match self.cache.pending().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Unreadable pending queue: {}", e);
                return items;
            }
        };

        for action in pending.iter().filter(|a| a.table == T::TABLE) {
            let position = items.iter().position(|item| item.id() == action.record_id);
            match (action.kind, position) {
                (ActionKind::Append, None) => match T::from_row(&Row::new(0, action.values.clone())) {
                    Ok(entity) => items.insert(0, entity),
                    Err(e) => warn!("Queued {} in {} is unreadable: {}", action.record_id, T::TABLE, e),
                },
                (ActionKind::Update, Some(index)) => {
                    let merged = items[index].to_cells().map(|mut cells| {
                        cells.extend(action.values.clone());
                        cells
                    });
                    match merged.and_then(|cells| T::from_row(&Row::new(0, cells))) {
                        Ok(entity) => items[index] = entity,
                        Err(e) => warn!("Queued update of {} is unreadable: {}", action.record_id, e),
                    }
                }
                (ActionKind::Delete, Some(index)) => {
                    items.remove(index);
                }
                _ => {}
            }
        }
        items
    }

    /// Populate the list from the persisted store state, if any.
    /// Returns the number of restored items.
    pub async fn restore(&self) -> Result<usize> {
        let snapshot: Option<PersistedSnapshot<T>> = self.cache.read(&Self::persisted_key()).await?;
        let Some(snapshot) = snapshot else {
            return Ok(0);
        };
        let count = snapshot.items.len();
        let mut state = self.state.write().await;
        state.items = snapshot.items;
        state.loaded_at = Some(snapshot.saved_at);
        debug!("Restored {} item(s) of {}", count, T::TABLE);
        Ok(count)
    }

    async fn persist(&self) {
        let items = self.state.read().await.items.clone();
        let snapshot = PersistedSnapshot {
            items,
            saved_at: Utc::now(),
        };
        if let Err(e) = self.cache.cache(&Self::persisted_key(), &snapshot).await {
            warn!("Could not persist {}: {}", T::TABLE, e);
        }
    }

    fn can_queue(&self, err: &Error) -> bool {
        self.queue_offline_writes && err.is_network()
    }

    /// Append a new entity. An empty id is generated and an empty
    /// `createdAt` stamped. The entity is prepended to the list.
    pub async fn add(&self, mut entity: T) -> Result<Outcome<T>> {
        entity.validate()?;
        if entity.id().is_empty() {
            entity.set_id(generate_id());
        }
        if entity.created_at().is_none() {
            entity.set_created_at(Utc::now());
        }
        let cells = entity.to_cells()?;

        let written = match self.remote.header(T::TABLE).await {
            Ok(header) => {
                let values = order_values(&header, T::COLUMNS, &cells);
                self.remote.append(T::TABLE, values).await
            }
            Err(err) => Err(err),
        };

        let outcome = match written {
            Ok(()) => Outcome::Done(entity.clone()),
            Err(err) if self.can_queue(&err) => {
                warn!("{} offline, queueing add of {}: {}", T::TABLE, entity.id(), err);
                self.cache
                    .enqueue(PendingAction::new(
                        ActionKind::Append,
                        T::TABLE,
                        entity.id(),
                        cells,
                        T::COLUMNS,
                    ))
                    .await?;
                Outcome::Queued(entity.clone())
            }
            Err(err) => return Err(err),
        };

        self.state.write().await.items.insert(0, entity.clone());
        self.persist().await;
        info!("Added {} to {}", entity.id(), T::TABLE);
        Ok(outcome)
    }

    /// Merge a patch into the stored row.
    ///
    /// The table is re-read and the row located by id right before the
    /// write. Concurrent updates from other clients are last-write-wins:
    /// whatever lands between that read and the write is overwritten.
    pub async fn update(&self, id: &str, patch: T::Patch) -> Result<Outcome<T>> {
        self.update_with(id, move |entity| {
            entity.apply(&patch);
            Ok(true)
        })
        .await
    }

    /// Like [`update`](Self::update) with a closure deciding the change.
    /// The closure sees the freshly read entity and returns `false` to skip
    /// the write, or an error to abort it.
    pub async fn update_with<F>(&self, id: &str, mutate: F) -> Result<Outcome<T>>
    where
        F: FnOnce(&mut T) -> Result<bool> + Send,
    {
        let table = match self.remote.fetch(T::TABLE).await {
            Ok(table) => table,
            Err(err) if self.can_queue(&err) => {
                return self.queue_update(id, mutate, err).await;
            }
            Err(err) => return Err(err),
        };

        let Some(row) = table.find(id) else {
            self.forget(id).await;
            return Ok(Outcome::NotFound);
        };

        let mut entity = T::from_row(row)?;
        if !mutate(&mut entity)? {
            self.remember(&entity).await;
            return Ok(Outcome::Done(entity));
        }
        entity.validate()?;

        let values = order_values(&table.header, T::COLUMNS, &entity.to_cells()?);
        self.remote.update(T::TABLE, row.number, values).await?;

        self.remember(&entity).await;
        self.persist().await;
        debug!("Updated {} in {} (row {})", id, T::TABLE, row.number);
        Ok(Outcome::Done(entity))
    }

    async fn queue_update<F>(&self, id: &str, mutate: F, err: Error) -> Result<Outcome<T>>
    where
        F: FnOnce(&mut T) -> Result<bool> + Send,
    {
        let Some(mut entity) = self.get(id).await else {
            return Err(err);
        };
        let before = entity.to_cells()?;
        if !mutate(&mut entity)? {
            return Ok(Outcome::Queued(entity));
        }
        entity.validate()?;
        let changed = changed_cells(&before, &entity.to_cells()?);

        warn!("{} offline, queueing update of {}: {}", T::TABLE, id, err);
        self.cache
            .enqueue(PendingAction::new(
                ActionKind::Update,
                T::TABLE,
                id,
                changed,
                T::COLUMNS,
            ))
            .await?;
        self.remember(&entity).await;
        self.persist().await;
        Ok(Outcome::Queued(entity))
    }

    /// Physically remove the row holding `id`
    pub async fn delete(&self, id: &str) -> Result<Outcome<()>> {
        let table = match self.remote.fetch(T::TABLE).await {
            Ok(table) => table,
            Err(err) if self.can_queue(&err) => {
                if self.get(id).await.is_none() {
                    return Err(err);
                }
                warn!("{} offline, queueing delete of {}: {}", T::TABLE, id, err);
                self.cache
                    .enqueue(PendingAction::new(
                        ActionKind::Delete,
                        T::TABLE,
                        id,
                        Cells::new(),
                        T::COLUMNS,
                    ))
                    .await?;
                self.forget(id).await;
                self.persist().await;
                return Ok(Outcome::Queued(()));
            }
            Err(err) => return Err(err),
        };

        let Some(row) = table.find(id) else {
            self.forget(id).await;
            return Ok(Outcome::NotFound);
        };

        self.remote.delete_row(T::TABLE, row.number).await?;
        self.forget(id).await;
        self.persist().await;
        info!("Deleted {} from {} (row {})", id, T::TABLE, row.number);
        Ok(Outcome::Done(()))
    }

    /// Replace or insert an entity in the in-memory list
    async fn remember(&self, entity: &T) {
        let mut state = self.state.write().await;
        match state.items.iter_mut().find(|item| item.id() == entity.id()) {
            Some(item) => *item = entity.clone(),
            None => state.items.insert(0, entity.clone()),
        }
    }

    async fn forget(&self, id: &str) {
        self.state.write().await.items.retain(|item| item.id() != id);
    }
}

/// Decode every row, newest first. Rows without an id are skipped, and so
/// are rows that fail to decode; their row numbers are returned.
fn decode_table<T: Record>(table: &Table) -> (Vec<T>, Vec<usize>) {
    let mut items = Vec::with_capacity(table.rows.len());
    let mut skipped = Vec::new();
    for row in table.rows.iter().filter(|row| !row.id().is_empty()) {
        match T::from_row(row) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!("Skipping row {} of {}: {}", row.number, T::TABLE, e);
                skipped.push(row.number);
            }
        }
    }
    // rows are in append order; reverse first so the stable sort keeps
    // later rows ahead on equal timestamps
    items.reverse();
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    (items, skipped)
}

fn skipped_warning(rows: &[usize]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let rows: Vec<String> = rows.iter().map(|n| n.to_string()).collect();
    Some(format!("Unreadable row(s) skipped: {}", rows.join(", ")))
}

fn changed_cells(before: &Cells, after: &Cells) -> Cells {
    after
        .iter()
        .filter(|(column, value)| before.get(*column) != Some(*value))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}
