//! In-memory [`TabularStore`], for tests and demos

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use autoshop_rust_sheets::SheetsError;

use super::tabular::{Table, TabularStore};
use crate::error::{Error, Result};

#[derive(Default)]
struct State {
    /// Raw rows per table, header first
    tables: HashMap<String, Vec<Vec<String>>>,
    offline: bool,
    calls: usize,
}

/// Tables held in memory with the same row semantics as a sheet: physical
/// row numbers, header in row 1, deletes shift later rows up.
#[derive(Clone, Default)]
pub struct MemoryTables {
    state: Arc<RwLock<State>>,
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding only its header
    pub async fn create_table(&self, table: &str, columns: &[&str]) {
        let header = columns.iter().map(|c| c.to_string()).collect();
        self.state
            .write()
            .await
            .tables
            .insert(table.to_string(), vec![header]);
    }

    /// Push a raw row, bypassing all checks
    pub async fn push_raw(&self, table: &str, row: Vec<String>) {
        let mut state = self.state.write().await;
        state.tables.entry(table.to_string()).or_default().push(row);
    }

    /// Raw rows of a table, header first
    pub async fn raw_rows(&self, table: &str) -> Vec<Vec<String>> {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// While offline every call fails as a network error
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    /// Number of calls received so far
    pub async fn calls(&self) -> usize {
        self.state.read().await.calls
    }

    async fn enter(&self) -> Result<tokio::sync::RwLockWriteGuard<'_, State>> {
        let mut state = self.state.write().await;
        state.calls += 1;
        if state.offline {
            return Err(Error::Unavailable("memory tables are offline".to_string()));
        }
        Ok(state)
    }
}

fn missing(table: &str) -> Error {
    Error::Sheets(SheetsError::SheetNotFound(table.to_string()))
}

#[async_trait]
impl TabularStore for MemoryTables {
    async fn fetch(&self, table: &str) -> Result<Table> {
        let state = self.enter().await?;
        let rows = state.tables.get(table).ok_or_else(|| missing(table))?;
        Ok(Table::from_values(rows.clone()))
    }

    async fn header(&self, table: &str) -> Result<Vec<String>> {
        let state = self.enter().await?;
        let rows = state.tables.get(table).ok_or_else(|| missing(table))?;
        Ok(rows.first().cloned().unwrap_or_default())
    }

    async fn append(&self, table: &str, values: Vec<String>) -> Result<()> {
        let mut state = self.enter().await?;
        let rows = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        rows.push(values);
        Ok(())
    }

    async fn update(&self, table: &str, row_number: usize, values: Vec<String>) -> Result<()> {
        let mut state = self.enter().await?;
        let rows = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        if row_number < 2 {
            return Err(Error::validation(format!(
                "row {} of {} is the header and cannot be overwritten",
                row_number, table
            )));
        }
        if rows.len() < row_number {
            rows.resize(row_number, Vec::new());
        }
        rows[row_number - 1] = values;
        Ok(())
    }

    async fn delete_row(&self, table: &str, row_number: usize) -> Result<()> {
        let mut state = self.enter().await?;
        let rows = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        if row_number < 2 || row_number > rows.len() {
            return Err(Error::Sheets(SheetsError::InvalidParameters(format!(
                "row {} does not exist in {}",
                row_number, table
            ))));
        }
        rows.remove(row_number - 1);
        Ok(())
    }

    async fn ensure_table(&self, table: &str, columns: &[&str]) -> Result<bool> {
        let mut state = self.enter().await?;
        if state.tables.contains_key(table) {
            return Ok(false);
        }
        let header = columns.iter().map(|c| c.to_string()).collect();
        state.tables.insert(table.to_string(), vec![header]);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_delete_shifts_rows() {
        let tables = MemoryTables::new();
        tables.create_table("T", &["id", "name"]).await;
        for id in ["a", "b", "c"] {
            tables.append("T", row(&[id, id])).await.unwrap();
        }

        tables.delete_row("T", 3).await.unwrap();
        let table = tables.fetch("T").await.unwrap();
        let ids: Vec<&str> = table.rows.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(table.find("c").map(|r| r.number), Some(3));
    }

    #[tokio::test]
    async fn test_offline_and_missing() {
        let tables = MemoryTables::new();
        assert!(matches!(
            tables.fetch("Nope").await,
            Err(Error::Sheets(SheetsError::SheetNotFound(_)))
        ));

        assert!(tables.ensure_table("T", &["id"]).await.unwrap());
        assert!(!tables.ensure_table("T", &["id"]).await.unwrap());

        tables.set_offline(true).await;
        let err = tables.fetch("T").await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(tables.calls().await, 4);
    }
}
