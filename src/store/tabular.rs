//! Remote tabular store adapter
//!
//! A table is a sheet whose first row is the header. Data rows are exposed as
//! header-keyed cells plus their 1-based physical row number; the number is
//! only good for addressing the row until the next structural change.

use async_trait::async_trait;
use log::{debug, info};

use autoshop_rust_sheets::{a1_range, column_letter, SheetsClient};

use crate::error::{Error, Result};
use crate::models::Cells;

/// Widest range read when listing a table
const LIST_COLUMNS: &str = "A:ZZ";

/// One data row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// Physical row number; the first data row is 2
    pub number: usize,
    pub cells: Cells,
}

impl Row {
    pub fn new(number: usize, cells: Cells) -> Self {
        Self { number, cells }
    }

    pub fn from_pairs(number: usize, pairs: &[(&str, &str)]) -> Self {
        Self {
            number,
            cells: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Cell value, `""` when the column is missing
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn id(&self) -> &str {
        self.get("id")
    }
}

/// A table read in one call: the live header and its data rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Build from raw sheet values. Fully blank rows are skipped but keep
    /// their numbering.
    pub fn from_values(values: Vec<Vec<String>>) -> Self {
        let mut values = values.into_iter();
        let header: Vec<String> = match values.next() {
            Some(header) => header.into_iter().map(|h| h.trim().to_string()).collect(),
            None => return Self::default(),
        };

        let rows = values
            .enumerate()
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .map(|(index, cells)| {
                let cells = header
                    .iter()
                    .enumerate()
                    .filter(|(_, name)| !name.is_empty())
                    .map(|(i, name)| (name.clone(), cells.get(i).cloned().unwrap_or_default()))
                    .collect();
                Row::new(index + 2, cells)
            })
            .collect();

        Self { header, rows }
    }

    pub fn find(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|row| row.id() == id)
    }
}

/// Order cells by the live header so values never land under the wrong
/// column. Unknown header columns are written blank; an empty header falls
/// back to `columns`.
pub fn order_values(header: &[String], columns: &[&str], cells: &Cells) -> Vec<String> {
    if header.iter().all(|h| h.is_empty()) {
        return columns
            .iter()
            .map(|c| cells.get(*c).cloned().unwrap_or_default())
            .collect();
    }
    header
        .iter()
        .map(|h| cells.get(h).cloned().unwrap_or_default())
        .collect()
}

/// Row-oriented remote storage addressed by table name and row number
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Read the header and all data rows
    async fn fetch(&self, table: &str) -> Result<Table>;

    /// Data rows only
    async fn list(&self, table: &str) -> Result<Vec<Row>> {
        Ok(self.fetch(table).await?.rows)
    }

    /// The live header row
    async fn header(&self, table: &str) -> Result<Vec<String>>;

    /// Add one row after the last one
    async fn append(&self, table: &str, values: Vec<String>) -> Result<()>;

    /// Overwrite exactly one data row
    async fn update(&self, table: &str, row_number: usize, values: Vec<String>) -> Result<()>;

    /// Physically remove one data row; later rows shift up
    async fn delete_row(&self, table: &str, row_number: usize) -> Result<()>;

    /// Create the table with the given header when missing.
    /// Returns `true` when it was created.
    async fn ensure_table(&self, table: &str, columns: &[&str]) -> Result<bool>;
}

/// [`TabularStore`] over a Google spreadsheet, one sheet per table
#[derive(Clone)]
pub struct SheetsTable {
    client: SheetsClient,
}

impl SheetsTable {
    pub fn new(client: SheetsClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SheetsClient {
        &self.client
    }

    fn row_range(table: &str, row_number: usize, width: usize) -> String {
        let last = column_letter(width.max(1));
        a1_range(table, &format!("A{}:{}{}", row_number, last, row_number))
    }
}

#[async_trait]
impl TabularStore for SheetsTable {
    async fn fetch(&self, table: &str) -> Result<Table> {
        let values = self.client.get_values(&a1_range(table, LIST_COLUMNS)).await?;
        let table_rows = Table::from_values(values);
        debug!("Fetched {} row(s) from {}", table_rows.rows.len(), table);
        Ok(table_rows)
    }

    async fn header(&self, table: &str) -> Result<Vec<String>> {
        let values = self.client.get_values(&a1_range(table, "1:1")).await?;
        Ok(values
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect())
    }

    async fn append(&self, table: &str, values: Vec<String>) -> Result<()> {
        let last = column_letter(values.len().max(1));
        let range = a1_range(table, &format!("A:{}", last));
        self.client.append_values(&range, &[values]).await?;
        Ok(())
    }

    async fn update(&self, table: &str, row_number: usize, values: Vec<String>) -> Result<()> {
        if row_number < 2 {
            return Err(Error::validation(format!(
                "row {} of {} is the header and cannot be overwritten",
                row_number, table
            )));
        }
        let range = Self::row_range(table, row_number, values.len());
        self.client.update_values(&range, &[values]).await?;
        Ok(())
    }

    async fn delete_row(&self, table: &str, row_number: usize) -> Result<()> {
        self.client.delete_row(table, row_number).await?;
        Ok(())
    }

    async fn ensure_table(&self, table: &str, columns: &[&str]) -> Result<bool> {
        let created = self.client.ensure_sheet(table, columns).await?;
        if created {
            info!("Created table {}", table);
        }
        Ok(created)
    }
}
