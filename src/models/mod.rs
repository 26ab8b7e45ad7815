//! Typed entities stored as sheet rows
//!
//! Every entity implements [`Record`]: it knows its table name, its canonical
//! column order and how to turn itself into header-keyed string cells and
//! back. String forms of enums, booleans, timestamps and JSON sub-objects
//! never leave this module.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::Row;

mod customer;
mod message;
mod reception;
mod sms;
mod task;
mod user;

pub use customer::{Customer, CustomerPatch};
pub use message::{Message, MessagePatch};
pub use reception::{
    Billing, CustomerInfo, PartItem, Reception, ReceptionPatch, ServiceInfo, ServiceItem,
    VehicleInfo,
};
pub use sms::{SmsLog, SmsLogPatch, SmsSendStatus, SmsSettings, SmsTemplate, SmsTemplatePatch};
pub use task::{Assignee, HistoryEntry, Priority, Task, TaskPatch, VehicleRef};
pub use user::{Permissions, Role, User, UserPatch};

/// Header-keyed string cells of one row
pub type Cells = BTreeMap<String, String>;

/// An entity persisted as one row of a table
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Partial update; `None` fields keep their current value
    type Patch: Send + Sync;

    /// Sheet name
    const TABLE: &'static str;

    /// Canonical column order of the header row
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn created_at(&self) -> Option<DateTime<Utc>>;

    fn set_created_at(&mut self, at: DateTime<Utc>);

    /// Encode into header-keyed cells
    fn to_cells(&self) -> Result<Cells>;

    /// Decode from a row
    fn from_row(row: &Row) -> Result<Self>;

    /// Merge a patch; patch fields win
    fn apply(&mut self, patch: &Self::Patch);

    /// Required fields and formats, checked before any network call
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle shared by receptions and tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
        }
    }

    /// Unknown strings read back as `Pending`
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "in-progress" | "in_progress" => Status::InProgress,
            "completed" => Status::Completed,
            _ => Status::Pending,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Status::Pending => 0,
            Status::InProgress => 1,
            Status::Completed => 2,
        }
    }

    /// Statuses only move forward; staying put is not a transition
    pub fn can_transition_to(&self, next: Status) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Millisecond timestamp followed by a random suffix, e.g. `lq2k3m9x4f7a1b2`
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("{}{}", to_base36(millis), suffix)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    out.iter().rev().collect()
}

/// Canonical mobile form: ASCII digits, leading `0`, no country code.
/// Persian and Arabic-Indic digits are folded to ASCII.
pub fn normalize_mobile(input: &str) -> String {
    let digits: String = input
        .chars()
        .filter_map(|c| match c {
            '0'..='9' => Some(c),
            '۰'..='۹' => char::from_digit(c as u32 - '۰' as u32, 10),
            '٠'..='٩' => char::from_digit(c as u32 - '٠' as u32, 10),
            _ => None,
        })
        .collect();

    if let Some(rest) = digits.strip_prefix("0098") {
        format!("0{}", rest)
    } else if digits.starts_with("98") && digits.len() == 12 {
        format!("0{}", &digits[2..])
    } else if digits.starts_with('9') && digits.len() == 10 {
        format!("0{}", digits)
    } else {
        digits
    }
}

/// 11 digits starting with `09`
pub fn is_valid_mobile(mobile: &str) -> bool {
    mobile.len() == 11 && mobile.starts_with("09") && mobile.chars().all(|c| c.is_ascii_digit())
}

pub(crate) fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn require_mobile(mobile: &str) -> Result<()> {
    if !is_valid_mobile(mobile) {
        return Err(Error::validation(format!(
            "mobile must be 11 digits starting with 09, got '{}'",
            mobile
        )));
    }
    Ok(())
}

pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "true" | "TRUE" | "True" | "1" | "yes")
}

pub(crate) fn format_bool(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

pub(crate) fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn format_time(value: Option<DateTime<Utc>>) -> String {
    value.map(|dt| dt.to_rfc3339()).unwrap_or_default()
}

pub(crate) fn opt(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Decode a JSON cell; an empty cell yields the default value
pub(crate) fn parse_json<T: DeserializeOwned + Default>(
    table: &'static str,
    row: &Row,
    column: &str,
) -> Result<T> {
    let raw = row.get(column);
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(raw).map_err(|e| Error::Decode {
        table,
        row: row.number,
        message: format!("column {}: {}", column, e),
    })
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Build a cell map from `(column, value)` pairs
pub(crate) fn cells<const N: usize>(pairs: [(&str, String); N]) -> Cells {
    pairs
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}
