use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{cells, format_bool, format_time, parse_bool, parse_time, require, Cells, Record};
use crate::error::{Error, Result};
use crate::store::Row;

/// Internal message between staff members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub from_id: String,
    pub from_name: String,
    pub to_id: String,
    pub to_name: String,
    pub subject: String,
    pub content: String,
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub subject: Option<String>,
    pub content: Option<String>,
    pub read: Option<bool>,
}

impl Record for Message {
    type Patch = MessagePatch;

    const TABLE: &'static str = "Messages";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "fromId",
        "fromName",
        "toId",
        "toName",
        "subject",
        "content",
        "read",
        "createdAt",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    fn to_cells(&self) -> Result<Cells> {
        Ok(cells([
            ("id", self.id.clone()),
            ("fromId", self.from_id.clone()),
            ("fromName", self.from_name.clone()),
            ("toId", self.to_id.clone()),
            ("toName", self.to_name.clone()),
            ("subject", self.subject.clone()),
            ("content", self.content.clone()),
            ("read", format_bool(self.read)),
            ("createdAt", format_time(self.created_at)),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get("id").to_string(),
            from_id: row.get("fromId").to_string(),
            from_name: row.get("fromName").to_string(),
            to_id: row.get("toId").to_string(),
            to_name: row.get("toName").to_string(),
            subject: row.get("subject").to_string(),
            content: row.get("content").to_string(),
            read: parse_bool(row.get("read")),
            created_at: parse_time(row.get("createdAt")),
        })
    }

    fn apply(&mut self, patch: &MessagePatch) {
        if let Some(subject) = &patch.subject {
            self.subject = subject.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(read) = patch.read {
            self.read = read;
        }
    }

    fn validate(&self) -> Result<()> {
        require(&self.from_id, "sender")?;
        require(&self.to_id, "recipient")?;
        if self.subject.trim().is_empty() && self.content.trim().is_empty() {
            return Err(Error::validation("message needs a subject or content"));
        }
        Ok(())
    }
}
