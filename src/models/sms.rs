use std::fmt;

use autoshop_rust_sms::extract_placeholders;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{cells, format_time, opt, parse_json, parse_time, require, to_json, Cells, Record};
use crate::error::Result;
use crate::store::Row;

/// A reusable SMS text with `{variable}` placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SmsTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    /// Derived from `content` on every write
    pub variables: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl SmsTemplate {
    pub fn new(name: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            content: content.to_string(),
            variables: extract_placeholders(content),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmsTemplatePatch {
    pub name: Option<String>,
    pub content: Option<String>,
}

impl Record for SmsTemplate {
    type Patch = SmsTemplatePatch;

    const TABLE: &'static str = "SmsTemplates";
    const COLUMNS: &'static [&'static str] = &["id", "name", "content", "variables", "createdAt"];

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
            ("name", self.name.clone()),
            ("content", self.content.clone()),
            ("variables", to_json(&extract_placeholders(&self.content))?),
            ("createdAt", format_time(self.created_at)),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get("id").to_string(),
            name: row.get("name").to_string(),
            content: row.get("content").to_string(),
            variables: parse_json(Self::TABLE, row, "variables")?,
            created_at: parse_time(row.get("createdAt")),
        })
    }

    fn apply(&mut self, patch: &SmsTemplatePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
            self.variables = extract_placeholders(content);
        }
    }

    fn validate(&self) -> Result<()> {
        require(&self.name, "template name")?;
        require(&self.content, "template content")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmsSendStatus {
    #[default]
    Sent,
    Failed,
}

impl SmsSendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmsSendStatus::Sent => "sent",
            SmsSendStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SmsSendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One send attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SmsLog {
    pub id: String,
    pub to: String,
    pub text: String,
    pub template_id: Option<String>,
    pub status: SmsSendStatus,
    pub message_id: Option<String>,
    pub cost: f64,
    pub error: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct SmsLogPatch {
    pub status: Option<SmsSendStatus>,
    pub error: Option<Option<String>>,
}

impl Record for SmsLog {
    type Patch = SmsLogPatch;

    const TABLE: &'static str = "SmsLogs";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "to",
        "text",
        "templateId",
        "status",
        "messageId",
        "cost",
        "error",
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
            ("to", self.to.clone()),
            ("text", self.text.clone()),
            ("templateId", self.template_id.clone().unwrap_or_default()),
            ("status", self.status.as_str().to_string()),
            ("messageId", self.message_id.clone().unwrap_or_default()),
            ("cost", self.cost.to_string()),
            ("error", self.error.clone().unwrap_or_default()),
            ("createdAt", format_time(self.created_at)),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        let status = match row.get("status").trim() {
            "failed" => SmsSendStatus::Failed,
            _ => SmsSendStatus::Sent,
        };
        Ok(Self {
            id: row.get("id").to_string(),
            to: row.get("to").to_string(),
            text: row.get("text").to_string(),
            template_id: opt(row.get("templateId")),
            status,
            message_id: opt(row.get("messageId")),
            cost: row.get("cost").trim().parse().unwrap_or(0.0),
            error: opt(row.get("error")),
            created_at: parse_time(row.get("createdAt")),
        })
    }

    fn apply(&mut self, patch: &SmsLogPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(error) = &patch.error {
            self.error = error.clone();
        }
    }
}

/// Vendor settings, kept in local storage rather than a sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SmsSettings {
    pub api_key: String,
    pub line_number: String,
    pub base_url: String,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_variables_follow_content() {
        let mut template = SmsTemplate::new("ready", "Dear {name}, {plate} is ready");
        assert_eq!(template.variables, vec!["name", "plate"]);

        template.apply(&SmsTemplatePatch {
            content: Some("Code: {code}".into()),
            ..Default::default()
        });
        assert_eq!(template.variables, vec!["code"]);
        assert_eq!(template.to_cells().unwrap()["variables"], r#"["code"]"#);
    }
}
