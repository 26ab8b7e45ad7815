use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{cells, format_time, parse_json, parse_time, require, to_json, Cells, Record, Status};
use crate::error::Result;
use crate::store::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user a task is assigned to. `name` is a display label only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Assignee {
    pub user_id: String,
    pub name: String,
}

/// Vehicle a task works on. `label` is a display label only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleRef {
    pub reception_id: String,
    pub vehicle_id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub status: Status,
    pub description: String,
    pub actor: String,
}

impl HistoryEntry {
    pub fn now(status: Status, description: impl Into<String>, actor: &str) -> Self {
        Self {
            date: Utc::now(),
            status,
            description: description.into(),
            actor: actor.to_string(),
        }
    }
}

/// A unit of work on a vehicle. `history` is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub assigned_to: Option<Assignee>,
    pub vehicle: Option<VehicleRef>,
    pub images: Vec<String>,
    pub history: Vec<HistoryEntry>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: String,
}

impl Task {
    pub fn new(title: &str, created_by: &str) -> Self {
        Self {
            title: title.to_string(),
            created_by: created_by.to_string(),
            ..Default::default()
        }
    }

    pub fn with_vehicle(mut self, vehicle: VehicleRef) -> Self {
        self.vehicle = Some(vehicle);
        self
    }

    pub fn with_assignee(mut self, user_id: &str, name: &str) -> Self {
        self.assigned_to = Some(Assignee {
            user_id: user_id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Status is absent on purpose: status writes go through
/// `TaskStore::set_status` so history stays in step.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<Option<Assignee>>,
    pub vehicle: Option<Option<VehicleRef>>,
    pub images: Option<Vec<String>>,
}

impl Record for Task {
    type Patch = TaskPatch;

    const TABLE: &'static str = "Tasks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "status",
        "priority",
        "assignedTo",
        "vehicle",
        "images",
        "history",
        "createdAt",
        "createdBy",
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
        let assigned_to = match &self.assigned_to {
            Some(assignee) => to_json(assignee)?,
            None => String::new(),
        };
        let vehicle = match &self.vehicle {
            Some(vehicle) => to_json(vehicle)?,
            None => String::new(),
        };
        Ok(cells([
            ("id", self.id.clone()),
            ("title", self.title.clone()),
            ("description", self.description.clone()),
            ("status", self.status.as_str().to_string()),
            ("priority", self.priority.as_str().to_string()),
            ("assignedTo", assigned_to),
            ("vehicle", vehicle),
            ("images", to_json(&self.images)?),
            ("history", to_json(&self.history)?),
            ("createdAt", format_time(self.created_at)),
            ("createdBy", self.created_by.clone()),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        let assigned_to: Option<Assignee> = parse_json(Self::TABLE, row, "assignedTo")?;
        let vehicle: Option<VehicleRef> = parse_json(Self::TABLE, row, "vehicle")?;
        Ok(Self {
            id: row.get("id").to_string(),
            title: row.get("title").to_string(),
            description: row.get("description").to_string(),
            status: Status::parse(row.get("status")),
            priority: Priority::parse(row.get("priority")),
            assigned_to,
            vehicle,
            images: parse_json(Self::TABLE, row, "images")?,
            history: parse_json(Self::TABLE, row, "history")?,
            created_at: parse_time(row.get("createdAt")),
            created_by: row.get("createdBy").to_string(),
        })
    }

    fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(assigned_to) = &patch.assigned_to {
            self.assigned_to = assigned_to.clone();
        }
        if let Some(vehicle) = &patch.vehicle {
            self.vehicle = vehicle.clone();
        }
        if let Some(images) = &patch.images {
            self.images = images.clone();
        }
    }

    fn validate(&self) -> Result<()> {
        require(&self.title, "title")
    }
}
