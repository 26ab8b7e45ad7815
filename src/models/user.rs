use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    cells, format_bool, format_time, opt, parse_bool, parse_json, parse_time, require, to_json,
    Cells, Record,
};
use crate::error::Result;
use crate::store::Row;

/// Staff role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Receptionist,
    Technician,
    Warehouse,
    Detailing,
    Accountant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Receptionist => "receptionist",
            Role::Technician => "technician",
            Role::Warehouse => "warehouse",
            Role::Detailing => "detailing",
            Role::Accountant => "accountant",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "technician" => Role::Technician,
            "warehouse" => Role::Warehouse,
            "detailing" => Role::Detailing,
            "accountant" => Role::Accountant,
            _ => Role::Receptionist,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named permission flags, stored as a JSON object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Permissions(pub BTreeMap<String, bool>);

impl Permissions {
    pub fn allows(&self, permission: &str) -> bool {
        self.0.get(permission).copied().unwrap_or(false)
    }

    pub fn grant(mut self, permission: &str) -> Self {
        self.0.insert(permission.to_string(), true);
        self
    }
}

/// A staff member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
    pub permissions: Permissions,
    /// Id of the linked external sign-in account
    pub auth_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: &str, name: &str, role: Role) -> Self {
        Self {
            username: username.to_string(),
            name: name.to_string(),
            role,
            active: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub permissions: Option<Permissions>,
    /// `Some(None)` unlinks the external account
    pub auth_id: Option<Option<String>>,
}

impl Record for User {
    type Patch = UserPatch;

    const TABLE: &'static str = "Users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "username",
        "name",
        "role",
        "active",
        "permissions",
        "authId",
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
            ("username", self.username.clone()),
            ("name", self.name.clone()),
            ("role", self.role.as_str().to_string()),
            ("active", format_bool(self.active)),
            ("permissions", to_json(&self.permissions)?),
            ("authId", self.auth_id.clone().unwrap_or_default()),
            ("createdAt", format_time(self.created_at)),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get("id").to_string(),
            username: row.get("username").trim().to_string(),
            name: row.get("name").to_string(),
            role: Role::parse(row.get("role")),
            active: parse_bool(row.get("active")),
            permissions: parse_json(Self::TABLE, row, "permissions")?,
            auth_id: opt(row.get("authId")),
            created_at: parse_time(row.get("createdAt")),
        })
    }

    fn apply(&mut self, patch: &UserPatch) {
        if let Some(username) = &patch.username {
            self.username = username.trim().to_string();
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(permissions) = &patch.permissions {
            self.permissions = permissions.clone();
        }
        if let Some(auth_id) = &patch.auth_id {
            self.auth_id = auth_id.clone();
        }
    }

    fn validate(&self) -> Result<()> {
        require(&self.username, "username")?;
        require(&self.name, "name")
    }
}
