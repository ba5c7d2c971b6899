use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Record, Table};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Pending,
    Admin,
    Manager,
    Vendor,
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Pending => "pending",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Vendor => "vendor",
            Role::Employee => "employee",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Role::Pending),
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "vendor" => Some(Role::Vendor),
            "employee" => Some(Role::Employee),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Model {
    const TABLE: Table = Table::Users;
}

/// Profile row written right after sign-up. The id is the auth user id.
#[derive(Clone, Debug, Serialize)]
pub struct Draft {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub approved: bool,
}

impl Draft {
    pub fn pending(id: Uuid, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            role: Role::Pending,
            approved: false,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Changes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
}
