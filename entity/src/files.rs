use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Record, Table};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(default)]
    pub activity_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub name: String,
    pub url: String,
    /// Object key inside the storage bucket. Older rows predate this column.
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Model {
    const TABLE: Table = Table::Files;
}

#[derive(Clone, Debug, Serialize)]
pub struct Draft {
    pub project_id: Uuid,
    pub activity_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub name: String,
    pub url: String,
    pub storage_path: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}
