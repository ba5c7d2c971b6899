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
    pub user_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Model {
    const TABLE: Table = Table::Comments;
}

#[derive(Clone, Debug, Serialize)]
pub struct Draft {
    pub project_id: Uuid,
    pub activity_id: Option<Uuid>,
    pub user_id: Uuid,
    pub content: String,
    pub parent_id: Option<Uuid>,
}
