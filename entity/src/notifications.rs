use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Record, Table};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Model {
    const TABLE: Table = Table::Notifications;
}

#[derive(Clone, Debug, Serialize)]
pub struct Draft {
    pub user_id: Uuid,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
}

impl Draft {
    pub fn unread(user_id: Uuid, message: impl Into<String>, link: Option<String>) -> Self {
        Self {
            user_id,
            message: message.into(),
            link,
            read: false,
        }
    }
}
