use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Record, Table};

/// Key of the single global settings row.
pub const SETTINGS_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: i32,
    #[serde(default)]
    pub allowed_file_types: Vec<String>,
    #[serde(default)]
    pub project_types: Vec<String>,
    #[serde(default)]
    pub vendors: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Model {
    const TABLE: Table = Table::Settings;
}

impl Default for Model {
    fn default() -> Self {
        Self {
            id: SETTINGS_ID,
            allowed_file_types: ["pdf", "png", "jpg", "jpeg", "doc", "docx", "xls", "xlsx", "csv"]
                .into_iter()
                .map(String::from)
                .collect(),
            project_types: Vec::new(),
            vendors: Vec::new(),
            updated_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Changes {
    pub allowed_file_types: Vec<String>,
    pub project_types: Vec<String>,
    pub vendors: Vec<String>,
}

/// Insert payload used when the singleton row does not exist yet.
#[derive(Clone, Debug, Serialize)]
pub struct Draft {
    pub id: i32,
    #[serde(flatten)]
    pub fields: Changes,
}
