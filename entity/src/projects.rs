use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Record, Table};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Ongoing,
    Completed,
    Delayed,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Ongoing, Status::Completed, Status::Delayed];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ongoing => "ongoing",
            Status::Completed => "completed",
            Status::Delayed => "delayed",
        }
    }

    /// Title-cased label used in exports.
    pub fn label(self) -> &'static str {
        match self {
            Status::Ongoing => "Ongoing",
            Status::Completed => "Completed",
            Status::Delayed => "Delayed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub completion_percentage: i32,
    pub created_by: Uuid,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Model {
    const TABLE: Table = Table::Projects;
}

impl Model {
    /// Editable fields of this row, as sent by an update.
    pub fn changes(&self) -> Changes {
        Changes {
            name: self.name.clone(),
            project_type: self.project_type.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            vendor: self.vendor.clone(),
            description: self.description.clone(),
            status: self.status,
            completion_percentage: self.completion_percentage,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Draft {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: Changes,
    pub created_by: Uuid,
}

/// The full editable field set; updates overwrite every column, so clearing
/// an optional field sends an explicit `null`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Changes {
    pub name: String,
    pub project_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub status: Status,
    pub completion_percentage: i32,
}
