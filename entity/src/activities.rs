use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Record, Table};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    /// Row index on the project form.
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Model {
    const TABLE: Table = Table::Activities;
}

impl Model {
    pub fn amount(&self) -> f64 {
        self.quantity * self.rate
    }

    /// Insert payload reproducing this row, used to restore a snapshot.
    pub fn to_draft(&self) -> Draft {
        Draft {
            id: self.id,
            project_id: self.project_id,
            name: self.name.clone(),
            quantity: self.quantity,
            unit: self.unit.clone(),
            rate: self.rate,
            start_date: self.start_date,
            end_date: self.end_date,
            assigned_to: self.assigned_to,
            position: self.position,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Draft {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub rate: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
    pub position: i32,
}
