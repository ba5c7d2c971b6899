use std::collections::HashMap;

use chrono::NaiveDate;
use entity::{Record, Table, activities};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One activity line as edited on the project form. Quantity and rate are
/// kept as typed so a half-entered number does not lose the user's input.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub rate: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
}

impl ActivityRow {
    pub fn quantity(&self) -> f64 {
        parse_number(&self.quantity)
    }

    pub fn rate(&self) -> f64 {
        parse_number(&self.rate)
    }

    pub fn amount(&self) -> f64 {
        self.quantity() * self.rate()
    }

    pub fn from_model(model: &activities::Model) -> Self {
        Self {
            name: model.name.clone(),
            quantity: model.quantity.to_string(),
            unit: model.unit.clone().unwrap_or_default(),
            rate: model.rate.to_string(),
            start_date: model.start_date,
            end_date: model.end_date,
            assigned_to: model.assigned_to,
        }
    }

    /// Insert payload for this row under `project_id`, kept at `position`
    /// on the form.
    pub fn to_draft(&self, id: Uuid, project_id: Uuid, position: usize) -> activities::Draft {
        let unit = self.unit.trim();
        activities::Draft {
            id,
            project_id,
            name: self.name.trim().to_string(),
            quantity: self.quantity(),
            unit: (!unit.is_empty()).then(|| unit.to_string()),
            rate: self.rate(),
            start_date: self.start_date,
            end_date: self.end_date,
            assigned_to: self.assigned_to,
            position: i32::try_from(position).unwrap_or(i32::MAX),
        }
    }
}

/// Lenient number parsing for form input: anything unparsable is zero.
pub fn parse_number(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Budget of the given rows: Σ quantity × rate.
pub fn total_budget(rows: &[ActivityRow]) -> f64 {
    rows.iter().map(ActivityRow::amount).sum()
}

/// Line amounts and their total for the rows currently on a form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BudgetPreview {
    pub amounts: Vec<f64>,
    pub total: f64,
}

impl BudgetPreview {
    pub fn of(rows: &[ActivityRow]) -> Self {
        let amounts: Vec<f64> = rows.iter().map(ActivityRow::amount).collect();
        let total = amounts.iter().sum();
        Self { amounts, total }
    }
}

/// The three activity columns a budget needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BudgetLine {
    pub project_id: Uuid,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub rate: f64,
}

impl Record for BudgetLine {
    const TABLE: Table = Table::Activities;
}

impl BudgetLine {
    pub const COLUMNS: &'static str = "project_id,quantity,rate";
}

/// Budget per project id. Projects without activities are absent.
pub fn budgets_by_project(lines: &[BudgetLine]) -> HashMap<Uuid, f64> {
    let mut totals = HashMap::new();
    for line in lines {
        *totals.entry(line.project_id).or_insert(0.0) += line.quantity * line.rate;
    }
    totals
}

pub fn activities_budget(activities: &[activities::Model]) -> f64 {
    activities.iter().map(activities::Model::amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(quantity: &str, rate: &str) -> ActivityRow {
        ActivityRow {
            name: "Excavation".into(),
            quantity: quantity.into(),
            rate: rate.into(),
            ..Default::default()
        }
    }

    #[test]
    fn unparsable_numbers_count_as_zero() {
        assert_eq!(parse_number("12.5"), 12.5);
        assert_eq!(parse_number(" 1,200 "), 1200.0);
        assert_eq!(parse_number("abc"), 0.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("NaN"), 0.0);
    }

    #[test]
    fn budget_is_sum_of_quantity_times_rate() {
        let mut rows = vec![row("2", "50"), row("3", "x"), row("1.5", "10")];
        assert_eq!(total_budget(&rows), 115.0);

        rows[1].rate = "20".into();
        let preview = BudgetPreview::of(&rows);
        assert_eq!(preview.amounts, vec![100.0, 60.0, 15.0]);
        assert_eq!(preview.total, 175.0);
    }

    #[test]
    fn drafts_trim_and_drop_blank_units() {
        let draft = ActivityRow {
            name: "  Pour ".into(),
            unit: " ".into(),
            ..row("4", "2.5")
        }
        .to_draft(Uuid::nil(), Uuid::nil(), 3);
        assert_eq!(draft.name, "Pour");
        assert_eq!(draft.position, 3);
        assert_eq!(draft.unit, None);
        assert_eq!(draft.quantity, 4.0);
        assert_eq!(draft.rate, 2.5);
    }

    #[test]
    fn budgets_group_by_project() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let lines = vec![
            BudgetLine { project_id: a, quantity: 2.0, rate: 3.0 },
            BudgetLine { project_id: b, quantity: 1.0, rate: 10.0 },
            BudgetLine { project_id: a, quantity: 1.0, rate: 4.0 },
        ];
        let totals = budgets_by_project(&lines);
        assert_eq!(totals[&a], 10.0);
        assert_eq!(totals[&b], 10.0);
    }
}
