use chrono::NaiveDate;
use csv::WriterBuilder;

use crate::{ProjectsError, ProjectsResult, projects::ProjectSummary};

pub const REPORT_HEADERS: [&str; 7] = [
    "Project Name",
    "Vendor",
    "Status",
    "Start Date",
    "End Date",
    "Completion %",
    "Total Budget",
];

fn date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Render project summaries as the report CSV.
pub fn projects_csv(rows: &[ProjectSummary]) -> ProjectsResult<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(REPORT_HEADERS).map_err(export_error)?;
    for row in rows {
        let project = &row.project;
        writer
            .write_record([
                project.name.clone(),
                project.vendor.clone().unwrap_or_default(),
                project.status.label().to_string(),
                date(project.start_date),
                date(project.end_date),
                project.completion_percentage.to_string(),
                format!("{:.2}", row.budget),
            ])
            .map_err(export_error)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| export_error(err.into_error().into()))?;
    String::from_utf8(bytes).map_err(|err| ProjectsError::Export(err.to_string()))
}

fn export_error(err: csv::Error) -> ProjectsError {
    ProjectsError::Export(err.to_string())
}

#[cfg(test)]
mod tests {
    use entity::projects::{self, Status};
    use uuid::Uuid;

    use super::*;

    fn summary(name: &str, vendor: Option<&str>, budget: f64) -> ProjectSummary {
        ProjectSummary {
            project: projects::Model {
                id: Uuid::new_v4(),
                name: name.into(),
                project_type: None,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 15),
                end_date: None,
                vendor: vendor.map(String::from),
                description: None,
                status: Status::Delayed,
                completion_percentage: 40,
                created_by: Uuid::new_v4(),
                created_at: None,
            },
            budget,
            activity_count: 1,
        }
    }

    #[test]
    fn writes_report_columns() {
        let csv = projects_csv(&[
            summary("Bridge", Some("Acme, Inc."), 1234.5),
            summary("Road", None, 0.0),
        ])
        .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Project Name,Vendor,Status,Start Date,End Date,Completion %,Total Budget"
        );
        assert_eq!(lines[1], "Bridge,\"Acme, Inc.\",Delayed,2024-01-15,,40,1234.50");
        assert_eq!(lines[2], "Road,,Delayed,2024-01-15,,40,0.00");
    }
}
