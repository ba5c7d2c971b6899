use crate::{
    ProjectsResult, Workspace,
    dashboard::StatusCounts,
    export::projects_csv,
    projects::{ProjectFilter, ProjectSummary},
};

#[derive(Clone, Debug)]
pub struct ProjectReport {
    pub rows: Vec<ProjectSummary>,
    pub total_budget: f64,
    pub status_counts: StatusCounts,
    pub average_completion: f64,
}

impl ProjectReport {
    pub fn from_rows(rows: Vec<ProjectSummary>) -> Self {
        let total_budget = rows.iter().map(|r| r.budget).sum();
        let status_counts = StatusCounts::tally(rows.iter().map(|r| &r.project));
        let average_completion = if rows.is_empty() {
            0.0
        } else {
            let sum: i64 = rows
                .iter()
                .map(|r| i64::from(r.project.completion_percentage))
                .sum();
            sum as f64 / rows.len() as f64
        };
        Self {
            rows,
            total_budget,
            status_counts,
            average_completion,
        }
    }
}

impl Workspace {
    pub async fn project_report(&self, filter: &ProjectFilter) -> ProjectsResult<ProjectReport> {
        let rows = self.list_projects(filter).await?;
        Ok(ProjectReport::from_rows(rows))
    }

    /// The filtered report as CSV text.
    pub async fn export_projects_csv(&self, filter: &ProjectFilter) -> ProjectsResult<String> {
        let rows = self.list_projects(filter).await?;
        projects_csv(&rows)
    }
}

#[cfg(test)]
mod tests {
    use entity::projects::{self, Status};
    use uuid::Uuid;

    use super::*;

    fn summary(status: Status, completion: i32, budget: f64) -> ProjectSummary {
        ProjectSummary {
            project: projects::Model {
                id: Uuid::new_v4(),
                name: "Quay".into(),
                project_type: None,
                start_date: None,
                end_date: None,
                vendor: None,
                description: None,
                status,
                completion_percentage: completion,
                created_by: Uuid::new_v4(),
                created_at: None,
            },
            budget,
            activity_count: 1,
        }
    }

    #[test]
    fn empty_reports_are_all_zero() {
        let report = ProjectReport::from_rows(Vec::new());
        assert!(report.rows.is_empty());
        assert_eq!(report.total_budget, 0.0);
        assert_eq!(report.status_counts, StatusCounts::default());
        assert_eq!(report.average_completion, 0.0);
    }

    #[test]
    fn totals_cover_every_row() {
        let report = ProjectReport::from_rows(vec![
            summary(Status::Ongoing, 20, 1000.0),
            summary(Status::Completed, 100, 250.5),
            summary(Status::Delayed, 45, 0.0),
            summary(Status::Ongoing, 0, 49.5),
        ]);
        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.total_budget, 1300.0);
        assert_eq!(
            report.status_counts,
            StatusCounts {
                ongoing: 2,
                completed: 1,
                delayed: 1,
            }
        );
        assert_eq!(report.average_completion, 41.25);
    }
}
