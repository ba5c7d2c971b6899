use entity::projects::{self, Status};

use crate::{
    ProjectsResult, Workspace,
    projects::{ProjectFilter, ProjectSummary},
};

const RECENT_PROJECTS: usize = 5;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusCounts {
    pub ongoing: usize,
    pub completed: usize,
    pub delayed: usize,
}

impl StatusCounts {
    pub fn tally<'a>(projects: impl IntoIterator<Item = &'a projects::Model>) -> Self {
        let mut counts = Self::default();
        for project in projects {
            match project.status {
                Status::Ongoing => counts.ongoing += 1,
                Status::Completed => counts.completed += 1,
                Status::Delayed => counts.delayed += 1,
            }
        }
        counts
    }
}

#[derive(Clone, Debug)]
pub struct DashboardSummary {
    pub total_projects: usize,
    pub status_counts: StatusCounts,
    pub total_budget: f64,
    pub recent_projects: Vec<ProjectSummary>,
    pub unread_notifications: usize,
}

impl Workspace {
    pub async fn dashboard(&self) -> ProjectsResult<DashboardSummary> {
        let summaries = self.list_projects(&ProjectFilter::default()).await?;
        let unread_notifications = self.unread_notification_count().await?;
        Ok(DashboardSummary {
            total_projects: summaries.len(),
            status_counts: StatusCounts::tally(summaries.iter().map(|s| &s.project)),
            total_budget: summaries.iter().map(|s| s.budget).sum(),
            recent_projects: summaries.into_iter().take(RECENT_PROJECTS).collect(),
            unread_notifications,
        })
    }
}
