use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use entity::{activities, files, projects};
use platform_authz::{Action, PolicyEngine};
use platform_backend::{Direction, Filter, Select};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    ActivityRow, BudgetPreview, ProjectsError, ProjectsResult, Workspace,
    budget::{BudgetLine, activities_budget, budgets_by_project},
    comments::CommentThread,
    csv_import::parse_activity_csv,
    files::storage_path_of,
    saga::Saga,
    validation::validate_project,
};

/// Project fields as submitted by the new/edit form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInput {
    pub name: String,
    pub project_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub status: projects::Status,
    pub completion_percentage: i32,
}

impl ProjectInput {
    pub fn from_model(model: &projects::Model) -> Self {
        Self {
            name: model.name.clone(),
            project_type: model.project_type.clone(),
            start_date: model.start_date,
            end_date: model.end_date,
            vendor: model.vendor.clone(),
            description: model.description.clone(),
            status: model.status,
            completion_percentage: model.completion_percentage,
        }
    }
}

/// A full form submission: the project and its activity rows.
#[derive(Clone, Debug, Default)]
pub struct ProjectSubmission {
    pub project: ProjectInput,
    pub activities: Vec<ActivityRow>,
    /// Makes a create safe to resubmit. Used as the project id.
    pub idempotency_key: Option<Uuid>,
}

#[derive(Clone, Debug, Default)]
pub struct ProjectFilter {
    pub status: Option<projects::Status>,
    pub vendor: Option<String>,
    /// Case-insensitive match on name or vendor.
    pub search: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectSummary {
    pub project: projects::Model,
    pub budget: f64,
    pub activity_count: usize,
}

#[derive(Clone, Debug)]
pub struct ProjectDetail {
    pub project: projects::Model,
    pub activities: Vec<activities::Model>,
    pub budget: f64,
    pub files: Vec<files::Model>,
    pub comments: Vec<CommentThread>,
    pub can_edit: bool,
}

/// The edit form, pre-filled from the stored project.
#[derive(Clone, Debug)]
pub struct ProjectForm {
    pub project: projects::Model,
    pub input: ProjectInput,
    pub activities: Vec<ActivityRow>,
    pub budget: BudgetPreview,
}

/// Id of the `index`-th activity created together with `project_id`.
/// Stable across retries so a resubmitted create never duplicates rows.
pub fn activity_id(project_id: Uuid, index: usize) -> Uuid {
    Uuid::new_v5(&project_id, format!("activity:{index}").as_bytes())
}

fn search_matches(project: &projects::Model, needle: &str) -> bool {
    project.name.to_lowercase().contains(needle)
        || project
            .vendor
            .as_deref()
            .is_some_and(|vendor| vendor.to_lowercase().contains(needle))
}

impl Workspace {
    async fn require_project(&self, project_id: Uuid) -> ProjectsResult<projects::Model> {
        self.client
            .find::<projects::Model>(project_id)
            .await?
            .ok_or(ProjectsError::NotFound("project"))
    }

    async fn project_activities(&self, project_id: Uuid) -> ProjectsResult<Vec<activities::Model>> {
        Ok(self
            .client
            .fetch::<activities::Model>(
                &Select::of::<activities::Model>()
                    .eq("project_id", project_id)
                    .order_by("position", Direction::Asc)
                    .order_by("created_at", Direction::Asc),
            )
            .await?)
    }

    /// Create a project and its activities.
    ///
    /// The project row goes in first, then all activities in one insert. If
    /// the activities fail the project is deleted again. With an idempotency
    /// key a retry picks up an existing project and inserts only the
    /// activities that are still missing. A resumed attempt never deletes the
    /// project it picked up, and it must carry the same project fields as the
    /// attempt that created it.
    #[instrument(skip_all, fields(user_id = %self.actor.user_id, rows = submission.activities.len()))]
    pub async fn create_project(
        &self,
        submission: ProjectSubmission,
    ) -> ProjectsResult<projects::Model> {
        let settings = self.load_settings().await?;
        let fields = validate_project(&submission.project, &submission.activities, &settings)
            .map_err(ProjectsError::Validation)?;

        let project_id = submission.idempotency_key.unwrap_or_else(Uuid::new_v4);
        let mut saga = Saga::new("create_project");

        let existing = match submission.idempotency_key {
            Some(key) => self.client.find::<projects::Model>(key).await?,
            None => None,
        };
        let (project, resumed) = match existing {
            Some(project) if project.created_by != self.actor.user_id => {
                return Err(ProjectsError::invalid("idempotencyKey", "is already in use"));
            }
            Some(project) if project.changes() != fields => {
                return Err(ProjectsError::invalid(
                    "idempotencyKey",
                    "was used for a project with different details",
                ));
            }
            Some(project) => {
                info!(%project_id, "resuming project creation");
                (project, true)
            }
            None => {
                let draft = projects::Draft {
                    id: project_id,
                    fields,
                    created_by: self.actor.user_id,
                };
                let project: projects::Model = self.client.insert_one(&draft).await?;
                let client = self.client.clone();
                saga.on_abort("insert project", async move {
                    client
                        .delete_by_id::<projects::Model>(project_id)
                        .await
                        .map(|_| ())
                });
                (project, false)
            }
        };

        let already_inserted: HashSet<Uuid> = if resumed {
            self.project_activities(project_id)
                .await?
                .into_iter()
                .map(|activity| activity.id)
                .collect()
        } else {
            HashSet::new()
        };
        let drafts: Vec<activities::Draft> = submission
            .activities
            .iter()
            .enumerate()
            .map(|(index, row)| row.to_draft(activity_id(project_id, index), project_id, index))
            .filter(|draft| !already_inserted.contains(&draft.id))
            .collect();

        if let Err(err) = self
            .client
            .insert::<activities::Model, _>(&drafts)
            .await
        {
            warn!(%project_id, error = %err, resumed, "activity insert failed, rolling back");
            saga.abort().await;
            return Err(err.into());
        }
        saga.commit();
        info!(%project_id, activities = drafts.len(), resumed, "project created");
        Ok(project)
    }

    /// Load the edit form for a project the user may change.
    pub async fn project_form(&self, project_id: Uuid) -> ProjectsResult<ProjectForm> {
        let project = self.require_project(project_id).await?;
        self.authorize(Action::EditProject {
            owner: project.created_by,
        })?;
        let activities: Vec<ActivityRow> = self
            .project_activities(project_id)
            .await?
            .iter()
            .map(ActivityRow::from_model)
            .collect();
        Ok(ProjectForm {
            input: ProjectInput::from_model(&project),
            budget: BudgetPreview::of(&activities),
            activities,
            project,
        })
    }

    /// Update a project and replace its activities.
    ///
    /// If replacing the activities fails, the previous activities are put
    /// back and the project fields restored.
    #[instrument(skip_all, fields(%project_id, user_id = %self.actor.user_id))]
    pub async fn update_project(
        &self,
        project_id: Uuid,
        submission: ProjectSubmission,
    ) -> ProjectsResult<projects::Model> {
        let previous = self.require_project(project_id).await?;
        self.authorize(Action::EditProject {
            owner: previous.created_by,
        })?;
        let settings = self.load_settings().await?;
        let changes = validate_project(&submission.project, &submission.activities, &settings)
            .map_err(ProjectsError::Validation)?;
        let snapshot = self.project_activities(project_id).await?;

        let mut saga = Saga::new("update_project");
        let by_id = [Filter::eq("id", project_id)];
        let project = self
            .client
            .update::<projects::Model, _>(&by_id, &changes)
            .await?
            .into_iter()
            .next()
            .ok_or(ProjectsError::NotFound("project"))?;
        let client = self.client.clone();
        let restore = previous.changes();
        saga.on_abort("update project", async move {
            client
                .update::<projects::Model, _>(&[Filter::eq("id", project_id)], &restore)
                .await
                .map(|_| ())
        });

        let by_project = [Filter::eq("project_id", project_id)];
        if let Err(err) = self.client.delete::<activities::Model>(&by_project).await {
            saga.abort().await;
            return Err(err.into());
        }
        if !snapshot.is_empty() {
            let client = self.client.clone();
            let drafts: Vec<activities::Draft> =
                snapshot.iter().map(activities::Model::to_draft).collect();
            saga.on_abort("replace activities", async move {
                client
                    .insert::<activities::Model, _>(&drafts)
                    .await
                    .map(|_| ())
            });
        }

        let drafts: Vec<activities::Draft> = submission
            .activities
            .iter()
            .enumerate()
            .map(|(index, row)| row.to_draft(Uuid::new_v4(), project_id, index))
            .collect();
        if let Err(err) = self.client.insert::<activities::Model, _>(&drafts).await {
            warn!(error = %err, "activity replace failed, restoring previous state");
            saga.abort().await;
            return Err(err.into());
        }
        saga.commit();
        info!(activities = drafts.len(), "project updated");
        Ok(project)
    }

    pub async fn list_projects(&self, filter: &ProjectFilter) -> ProjectsResult<Vec<ProjectSummary>> {
        let mut query =
            Select::of::<projects::Model>().order_by("created_at", Direction::Desc);
        if let Some(status) = filter.status {
            query = query.eq("status", status.as_str());
        }
        if let Some(vendor) = filter.vendor.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            query = query.eq("vendor", vendor);
        }
        let mut projects = self.client.fetch::<projects::Model>(&query).await?;
        if let Some(needle) = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
        {
            projects.retain(|project| search_matches(project, &needle));
        }
        self.summarize(projects).await
    }

    /// Attach derived budgets to `projects`, keeping their order.
    pub(crate) async fn summarize(
        &self,
        projects: Vec<projects::Model>,
    ) -> ProjectsResult<Vec<ProjectSummary>> {
        if projects.is_empty() {
            return Ok(Vec::new());
        }
        let lines = self
            .client
            .fetch::<BudgetLine>(
                &Select::of::<BudgetLine>()
                    .columns(BudgetLine::COLUMNS)
                    .is_in("project_id", projects.iter().map(|p| p.id)),
            )
            .await?;
        let budgets = budgets_by_project(&lines);
        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for line in &lines {
            *counts.entry(line.project_id).or_default() += 1;
        }
        Ok(projects
            .into_iter()
            .map(|project| ProjectSummary {
                budget: budgets.get(&project.id).copied().unwrap_or(0.0),
                activity_count: counts.get(&project.id).copied().unwrap_or(0),
                project,
            })
            .collect())
    }

    pub async fn project_detail(&self, project_id: Uuid) -> ProjectsResult<ProjectDetail> {
        let project = self.require_project(project_id).await?;
        let activities = self.project_activities(project_id).await?;
        let files = self.list_files(project_id, None).await?;
        let comments = self.comment_threads(project_id).await?;
        let can_edit = PolicyEngine.allows(
            &self.actor,
            &Action::EditProject {
                owner: project.created_by,
            },
        );
        Ok(ProjectDetail {
            budget: activities_budget(&activities),
            project,
            activities,
            files,
            comments,
            can_edit,
        })
    }

    /// Delete a project. Activities, files and comments go with it; the
    /// stored blobs are removed afterwards on a best-effort basis.
    #[instrument(skip_all, fields(%project_id, user_id = %self.actor.user_id))]
    pub async fn delete_project(&self, project_id: Uuid) -> ProjectsResult<()> {
        let project = self.require_project(project_id).await?;
        self.authorize(Action::DeleteProject {
            owner: project.created_by,
        })?;
        let paths: Vec<String> = self
            .list_files(project_id, None)
            .await?
            .iter()
            .filter_map(|file| storage_path_of(file, self.client.bucket()))
            .collect();

        self.client
            .delete_by_id::<projects::Model>(project_id)
            .await?;
        if let Err(err) = self.client.remove(&paths).await {
            warn!(error = %err, objects = paths.len(), "failed to remove project files from storage");
        }
        info!("project deleted");
        Ok(())
    }

    /// Parse an uploaded activity sheet. The rows replace the form's list.
    pub fn import_activities(&self, csv_text: &str) -> ProjectsResult<Vec<ActivityRow>> {
        Ok(parse_activity_csv(csv_text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_ids_are_stable_per_row() {
        let project = Uuid::new_v4();
        assert_eq!(activity_id(project, 3), activity_id(project, 3));
        assert_ne!(activity_id(project, 3), activity_id(project, 4));
        assert_ne!(activity_id(project, 0), activity_id(Uuid::new_v4(), 0));
    }

    #[test]
    fn search_checks_name_and_vendor() {
        let project = projects::Model {
            id: Uuid::new_v4(),
            name: "North Pier".into(),
            project_type: None,
            start_date: None,
            end_date: None,
            vendor: Some("Acme Marine".into()),
            description: None,
            status: projects::Status::Ongoing,
            completion_percentage: 0,
            created_by: Uuid::new_v4(),
            created_at: None,
        };
        assert!(search_matches(&project, "pier"));
        assert!(search_matches(&project, "marine"));
        assert!(!search_matches(&project, "bridge"));
    }
}
