use async_graphql::{Context, ID, Object};
use products_projects::{BudgetPreview, projects::ProjectSubmission};
use tracing::instrument;

use super::{
    gql_error, parse_optional_uuid, parse_uuid, require_viewer,
    types::{
        ActivityRowInput, ActivityRowNode, BudgetPreviewNode, DashboardNode, ProjectDetailNode,
        ProjectFieldsInput, ProjectFilterInput, ProjectFormNode, ProjectNode, ProjectSummaryNode,
        ReportNode, into_rows,
    },
};

#[derive(Default)]
pub struct ProjectsQuery;

#[Object]
impl ProjectsQuery {
    #[instrument(name = "graphql.projects", skip_all)]
    async fn projects(
        &self,
        ctx: &Context<'_>,
        filter: Option<ProjectFilterInput>,
    ) -> async_graphql::Result<Vec<ProjectSummaryNode>> {
        let viewer = require_viewer(ctx)?;
        let filter = filter.unwrap_or_default().into();
        let rows = viewer
            .workspace
            .list_projects(&filter)
            .await
            .map_err(gql_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(name = "graphql.project", skip_all)]
    async fn project(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<ProjectDetailNode> {
        let viewer = require_viewer(ctx)?;
        let detail = viewer
            .workspace
            .project_detail(parse_uuid(&id)?)
            .await
            .map_err(gql_error)?;
        Ok(detail.into())
    }

    /// Current values of a project for the edit form.
    async fn project_form(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<ProjectFormNode> {
        let viewer = require_viewer(ctx)?;
        let form = viewer
            .workspace
            .project_form(parse_uuid(&id)?)
            .await
            .map_err(gql_error)?;
        Ok(form.into())
    }

    /// Line amounts and total for unsaved activity rows.
    async fn budget_preview(
        &self,
        ctx: &Context<'_>,
        activities: Vec<ActivityRowInput>,
    ) -> async_graphql::Result<BudgetPreviewNode> {
        require_viewer(ctx)?;
        Ok(BudgetPreview::of(&into_rows(activities)?).into())
    }

    /// Parse an activity CSV into form rows without saving anything.
    async fn import_activities(
        &self,
        ctx: &Context<'_>,
        csv: String,
    ) -> async_graphql::Result<Vec<ActivityRowNode>> {
        let viewer = require_viewer(ctx)?;
        let rows = viewer.workspace.import_activities(&csv).map_err(gql_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(name = "graphql.dashboard", skip_all)]
    async fn dashboard(&self, ctx: &Context<'_>) -> async_graphql::Result<DashboardNode> {
        let viewer = require_viewer(ctx)?;
        let summary = viewer.workspace.dashboard().await.map_err(gql_error)?;
        Ok(summary.into())
    }

    #[instrument(name = "graphql.report", skip_all)]
    async fn report(
        &self,
        ctx: &Context<'_>,
        filter: Option<ProjectFilterInput>,
    ) -> async_graphql::Result<ReportNode> {
        let viewer = require_viewer(ctx)?;
        let filter = filter.unwrap_or_default().into();
        let report = viewer
            .workspace
            .project_report(&filter)
            .await
            .map_err(gql_error)?;
        Ok(report.into())
    }
}

#[derive(Default)]
pub struct ProjectsMutation;

#[Object]
impl ProjectsMutation {
    /// `idempotency_key` makes a retried submission resume the first one
    /// instead of creating a second project.
    #[instrument(name = "graphql.create_project", skip_all)]
    async fn create_project(
        &self,
        ctx: &Context<'_>,
        input: ProjectFieldsInput,
        #[graphql(default)] activities: Vec<ActivityRowInput>,
        idempotency_key: Option<ID>,
    ) -> async_graphql::Result<ProjectNode> {
        let viewer = require_viewer(ctx)?;
        let submission = ProjectSubmission {
            project: input.into(),
            activities: into_rows(activities)?,
            idempotency_key: parse_optional_uuid(idempotency_key.as_ref())?,
        };
        let project = viewer
            .workspace
            .create_project(submission)
            .await
            .map_err(gql_error)?;
        Ok(project.into())
    }

    #[instrument(name = "graphql.update_project", skip_all)]
    async fn update_project(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: ProjectFieldsInput,
        #[graphql(default)] activities: Vec<ActivityRowInput>,
    ) -> async_graphql::Result<ProjectNode> {
        let viewer = require_viewer(ctx)?;
        let submission = ProjectSubmission {
            project: input.into(),
            activities: into_rows(activities)?,
            idempotency_key: None,
        };
        let project = viewer
            .workspace
            .update_project(parse_uuid(&id)?, submission)
            .await
            .map_err(gql_error)?;
        Ok(project.into())
    }

    #[instrument(name = "graphql.delete_project", skip_all)]
    async fn delete_project(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let viewer = require_viewer(ctx)?;
        viewer
            .workspace
            .delete_project(parse_uuid(&id)?)
            .await
            .map_err(gql_error)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use entity::{Table, users::Role};
    use serde_json::json;

    use crate::graphql::testing::{Harness, error_code};

    const CREATE: &str = r#"
        mutation($input: ProjectFieldsInput!, $activities: [ActivityRowInput!]!) {
            createProject(input: $input, activities: $activities) { id name status }
        }
    "#;

    #[tokio::test]
    async fn create_then_list_reports_budget() {
        let harness = Harness::new();
        let viewer = harness.viewer("pm@example.test", Role::Manager).await;
        let response = harness
            .run(
                Some(&viewer),
                CREATE,
                json!({
                    "input": {"name": "Harbour Wall", "status": "ONGOING"},
                    "activities": [
                        {"name": "Piling", "quantity": "4", "rate": "250"},
                        {"name": "Survey", "quantity": "1", "rate": "1,000"}
                    ]
                }),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(harness.memory.rows(Table::Activities).len(), 2);

        let response = harness
            .run(
                Some(&viewer),
                "{ projects { project { name } budget activityCount } }",
                json!({}),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"projects": [
                {"project": {"name": "Harbour Wall"}, "budget": 2000.0, "activityCount": 2}
            ]})
        );
    }

    #[tokio::test]
    async fn invalid_projects_report_field_errors() {
        let harness = Harness::new();
        let viewer = harness.viewer("pm@example.test", Role::Manager).await;
        let response = harness
            .run(
                Some(&viewer),
                CREATE,
                json!({
                    "input": {"name": " ", "completionPercentage": 140},
                    "activities": []
                }),
            )
            .await;
        assert_eq!(error_code(&response).as_deref(), Some("VALIDATION"));
        assert!(harness.memory.rows(Table::Projects).is_empty());
    }

    #[tokio::test]
    async fn budget_preview_sums_rows() {
        let harness = Harness::new();
        let viewer = harness.viewer("pm@example.test", Role::Employee).await;
        let response = harness
            .run(
                Some(&viewer),
                r#"query($rows: [ActivityRowInput!]!) { budgetPreview(activities: $rows) { amounts total } }"#,
                json!({"rows": [
                    {"name": "a", "quantity": "2", "rate": "10"},
                    {"name": "b", "quantity": "x", "rate": "10"}
                ]}),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"budgetPreview": {"amounts": [20.0, 0.0], "total": 20.0}})
        );
    }

    #[tokio::test]
    async fn report_totals_follow_the_filter() {
        let harness = Harness::new();
        let viewer = harness.viewer("pm@example.test", Role::Manager).await;
        for (name, vendor, status, completion, rate) in [
            ("Quay wall", "Acme", "ONGOING", 40, "100"),
            ("Slipway", "Acme", "COMPLETED", 100, "300"),
            ("Boathouse", "Borealis", "DELAYED", 10, "999"),
        ] {
            let response = harness
                .run(
                    Some(&viewer),
                    CREATE,
                    json!({
                        "input": {
                            "name": name,
                            "vendor": vendor,
                            "status": status,
                            "completionPercentage": completion
                        },
                        "activities": [{"name": "Work", "quantity": "1", "rate": rate}]
                    }),
                )
                .await;
            assert!(response.errors.is_empty(), "{:?}", response.errors);
        }

        let response = harness
            .run(
                Some(&viewer),
                r#"query($filter: ProjectFilterInput) {
                    report(filter: $filter) {
                        totalBudget averageCompletion
                        statusCounts { ongoing completed delayed }
                        rows { project { name } }
                    }
                }"#,
                json!({"filter": {"vendor": "Acme"}}),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let data = response.data.into_json().unwrap();
        let report = &data["report"];
        assert_eq!(report["totalBudget"], 400.0);
        assert_eq!(report["averageCompletion"], 70.0);
        assert_eq!(
            report["statusCounts"],
            json!({"ongoing": 1, "completed": 1, "delayed": 0})
        );
        assert_eq!(report["rows"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn import_rejects_csv_without_name_column() {
        let harness = Harness::new();
        let viewer = harness.viewer("pm@example.test", Role::Employee).await;
        let response = harness
            .run(
                Some(&viewer),
                "query($csv: String!) { importActivities(csv: $csv) { name } }",
                json!({"csv": "Qty,Rate\n1,2\n"}),
            )
            .await;
        assert_eq!(error_code(&response).as_deref(), Some("VALIDATION"));
    }
}
