use async_graphql::{Context, ID, InputObject, Object};
use products_projects::comments::NewComment;
use tracing::instrument;

use super::{
    gql_error, parse_optional_uuid, parse_uuid, require_viewer,
    types::{CommentNode, FileNode, NotificationNode},
};

#[derive(Clone, Debug, InputObject)]
pub struct NewCommentInput {
    pub project_id: ID,
    pub activity_id: Option<ID>,
    /// Set when replying to another comment.
    pub parent_id: Option<ID>,
    pub content: String,
}

#[derive(Default)]
pub struct CollabQuery;

#[Object]
impl CollabQuery {
    async fn files(
        &self,
        ctx: &Context<'_>,
        project_id: ID,
        activity_id: Option<ID>,
    ) -> async_graphql::Result<Vec<FileNode>> {
        let viewer = require_viewer(ctx)?;
        let files = viewer
            .workspace
            .list_files(parse_uuid(&project_id)?, parse_optional_uuid(activity_id.as_ref())?)
            .await
            .map_err(gql_error)?;
        Ok(files.into_iter().map(Into::into).collect())
    }

    /// Top-level comments of a project with their replies nested.
    async fn comments(
        &self,
        ctx: &Context<'_>,
        project_id: ID,
    ) -> async_graphql::Result<Vec<CommentNode>> {
        let viewer = require_viewer(ctx)?;
        let threads = viewer
            .workspace
            .comment_threads(parse_uuid(&project_id)?)
            .await
            .map_err(gql_error)?;
        Ok(threads.into_iter().map(Into::into).collect())
    }

    async fn notifications(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] unread_only: bool,
    ) -> async_graphql::Result<Vec<NotificationNode>> {
        let viewer = require_viewer(ctx)?;
        let rows = viewer
            .workspace
            .list_notifications(unread_only)
            .await
            .map_err(gql_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn unread_count(&self, ctx: &Context<'_>) -> async_graphql::Result<i32> {
        let viewer = require_viewer(ctx)?;
        let count = viewer
            .workspace
            .unread_notification_count()
            .await
            .map_err(gql_error)?;
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }
}

#[derive(Default)]
pub struct CollabMutation;

#[Object]
impl CollabMutation {
    #[instrument(name = "graphql.add_comment", skip_all)]
    async fn add_comment(
        &self,
        ctx: &Context<'_>,
        input: NewCommentInput,
    ) -> async_graphql::Result<CommentNode> {
        let viewer = require_viewer(ctx)?;
        let comment = viewer
            .workspace
            .add_comment(NewComment {
                project_id: parse_uuid(&input.project_id)?,
                activity_id: parse_optional_uuid(input.activity_id.as_ref())?,
                parent_id: parse_optional_uuid(input.parent_id.as_ref())?,
                content: input.content,
            })
            .await
            .map_err(gql_error)?;
        Ok(CommentNode::from_model(comment, Vec::new()))
    }

    #[instrument(name = "graphql.delete_comment", skip_all)]
    async fn delete_comment(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let viewer = require_viewer(ctx)?;
        viewer
            .workspace
            .delete_comment(parse_uuid(&id)?)
            .await
            .map_err(gql_error)?;
        Ok(true)
    }

    #[instrument(name = "graphql.delete_file", skip_all)]
    async fn delete_file(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let viewer = require_viewer(ctx)?;
        viewer
            .workspace
            .delete_file(parse_uuid(&id)?)
            .await
            .map_err(gql_error)?;
        Ok(true)
    }

    async fn mark_notification_read(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<NotificationNode> {
        let viewer = require_viewer(ctx)?;
        let row = viewer
            .workspace
            .mark_notification_read(parse_uuid(&id)?)
            .await
            .map_err(gql_error)?;
        Ok(row.into())
    }

    /// Returns how many notifications changed.
    async fn mark_all_notifications_read(&self, ctx: &Context<'_>) -> async_graphql::Result<i32> {
        let viewer = require_viewer(ctx)?;
        let changed = viewer
            .workspace
            .mark_all_notifications_read()
            .await
            .map_err(gql_error)?;
        Ok(i32::try_from(changed).unwrap_or(i32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use entity::{Table, projects, users::Role};
    use products_projects::projects::{ProjectInput, ProjectSubmission};
    use serde_json::json;

    use crate::{
        graphql::testing::{Harness, error_code},
        session::Viewer,
    };

    async fn seed_project(viewer: &Viewer) -> projects::Model {
        viewer
            .workspace
            .create_project(ProjectSubmission {
                project: ProjectInput {
                    name: "Depot".into(),
                    project_type: None,
                    start_date: None,
                    end_date: None,
                    vendor: None,
                    description: None,
                    status: projects::Status::Ongoing,
                    completion_percentage: 0,
                },
                activities: Vec::new(),
                idempotency_key: None,
            })
            .await
            .unwrap()
    }

    const ADD: &str = r#"
        mutation($input: NewCommentInput!) { addComment(input: $input) { id content } }
    "#;

    #[tokio::test]
    async fn replies_nest_under_their_parent_and_notify_the_owner() {
        let harness = Harness::new();
        let owner = harness.viewer("owner@example.test", Role::Manager).await;
        let peer = harness.viewer("peer@example.test", Role::Employee).await;
        let project = seed_project(&owner).await;

        let response = harness
            .run(
                Some(&peer),
                ADD,
                json!({"input": {"projectId": project.id.to_string(), "content": "Ready?"}}),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let parent = response.data.into_json().unwrap()["addComment"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = harness
            .run(
                Some(&owner),
                ADD,
                json!({"input": {
                    "projectId": project.id.to_string(),
                    "parentId": parent,
                    "content": "Yes"
                }}),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let response = harness
            .run(
                Some(&peer),
                "query($p: ID!) { comments(projectId: $p) { content replies { content } } }",
                json!({"p": project.id.to_string()}),
            )
            .await;
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"comments": [{"content": "Ready?", "replies": [{"content": "Yes"}]}]})
        );

        let response = harness.run(Some(&owner), "{ unreadCount }", json!({})).await;
        assert_eq!(response.data.into_json().unwrap(), json!({"unreadCount": 1}));
        let response = harness
            .run(Some(&owner), "mutation { markAllNotificationsRead }", json!({}))
            .await;
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"markAllNotificationsRead": 1})
        );
    }

    #[tokio::test]
    async fn only_the_author_or_an_admin_deletes_a_comment() {
        let harness = Harness::new();
        let owner = harness.viewer("owner@example.test", Role::Manager).await;
        let other = harness.viewer("other@example.test", Role::Employee).await;
        let project = seed_project(&owner).await;
        let response = harness
            .run(
                Some(&owner),
                ADD,
                json!({"input": {"projectId": project.id.to_string(), "content": "note"}}),
            )
            .await;
        let id = response.data.into_json().unwrap()["addComment"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = harness
            .run(
                Some(&other),
                "mutation($id: ID!) { deleteComment(id: $id) }",
                json!({"id": id}),
            )
            .await;
        assert_eq!(error_code(&response).as_deref(), Some("FORBIDDEN"));
        assert_eq!(harness.memory.rows(Table::Comments).len(), 1);
    }
}
