use async_graphql::{Context, ID, Object};
use tracing::instrument;

use super::{
    gql_error, parse_uuid, require_viewer,
    types::{SettingsInput, SettingsNode, UserNode, UserRole},
};

#[derive(Default)]
pub struct AdminQuery;

#[Object]
impl AdminQuery {
    async fn users(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] pending_only: bool,
    ) -> async_graphql::Result<Vec<UserNode>> {
        let viewer = require_viewer(ctx)?;
        let users = viewer
            .workspace
            .list_users(pending_only)
            .await
            .map_err(gql_error)?;
        Ok(users.into_iter().map(Into::into).collect())
    }

    /// Readable by every signed-in user; the project form needs the lists.
    async fn settings(&self, ctx: &Context<'_>) -> async_graphql::Result<SettingsNode> {
        let viewer = require_viewer(ctx)?;
        let settings = viewer.workspace.settings().await.map_err(gql_error)?;
        Ok(settings.into())
    }
}

#[derive(Default)]
pub struct AdminMutation;

#[Object]
impl AdminMutation {
    #[instrument(name = "graphql.approve_user", skip_all)]
    async fn approve_user(
        &self,
        ctx: &Context<'_>,
        id: ID,
        role: Option<UserRole>,
    ) -> async_graphql::Result<UserNode> {
        let viewer = require_viewer(ctx)?;
        let user = viewer
            .workspace
            .approve_user(parse_uuid(&id)?, role.map(Into::into))
            .await
            .map_err(gql_error)?;
        Ok(user.into())
    }

    #[instrument(name = "graphql.set_user_role", skip_all)]
    async fn set_user_role(
        &self,
        ctx: &Context<'_>,
        id: ID,
        role: UserRole,
    ) -> async_graphql::Result<UserNode> {
        let viewer = require_viewer(ctx)?;
        let user = viewer
            .workspace
            .set_user_role(parse_uuid(&id)?, role.into())
            .await
            .map_err(gql_error)?;
        Ok(user.into())
    }

    #[instrument(name = "graphql.update_settings", skip_all)]
    async fn update_settings(
        &self,
        ctx: &Context<'_>,
        input: SettingsInput,
    ) -> async_graphql::Result<SettingsNode> {
        let viewer = require_viewer(ctx)?;
        let settings = viewer
            .workspace
            .update_settings(input.into())
            .await
            .map_err(gql_error)?;
        Ok(settings.into())
    }
}

#[cfg(test)]
mod tests {
    use entity::users::Role;
    use serde_json::json;

    use crate::graphql::testing::{Harness, error_code};

    #[tokio::test]
    async fn admins_approve_pending_users() {
        let harness = Harness::new();
        let admin = harness.viewer("admin@example.test", Role::Admin).await;
        let newcomer = harness.viewer("new@example.test", Role::Pending).await;

        let response = harness
            .run(Some(&admin), "{ users(pendingOnly: true) { email } }", json!({}))
            .await;
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"users": [{"email": "new@example.test"}]})
        );

        let response = harness
            .run(
                Some(&admin),
                "mutation($id: ID!) { approveUser(id: $id, role: VENDOR) { role approved } }",
                json!({"id": newcomer.user.id.to_string()}),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"approveUser": {"role": "VENDOR", "approved": true}})
        );
    }

    #[tokio::test]
    async fn settings_changes_are_admin_only() {
        let harness = Harness::new();
        let manager = harness.viewer("pm@example.test", Role::Manager).await;
        let admin = harness.viewer("admin@example.test", Role::Admin).await;
        let mutation = r#"
            mutation($input: SettingsInput!) {
                updateSettings(input: $input) { allowedFileTypes vendors }
            }
        "#;
        let vars = json!({"input": {"allowedFileTypes": [".PDF", "pdf", " dwg "], "vendors": ["Acme"]}});

        let response = harness.run(Some(&manager), mutation, vars.clone()).await;
        assert_eq!(error_code(&response).as_deref(), Some("FORBIDDEN"));

        let response = harness.run(Some(&admin), mutation, vars).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"updateSettings": {"allowedFileTypes": ["pdf", "dwg"], "vendors": ["Acme"]}})
        );
    }
}
