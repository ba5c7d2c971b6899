use async_graphql::{Context, Object, SimpleObject};
use tracing::instrument;

use super::{
    gql_error, require_viewer,
    types::{UserNode, UserRole},
};

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub user: UserNode,
    pub is_admin: bool,
    pub can_manage_projects: bool,
}

impl MePayload {
    fn new(user: UserNode) -> Self {
        let is_admin = user.role == UserRole::Admin;
        Self {
            can_manage_projects: is_admin || user.role == UserRole::Manager,
            is_admin,
            user,
        }
    }
}

#[derive(Default)]
pub struct MeQuery;

#[Object]
impl MeQuery {
    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<MePayload> {
        let viewer = require_viewer(ctx)?;
        let profile = viewer.workspace.my_profile().await.map_err(gql_error)?;
        Ok(MePayload::new(profile.into()))
    }
}

#[derive(Default)]
pub struct MeMutation;

#[Object]
impl MeMutation {
    #[instrument(name = "graphql.update_profile", skip_all)]
    async fn update_profile(&self, ctx: &Context<'_>, name: String) -> async_graphql::Result<UserNode> {
        let viewer = require_viewer(ctx)?;
        let profile = viewer
            .workspace
            .update_profile(&name)
            .await
            .map_err(gql_error)?;
        Ok(profile.into())
    }
}
