mod admin;
mod collab;
mod me;
mod projects;
pub mod types;

use async_graphql::{
    Context, EmptySubscription, Error, ErrorExtensions, ID, MergedObject, Object, Schema,
    SimpleObject,
};
use platform_api::ApiError;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::session::Viewer;

pub use admin::{AdminMutation, AdminQuery};
pub use collab::{CollabMutation, CollabQuery};
pub use me::{MeMutation, MeQuery};
pub use projects::{ProjectsMutation, ProjectsQuery};

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

#[derive(MergedObject, Default)]
pub struct QueryRoot(SystemQuery, MeQuery, ProjectsQuery, CollabQuery, AdminQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(MeMutation, ProjectsMutation, CollabMutation, AdminMutation);

/// The caller is attached per request as a [`Viewer`]; the schema itself
/// holds no state.
pub fn build_schema() -> SchemaType {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        EmptySubscription,
    )
    .finish()
}

#[derive(Default)]
pub struct SystemQuery;

#[Object]
impl SystemQuery {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> HealthPayload {
        HealthPayload { ok: true }
    }

    async fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

pub(crate) fn gql_error(err: impl Into<ApiError>) -> Error {
    err.into().extend()
}

pub(crate) fn require_viewer<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Viewer> {
    ctx.data_opt::<Viewer>()
        .ok_or_else(|| gql_error(ApiError::Unauthenticated))
}

pub(crate) fn parse_uuid(id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| gql_error(ApiError::invalid_field("id", "Invalid ID")))
}

pub(crate) fn parse_optional_uuid(id: Option<&ID>) -> async_graphql::Result<Option<Uuid>> {
    id.map(parse_uuid).transpose()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_graphql::{Request, Response, Variables};
    use entity::users::{self, Role};
    use platform_authz::Actor;
    use platform_backend::{AuthUser, BackendClient, MemoryTransport};
    use products_projects::{Workspace, WorkspaceOptions};
    use serde_json::Value;

    use super::*;

    pub struct Harness {
        pub memory: Arc<MemoryTransport>,
        pub client: BackendClient,
        pub schema: SchemaType,
    }

    impl Harness {
        pub fn new() -> Self {
            let memory = Arc::new(MemoryTransport::new());
            let client = BackendClient::new(memory.clone(), "project-files");
            Self {
                memory,
                client,
                schema: build_schema(),
            }
        }

        /// Register an account with a profile row and return it as a viewer.
        pub async fn viewer(&self, email: &str, role: Role) -> Viewer {
            let id = self.memory.seed_account(email, "password", email);
            let mut draft = users::Draft::pending(id, email, email);
            draft.role = role;
            draft.approved = role != Role::Pending;
            self.client
                .insert_one::<users::Model, _>(&draft)
                .await
                .expect("seed profile");
            Viewer {
                user: AuthUser {
                    id,
                    email: Some(email.to_string()),
                    user_metadata: Value::Null,
                },
                workspace: Workspace::new(
                    self.client.clone(),
                    Actor::new(id, role),
                    WorkspaceOptions::default(),
                ),
            }
        }

        pub async fn run(&self, viewer: Option<&Viewer>, query: &str, vars: Value) -> Response {
            let mut request = Request::new(query).variables(Variables::from_json(vars));
            if let Some(viewer) = viewer {
                request = request.data(viewer.clone());
            }
            self.schema.execute(request).await
        }
    }

    pub fn error_code(response: &Response) -> Option<String> {
        let error = response.errors.first()?;
        let code = error.extensions.as_ref()?.get("code")?;
        match code {
            async_graphql::Value::String(code) => Some(code.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::{Harness, error_code};

    #[tokio::test]
    async fn health_query_returns_ok() {
        let harness = Harness::new();
        let response = harness.run(None, "{ health { ok } }", json!({})).await;
        assert!(response.errors.is_empty());
        let body = response.data.into_json().unwrap();
        assert_eq!(body, json!({"health": {"ok": true}}));
    }

    #[tokio::test]
    async fn private_fields_require_a_viewer() {
        let harness = Harness::new();
        let response = harness.run(None, "{ me { id } }", json!({})).await;
        assert_eq!(error_code(&response).as_deref(), Some("UNAUTHENTICATED"));
    }
}
