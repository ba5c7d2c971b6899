//! Project management vertical slice.
//!
//! [`Workspace`] is the signed-in user's view of the hosted backend. Every
//! page of the application maps to one of its operations; each call goes
//! straight to the backend with the user's token and nothing is cached.

pub mod auth;
pub mod budget;
pub mod comments;
pub mod csv_import;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod files;
pub mod gate;
pub mod notifications;
pub mod profile;
pub mod projects;
pub mod reports;
pub mod saga;
pub mod settings;
pub mod users;
pub mod validation;

use entity::{settings as settings_row, users::Role};
use platform_authz::{Action, Actor, PolicyEngine};
use platform_backend::BackendClient;
use tracing::debug;
use uuid::Uuid;

pub use budget::{ActivityRow, BudgetPreview};
pub use error::{ImportError, ProjectsError, ProjectsResult};
pub use gate::{AuthGate, GateDecision, GateState, View};

/// Uploads larger than this are rejected unless configured otherwise.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct WorkspaceOptions {
    pub max_upload_bytes: usize,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Operations available to one signed-in user.
#[derive(Clone, Debug)]
pub struct Workspace {
    client: BackendClient,
    actor: Actor,
    options: WorkspaceOptions,
}

impl Workspace {
    pub fn new(client: BackendClient, actor: Actor, options: WorkspaceOptions) -> Self {
        Self {
            client,
            actor,
            options,
        }
    }

    /// Build a workspace for `user_id`, reading its role from the profile
    /// row. A user without a profile row yet is treated as pending.
    pub async fn load(
        client: BackendClient,
        user_id: Uuid,
        options: WorkspaceOptions,
    ) -> ProjectsResult<Self> {
        let profile = client.find::<entity::users::Model>(user_id).await?;
        let role = profile.map(|p| p.role).unwrap_or(Role::Pending);
        debug!(%user_id, role = role.as_str(), "workspace loaded");
        Ok(Self::new(client, Actor::new(user_id, role), options))
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn options(&self) -> &WorkspaceOptions {
        &self.options
    }

    fn authorize(&self, action: Action) -> ProjectsResult<()> {
        PolicyEngine.check(&self.actor, &action)?;
        Ok(())
    }

    /// Global settings, or the defaults while the row does not exist.
    pub(crate) async fn load_settings(&self) -> ProjectsResult<settings_row::Model> {
        Ok(self
            .client
            .find::<settings_row::Model>(settings_row::SETTINGS_ID)
            .await?
            .unwrap_or_default())
    }
}
