use entity::{notifications, users};
use platform_authz::Action;
use platform_backend::{Direction, Filter, Select};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{ProjectsError, ProjectsResult, Workspace};

impl Workspace {
    pub async fn list_users(&self, pending_only: bool) -> ProjectsResult<Vec<users::Model>> {
        self.authorize(Action::ManageUsers)?;
        let mut query = Select::of::<users::Model>().order_by("created_at", Direction::Desc);
        if pending_only {
            query = query.eq("approved", false);
        }
        Ok(self.client.fetch::<users::Model>(&query).await?)
    }

    async fn change_user(
        &self,
        user_id: Uuid,
        changes: users::Changes,
    ) -> ProjectsResult<users::Model> {
        self.client
            .update::<users::Model, _>(&[Filter::eq("id", user_id)], &changes)
            .await?
            .into_iter()
            .next()
            .ok_or(ProjectsError::NotFound("user"))
    }

    /// Approve a user and give them a working role (employee unless
    /// specified). The user is told by notification.
    #[instrument(skip_all, fields(%user_id, admin = %self.actor.user_id))]
    pub async fn approve_user(
        &self,
        user_id: Uuid,
        role: Option<users::Role>,
    ) -> ProjectsResult<users::Model> {
        self.authorize(Action::ManageUsers)?;
        let role = role.unwrap_or(users::Role::Employee);
        if role == users::Role::Pending {
            return Err(ProjectsError::invalid(
                "role",
                "an approved user needs a role other than pending",
            ));
        }
        let user = self
            .change_user(
                user_id,
                users::Changes {
                    role: Some(role),
                    approved: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        info!(role = role.as_str(), "user approved");

        let note = notifications::Draft::unread(
            user_id,
            format!("Your account has been approved as {}", role.as_str()),
            Some("/dashboard".to_string()),
        );
        if let Err(err) = self
            .client
            .insert::<notifications::Model, _>(std::slice::from_ref(&note))
            .await
        {
            warn!(error = %err, "failed to notify approved user");
        }
        Ok(user)
    }

    /// Change a user's role. Moving a user back to pending also withdraws
    /// their approval.
    #[instrument(skip_all, fields(%user_id, admin = %self.actor.user_id))]
    pub async fn set_user_role(
        &self,
        user_id: Uuid,
        role: users::Role,
    ) -> ProjectsResult<users::Model> {
        self.authorize(Action::ManageUsers)?;
        let changes = users::Changes {
            role: Some(role),
            approved: (role == users::Role::Pending).then_some(false),
            ..Default::default()
        };
        let user = self.change_user(user_id, changes).await?;
        info!(role = role.as_str(), "user role changed");
        Ok(user)
    }
}
