use entity::notifications;
use platform_backend::{Direction, Filter, Select};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::{ProjectsError, ProjectsResult, Workspace};

impl Workspace {
    fn own_notifications(&self) -> Select {
        Select::of::<notifications::Model>().eq("user_id", self.actor.user_id)
    }

    pub async fn list_notifications(
        &self,
        unread_only: bool,
    ) -> ProjectsResult<Vec<notifications::Model>> {
        let mut query = self
            .own_notifications()
            .order_by("created_at", Direction::Desc);
        if unread_only {
            query = query.eq("read", false);
        }
        Ok(self.client.fetch::<notifications::Model>(&query).await?)
    }

    pub async fn unread_notification_count(&self) -> ProjectsResult<usize> {
        let rows = self
            .client
            .fetch::<notifications::Model>(&self.own_notifications().eq("read", false))
            .await?;
        Ok(rows.len())
    }

    /// Mark one notification read. An already-read notification is returned
    /// as is without writing.
    pub async fn mark_notification_read(
        &self,
        notification_id: Uuid,
    ) -> ProjectsResult<notifications::Model> {
        let notification = self
            .client
            .fetch_one::<notifications::Model>(&self.own_notifications().eq("id", notification_id))
            .await?
            .ok_or(ProjectsError::NotFound("notification"))?;
        if notification.read {
            debug!(%notification_id, "notification already read");
            return Ok(notification);
        }
        self.client
            .update::<notifications::Model, _>(
                &[
                    Filter::eq("id", notification_id),
                    Filter::eq("user_id", self.actor.user_id),
                ],
                &json!({ "read": true }),
            )
            .await?
            .into_iter()
            .next()
            .ok_or(ProjectsError::NotFound("notification"))
    }

    /// Mark every unread notification read; returns how many changed.
    pub async fn mark_all_notifications_read(&self) -> ProjectsResult<usize> {
        let updated = self
            .client
            .update::<notifications::Model, _>(
                &[
                    Filter::eq("user_id", self.actor.user_id),
                    Filter::eq("read", false),
                ],
                &json!({ "read": true }),
            )
            .await?;
        Ok(updated.len())
    }
}
