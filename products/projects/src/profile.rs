use entity::users;
use platform_backend::Filter;

use crate::{ProjectsError, ProjectsResult, Workspace, validation::required_text};

impl Workspace {
    pub async fn my_profile(&self) -> ProjectsResult<users::Model> {
        self.client
            .find::<users::Model>(self.actor.user_id)
            .await?
            .ok_or(ProjectsError::NotFound("profile"))
    }

    /// Change the display name. Role and approval are not editable here.
    pub async fn update_profile(&self, name: &str) -> ProjectsResult<users::Model> {
        let name = required_text("name", name).map_err(|err| ProjectsError::Validation(vec![err]))?;
        self.client
            .update::<users::Model, _>(
                &[Filter::eq("id", self.actor.user_id)],
                &users::Changes {
                    name: Some(name),
                    ..Default::default()
                },
            )
            .await?
            .into_iter()
            .next()
            .ok_or(ProjectsError::NotFound("profile"))
    }
}
