use entity::settings::{self, SETTINGS_ID};
use platform_authz::Action;
use platform_backend::Filter;
use tracing::info;

use crate::{
    ProjectsResult, Workspace,
    validation::{normalize_extensions, normalize_list},
};

#[derive(Clone, Debug, Default)]
pub struct SettingsInput {
    pub allowed_file_types: Vec<String>,
    pub project_types: Vec<String>,
    pub vendors: Vec<String>,
}

impl SettingsInput {
    pub fn normalized(&self) -> settings::Changes {
        settings::Changes {
            allowed_file_types: normalize_extensions(&self.allowed_file_types),
            project_types: normalize_list(&self.project_types),
            vendors: normalize_list(&self.vendors),
        }
    }
}

impl Workspace {
    pub async fn settings(&self) -> ProjectsResult<settings::Model> {
        self.load_settings().await
    }

    /// Replace the global lists, creating the settings row on first save.
    pub async fn update_settings(&self, input: SettingsInput) -> ProjectsResult<settings::Model> {
        self.authorize(Action::ManageSettings)?;
        let changes = input.normalized();
        let updated = self
            .client
            .update::<settings::Model, _>(&[Filter::eq("id", SETTINGS_ID)], &changes)
            .await?;
        let stored = match updated.into_iter().next() {
            Some(row) => row,
            None => {
                self.client
                    .insert_one::<settings::Model, _>(&settings::Draft {
                        id: SETTINGS_ID,
                        fields: changes,
                    })
                    .await?
            }
        };
        info!(
            file_types = stored.allowed_file_types.len(),
            project_types = stored.project_types.len(),
            vendors = stored.vendors.len(),
            "settings saved"
        );
        Ok(stored)
    }
}
