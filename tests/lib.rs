//! Shared fixtures for the cross-crate workflow tests.

use std::sync::Arc;

use entity::{
    projects,
    users::{self, Role},
};
use platform_authz::Actor;
use platform_backend::{BackendClient, MemoryTransport};
use products_projects::{
    ActivityRow, Workspace, WorkspaceOptions,
    projects::{ProjectInput, ProjectSubmission},
};
use uuid::Uuid;

pub const BUCKET: &str = "project-files";

/// An in-memory backend plus an anonymous client onto it.
pub struct Fixture {
    pub memory: Arc<MemoryTransport>,
    pub client: BackendClient,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        let memory = Arc::new(MemoryTransport::new());
        let client = BackendClient::new(memory.clone(), BUCKET);
        Self { memory, client }
    }

    /// Create an account with an approved profile and return its workspace.
    pub async fn workspace(&self, email: &str, role: Role) -> Workspace {
        let id = self.memory.seed_account(email, "password", email);
        let mut draft = users::Draft::pending(id, email, email);
        draft.role = role;
        draft.approved = role != Role::Pending;
        self.client
            .insert_one::<users::Model, _>(&draft)
            .await
            .expect("seed profile");
        Workspace::new(
            self.client.clone(),
            Actor::new(id, role),
            WorkspaceOptions::default(),
        )
    }
}

pub fn project_input(name: &str) -> ProjectInput {
    ProjectInput {
        name: name.to_string(),
        project_type: None,
        start_date: None,
        end_date: None,
        vendor: None,
        description: None,
        status: projects::Status::Ongoing,
        completion_percentage: 0,
    }
}

pub fn activity(name: &str, quantity: &str, rate: &str) -> ActivityRow {
    ActivityRow {
        name: name.to_string(),
        quantity: quantity.to_string(),
        rate: rate.to_string(),
        ..Default::default()
    }
}

pub fn submission(name: &str, activities: Vec<ActivityRow>) -> ProjectSubmission {
    ProjectSubmission {
        project: project_input(name),
        activities,
        idempotency_key: None,
    }
}

pub fn keyed_submission(name: &str, activities: Vec<ActivityRow>, key: Uuid) -> ProjectSubmission {
    ProjectSubmission {
        idempotency_key: Some(key),
        ..submission(name, activities)
    }
}
