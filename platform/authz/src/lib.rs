//! Authorization primitives for the project workspace.
//!
//! Row visibility is decided by the hosted store; this crate only guards the
//! privileged mutations the application performs on a user's behalf.

use entity::users::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("action {action} denied for resource {resource}")]
    Denied { action: String, resource: String },
}

/// The signed-in user as far as policy is concerned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Manager)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    ManageUsers,
    ManageSettings,
    EditProject { owner: Uuid },
    DeleteProject { owner: Uuid },
    DeleteFile { uploaded_by: Uuid, project_owner: Uuid },
    DeleteComment { author: Uuid },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::ManageUsers => "manage:users",
            Action::ManageSettings => "manage:settings",
            Action::EditProject { .. } => "edit:project",
            Action::DeleteProject { .. } => "delete:project",
            Action::DeleteFile { .. } => "delete:file",
            Action::DeleteComment { .. } => "delete:comment",
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            Action::ManageUsers => "users",
            Action::ManageSettings => "settings",
            Action::EditProject { .. } | Action::DeleteProject { .. } => "projects",
            Action::DeleteFile { .. } => "files",
            Action::DeleteComment { .. } => "comments",
        }
    }
}

#[derive(Default, Debug)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn allows(&self, actor: &Actor, action: &Action) -> bool {
        match *action {
            Action::ManageUsers | Action::ManageSettings => actor.is_admin(),
            Action::EditProject { owner } | Action::DeleteProject { owner } => {
                actor.user_id == owner || actor.is_staff()
            }
            Action::DeleteFile {
                uploaded_by,
                project_owner,
            } => {
                actor.user_id == uploaded_by
                    || actor.user_id == project_owner
                    || actor.is_staff()
            }
            Action::DeleteComment { author } => actor.user_id == author || actor.is_admin(),
        }
    }

    pub fn check(&self, actor: &Actor, action: &Action) -> Result<(), AuthzError> {
        if self.allows(actor, action) {
            Ok(())
        } else {
            Err(AuthzError::Denied {
                action: action.name().to_string(),
                resource: action.resource().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admins_manage_users_and_settings() {
        let engine = PolicyEngine;
        for role in [Role::Pending, Role::Manager, Role::Vendor, Role::Employee] {
            let actor = Actor::new(Uuid::new_v4(), role);
            assert!(engine.check(&actor, &Action::ManageUsers).is_err());
            assert!(engine.check(&actor, &Action::ManageSettings).is_err());
        }
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        assert!(engine.check(&admin, &Action::ManageUsers).is_ok());
        assert!(engine.check(&admin, &Action::ManageSettings).is_ok());
    }

    #[test]
    fn owners_and_staff_edit_projects() {
        let engine = PolicyEngine;
        let owner = Actor::new(Uuid::new_v4(), Role::Vendor);
        let other = Actor::new(Uuid::new_v4(), Role::Employee);
        let manager = Actor::new(Uuid::new_v4(), Role::Manager);
        let edit = Action::EditProject {
            owner: owner.user_id,
        };
        assert!(engine.allows(&owner, &edit));
        assert!(engine.allows(&manager, &edit));
        let err = engine.check(&other, &edit).unwrap_err();
        assert_eq!(
            err.to_string(),
            "action edit:project denied for resource projects"
        );
    }

    #[test]
    fn comments_are_removed_by_their_author() {
        let engine = PolicyEngine;
        let author = Actor::new(Uuid::new_v4(), Role::Employee);
        let manager = Actor::new(Uuid::new_v4(), Role::Manager);
        let action = Action::DeleteComment {
            author: author.user_id,
        };
        assert!(engine.allows(&author, &action));
        assert!(!engine.allows(&manager, &action));
    }
}
