//! Row types for the tables held by the hosted backend.
//!
//! Each module mirrors one remote table: `Model` is the row as read back,
//! `Draft` is the insert payload and `Changes` (where the table is mutable)
//! is a sparse update payload whose `None` fields are omitted on the wire.

use serde::{Serialize, de::DeserializeOwned};

pub mod activities;
pub mod comments;
pub mod files;
pub mod notifications;
pub mod projects;
pub mod settings;
pub mod users;

/// Remote tables known to the application.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Users,
    Projects,
    Activities,
    Files,
    Comments,
    Notifications,
    Settings,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Users,
        Table::Projects,
        Table::Activities,
        Table::Files,
        Table::Comments,
        Table::Notifications,
        Table::Settings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Projects => "projects",
            Table::Activities => "activities",
            Table::Files => "files",
            Table::Comments => "comments",
            Table::Notifications => "notifications",
            Table::Settings => "settings",
        }
    }

    /// Column on this table that references `projects.id`, if any.
    /// Rows owning such a column are removed together with their project.
    pub fn project_reference(self) -> Option<&'static str> {
        match self {
            Table::Activities | Table::Files | Table::Comments => Some("project_id"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row type stored in a specific remote table.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: Table;
}
