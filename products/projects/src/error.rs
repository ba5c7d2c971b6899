use platform_api::{ApiError, FieldError};
use platform_authz::AuthzError;
use platform_backend::BackendError;
use thiserror::Error;

pub type ProjectsResult<T> = Result<T, ProjectsError>;

/// Why a CSV import was rejected. Imports are all-or-nothing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("the file is empty")]
    Empty,
    #[error("missing required column \"{0}\"")]
    MissingColumn(&'static str),
    #[error("malformed CSV: {0}")]
    Malformed(String),
}

impl From<csv::Error> for ImportError {
    fn from(value: csv::Error) -> Self {
        ImportError::Malformed(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProjectsError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("import failed: {0}")]
    Import(#[from] ImportError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Forbidden(#[from] AuthzError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("export failed: {0}")]
    Export(String),
}

impl ProjectsError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<ProjectsError> for ApiError {
    fn from(value: ProjectsError) -> Self {
        match value {
            ProjectsError::Validation(fields) => ApiError::Validation(fields),
            ProjectsError::Import(err) => ApiError::invalid_field("csv", err.to_string()),
            ProjectsError::NotFound(what) => ApiError::not_found(what),
            ProjectsError::Forbidden(err) => err.into(),
            ProjectsError::Backend(err) => err.into(),
            ProjectsError::Export(message) => ApiError::internal(anyhow::anyhow!(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_failures_become_one_field_error() {
        let api: ApiError = ProjectsError::from(ImportError::MissingColumn("Activity Name")).into();
        assert_eq!(api.code(), "VALIDATION");
        assert_eq!(
            api.fields(),
            [FieldError::new(
                "csv",
                "missing required column \"Activity Name\""
            )]
        );
    }
}
