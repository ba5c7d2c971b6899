use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use platform_authz::AuthzError;
use platform_backend::BackendError;
use serde::Serialize;
use thiserror::Error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// A single rejected input field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    /// A call to the hosted backend failed; carries the backend's message.
    #[error("{0}")]
    Backend(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) | ApiError::Validation(_) => "VALIDATION",
            ApiError::Backend(_) => "BACKEND",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::Unauthenticated => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::InvalidInput(_) | ApiError::Validation(_) => 422,
            ApiError::Backend(_) => 502,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Field errors carried by a validation failure.
    pub fn fields(&self) -> &[FieldError] {
        match self {
            ApiError::Validation(fields) => fields,
            _ => &[],
        }
    }

    /// Human readable message, safe to show to the user.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Validation(fields) if !fields.is_empty() => fields
                .iter()
                .map(|f| format!("{}: {}", f.field, f.message))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        Self::Forbidden(value.to_string())
    }
}

impl From<BackendError> for ApiError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Api { status: 401, .. } => ApiError::Unauthenticated,
            BackendError::Api {
                status: 403,
                message,
            } => ApiError::Forbidden(message),
            BackendError::Api {
                status: 400 | 422,
                message,
            } => ApiError::InvalidInput(message),
            BackendError::Api { message, .. } => ApiError::Backend(message),
            BackendError::Network(message) => ApiError::Backend(message),
            other => ApiError::internal(other.into()),
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        if let ApiError::Internal(source) = self {
            tracing::error!(error = ?source, "internal error");
        }
        let mut err = Error::new(self.public_message());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::Validation(fields) = self {
            let fields = async_graphql::to_value(fields).unwrap_or_default();
            err = err.extend_with(|_err, e| {
                e.set("fields", fields.clone());
            });
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}
