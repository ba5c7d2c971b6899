use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The remote service answered with a non-success status. `message` is
    /// the service's own error text and is safe to show to the user.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("backend unreachable: {0}")]
    Network(String),
    #[error("unexpected backend response: {0}")]
    Decode(String),
    #[error("missing backend setting {0}")]
    MissingSetting(&'static str),
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the bearer token was rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Network(value.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
