//! Client for the hosted backend the application delegates to.
//!
//! The backend exposes three surfaces: password authentication, filtered
//! table CRUD and object storage. [`Transport`] is the seam to the remote
//! service; [`RestTransport`] speaks its HTTP APIs and [`MemoryTransport`]
//! keeps everything in process for local runs and tests. Application code
//! talks to [`BackendClient`] and observes sign-in state through
//! [`SessionContext`].

mod client;
mod error;
mod memory;
mod query;
mod rest;
mod session;
mod transport;

use std::time::Duration;

pub use client::BackendClient;
pub use error::{BackendError, BackendResult};
pub use memory::{FailPoint, MemoryTransport};
pub use query::{Direction, Filter, FilterOp, Order, Select};
pub use rest::RestTransport;
pub use session::{AuthState, SessionContext};
pub use transport::{
    AuthSession, AuthUser, Credentials, ObjectUpload, SignUp, SignUpOutcome, TokenPair, Transport,
};

/// Bucket used for project files when `STORAGE_BUCKET` is not set.
pub const DEFAULT_BUCKET: &str = "project-files";

/// Connection settings for the hosted backend.
#[derive(Clone, Debug)]
pub struct BackendSettings {
    pub url: String,
    pub anon_key: String,
    pub bucket: String,
    pub timeout: Duration,
}

impl BackendSettings {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read `BACKEND_URL`, `BACKEND_ANON_KEY`, `STORAGE_BUCKET` and
    /// `BACKEND_TIMEOUT_SECS`.
    pub fn from_env() -> BackendResult<Self> {
        let url = std::env::var("BACKEND_URL")
            .map_err(|_| BackendError::MissingSetting("BACKEND_URL"))?;
        let anon_key = std::env::var("BACKEND_ANON_KEY")
            .map_err(|_| BackendError::MissingSetting("BACKEND_ANON_KEY"))?;
        let mut settings = Self::new(url, anon_key);
        if let Ok(bucket) = std::env::var("STORAGE_BUCKET") {
            if !bucket.trim().is_empty() {
                settings.bucket = bucket.trim().to_string();
            }
        }
        if let Some(secs) = std::env::var("BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
        {
            settings.timeout = Duration::from_secs(secs);
        }
        Ok(settings)
    }
}
