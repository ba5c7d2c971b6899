use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::Table;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{BackendResult, Filter, Select};

/// Identity returned by the auth service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

impl AuthUser {
    /// Display name recorded at sign-up, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.user_metadata
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
    }
}

/// Access/refresh token pair; the part of a session worth persisting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds at which the access token stops being accepted.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|expires_at| expires_at <= now.timestamp())
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Result of a sign-up. `session` is `None` when the service requires the
/// address to be confirmed before the first sign-in.
#[derive(Clone, Debug)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

#[derive(Clone, Debug)]
pub struct ObjectUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Remote operations the application relies on.
///
/// `bearer` is the signed-in user's access token; `None` calls the service
/// with the anonymous key. Rows travel as JSON objects.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn sign_in_with_password(&self, credentials: &Credentials) -> BackendResult<AuthSession>;

    async fn sign_up(&self, request: &SignUp) -> BackendResult<SignUpOutcome>;

    async fn sign_out(&self, access_token: &str) -> BackendResult<()>;

    async fn get_user(&self, access_token: &str) -> BackendResult<AuthUser>;

    async fn refresh_session(&self, refresh_token: &str) -> BackendResult<AuthSession>;

    async fn select(&self, bearer: Option<&str>, query: &Select) -> BackendResult<Vec<Value>>;

    async fn insert(
        &self,
        bearer: Option<&str>,
        table: Table,
        rows: Vec<Value>,
    ) -> BackendResult<Vec<Value>>;

    async fn update(
        &self,
        bearer: Option<&str>,
        table: Table,
        filters: &[Filter],
        changes: Value,
    ) -> BackendResult<Vec<Value>>;

    async fn delete(
        &self,
        bearer: Option<&str>,
        table: Table,
        filters: &[Filter],
    ) -> BackendResult<Vec<Value>>;

    async fn upload(
        &self,
        bearer: Option<&str>,
        bucket: &str,
        path: &str,
        object: ObjectUpload,
    ) -> BackendResult<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bearer: Option<&str>, bucket: &str, paths: &[String])
    -> BackendResult<()>;

    /// Cheap reachability probe.
    async fn health(&self) -> BackendResult<()>;
}
