use async_trait::async_trait;
use chrono::Utc;
use entity::Table;
use reqwest::{Method, RequestBuilder, Response, Url, header};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::{
    AuthSession, AuthUser, BackendError, BackendResult, BackendSettings, Credentials, Filter,
    ObjectUpload, Select, SignUp, SignUpOutcome, Transport,
};

/// HTTP transport for a PostgREST + GoTrue + Storage style service.
#[derive(Clone, Debug)]
pub struct RestTransport {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
}

impl RestTransport {
    pub fn new(settings: &BackendSettings) -> BackendResult<Self> {
        let mut raw = settings.url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw).map_err(|err| BackendError::InvalidUrl(err.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            http,
            base,
            anon_key: settings.anon_key.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                for part in segment.split('/').filter(|part| !part.is_empty()) {
                    path.push(part);
                }
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(self.anon_key.as_str()))
    }

    fn table_url(&self, table: Table, filters: &[Filter]) -> BackendResult<Url> {
        let mut url = self.endpoint(&["rest/v1", table.as_str()])?;
        if !filters.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in filters.iter().map(Filter::to_query_pair) {
                query.append_pair(&key, &value);
            }
        }
        Ok(url)
    }

    async fn token(&self, grant_type: &str, body: Value) -> BackendResult<AuthSession> {
        let mut url = self.endpoint(&["auth/v1/token"])?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        let response = self
            .request(Method::POST, url, None)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = read_json(response).await?;
        Ok(token.into_session())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Turn a non-success response into [`BackendError::Api`], keeping the
/// service's own message.
async fn check(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    debug!(status = status.as_u16(), %message, "backend request failed");
    Err(BackendError::api(status.as_u16(), message))
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> BackendResult<T> {
    let response = check(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Extract the human readable part of a service error body. Each service
/// uses its own field name for it.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl Transport for RestTransport {
    #[instrument(name = "backend.sign_in", skip_all)]
    async fn sign_in_with_password(&self, credentials: &Credentials) -> BackendResult<AuthSession> {
        self.token(
            "password",
            json!({ "email": credentials.email, "password": credentials.password }),
        )
        .await
    }

    #[instrument(name = "backend.sign_up", skip_all)]
    async fn sign_up(&self, request: &SignUp) -> BackendResult<SignUpOutcome> {
        let url = self.endpoint(&["auth/v1/signup"])?;
        let response = self
            .request(Method::POST, url, None)
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "data": { "name": request.name },
            }))
            .send()
            .await?;
        let body: Value = read_json(response).await?;
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            let session = token.into_session();
            return Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            });
        }
        let user_value = body.get("user").cloned().unwrap_or(body);
        let user: AuthUser = serde_json::from_value(user_value)?;
        Ok(SignUpOutcome {
            user,
            session: None,
        })
    }

    #[instrument(name = "backend.sign_out", skip_all)]
    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        let url = self.endpoint(&["auth/v1/logout"])?;
        let response = self
            .request(Method::POST, url, Some(access_token))
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    #[instrument(name = "backend.get_user", skip_all)]
    async fn get_user(&self, access_token: &str) -> BackendResult<AuthUser> {
        let url = self.endpoint(&["auth/v1/user"])?;
        let response = self
            .request(Method::GET, url, Some(access_token))
            .send()
            .await?;
        read_json(response).await
    }

    #[instrument(name = "backend.refresh", skip_all)]
    async fn refresh_session(&self, refresh_token: &str) -> BackendResult<AuthSession> {
        self.token("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    #[instrument(name = "backend.select", skip(self, bearer, query), fields(table = %query.table))]
    async fn select(&self, bearer: Option<&str>, query: &Select) -> BackendResult<Vec<Value>> {
        let mut url = self.endpoint(&["rest/v1", query.table.as_str()])?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.to_query_pairs() {
                pairs.append_pair(&key, &value);
            }
        }
        let response = self.request(Method::GET, url, bearer).send().await?;
        read_json(response).await
    }

    #[instrument(name = "backend.insert", skip(self, bearer, rows), fields(rows = rows.len()))]
    async fn insert(
        &self,
        bearer: Option<&str>,
        table: Table,
        rows: Vec<Value>,
    ) -> BackendResult<Vec<Value>> {
        let url = self.table_url(table, &[])?;
        let response = self
            .request(Method::POST, url, bearer)
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        read_json(response).await
    }

    #[instrument(name = "backend.update", skip(self, bearer, filters, changes))]
    async fn update(
        &self,
        bearer: Option<&str>,
        table: Table,
        filters: &[Filter],
        changes: Value,
    ) -> BackendResult<Vec<Value>> {
        let url = self.table_url(table, filters)?;
        let response = self
            .request(Method::PATCH, url, bearer)
            .header("Prefer", "return=representation")
            .json(&changes)
            .send()
            .await?;
        read_json(response).await
    }

    #[instrument(name = "backend.delete", skip(self, bearer, filters))]
    async fn delete(
        &self,
        bearer: Option<&str>,
        table: Table,
        filters: &[Filter],
    ) -> BackendResult<Vec<Value>> {
        let url = self.table_url(table, filters)?;
        let response = self
            .request(Method::DELETE, url, bearer)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        read_json(response).await
    }

    #[instrument(name = "backend.upload", skip(self, bearer, object), fields(bytes = object.bytes.len()))]
    async fn upload(
        &self,
        bearer: Option<&str>,
        bucket: &str,
        path: &str,
        object: ObjectUpload,
    ) -> BackendResult<()> {
        let url = self.endpoint(&["storage/v1/object", bucket, path])?;
        let response = self
            .request(Method::POST, url, bearer)
            .header(header::CONTENT_TYPE, object.content_type)
            .header("x-upsert", "false")
            .body(object.bytes)
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&["storage/v1/object/public", bucket, path])
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}storage/v1/object/public/{bucket}/{path}", self.base))
    }

    #[instrument(name = "backend.remove", skip(self, bearer, paths), fields(objects = paths.len()))]
    async fn remove(
        &self,
        bearer: Option<&str>,
        bucket: &str,
        paths: &[String],
    ) -> BackendResult<()> {
        let url = self.endpoint(&["storage/v1/object", bucket])?;
        let response = self
            .request(Method::DELETE, url, bearer)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    async fn health(&self) -> BackendResult<()> {
        let url = self.endpoint(&["auth/v1/health"])?;
        let response = self.request(Method::GET, url, None).send().await?;
        check(response).await.map(|_| ())
    }
}
