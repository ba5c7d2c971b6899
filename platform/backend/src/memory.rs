use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use entity::Table;
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AuthSession, AuthUser, BackendError, BackendResult, Credentials, Filter, ObjectUpload, Select,
    SignUp, SignUpOutcome, Transport, query::cell_text,
};

const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

/// Operation that should fail the next time it runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailPoint {
    Select(Table),
    Insert(Table),
    Update(Table),
    Delete(Table),
    Upload,
    Remove,
}

#[derive(Clone, Debug)]
struct Account {
    id: Uuid,
    email: String,
    password: String,
    name: String,
}

#[derive(Clone, Debug)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<Table, Vec<Map<String, Value>>>,
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, (Uuid, i64)>,
    refresh_tokens: HashMap<String, Uuid>,
    objects: BTreeMap<(String, String), StoredObject>,
}

/// In-process stand-in for the hosted backend.
///
/// Mirrors the behaviour the application depends on: generated ids and
/// timestamps, unique ids, project foreign keys with cascading deletes,
/// password accounts with expiring access tokens and a flat object store.
/// Row-level security is not modelled.
pub struct MemoryTransport {
    base_url: String,
    state: Mutex<MemoryState>,
    failures: Mutex<Vec<FailPoint>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            base_url: "http://backend.local".to_string(),
            state: Mutex::new(MemoryState::default()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Make the next matching operation fail with a 500 response.
    pub fn fail_next(&self, point: FailPoint) {
        lock(&self.failures).push(point);
    }

    /// Create a confirmed password account directly, bypassing sign-up.
    pub fn seed_account(&self, email: &str, password: &str, name: &str) -> Uuid {
        let mut state = lock(&self.state);
        let key = email.trim().to_lowercase();
        let account = state.accounts.entry(key.clone()).or_insert_with(|| Account {
            id: Uuid::new_v4(),
            email: key,
            password: password.to_string(),
            name: name.to_string(),
        });
        account.id
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        lock(&self.state)
            .tables
            .get(&table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Paths of all objects stored in `bucket`.
    pub fn object_paths(&self, bucket: &str) -> Vec<String> {
        lock(&self.state)
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, path)| path.clone())
            .collect()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
        lock(&self.state)
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|object| (object.bytes.clone(), object.content_type.clone()))
    }

    /// Force an access token past its expiry.
    pub fn expire_access_token(&self, token: &str) {
        if let Some(entry) = lock(&self.state).access_tokens.get_mut(token) {
            entry.1 = Utc::now().timestamp() - 1;
        }
    }

    fn take_failure(&self, point: FailPoint) -> BackendResult<()> {
        let mut failures = lock(&self.failures);
        if let Some(index) = failures.iter().position(|p| *p == point) {
            failures.remove(index);
            debug!(?point, "injected backend failure");
            return Err(BackendError::api(500, format!("injected failure: {point:?}")));
        }
        Ok(())
    }

    fn authorize(&self, state: &MemoryState, bearer: Option<&str>) -> BackendResult<()> {
        match bearer {
            None => Ok(()),
            Some(token) => resolve_token(state, token).map(|_| ()),
        }
    }

    fn issue_session(state: &mut MemoryState, account: &Account) -> AuthSession {
        let access_token = format!("mem-at-{}", Uuid::new_v4().simple());
        let refresh_token = format!("mem-rt-{}", Uuid::new_v4().simple());
        let expires_at = (Utc::now() + Duration::seconds(ACCESS_TOKEN_TTL_SECS)).timestamp();
        state
            .access_tokens
            .insert(access_token.clone(), (account.id, expires_at));
        state
            .refresh_tokens
            .insert(refresh_token.clone(), account.id);
        AuthSession {
            access_token,
            refresh_token,
            expires_at: Some(expires_at),
            user: account_user(account),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn account_user(account: &Account) -> AuthUser {
    AuthUser {
        id: account.id,
        email: Some(account.email.clone()),
        user_metadata: json!({ "name": account.name }),
    }
}

fn resolve_token(state: &MemoryState, token: &str) -> BackendResult<Uuid> {
    match state.access_tokens.get(token) {
        Some((user_id, expires_at)) if *expires_at > Utc::now().timestamp() => Ok(*user_id),
        Some(_) => Err(BackendError::api(401, "JWT expired")),
        None => Err(BackendError::api(401, "invalid JWT")),
    }
}

fn find_account(state: &MemoryState, user_id: Uuid) -> Option<&Account> {
    state.accounts.values().find(|account| account.id == user_id)
}

fn matches_all(row: &Map<String, Value>, filters: &[Filter]) -> bool {
    let value = Value::Object(row.clone());
    filters.iter().all(|filter| filter.matches(&value))
}

/// Fill in the columns the remote store generates itself.
fn with_defaults(table: Table, row: Value) -> BackendResult<Map<String, Value>> {
    let Value::Object(mut row) = row else {
        return Err(BackendError::api(400, "row must be a JSON object"));
    };
    let now = Value::String(Utc::now().to_rfc3339());
    if table == Table::Settings {
        if !row.contains_key("id") {
            return Err(BackendError::api(400, "null value in column \"id\""));
        }
        row.insert("updated_at".to_string(), now);
    } else {
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        row.entry("created_at").or_insert(now);
    }
    Ok(row)
}

fn row_id(row: &Map<String, Value>) -> Option<String> {
    row.get("id").map(cell_text)
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn sign_in_with_password(&self, credentials: &Credentials) -> BackendResult<AuthSession> {
        let mut state = lock(&self.state);
        let key = credentials.email.trim().to_lowercase();
        let account = state
            .accounts
            .get(&key)
            .filter(|account| account.password == credentials.password)
            .cloned()
            .ok_or_else(|| BackendError::api(400, "Invalid login credentials"))?;
        Ok(Self::issue_session(&mut state, &account))
    }

    async fn sign_up(&self, request: &SignUp) -> BackendResult<SignUpOutcome> {
        let mut state = lock(&self.state);
        let key = request.email.trim().to_lowercase();
        if key.is_empty() || !key.contains('@') {
            return Err(BackendError::api(422, "Unable to validate email address: invalid format"));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BackendError::api(
                422,
                "Password should be at least 6 characters.",
            ));
        }
        if state.accounts.contains_key(&key) {
            return Err(BackendError::api(422, "User already registered"));
        }
        let account = Account {
            id: Uuid::new_v4(),
            email: key.clone(),
            password: request.password.clone(),
            name: request.name.clone(),
        };
        state.accounts.insert(key, account.clone());
        let session = Self::issue_session(&mut state, &account);
        Ok(SignUpOutcome {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        let mut state = lock(&self.state);
        let user_id = resolve_token(&state, access_token)?;
        state.access_tokens.retain(|_, (owner, _)| *owner != user_id);
        state.refresh_tokens.retain(|_, owner| *owner != user_id);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<AuthUser> {
        let state = lock(&self.state);
        let user_id = resolve_token(&state, access_token)?;
        find_account(&state, user_id)
            .map(account_user)
            .ok_or_else(|| BackendError::api(404, "User not found"))
    }

    async fn refresh_session(&self, refresh_token: &str) -> BackendResult<AuthSession> {
        let mut state = lock(&self.state);
        let user_id = state
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| BackendError::api(400, "Invalid Refresh Token: Refresh Token Not Found"))?;
        let account = find_account(&state, user_id)
            .cloned()
            .ok_or_else(|| BackendError::api(404, "User not found"))?;
        Ok(Self::issue_session(&mut state, &account))
    }

    async fn select(&self, bearer: Option<&str>, query: &Select) -> BackendResult<Vec<Value>> {
        self.take_failure(FailPoint::Select(query.table))?;
        let state = lock(&self.state);
        self.authorize(&state, bearer)?;
        let mut rows: Vec<Value> = state
            .tables
            .get(&query.table)
            .into_iter()
            .flatten()
            .filter(|row| matches_all(row, &query.filters))
            .cloned()
            .map(Value::Object)
            .collect();
        for order in query.order.iter().rev() {
            rows.sort_by(|a, b| order.compare(a, b));
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows.iter().map(|row| query.project(row)).collect())
    }

    async fn insert(
        &self,
        bearer: Option<&str>,
        table: Table,
        rows: Vec<Value>,
    ) -> BackendResult<Vec<Value>> {
        self.take_failure(FailPoint::Insert(table))?;
        let mut state = lock(&self.state);
        self.authorize(&state, bearer)?;

        let prepared = rows
            .into_iter()
            .map(|row| with_defaults(table, row))
            .collect::<BackendResult<Vec<_>>>()?;

        let existing = state.tables.get(&table).cloned().unwrap_or_default();
        let mut seen: Vec<String> = existing.iter().filter_map(row_id).collect();
        for row in &prepared {
            let Some(id) = row_id(row) else {
                continue;
            };
            if seen.contains(&id) {
                return Err(BackendError::api(
                    409,
                    format!("duplicate key value violates unique constraint \"{table}_pkey\""),
                ));
            }
            seen.push(id);
        }

        if let Some(column) = table.project_reference() {
            let projects = state.tables.get(&Table::Projects);
            for row in &prepared {
                let target = row.get(column).map(cell_text);
                let exists = projects
                    .into_iter()
                    .flatten()
                    .any(|project| row_id(project) == target);
                if !exists {
                    return Err(BackendError::api(
                        409,
                        format!(
                            "insert or update on table \"{table}\" violates foreign key constraint \"{table}_{column}_fkey\""
                        ),
                    ));
                }
            }
        }

        state
            .tables
            .entry(table)
            .or_default()
            .extend(prepared.iter().cloned());
        Ok(prepared.into_iter().map(Value::Object).collect())
    }

    async fn update(
        &self,
        bearer: Option<&str>,
        table: Table,
        filters: &[Filter],
        changes: Value,
    ) -> BackendResult<Vec<Value>> {
        self.take_failure(FailPoint::Update(table))?;
        let Value::Object(changes) = changes else {
            return Err(BackendError::api(400, "changes must be a JSON object"));
        };
        let mut state = lock(&self.state);
        self.authorize(&state, bearer)?;
        let now = Value::String(Utc::now().to_rfc3339());
        let mut updated = Vec::new();
        for row in state.tables.entry(table).or_default().iter_mut() {
            if !matches_all(row, filters) {
                continue;
            }
            for (key, value) in &changes {
                row.insert(key.clone(), value.clone());
            }
            if table == Table::Settings {
                row.insert("updated_at".to_string(), now.clone());
            }
            updated.push(Value::Object(row.clone()));
        }
        Ok(updated)
    }

    async fn delete(
        &self,
        bearer: Option<&str>,
        table: Table,
        filters: &[Filter],
    ) -> BackendResult<Vec<Value>> {
        self.take_failure(FailPoint::Delete(table))?;
        let mut state = lock(&self.state);
        self.authorize(&state, bearer)?;
        let rows = state.tables.entry(table).or_default();
        let (removed, kept): (Vec<_>, Vec<_>) =
            rows.drain(..).partition(|row| matches_all(row, filters));
        *rows = kept;

        let removed_ids: Vec<String> = removed.iter().filter_map(row_id).collect();
        if table == Table::Projects && !removed_ids.is_empty() {
            for child in Table::ALL {
                if let Some(column) = child.project_reference() {
                    if let Some(child_rows) = state.tables.get_mut(&child) {
                        child_rows.retain(|row| {
                            let parent = row.get(column).map(cell_text);
                            !parent.is_some_and(|parent| removed_ids.contains(&parent))
                        });
                    }
                }
            }
        }
        if table == Table::Comments {
            // replies go with the comment they answer
            let mut orphaned = removed_ids.clone();
            while !orphaned.is_empty() {
                let comments = state.tables.entry(Table::Comments).or_default();
                let (replies, rest): (Vec<_>, Vec<_>) = comments.drain(..).partition(|row| {
                    row.get("parent_id")
                        .map(cell_text)
                        .is_some_and(|parent| orphaned.contains(&parent))
                });
                *comments = rest;
                orphaned = replies.iter().filter_map(row_id).collect();
            }
        }
        Ok(removed.into_iter().map(Value::Object).collect())
    }

    async fn upload(
        &self,
        bearer: Option<&str>,
        bucket: &str,
        path: &str,
        object: ObjectUpload,
    ) -> BackendResult<()> {
        self.take_failure(FailPoint::Upload)?;
        let mut state = lock(&self.state);
        self.authorize(&state, bearer)?;
        let key = (bucket.to_string(), path.to_string());
        if state.objects.contains_key(&key) {
            return Err(BackendError::api(409, "The resource already exists"));
        }
        state.objects.insert(
            key,
            StoredObject {
                bytes: object.bytes,
                content_type: object.content_type,
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
    }

    async fn remove(
        &self,
        bearer: Option<&str>,
        bucket: &str,
        paths: &[String],
    ) -> BackendResult<()> {
        self.take_failure(FailPoint::Remove)?;
        let mut state = lock(&self.state);
        self.authorize(&state, bearer)?;
        for path in paths {
            state.objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }

    async fn health(&self) -> BackendResult<()> {
        Ok(())
    }
}
