use std::sync::Arc;

use entity::Record;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{BackendError, BackendResult, Filter, ObjectUpload, Select, Transport};

/// Typed handle over a [`Transport`], optionally scoped to a signed-in user.
///
/// Cloning is cheap; every clone shares the same transport.
#[derive(Clone)]
pub struct BackendClient {
    transport: Arc<dyn Transport>,
    bearer: Option<Arc<str>>,
    bucket: Arc<str>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("signed_in", &self.bearer.is_some())
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl BackendClient {
    pub fn new(transport: Arc<dyn Transport>, bucket: impl Into<String>) -> Self {
        Self {
            transport,
            bearer: None,
            bucket: Arc::from(bucket.into()),
        }
    }

    /// A copy of this client that authenticates as the holder of `access_token`.
    pub fn with_token(&self, access_token: &str) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            bearer: Some(Arc::from(access_token)),
            bucket: Arc::clone(&self.bucket),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub async fn fetch<R: Record>(&self, query: &Select) -> BackendResult<Vec<R>> {
        let rows = self.transport.select(self.bearer(), query).await?;
        decode_rows(rows)
    }

    /// First row of `query`, if any.
    pub async fn fetch_one<R: Record>(&self, query: &Select) -> BackendResult<Option<R>> {
        let query = query.clone().limit(1);
        Ok(self.fetch::<R>(&query).await?.into_iter().next())
    }

    pub async fn find<R: Record>(&self, id: impl std::fmt::Display) -> BackendResult<Option<R>> {
        self.fetch_one::<R>(&Select::of::<R>().eq("id", id)).await
    }

    /// Insert `drafts` in one request and return the stored rows.
    pub async fn insert<R: Record, D: Serialize>(&self, drafts: &[D]) -> BackendResult<Vec<R>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let rows = drafts
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let stored = self.transport.insert(self.bearer(), R::TABLE, rows).await?;
        decode_rows(stored)
    }

    pub async fn insert_one<R: Record, D: Serialize>(&self, draft: &D) -> BackendResult<R> {
        self.insert::<R, D>(std::slice::from_ref(draft))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("insert returned no rows".to_string()))
    }

    pub async fn update<R: Record, C: Serialize>(
        &self,
        filters: &[Filter],
        changes: &C,
    ) -> BackendResult<Vec<R>> {
        let changes = serde_json::to_value(changes)?;
        let rows = self
            .transport
            .update(self.bearer(), R::TABLE, filters, changes)
            .await?;
        decode_rows(rows)
    }

    pub async fn delete<R: Record>(&self, filters: &[Filter]) -> BackendResult<Vec<R>> {
        let rows = self.transport.delete(self.bearer(), R::TABLE, filters).await?;
        decode_rows(rows)
    }

    /// Delete the row with primary key `id`.
    pub async fn delete_by_id<R: Record>(&self, id: Uuid) -> BackendResult<Vec<R>> {
        self.delete::<R>(&[Filter::eq("id", id)]).await
    }

    pub async fn upload(&self, path: &str, object: ObjectUpload) -> BackendResult<()> {
        self.transport
            .upload(self.bearer(), &self.bucket, path, object)
            .await
    }

    pub fn public_url(&self, path: &str) -> String {
        self.transport.public_url(&self.bucket, path)
    }

    pub async fn remove(&self, paths: &[String]) -> BackendResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        self.transport.remove(self.bearer(), &self.bucket, paths).await
    }
}

fn decode_rows<R: Record>(rows: Vec<Value>) -> BackendResult<Vec<R>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(BackendError::from))
        .collect()
}
