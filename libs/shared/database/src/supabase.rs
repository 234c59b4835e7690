use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::StoreError;
use crate::store::{CommitResult, Document, DocumentStore, Query, Write, WriteBatch};
use crate::subscription::{Snapshot, Subscription};

/// Thin PostgREST client: one table per collection, one `id` column per row.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| StoreError::Unavailable(format!("invalid api key header: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.anon_key))
            .map_err(|e| StoreError::Unavailable(format!("invalid authorization header: {}", e)))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, StoreError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self.client.request(method, &url)
            .headers(self.get_headers()?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                404 => StoreError::NotFound(error_text),
                409 => classify_conflict(error_text),
                400 | 422 => StoreError::InvalidWrite(error_text),
                401 | 403 => StoreError::Unavailable(format!("Authentication error: {}", error_text)),
                _ => StoreError::Unavailable(format!("API error ({}): {}", status, error_text)),
            });
        }

        let data = response.json::<T>().await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(data)
    }
}

/// `commit_batch` raises `already_exists:` / `not_found:` / anything else as a precondition failure.
fn classify_conflict(error_text: String) -> StoreError {
    let message = serde_json::from_str::<Value>(&error_text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(error_text);

    if let Some(rest) = message.strip_prefix("already_exists:") {
        StoreError::AlreadyExists(rest.trim().to_string())
    } else if let Some(rest) = message.strip_prefix("not_found:") {
        StoreError::NotFound(rest.trim().to_string())
    } else {
        StoreError::PreconditionFailed(message)
    }
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => urlencoding::encode(s).into_owned(),
        other => urlencoding::encode(&other.to_string()).into_owned(),
    }
}

fn query_path(query: &Query) -> String {
    let mut parts: Vec<String> = query
        .filters
        .iter()
        .map(|f| format!("{}=eq.{}", f.field, filter_value(&f.value)))
        .collect();

    if let Some(order) = &query.order_by {
        let direction = if order.descending { "desc" } else { "asc" };
        parts.push(format!("order={}.{}", order.field, direction));
    }
    if let Some(limit) = query.limit {
        parts.push(format!("limit={}", limit));
    }

    if parts.is_empty() {
        format!("/rest/v1/{}", query.collection)
    } else {
        format!("/rest/v1/{}?{}", query.collection, parts.join("&"))
    }
}

/// Document store over Supabase. Batches are applied by the `commit_batch`
/// database function (`migrations/commit_batch.sql`) inside one transaction;
/// live queries are polled.
#[derive(Clone)]
pub struct SupabaseStore {
    client: Arc<SupabaseClient>,
    poll_interval: Duration,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Arc::new(SupabaseClient::new(config)),
            poll_interval: config.subscription_poll_interval(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let path = format!(
            "/rest/v1/{}?id=eq.{}&limit=1",
            collection,
            urlencoding::encode(id)
        );
        let rows: Vec<Value> = self.client.request(Method::GET, &path, None).await?;

        rows.into_iter().next().map(Document::from_row).transpose()
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &query_path(query), None)
            .await?;

        rows.into_iter().map(Document::from_row).collect()
    }

    async fn commit(&self, mut batch: WriteBatch) -> Result<CommitResult, StoreError> {
        // Ids are assigned client-side so the caller learns them without a round trip.
        let mut created_ids = Vec::new();
        for write in batch.writes.iter_mut() {
            if let Write::Create { id, .. } = write {
                let assigned = id.get_or_insert_with(|| Uuid::new_v4().to_string());
                created_ids.push(assigned.clone());
            }
        }

        let _: Value = self
            .client
            .request(
                Method::POST,
                "/rest/v1/rpc/commit_batch",
                Some(json!({ "batch": batch })),
            )
            .await?;

        debug!("Committed batch of {} writes", batch.writes.len());
        Ok(CommitResult { created_ids })
    }

    async fn watch(&self, query: Query) -> Result<Subscription, StoreError> {
        let store = self.clone();
        let interval = self.poll_interval;

        Ok(Subscription::spawn(move |sender| async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Vec<Document>> = None;

            loop {
                ticker.tick().await;
                match store.query(&query).await {
                    Ok(docs) => {
                        if last.as_ref() == Some(&docs) {
                            continue;
                        }
                        last = Some(docs.clone());
                        if sender.send(Ok(Snapshot::new(docs))).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Polling {} failed: {}", query.collection, e);
                        if sender.send(Err(e)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }))
    }
}
