//! Firestore REST v1 client.
//!
//! Subscriptions poll a structured query at a fixed interval and push a new
//! snapshot whenever the result changes. Errors are pushed once per
//! transition so a long outage does not flood the event channel.

mod value;

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::RemoteConfig;

use super::{
    Collection, FeedSink, Fields, RemoteDocument, RemoteError, RemoteStore, Subscription, WriteOp,
    classify,
};
use value::{decode_fields, encode_fields};

const API_ROOT: &str = "https://firestore.googleapis.com/v1";

/// Firestore client. Cheap to clone.
#[derive(Clone)]
pub struct FirestoreRemote {
    inner: Arc<FirestoreInner>,
}

struct FirestoreInner {
    client: reqwest::Client,
    /// `projects/{project}/databases/{database}`
    database_path: String,
    api_key: SecretString,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    document: Option<WireDocument>,
}

impl FirestoreRemote {
    #[must_use]
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            inner: Arc::new(FirestoreInner {
                client: reqwest::Client::new(),
                database_path: format!(
                    "projects/{}/databases/{}",
                    config.project_id, config.database
                ),
                api_key: config.api_key.clone(),
                poll_interval: config.poll_interval,
            }),
        }
    }

    /// Full resource name of a document.
    fn document_name(&self, collection: Collection, id: &str) -> String {
        format!("{}/documents/{collection}/{id}", self.inner.database_path)
    }

    /// Build a request URL below the API root, with the API key attached.
    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&format!("{API_ROOT}/{path}"))
            .map_err(|e| RemoteError::Unknown(format!("invalid request URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("key", self.inner.api_key.expose_secret());
        }
        Ok(url)
    }

    /// Send a request and return the parsed JSON body, classifying failures.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| classify(Some("unavailable"), &e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify(Some("unavailable"), &e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| RemoteError::Unknown(format!("unreadable response: {e}")))
    }

    /// Run the ordered collection query once.
    #[instrument(skip(self), fields(collection = %collection))]
    async fn run_query(&self, collection: Collection) -> Result<Vec<RemoteDocument>, RemoteError> {
        let url = self.url(&format!("{}/documents:runQuery", self.inner.database_path), &[])?;
        let body = self
            .send(self.inner.client.post(url).json(&query_body(collection)))
            .await?;
        parse_query_rows(body)
    }
}

/// Structured query for a whole collection in subscription order.
fn query_body(collection: Collection) -> Value {
    let order = collection.order();
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection.name() }],
            "orderBy": [{
                "field": { "fieldPath": order.field },
                "direction": if order.descending { "DESCENDING" } else { "ASCENDING" },
            }],
        }
    })
}

fn parse_query_rows(body: Value) -> Result<Vec<RemoteDocument>, RemoteError> {
    if body.is_null() {
        return Ok(Vec::new());
    }
    let rows: Vec<QueryRow> = serde_json::from_value(body)
        .map_err(|e| RemoteError::Unknown(format!("unreadable query result: {e}")))?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.document)
        .map(into_remote_document)
        .collect())
}

fn into_remote_document(doc: WireDocument) -> RemoteDocument {
    RemoteDocument {
        id: document_id(&doc.name).to_string(),
        fields: decode_fields(&doc.fields),
    }
}

/// Last path segment of a document resource name.
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Classify an error response. Falls back to the HTTP status when the body
/// is not a Google API error envelope.
fn error_from_response(status: u16, body: &str) -> RemoteError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return classify(envelope.error.status.as_deref(), &envelope.error.message);
    }
    let code = match status {
        401 => "unauthenticated",
        403 => "permission-denied",
        404 => "not-found",
        429 => "resource-exhausted",
        500 => "internal",
        502..=504 => "unavailable",
        _ => "unknown",
    };
    classify(Some(code), &format!("HTTP {status}: {}", truncate(body, 200)))
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn commit_body(database_path: &str, ops: Vec<WriteOp>) -> Value {
    let writes: Vec<Value> = ops
        .into_iter()
        .map(|op| {
            let collection = op.collection();
            match op {
                WriteOp::Create { id, fields, .. } => json!({
                    "update": {
                        "name": format!("{database_path}/documents/{collection}/{id}"),
                        "fields": encode_fields(&fields),
                    },
                    "currentDocument": { "exists": false },
                }),
                WriteOp::Update { id, fields, .. } => json!({
                    "update": {
                        "name": format!("{database_path}/documents/{collection}/{id}"),
                        "fields": encode_fields(&fields),
                    },
                    "updateMask": { "fieldPaths": fields.keys().collect::<Vec<_>>() },
                    "currentDocument": { "exists": true },
                }),
            }
        })
        .collect();
    json!({ "writes": writes })
}

impl RemoteStore for FirestoreRemote {
    fn subscribe(&self, collection: Collection, sink: FeedSink) -> Subscription {
        let remote = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(remote.inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Result<Vec<RemoteDocument>, RemoteError>> = None;

            loop {
                ticker.tick().await;
                if sink.is_closed() {
                    break;
                }
                let result = remote.run_query(collection).await;
                if last.as_ref() == Some(&result) {
                    continue;
                }
                let delivered = match &result {
                    Ok(documents) => {
                        debug!(collection = %collection, count = documents.len(), "snapshot changed");
                        sink.snapshot(documents.clone())
                    }
                    Err(e) => {
                        warn!(collection = %collection, error = %e, "subscription failed");
                        sink.error(e.clone())
                    }
                };
                if !delivered {
                    break;
                }
                last = Some(result);
            }
        });
        Subscription::new(move || task.abort())
    }

    #[instrument(skip(self, fields), fields(collection = %collection))]
    async fn write(
        &self,
        collection: Collection,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, RemoteError> {
        let body = json!({ "fields": encode_fields(&fields) });

        let request = match id {
            None => {
                let path = format!("{}/documents/{collection}", self.inner.database_path);
                self.inner.client.post(self.url(&path, &[])?)
            }
            Some(id) => {
                let mut params: Vec<(&str, &str)> = fields
                    .keys()
                    .map(|key| ("updateMask.fieldPaths", key.as_str()))
                    .collect();
                params.push(("currentDocument.exists", "true"));
                self.inner
                    .client
                    .patch(self.url(&self.document_name(collection, id), &params)?)
            }
        };

        let response = self.send(request.json(&body)).await?;
        let name = response
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Unknown("write response has no document name".to_string()))?;
        Ok(document_id(name).to_string())
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RemoteError> {
        let url = self.url(&self.document_name(collection, id), &[])?;
        self.send(self.inner.client.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip(self, ops), fields(writes = ops.len()))]
    async fn batch_commit(&self, ops: Vec<WriteOp>) -> Result<(), RemoteError> {
        let url = self.url(&format!("{}/documents:commit", self.inner.database_path), &[])?;
        let body = commit_body(&self.inner.database_path, ops);
        self.send(self.inner.client.post(url).json(&body)).await?;
        Ok(())
    }
}
