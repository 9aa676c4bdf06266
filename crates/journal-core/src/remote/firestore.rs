//! Cloud Firestore remote store over the REST v1 API.
//!
//! Writes are `PATCH` (create-or-replace) and `DELETE` on the document URL.
//! The subscription polls the collection and emits a snapshot whenever its
//! contents differ from the last one delivered.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::{FieldValue, RemoteDocument, RemoteSnapshot, RemoteStore, Subscription};
use crate::error::{Error, Result};
use crate::util::compact_text;

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_COLLECTION: &str = "journals";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const HTTP_TIMEOUT_SECS: u64 = 15;
const PAGE_SIZE: usize = 300;

/// Connection settings for one Firestore collection
#[derive(Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database_id: String,
    pub collection: String,
    /// Web API key, sent as the `key` query parameter
    pub api_key: Option<String>,
    /// OAuth or Firebase ID token, sent as a bearer token
    pub bearer_token: Option<String>,
    pub poll_interval: Duration,
    /// REST root; point it at an emulator for local work
    pub base_url: String,
}

impl std::fmt::Debug for FirestoreConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .field("collection", &self.collection)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("poll_interval", &self.poll_interval)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            api_key: None,
            bearer_token: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    #[must_use]
    pub fn with_database(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.project_id),
            self.database_id,
            urlencoding::encode(&self.collection)
        )
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(id))
    }
}

/// [`RemoteStore`] backed by a Firestore collection
#[derive(Clone)]
pub struct FirestoreRemoteStore {
    config: Arc<FirestoreConfig>,
    client: reqwest::Client,
}

impl FirestoreRemoteStore {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        if config.project_id.trim().is_empty() {
            return Err(Error::Config("Firestore project id must not be empty".into()));
        }
        if config.collection.trim().is_empty() {
            return Err(Error::Config("Firestore collection must not be empty".into()));
        }
        if config.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be positive".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    /// Read the whole collection, following page tokens
    pub async fn fetch_snapshot(&self) -> Result<RemoteSnapshot> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, &self.config.collection_url())
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(Error::Remote(parse_api_error(status, &body)));
            }

            let page: ListDocumentsResponse = serde_json::from_str(&body)?;
            documents.extend(page.documents.iter().map(decode_document));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(RemoteSnapshot::new(documents))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        if let Some(api_key) = self.config.api_key.as_deref() {
            request = request.query(&[("key", api_key)]);
        }
        if let Some(token) = self.config.bearer_token.as_deref() {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn poll(self, tx: mpsc::UnboundedSender<Result<RemoteSnapshot>>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_delivered: Option<RemoteSnapshot> = None;

        loop {
            tokio::select! {
                () = tx.closed() => break,
                _ = interval.tick() => {}
            }

            let event = match self.fetch_snapshot().await {
                Ok(snapshot) if last_delivered.as_ref() == Some(&snapshot) => continue,
                Ok(snapshot) => {
                    last_delivered = Some(snapshot.clone());
                    Ok(snapshot)
                }
                Err(error) => Err(error),
            };

            if tx.send(event).is_err() {
                break;
            }
        }

        tracing::debug!(
            "Firestore listener for '{}' stopped",
            self.config.collection
        );
    }
}

#[async_trait]
impl RemoteStore for FirestoreRemoteStore {
    async fn set_document(&self, id: &str, document: &RemoteDocument) -> Result<()> {
        let body = json!({ "fields": encode_fields(&document.fields) });
        let response = self
            .request(Method::PATCH, &self.config.document_url(id))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(parse_api_error(status, &body)));
        }
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &self.config.document_url(id))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Remote(parse_api_error(status, &body)))
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.clone().poll(tx));
        rx
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    /// Full resource name; the last path segment is the document key
    name: String,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

fn decode_document(document: &FirestoreDocument) -> RemoteDocument {
    let id = document
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    let fields = document
        .fields
        .iter()
        .filter_map(|(name, value)| decode_value(value).map(|decoded| (name.clone(), decoded)))
        .collect();
    RemoteDocument { id, fields }
}

/// Decode one typed Firestore value; kinds we never write are skipped
fn decode_value(value: &Value) -> Option<FieldValue> {
    let object = value.as_object()?;

    if object.contains_key("nullValue") {
        return Some(FieldValue::Null);
    }
    if let Some(text) = object.get("stringValue") {
        return text.as_str().map(|text| FieldValue::String(text.to_string()));
    }
    if let Some(integer) = object.get("integerValue") {
        // int64 arrives as a decimal string
        return match integer {
            Value::String(text) => text.parse().ok().map(FieldValue::Integer),
            Value::Number(number) => number.as_i64().map(FieldValue::Integer),
            _ => None,
        };
    }
    if let Some(double) = object.get("doubleValue") {
        return double.as_f64().map(FieldValue::Double);
    }
    if let Some(boolean) = object.get("booleanValue") {
        return boolean.as_bool().map(FieldValue::Boolean);
    }
    None
}

fn encode_fields(fields: &BTreeMap<String, FieldValue>) -> serde_json::Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect()
}

fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Boolean(boolean) => json!({ "booleanValue": boolean }),
        FieldValue::Integer(integer) => json!({ "integerValue": integer.to_string() }),
        FieldValue::Double(double) => json!({ "doubleValue": double }),
        FieldValue::String(text) => json!({ "stringValue": text }),
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(ApiErrorBody {
        error: Some(detail),
    }) = serde_json::from_str::<ApiErrorBody>(body)
    {
        if let Some(message) = detail.message {
            let kind = detail.status.unwrap_or_else(|| status.as_u16().to_string());
            return format!("{} ({kind})", message.trim());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_collection_and_document_urls() {
        let config = FirestoreConfig::new("my-project");
        assert_eq!(
            config.collection_url(),
            "https://firestore.googleapis.com/v1/projects/my-project/databases/(default)/documents/journals"
        );
        assert_eq!(
            config.document_url("12"),
            "https://firestore.googleapis.com/v1/projects/my-project/databases/(default)/documents/journals/12"
        );

        let emulator = FirestoreConfig::new("demo")
            .with_base_url("http://localhost:8080/v1/")
            .with_collection("entries");
        assert_eq!(
            emulator.collection_url(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/entries"
        );
    }

    #[test]
    fn new_rejects_invalid_config() {
        assert!(FirestoreRemoteStore::new(FirestoreConfig::new("  ")).is_err());
        assert!(FirestoreRemoteStore::new(FirestoreConfig::new("p").with_collection("")).is_err());
        assert!(FirestoreRemoteStore::new(
            FirestoreConfig::new("p").with_poll_interval(Duration::ZERO)
        )
        .is_err());
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = FirestoreConfig::new("p")
            .with_api_key("api-secret")
            .with_bearer_token("token-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("api-secret"));
        assert!(!debug.contains("token-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn encodes_typed_values() {
        let document = RemoteDocument::new("1")
            .with_field("title", "A")
            .with_field("moodLevel", 3_i64)
            .with_field("imageUri", None::<String>);

        assert_eq!(
            Value::Object(encode_fields(&document.fields)),
            json!({
                "title": { "stringValue": "A" },
                "moodLevel": { "integerValue": "3" },
                "imageUri": { "nullValue": null },
            })
        );
    }

    #[test]
    fn decodes_list_response() {
        let body = json!({
            "documents": [
                {
                    "name": "projects/p/databases/(default)/documents/journals/1",
                    "fields": {
                        "title": { "stringValue": "A" },
                        "location": { "stringValue": "1.5,2.5" },
                        "moodLevel": { "integerValue": "2" },
                        "imageUri": { "nullValue": null },
                        "createdAt": { "timestampValue": "2024-01-01T00:00:00Z" }
                    },
                    "createTime": "2024-01-01T00:00:00Z",
                    "updateTime": "2024-01-01T00:00:00Z"
                }
            ],
            "nextPageToken": "abc"
        })
        .to_string();

        let page: ListDocumentsResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        let document = decode_document(&page.documents[0]);
        assert_eq!(
            document,
            RemoteDocument::new("1")
                .with_field("title", "A")
                .with_field("location", "1.5,2.5")
                .with_field("moodLevel", 2_i64)
                .with_field("imageUri", None::<String>)
        );
    }

    #[test]
    fn decodes_empty_collection() {
        let page: ListDocumentsResponse = serde_json::from_str("{}").unwrap();
        assert!(page.documents.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn decode_value_handles_numbers_and_unknown_kinds() {
        assert_eq!(
            decode_value(&json!({ "integerValue": 5 })),
            Some(FieldValue::Integer(5))
        );
        assert_eq!(
            decode_value(&json!({ "integerValue": "not a number" })),
            None
        );
        assert_eq!(
            decode_value(&json!({ "doubleValue": 1.25 })),
            Some(FieldValue::Double(1.25))
        );
        assert_eq!(
            decode_value(&json!({ "booleanValue": true })),
            Some(FieldValue::Boolean(true))
        );
        assert_eq!(decode_value(&json!({ "mapValue": {} })), None);
        assert_eq!(decode_value(&json!("bare")), None);
    }

    #[test]
    fn parse_api_error_prefers_structured_message() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            parse_api_error(StatusCode::FORBIDDEN, body),
            "Missing or insufficient permissions. (PERMISSION_DENIED)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down (502)"
        );
    }
}
