use super::{EventStore, auth::ServiceAccount};
use crate::{config::FirestoreConfig, error::StoreError, event::Event};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;

/// Read-only view of a Firestore collection through the REST API.
pub struct FirestoreStore {
    client: Client,
    base_url: String,
    project_id: String,
    collection: String,
    auth: Option<ServiceAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    pub fn from_config(config: &FirestoreConfig) -> Result<Self, StoreError> {
        let project_id = config
            .project_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::NotConfigured("firestore project_id is missing".into()))?;

        let (base_url, auth) = match config.emulator_host.as_deref().filter(|h| !h.is_empty()) {
            Some(host) => {
                tracing::info!(host, "using firestore emulator without credentials");
                (format!("http://{}/v1", host.trim_end_matches('/')), None)
            }
            None => {
                let (Some(email), Some(key)) = (
                    config.client_email.as_deref().filter(|v| !v.is_empty()),
                    config.private_key.as_deref().filter(|v| !v.is_empty()),
                ) else {
                    return Err(StoreError::NotConfigured(
                        "firestore client_email and private_key are required".into(),
                    ));
                };
                let account = ServiceAccount::new(email, key, &config.token_uri)?;
                (FIRESTORE_BASE_URL.to_string(), Some(account))
            }
        };

        let client = Client::builder()
            .user_agent(concat!("eps-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            project_id,
            collection: config.collection.clone(),
            auth,
        })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            self.base_url, self.project_id, self.collection
        )
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<ListDocumentsResponse, StoreError> {
        let mut request = self
            .client
            .get(self.documents_url())
            .query(&[("pageSize", PAGE_SIZE.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        if let Some(auth) = &self.auth {
            request = request.bearer_auth(auth.access_token(&self.client).await?);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl EventStore for FirestoreStore {
    async fn list(&self) -> Result<Vec<Event>, StoreError> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(page_token.as_deref()).await?;
            for document in page.documents {
                match document_to_event(&document) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        tracing::warn!(document = %document.name, error = %err, "skipping undecodable document");
                    }
                }
            }
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!(collection = %self.collection, count = events.len(), "fetched firestore events");
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "firestore"
    }
}

fn document_to_event(document: &Document) -> Result<Event, serde_json::Error> {
    let mut fields = decode_fields(&document.fields);
    let id = document
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    fields.insert("id".to_string(), Value::String(id));
    serde_json::from_value(Value::Object(fields))
}

fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

/// Flattens a typed Firestore value (`{"integerValue": "4"}`) into plain JSON.
fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|obj| obj.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" | "booleanValue"
        | "doubleValue" | "geoPointValue" => inner.clone(),
        "integerValue" => inner
            .as_str()
            .and_then(|text| text.parse::<i64>().ok())
            .map(Value::from)
            .or_else(|| inner.as_i64().map(Value::from))
            .unwrap_or(Value::Null),
        "mapValue" => inner
            .get("fields")
            .and_then(Value::as_object)
            .map(|fields| Value::Object(decode_fields(fields)))
            .unwrap_or_else(|| Value::Object(Map::new())),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}
