use crate::config::MilvusConfig;
use crate::error::{AppError, Result};
use crate::request::HybridSearchPayload;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

const REST_PREFIX: &str = "/v2/vectordb";

/// Envelope wrapping every Milvus v2 REST response.
#[derive(Debug, Deserialize)]
struct MilvusResponse {
    #[serde(default)]
    code: i64,
    message: Option<String>,
    data: Option<Value>,
}

/// Thin client for the Milvus v2 REST API.
///
/// One POST per call and no retries: failures surface to the caller as-is.
#[derive(Clone)]
pub struct MilvusClient {
    client: reqwest::Client,
    base_url: String,
    database: String,
}

impl MilvusClient {
    pub fn new(config: &MilvusConfig) -> Result<Self> {
        let base_url = rest_base_url(&config.uri)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let token = config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty());
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                AppError::Config("MILVUS_TOKEN contains invalid header characters".to_string())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            base_url = %base_url,
            database = %config.database,
            "Milvus client configured"
        );

        Ok(Self {
            client,
            base_url,
            database: config.database.clone(),
        })
    }

    /// Database injected as `dbName` into outbound requests.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// POST `body` to `endpoint` and unwrap the Milvus envelope.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(url = %url, "Sending Milvus request");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(AppError::Upstream(format!("HTTP {}: {}", status.as_u16(), text)));
        }

        let envelope: MilvusResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::Upstream(format!("Invalid response from Milvus: {}", e)))?;

        if envelope.code != 0 && envelope.code != 200 {
            let message = envelope
                .message
                .unwrap_or_else(|| "Unknown error".to_string());
            tracing::debug!(
                code = envelope.code,
                message = %message,
                "Milvus returned an error code"
            );
            return Err(AppError::Upstream(message));
        }

        Ok(envelope.data)
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let data = self
            .post("/collections/list", &json!({ "dbName": self.database }))
            .await?;
        Ok(data
            .and_then(|data| serde_json::from_value(data).ok())
            .unwrap_or_default())
    }

    /// Describe a collection; Milvus "not found" errors become [`AppError::CollectionNotFound`].
    pub async fn describe_collection(&self, collection_name: &str) -> Result<Value> {
        let body = json!({
            "dbName": self.database,
            "collectionName": collection_name,
        });

        match self.post("/collections/describe", &body).await {
            Ok(data) => Ok(data.unwrap_or(Value::Null)),
            Err(AppError::Upstream(message)) if is_not_found(&message) => {
                Err(AppError::CollectionNotFound(collection_name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Run a validated hybrid search and return the result rows.
    pub async fn hybrid_search(&self, payload: &HybridSearchPayload) -> Result<Vec<Value>> {
        match self.post("/entities/hybrid_search", payload).await? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(rows)) => Ok(rows),
            Some(other) => Err(AppError::Upstream(format!(
                "Unexpected hybrid_search response data: {}",
                other
            ))),
        }
    }
}

/// Normalize a Milvus address into the v2 REST base URL.
///
/// `localhost:19530` becomes `http://localhost:19530/v2/vectordb`.
pub fn rest_base_url(uri: &str) -> Result<String> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(AppError::Config("Milvus URI is required".to_string()));
    }

    let mut url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let len = url.trim_end_matches('/').len();
    url.truncate(len);
    if !url.ends_with(REST_PREFIX) {
        url.push_str(REST_PREFIX);
    }
    Ok(url)
}

/// Map vector field names to their dimension from a describe-collection response.
///
/// Fields whose dimension cannot be read are skipped.
pub fn extract_vector_dims(describe: &Value) -> HashMap<String, usize> {
    let Some(fields) = describe.get("fields").and_then(|f| f.as_array()) else {
        return HashMap::new();
    };

    fields
        .iter()
        .filter_map(|field| {
            let name = field
                .get("fieldName")
                .or_else(|| field.get("name"))
                .and_then(|n| n.as_str())?;
            let data_type = field
                .get("dataType")
                .or_else(|| field.get("type"))
                .and_then(|t| t.as_str())?;
            if !data_type.to_lowercase().contains("vector") {
                return None;
            }

            let dim = ["elementTypeParams", "typeParams", "params"]
                .iter()
                .find_map(|key| field.get(*key).and_then(dim_param))?;
            let dim = match dim {
                Value::Number(n) => n.as_u64()?,
                Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                    s.parse().ok()?
                }
                _ => return None,
            };
            Some((name.to_string(), dim as usize))
        })
        .collect()
}

/// `dim` from either `{"dim": 768}` or the REST list form `[{"key": "dim", "value": "768"}]`.
fn dim_param(params: &Value) -> Option<&Value> {
    match params {
        Value::Object(map) => map.get("dim"),
        Value::Array(entries) => entries
            .iter()
            .find(|entry| entry.get("key").and_then(Value::as_str) == Some("dim"))
            .and_then(|entry| entry.get("value")),
        _ => None,
    }
}

fn is_not_found(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("not found") || message.contains("not exist")
}
