//! Type definitions for the hybrid search request pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Milvus rejects hybrid searches where `limit + offset` reaches this value.
pub const LIMIT_OFFSET_CEILING: i64 = 16384;

/// One raw route mapping exactly as the caller supplied it.
pub type RouteMap = Map<String, Value>;

/// A tool parameter in either of its accepted encodings.
///
/// Tool runtimes hand us strings for everything they cannot type (often
/// JSON-encoded), while programmatic callers send native JSON. Every
/// parameter is classified here once, so later stages never inspect the
/// encoding again.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum ParamValue {
    Text(String),
    Native(Value),
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => ParamValue::Text(s),
            other => ParamValue::Native(other),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Raw parameters of the hybrid search tool.
///
/// `null` and missing keys both deserialize to `None`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolParameters {
    pub collection_name: Option<ParamValue>,
    pub searches_json: Option<ParamValue>,
    pub rerank_strategy: Option<ParamValue>,
    pub rerank_params: Option<ParamValue>,
    pub limit: Option<ParamValue>,
    pub offset: Option<ParamValue>,
    pub output_fields: Option<ParamValue>,
    pub partition_names: Option<ParamValue>,
    pub consistency_level: Option<ParamValue>,
    pub grouping_field: Option<ParamValue>,
    pub group_size: Option<ParamValue>,
    pub strict_group_size: Option<ParamValue>,
    pub function_score: Option<ParamValue>,
}

/// Canonical form of a hybrid search request, independent of how each
/// parameter was encoded. Routes and rerank settings are still unvalidated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridSearchRequest {
    pub collection_name: String,
    pub routes: Vec<RouteMap>,
    pub rerank_strategy: Option<String>,
    pub rerank_params: Option<Map<String, Value>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub output_fields: Option<Vec<String>>,
    pub partition_names: Option<Vec<String>>,
    pub consistency_level: Option<String>,
    pub grouping_field: Option<String>,
    pub group_size: Option<i64>,
    pub strict_group_size: Option<bool>,
    pub function_score: Option<Value>,
}

/// A validated search route (one leg of the hybrid search).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRoute {
    #[serde(rename = "annsField")]
    pub vector_field: String,
    #[serde(rename = "data")]
    pub query_vectors: Vec<Vec<f64>>,
    #[serde(rename = "limit")]
    pub top_k: u64,
    /// Tuning keys forwarded to Milvus untouched (filter, metricType, params, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankStrategy {
    /// Reciprocal rank fusion.
    Rrf,
    /// Weighted score sum, one weight per route.
    Weighted,
}

impl RerankStrategy {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "rrf" => Some(Self::Rrf),
            "weighted" => Some(Self::Weighted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rrf => "rrf",
            Self::Weighted => "weighted",
        }
    }
}

impl fmt::Display for RerankStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankSpec {
    pub strategy: RerankStrategy,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

/// Body of `POST /v2/vectordb/entities/hybrid_search`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridSearchPayload {
    pub db_name: String,
    pub collection_name: String,
    pub search: Vec<SearchRoute>,
    pub rerank: RerankSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_group_size: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_score: Option<Value>,
}
