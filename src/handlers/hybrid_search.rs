//! Hybrid search tool endpoints.
//!
//! The tool runtime posts its raw parameters as one JSON object. The
//! request is normalized and validated in full before any call to Milvus,
//! so a caller mistake never costs a network round trip.

use crate::error::{AppError, Result, ValidationError};
use crate::milvus::extract_vector_dims;
use crate::request::{
    build, validate_dimensions, HybridSearchPayload, HybridSearchRequest, ToolParameters,
};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HybridSearchResponse {
    pub success: bool,
    pub operation: &'static str,
    pub collection_name: String,
    pub results: Vec<Value>,
    pub result_count: usize,
}

#[derive(Debug, Serialize)]
pub struct BuildResponse {
    pub success: bool,
    pub payload: HybridSearchPayload,
}

/// POST /tools/hybrid_search - Validate tool parameters and run the hybrid search.
///
/// # Flow
/// 1. Normalize and validate parameters (no network)
/// 2. Describe the collection (404 if it does not exist)
/// 3. Check query vector dimensions against the schema
/// 4. Send the payload to Milvus
pub async fn hybrid_search_handler(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ToolParameters>, JsonRejection>,
) -> Result<Json<HybridSearchResponse>> {
    let start_time = std::time::Instant::now();

    let payload = prepare(body, state.milvus.database())?;
    let collection_name = payload.collection_name.clone();

    let describe = state.milvus.describe_collection(&collection_name).await?;
    let dims = extract_vector_dims(&describe);
    validate_dimensions(&payload, &dims)?;

    tracing::info!(
        collection = %collection_name,
        routes = payload.search.len(),
        strategy = %payload.rerank.strategy,
        "Hybrid searching"
    );

    let results = state.milvus.hybrid_search(&payload).await?;

    let total_time = start_time.elapsed();
    tracing::info!(
        collection = %collection_name,
        result_count = results.len(),
        total_ms = total_time.as_millis(),
        "Hybrid search completed"
    );

    metrics::counter!("hybrid_search_requests_total").increment(1);
    metrics::histogram!("hybrid_search_latency_ms").record(total_time.as_millis() as f64);

    Ok(Json(HybridSearchResponse {
        success: true,
        operation: "hybrid_search",
        collection_name,
        result_count: results.len(),
        results,
    }))
}

/// POST /tools/hybrid_search/build - Return the payload that would be sent, without sending it.
pub async fn build_handler(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ToolParameters>, JsonRejection>,
) -> Result<Json<BuildResponse>> {
    let payload = prepare(body, state.milvus.database())?;

    Ok(Json(BuildResponse {
        success: true,
        payload,
    }))
}

fn prepare(
    body: std::result::Result<Json<ToolParameters>, JsonRejection>,
    database: &str,
) -> Result<HybridSearchPayload> {
    let Json(params) = body.map_err(|rejection| {
        AppError::Validation(ValidationError::MalformedInput {
            param: "request body",
            reason: rejection.body_text(),
        })
    })?;

    let request = HybridSearchRequest::from_parameters(params)?;
    Ok(build(request, database)?)
}
