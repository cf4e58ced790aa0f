//! Validation and assembly of the Milvus hybrid search payload.
//!
//! Works on the canonical [`HybridSearchRequest`] only. The first failure
//! aborts the build; nothing partial leaves this module.

use crate::error::ValidationError;
use crate::request::normalize::{coerce_integer, coerce_number, type_name, RequestResult};
use crate::request::types::{
    HybridSearchPayload, HybridSearchRequest, RerankSpec, RerankStrategy, RouteMap, SearchRoute,
    LIMIT_OFFSET_CEILING,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

const VECTOR_FIELD_KEYS: [&str; 4] = ["annsField", "anns_field", "vectorField", "vector_field"];
const QUERY_VECTOR_KEYS: [&str; 3] = ["data", "queryVectors", "query_vectors"];
const TOP_K_KEYS: [&str; 3] = ["limit", "topK", "top_k"];

/// Accepted snake_case spellings of route keys and their Milvus names.
const PASSTHROUGH_RENAMES: [(&str, &str); 6] = [
    ("output_fields", "outputFields"),
    ("metric_type", "metricType"),
    ("range_filter", "rangeFilter"),
    ("ignore_growing", "ignoreGrowing"),
    ("search_params", "params"),
    ("grouping_field", "groupingField"),
];

const MAX_COLLECTION_NAME_LENGTH: usize = 255;

/// Validate one raw route and lift it into a [`SearchRoute`].
///
/// Only the vector field, the query vectors and top-K are checked. Every
/// other key is forwarded for Milvus to judge.
pub fn validate_route(route: &RouteMap, index: usize) -> RequestResult<SearchRoute> {
    let vector_field = match lookup(route, &VECTOR_FIELD_KEYS) {
        None => return Err(ValidationError::route(index, "missing vectorField")),
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(_) => {
            return Err(ValidationError::route(
                index,
                "vectorField must be a non-empty string",
            ))
        }
    };

    let top_k = match lookup(route, &TOP_K_KEYS).map(coerce_integer) {
        None => return Err(ValidationError::route(index, "missing topK")),
        Some(None) => return Err(ValidationError::route(index, "topK must be an integer")),
        Some(Some(k)) if k <= 0 => {
            return Err(ValidationError::route(index, "topK must be positive"))
        }
        Some(Some(k)) => k as u64,
    };

    let query_vectors = match lookup(route, &QUERY_VECTOR_KEYS) {
        None => return Err(ValidationError::route(index, "missing queryVectors")),
        Some(Value::Array(vectors)) if !vectors.is_empty() => vectors
            .iter()
            .enumerate()
            .map(|(vi, vector)| {
                numeric_vector(vector).ok_or_else(|| {
                    ValidationError::route(
                        index,
                        format!("queryVectors[{}] must be a non-empty numeric vector", vi),
                    )
                })
            })
            .collect::<RequestResult<Vec<_>>>()?,
        Some(_) => {
            return Err(ValidationError::route(
                index,
                "queryVectors must be a non-empty sequence",
            ))
        }
    };

    let mut extra = Map::new();
    for (key, value) in route {
        if is_core_key(key) {
            continue;
        }
        let canonical = canonical_key(key);
        // Milvus spelling wins when the caller sent both.
        if canonical != key.as_str() && route.contains_key(canonical) {
            continue;
        }
        extra.insert(canonical.to_string(), value.clone());
    }

    Ok(SearchRoute {
        vector_field,
        query_vectors,
        top_k,
        extra,
    })
}

/// Resolve the rerank strategy and check its parameters against the route count.
///
/// A missing strategy is weighted when `weights` are supplied and reciprocal
/// rank fusion otherwise.
pub fn validate_rerank(
    strategy: Option<&str>,
    params: Option<&Map<String, Value>>,
    route_count: usize,
) -> RequestResult<RerankSpec> {
    let strategy = match strategy {
        None if params.is_some_and(|p| p.contains_key("weights")) => RerankStrategy::Weighted,
        None => RerankStrategy::Rrf,
        Some(name) => RerankStrategy::parse(name)
            .ok_or_else(|| ValidationError::InvalidRerankStrategy(name.to_string()))?,
    };
    let mut params = params.cloned().unwrap_or_default();

    if strategy == RerankStrategy::Weighted {
        let weights = match params.get("weights") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(weights)) => weights.clone(),
            Some(other) => {
                return Err(ValidationError::InvalidRerankWeights(format!(
                    "must be an array, got {}",
                    type_name(other)
                )))
            }
        };

        if weights.len() != route_count {
            return Err(ValidationError::RerankWeightMismatch {
                expected: route_count,
                actual: weights.len(),
            });
        }

        let weights = weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                coerce_number(w).ok_or_else(|| {
                    ValidationError::InvalidRerankWeights(format!("[{}] must be numeric", i))
                })
            })
            .collect::<RequestResult<Vec<f64>>>()?;
        params.insert("weights".to_string(), Value::from(weights));
    }

    Ok(RerankSpec { strategy, params })
}

/// Check the top-level refinements that Milvus constrains jointly.
pub fn validate_top_level(request: &HybridSearchRequest) -> RequestResult<()> {
    validate_collection_name(&request.collection_name)?;

    if request.limit.is_some_and(|limit| limit < 0) {
        return Err(ValidationError::parameter("limit", "must be non-negative"));
    }
    if request.offset.is_some_and(|offset| offset < 0) {
        return Err(ValidationError::parameter("offset", "must be non-negative"));
    }
    if request.group_size.is_some_and(|size| size <= 0) {
        return Err(ValidationError::parameter("group_size", "must be positive"));
    }

    if let Some(limit) = request.limit {
        let offset = request.offset.unwrap_or(0);
        if limit.saturating_add(offset) >= LIMIT_OFFSET_CEILING {
            return Err(ValidationError::LimitOffsetExceeded {
                limit,
                offset,
                ceiling: LIMIT_OFFSET_CEILING,
            });
        }
    }

    Ok(())
}

/// Validate the whole request and assemble the outbound payload.
///
/// # Flow
/// 1. Reject an empty route list
/// 2. Validate every route in order (fail fast)
/// 3. Validate rerank against the route count
/// 4. Validate top-level refinements
/// 5. Assemble the payload with `database` as `dbName`
pub fn build(request: HybridSearchRequest, database: &str) -> RequestResult<HybridSearchPayload> {
    if request.routes.is_empty() {
        return Err(ValidationError::route(
            0,
            "at least one search route is required",
        ));
    }

    let search = request
        .routes
        .iter()
        .enumerate()
        .map(|(index, route)| validate_route(route, index))
        .collect::<RequestResult<Vec<_>>>()?;

    let rerank = validate_rerank(
        request.rerank_strategy.as_deref(),
        request.rerank_params.as_ref(),
        search.len(),
    )?;

    validate_top_level(&request)?;

    tracing::debug!(
        collection = %request.collection_name,
        routes = search.len(),
        strategy = %rerank.strategy,
        "Hybrid search payload built"
    );

    Ok(HybridSearchPayload {
        db_name: database.to_string(),
        collection_name: request.collection_name,
        search,
        rerank,
        limit: request.limit,
        offset: request.offset,
        output_fields: request.output_fields,
        partition_names: request.partition_names,
        consistency_level: request.consistency_level,
        grouping_field: request.grouping_field,
        group_size: request.group_size,
        strict_group_size: request.strict_group_size,
        function_score: request.function_score,
    })
}

/// Check every route's vectors against the field dimensions Milvus reported.
///
/// Fields missing from `dims` are not checked.
pub fn validate_dimensions(
    payload: &HybridSearchPayload,
    dims: &HashMap<String, usize>,
) -> RequestResult<()> {
    for (index, route) in payload.search.iter().enumerate() {
        let Some(&expected) = dims.get(&route.vector_field) else {
            continue;
        };
        if let Some(vector) = route.query_vectors.iter().find(|v| v.len() != expected) {
            return Err(ValidationError::DimensionMismatch {
                index,
                field: route.vector_field.clone(),
                expected,
                actual: vector.len(),
            });
        }
    }
    Ok(())
}

fn validate_collection_name(name: &str) -> RequestResult<()> {
    if name.len() > MAX_COLLECTION_NAME_LENGTH {
        return Err(ValidationError::parameter(
            "collection_name",
            format!("must be at most {} characters", MAX_COLLECTION_NAME_LENGTH),
        ));
    }

    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::parameter(
            "collection_name",
            "may only contain letters, digits and underscores, and must not start with a digit",
        ));
    }
    Ok(())
}

/// First non-null value among the accepted spellings of a key.
fn lookup<'a>(route: &'a RouteMap, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| route.get(*key))
        .find(|value| !value.is_null())
}

fn is_core_key(key: &str) -> bool {
    VECTOR_FIELD_KEYS.contains(&key)
        || QUERY_VECTOR_KEYS.contains(&key)
        || TOP_K_KEYS.contains(&key)
}

fn canonical_key(key: &str) -> &str {
    PASSTHROUGH_RENAMES
        .iter()
        .find(|(from, _)| *from == key)
        .map(|(_, to)| *to)
        .unwrap_or(key)
}

fn numeric_vector(value: &Value) -> Option<Vec<f64>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items.iter().map(Value::as_f64).collect()
}
