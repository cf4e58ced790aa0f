//! Input normalization for hybrid search tool parameters.
//!
//! Every parameter arrives either as text (possibly JSON-encoded, possibly
//! comma-separated) or as native JSON. The functions here collapse both
//! encodings into a single canonical shape so the builder never has to
//! care which one the caller picked.

use crate::error::ValidationError;
use crate::request::types::{HybridSearchRequest, ParamValue, RouteMap, ToolParameters};
use serde_json::Value;

/// Result type for normalization and validation
pub type RequestResult<T> = std::result::Result<T, ValidationError>;

/// How many extra times a JSON string result is decoded again.
/// Tool runtimes occasionally encode structured parameters twice.
const MAX_NESTED_DECODES: usize = 2;

/// Parse JSON text, unwrapping values that were string-encoded more than once.
pub fn parse_json_text(param: &'static str, text: &str) -> RequestResult<Value> {
    let mut parsed: Value =
        serde_json::from_str(text.trim()).map_err(|e| ValidationError::MalformedInput {
            param,
            reason: e.to_string(),
        })?;

    for _ in 0..MAX_NESTED_DECODES {
        let Value::String(inner) = &parsed else {
            break;
        };
        match serde_json::from_str::<Value>(inner.trim()) {
            Ok(decoded) => parsed = decoded,
            Err(_) => break,
        }
    }

    Ok(parsed)
}

/// Normalize `searches_json` into an ordered list of raw route mappings.
///
/// Route order is preserved: it decides which weight applies to which
/// route under weighted rerank.
pub fn normalize_routes(raw: ParamValue) -> RequestResult<Vec<RouteMap>> {
    const PARAM: &str = "searches_json";

    let value = match raw {
        ParamValue::Text(text) => parse_json_text(PARAM, &text)?,
        ParamValue::Native(value) => value,
    };

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ValidationError::MalformedInput {
                param: PARAM,
                reason: format!(
                    "expected a JSON array of search objects, got {}",
                    type_name(&other)
                ),
            })
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(route) => Ok(route),
            _ => Err(ValidationError::route(index, "route must be an object")),
        })
        .collect()
}

/// Normalize a list parameter given as `"a, b"`, `'["a","b"]'` or `["a","b"]`.
///
/// Elements are trimmed and empty elements dropped.
pub fn normalize_delimited_list(
    param: &'static str,
    raw: ParamValue,
) -> RequestResult<Vec<String>> {
    let items = match raw {
        ParamValue::Text(text) => {
            let trimmed = text.trim();
            if !trimmed.starts_with('[') {
                return Ok(split_delimited(trimmed));
            }
            match parse_json_text(param, trimmed)? {
                Value::Array(items) => items,
                other => {
                    return Err(ValidationError::MalformedInput {
                        param,
                        reason: format!("expected a JSON array, got {}", type_name(&other)),
                    })
                }
            }
        }
        ParamValue::Native(Value::Array(items)) => items,
        ParamValue::Native(other) => {
            return Err(ValidationError::parameter(
                param,
                format!(
                    "must be a comma-separated string or an array of strings, got {}",
                    type_name(&other)
                ),
            ))
        }
    };

    let mut values = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let s = match item {
            Value::String(s) => s,
            other => {
                return Err(ValidationError::parameter(
                    param,
                    format!("[{}] must be a string, got {}", idx, type_name(&other)),
                ))
            }
        };
        let s = s.trim();
        if !s.is_empty() {
            values.push(s.to_string());
        }
    }
    Ok(values)
}

/// Normalize a structured parameter given as JSON text or native JSON.
///
/// Only objects and arrays are accepted.
pub fn normalize_json_object(param: &'static str, raw: ParamValue) -> RequestResult<Value> {
    let value = match raw {
        ParamValue::Text(text) => parse_json_text(param, &text)?,
        ParamValue::Native(value) => value,
    };

    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        other => Err(ValidationError::MalformedInput {
            param,
            reason: format!("expected a JSON object or array, got {}", type_name(&other)),
        }),
    }
}

pub fn normalize_integer(param: &'static str, raw: ParamValue) -> RequestResult<Option<i64>> {
    let value = match raw {
        ParamValue::Text(text) if text.trim().is_empty() => return Ok(None),
        ParamValue::Text(text) => Value::String(text),
        ParamValue::Native(value) => value,
    };
    coerce_integer(&value)
        .map(Some)
        .ok_or_else(|| ValidationError::parameter(param, "must be an integer"))
}

pub fn normalize_flag(param: &'static str, raw: ParamValue) -> RequestResult<Option<bool>> {
    match raw {
        ParamValue::Native(Value::Bool(flag)) => Ok(Some(flag)),
        ParamValue::Text(text) => match text.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(ValidationError::parameter(param, "must be 'true' or 'false'")),
        },
        ParamValue::Native(other) => Err(ValidationError::parameter(
            param,
            format!("must be a boolean, got {}", type_name(&other)),
        )),
    }
}

pub fn normalize_text(param: &'static str, raw: ParamValue) -> RequestResult<Option<String>> {
    match raw {
        ParamValue::Text(text) => {
            let text = text.trim();
            Ok((!text.is_empty()).then(|| text.to_string()))
        }
        ParamValue::Native(other) => Err(ValidationError::parameter(
            param,
            format!("must be a string, got {}", type_name(&other)),
        )),
    }
}

impl HybridSearchRequest {
    /// Normalize raw tool parameters into the canonical request.
    ///
    /// Blank strings count as absent. `collection_name` and `searches_json`
    /// are required.
    pub fn from_parameters(params: ToolParameters) -> RequestResult<Self> {
        let collection_name = optional(params.collection_name, |raw| {
            normalize_text("collection_name", raw)
        })?
        .ok_or(ValidationError::MissingParameter("collection_name"))?;

        let routes = non_blank(params.searches_json)
            .ok_or(ValidationError::MissingParameter("searches_json"))
            .and_then(normalize_routes)?;

        let rerank_strategy = optional(params.rerank_strategy, |raw| {
            normalize_text("rerank_strategy", raw)
        })?;
        let rerank_params = optional(params.rerank_params, |raw| {
            match normalize_json_object("rerank_params", raw)? {
                Value::Object(map) => Ok(Some(map)),
                _ => Err(ValidationError::MalformedInput {
                    param: "rerank_params",
                    reason: "expected a JSON object".to_string(),
                }),
            }
        })?;

        Ok(Self {
            collection_name,
            routes,
            rerank_strategy,
            rerank_params,
            limit: optional(params.limit, |raw| normalize_integer("limit", raw))?,
            offset: optional(params.offset, |raw| normalize_integer("offset", raw))?,
            output_fields: optional(params.output_fields, |raw| {
                normalize_delimited_list("output_fields", raw).map(non_empty)
            })?,
            partition_names: optional(params.partition_names, |raw| {
                normalize_delimited_list("partition_names", raw).map(non_empty)
            })?,
            consistency_level: optional(params.consistency_level, |raw| {
                normalize_text("consistency_level", raw)
            })?,
            grouping_field: optional(params.grouping_field, |raw| {
                normalize_text("grouping_field", raw)
            })?,
            group_size: optional(params.group_size, |raw| normalize_integer("group_size", raw))?,
            strict_group_size: optional(params.strict_group_size, |raw| {
                normalize_flag("strict_group_size", raw)
            })?,
            function_score: optional(params.function_score, |raw| {
                normalize_json_object("function_score", raw).map(Some)
            })?,
        })
    }
}

// i64::MAX itself is not representable as f64, so the upper bound is exclusive.
const I64_LOWER: f64 = i64::MIN as f64;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// Integer from a JSON number (zero fraction allowed) or an integer string.
pub(crate) fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Float from a JSON number or a numeric string.
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn split_delimited(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn non_blank(raw: Option<ParamValue>) -> Option<ParamValue> {
    raw.filter(|value| !matches!(value, ParamValue::Text(text) if text.trim().is_empty()))
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

fn optional<T>(
    raw: Option<ParamValue>,
    normalize: impl FnOnce(ParamValue) -> RequestResult<Option<T>>,
) -> RequestResult<Option<T>> {
    Ok(non_blank(raw).map(normalize).transpose()?.flatten())
}
