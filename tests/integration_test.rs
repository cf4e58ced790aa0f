//! Integration tests for the hybridgate HTTP surface.
//!
//! Milvus is replaced by a wiremock server; tests that only exercise
//! validation point the client at an address that is never contacted.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use hybridgate::{
    build_handler, health_handler, hybrid_search_handler, ready_handler, AppState, Config,
    MilvusConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNUSED_MILVUS: &str = "127.0.0.1:9";

/// Helper to create a test router with every tool endpoint.
fn create_test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tools/hybrid_search", post(hybrid_search_handler))
        .route("/tools/hybrid_search/build", post(build_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}

fn test_state(milvus_uri: &str) -> Arc<AppState> {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        shutdown_timeout_secs: 0,
        max_body_bytes: 1024 * 1024,
        milvus: MilvusConfig {
            token: Some("root:Milvus".to_string()),
            database: "analytics".to_string(),
            timeout_secs: 5,
            ..MilvusConfig::new(milvus_uri)
        },
    };
    Arc::new(AppState::new(config).expect("Failed to create AppState"))
}

/// Helper to make a JSON request to the router.
async fn json_request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Body>,
) -> (StatusCode, Value) {
    let req = match method {
        "GET" => Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
        "POST" => Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.unwrap_or_else(|| Body::from("{}")))
            .unwrap(),
        _ => panic!("Unsupported method"),
    };

    let response = app.oneshot(req).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    json_request(app, "POST", uri, Some(Body::from(body.to_string()))).await
}

fn describe_response(dims: &[(&str, u64)]) -> ResponseTemplate {
    let fields: Vec<Value> = dims
        .iter()
        .map(|(name, dim)| {
            json!({
                "fieldName": name,
                "dataType": "FloatVector",
                "elementTypeParams": { "dim": dim }
            })
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 0,
        "data": { "collectionName": "docs", "fields": fields }
    }))
}

// ============================================================================
// Health Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_200() {
    let app = Router::new().route("/health", get(health_handler));
    let (status, body) = json_request(app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_endpoint_reflects_milvus() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": ["docs", "images"]
        })))
        .mount(&server)
        .await;

    let app = create_test_app(test_state(&server.uri()));
    let (status, body) = json_request(app, "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_ready_endpoint_returns_503_when_milvus_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/list"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let app = create_test_app(test_state(&server.uri()));
    let (status, body) = json_request(app, "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
}

// ============================================================================
// Build Endpoint Tests (no Milvus)
// ============================================================================

#[tokio::test]
async fn test_build_single_rrf_route() {
    let app = create_test_app(test_state(UNUSED_MILVUS));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search/build",
        json!({
            "collection_name": "docs",
            "searches_json": r#"[{"data": [[0.1,0.2]], "annsField": "v1", "limit": 10}]"#,
            "rerank_strategy": "rrf",
            "rerank_params": r#"{"k": 10}"#
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["payload"],
        json!({
            "dbName": "analytics",
            "collectionName": "docs",
            "search": [{ "annsField": "v1", "data": [[0.1, 0.2]], "limit": 10 }],
            "rerank": { "strategy": "rrf", "params": { "k": 10 } }
        })
    );
}

#[tokio::test]
async fn test_build_weight_mismatch_returns_400() {
    let app = create_test_app(test_state(UNUSED_MILVUS));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search/build",
        json!({
            "collection_name": "docs",
            "searches_json": [
                { "data": [[0.1]], "annsField": "dense", "limit": 5 },
                { "data": [[0.2]], "annsField": "title", "limit": 5 }
            ],
            "rerank_strategy": "weighted",
            "rerank_params": { "weights": [0.6] }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_type"], "RerankWeightMismatch");
    assert!(body["error"].as_str().unwrap().contains("expected 2, got 1"));
}

#[tokio::test]
async fn test_build_output_fields_string_is_split() {
    let app = create_test_app(test_state(UNUSED_MILVUS));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search/build",
        json!({
            "collection_name": "docs",
            "searches_json": [{ "data": [[0.1]], "annsField": "v1", "limit": 5 }],
            "output_fields": "a, b ,c",
            "partition_names": ["p2024", " p2025 "],
            "consistency_level": "Bounded",
            "grouping_field": "author",
            "group_size": "3",
            "strict_group_size": "true",
            "function_score": r#"{"functions": [{"type": "decay"}]}"#
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let payload = &body["payload"];
    assert_eq!(payload["outputFields"], json!(["a", "b", "c"]));
    assert_eq!(payload["partitionNames"], json!(["p2024", "p2025"]));
    assert_eq!(payload["consistencyLevel"], "Bounded");
    assert_eq!(payload["groupingField"], "author");
    assert_eq!(payload["groupSize"], 3);
    assert_eq!(payload["strictGroupSize"], true);
    assert_eq!(payload["functionScore"]["functions"][0]["type"], "decay");
}

#[tokio::test]
async fn test_build_limit_offset_exceeded_returns_400() {
    let app = create_test_app(test_state(UNUSED_MILVUS));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search/build",
        json!({
            "collection_name": "docs",
            "searches_json": [{ "data": [[0.1]], "annsField": "v1", "limit": 5 }],
            "limit": 16000,
            "offset": "400"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "LimitOffsetExceeded");
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_build_missing_vector_field_returns_400() {
    let app = create_test_app(test_state(UNUSED_MILVUS));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search/build",
        json!({
            "collection_name": "docs",
            "searches_json": [{ "data": [[0.1]], "limit": 5 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "InvalidRoute");
    assert_eq!(body["error"], "search[0]: missing vectorField");
}

#[tokio::test]
async fn test_build_invalid_searches_json_names_parameter() {
    let app = create_test_app(test_state(UNUSED_MILVUS));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search/build",
        json!({
            "collection_name": "docs",
            "searches_json": "[{\"annsField\": "
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "MalformedInput");
    assert!(body["error"].as_str().unwrap().contains("searches_json"));
}

#[tokio::test]
async fn test_build_rejects_non_json_body() {
    let app = create_test_app(test_state(UNUSED_MILVUS));
    let (status, body) = json_request(
        app,
        "POST",
        "/tools/hybrid_search/build",
        Some(Body::from("collection_name=docs")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "MalformedInput");
}

#[tokio::test]
async fn test_build_rejects_bad_collection_name() {
    let app = create_test_app(test_state(UNUSED_MILVUS));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search/build",
        json!({
            "collection_name": "my-docs",
            "searches_json": [{ "data": [[0.1]], "annsField": "v1", "limit": 5 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "InvalidParameter");
}

// ============================================================================
// Hybrid Search Endpoint Tests (mock Milvus)
// ============================================================================

#[tokio::test]
async fn test_hybrid_search_sends_validated_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/describe"))
        .and(body_partial_json(json!({ "dbName": "analytics", "collectionName": "docs" })))
        .respond_with(describe_response(&[("dense", 2), ("title", 3)]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/entities/hybrid_search"))
        .and(header("authorization", "Bearer root:Milvus"))
        .and(body_partial_json(json!({
            "dbName": "analytics",
            "collectionName": "docs",
            "search": [
                { "annsField": "dense", "limit": 10 },
                { "annsField": "title", "limit": 5, "filter": "year > 2000" }
            ],
            "rerank": { "strategy": "weighted", "params": { "weights": [0.7, 0.3] } },
            "limit": 3
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": [
                { "id": 11, "distance": 0.91 },
                { "id": 7, "distance": 0.52 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_test_app(test_state(&server.uri()));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search",
        json!({
            "collection_name": "docs",
            "searches_json": [
                { "data": [[0.1, 0.2]], "annsField": "dense", "limit": 10 },
                {
                    "data": [[0.3, 0.4, 0.5]],
                    "annsField": "title",
                    "limit": "5",
                    "filter": "year > 2000"
                }
            ],
            "rerank_strategy": "weighted",
            "rerank_params": "{\"weights\": [\"0.7\", 0.3]}",
            "limit": "3"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["operation"], "hybrid_search");
    assert_eq!(body["collection_name"], "docs");
    assert_eq!(body["result_count"], 2);
    assert_eq!(body["results"][0]["id"], 11);
}

#[tokio::test]
async fn test_hybrid_search_validation_failure_never_reaches_milvus() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0 })))
        .expect(0)
        .mount(&server)
        .await;

    let app = create_test_app(test_state(&server.uri()));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search",
        json!({
            "collection_name": "docs",
            "searches_json": [{ "data": [[0.1]], "annsField": "v1", "limit": 0 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "InvalidRoute");
    assert_eq!(body["error"], "search[0]: topK must be positive");
}

#[tokio::test]
async fn test_hybrid_search_missing_collection_returns_404() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/describe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 100,
            "message": "collection not found[database=analytics][collection=docs]"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/entities/hybrid_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0 })))
        .expect(0)
        .mount(&server)
        .await;

    let app = create_test_app(test_state(&server.uri()));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search",
        json!({
            "collection_name": "docs",
            "searches_json": [{ "data": [[0.1]], "annsField": "v1", "limit": 5 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_type"], "CollectionNotFound");
}

#[tokio::test]
async fn test_hybrid_search_dimension_mismatch_returns_400() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/describe"))
        .respond_with(describe_response(&[("v1", 4)]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/entities/hybrid_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0 })))
        .expect(0)
        .mount(&server)
        .await;

    let app = create_test_app(test_state(&server.uri()));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search",
        json!({
            "collection_name": "docs",
            "searches_json": [{ "data": [[0.1, 0.2]], "annsField": "v1", "limit": 5 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "DimensionMismatch");
    assert!(body["error"].as_str().unwrap().contains("expected 4, got 2"));
}

#[tokio::test]
async fn test_hybrid_search_dimension_mismatch_with_rest_field_params() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/describe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {
                "collectionName": "docs",
                "fields": [
                    { "name": "id", "type": "Int64", "primaryKey": true, "params": [] },
                    {
                        "name": "vector",
                        "type": "FloatVector",
                        "params": [{ "key": "dim", "value": "768" }]
                    }
                ]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/entities/hybrid_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0 })))
        .expect(0)
        .mount(&server)
        .await;

    let app = create_test_app(test_state(&server.uri()));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search",
        json!({
            "collection_name": "docs",
            "searches_json": [{ "data": [[0.1, 0.2, 0.3]], "annsField": "vector", "limit": 5 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "DimensionMismatch");
    assert!(body["error"].as_str().unwrap().contains("expected 768, got 3"));
}

#[tokio::test]
async fn test_hybrid_search_surfaces_milvus_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/describe"))
        .respond_with(describe_response(&[]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/entities/hybrid_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1100,
            "message": "invalid parameter: metric type not match"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_test_app(test_state(&server.uri()));
    let (status, body) = post_json(
        app,
        "/tools/hybrid_search",
        json!({
            "collection_name": "docs",
            "searches_json": [
                { "data": [[0.1]], "annsField": "v1", "limit": 5, "metricType": "L2" }
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_type"], "UpstreamError");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("metric type not match"));
}
