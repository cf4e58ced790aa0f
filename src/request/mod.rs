//! Hybrid search request pipeline.
//!
//! Raw tool parameters are normalized into a canonical request, validated
//! against Milvus's hybrid search constraints, and assembled into the REST
//! payload. Everything here is pure; no network access happens until the
//! payload is handed to the Milvus client.

pub mod builder;
pub mod normalize;
pub mod types;

pub use builder::{build, validate_dimensions, validate_rerank, validate_route, validate_top_level};
pub use normalize::{
    normalize_delimited_list, normalize_json_object, normalize_routes, RequestResult,
};
pub use types::{
    HybridSearchPayload, HybridSearchRequest, ParamValue, RerankSpec, RerankStrategy, RouteMap,
    SearchRoute, ToolParameters, LIMIT_OFFSET_CEILING,
};
