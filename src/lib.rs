//! Hybridgate - parameter normalization and validation for Milvus hybrid search
//!
//! This library exposes the request pipeline, the Milvus REST client and the
//! HTTP handlers, enabling integration tests and embedding in other services.

pub mod config;
pub mod error;
pub mod handlers;
pub mod milvus;
pub mod request;
pub mod state;

// Re-export key types for convenience
pub use config::{Config, MilvusConfig};
pub use error::{AppError, Result, ValidationError};
pub use handlers::{build_handler, health_handler, hybrid_search_handler, ready_handler};
pub use milvus::MilvusClient;
pub use request::{build, HybridSearchPayload, HybridSearchRequest, ParamValue, ToolParameters};
pub use state::AppState;
