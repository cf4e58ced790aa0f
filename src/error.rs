use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Caller mistakes detected before any request reaches Milvus.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("'{param}' is not valid JSON: {reason}")]
    MalformedInput { param: &'static str, reason: String },

    #[error("'{0}' is required")]
    MissingParameter(&'static str),

    #[error("'{param}' {reason}")]
    InvalidParameter { param: &'static str, reason: String },

    #[error("search[{index}]: {reason}")]
    InvalidRoute { index: usize, reason: String },

    #[error("unsupported rerank strategy '{0}', expected 'rrf' or 'weighted'")]
    InvalidRerankStrategy(String),

    #[error("weighted rerank needs one weight per search route: expected {expected}, got {actual}")]
    RerankWeightMismatch { expected: usize, actual: usize },

    #[error("'rerank_params.weights' {0}")]
    InvalidRerankWeights(String),

    #[error("limit ({limit}) + offset ({offset}) must be less than {ceiling}")]
    LimitOffsetExceeded { limit: i64, offset: i64, ceiling: i64 },

    #[error(
        "dimension mismatch for search[{index}] on field '{field}': expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        index: usize,
        field: String,
        expected: usize,
        actual: usize,
    },
}

impl ValidationError {
    /// Stable name reported to tool callers as `error_type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "MalformedInput",
            Self::MissingParameter(_) => "MissingParameter",
            Self::InvalidParameter { .. } => "InvalidParameter",
            Self::InvalidRoute { .. } => "InvalidRoute",
            Self::InvalidRerankStrategy(_) => "InvalidRerankStrategy",
            Self::RerankWeightMismatch { .. } => "RerankWeightMismatch",
            Self::InvalidRerankWeights(_) => "InvalidRerankWeights",
            Self::LimitOffsetExceeded { .. } => "LimitOffsetExceeded",
            Self::DimensionMismatch { .. } => "DimensionMismatch",
        }
    }

    pub(crate) fn route(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRoute {
            index,
            reason: reason.into(),
        }
    }

    pub(crate) fn parameter(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Collection '{0}' does not exist")]
    CollectionNotFound(String),

    #[error("Milvus API error: {0}")]
    Upstream(String),

    #[error("Request to Milvus failed: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(e) => e.kind(),
            AppError::CollectionNotFound(_) => "CollectionNotFound",
            AppError::Upstream(_) => "UpstreamError",
            AppError::Transport(_) => "TransportError",
            AppError::Config(_) => "ConfigError",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    error_type: &'static str,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(e) => {
                tracing::warn!(error = %e, error_type = e.kind(), "Validation error");
                metrics::counter!("hybrid_search_validation_failures_total").increment(1);
                StatusCode::BAD_REQUEST
            }
            AppError::CollectionNotFound(name) => {
                tracing::warn!(collection = %name, "Collection not found");
                StatusCode::NOT_FOUND
            }
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Milvus API error");
                StatusCode::BAD_GATEWAY
            }
            AppError::Transport(msg) => {
                tracing::error!(error = %msg, "Milvus transport error");
                StatusCode::BAD_GATEWAY
            }
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
            error_type: self.kind(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
