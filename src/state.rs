use crate::config::Config;
use crate::error::Result;
use crate::milvus::MilvusClient;

/// Application state shared across all request handlers.
///
/// Nothing here is mutated per request: the Milvus client wraps a
/// connection-pooled `reqwest::Client` that is cheap to share.
pub struct AppState {
    pub milvus: MilvusClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let milvus = MilvusClient::new(&config.milvus)?;

        Ok(Self { milvus })
    }

    /// Check that Milvus is reachable and accepts our credentials.
    pub async fn is_ready(&self) -> bool {
        match self.milvus.list_collections().await {
            Ok(collections) => {
                tracing::debug!(collections = collections.len(), "Milvus readiness check passed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Milvus readiness check failed");
                false
            }
        }
    }
}
