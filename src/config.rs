use anyhow::Context;
use std::env;

/// Connection settings for the Milvus REST API.
#[derive(Debug, Clone)]
pub struct MilvusConfig {
    /// Milvus endpoint, with or without scheme and `/v2/vectordb` suffix.
    pub uri: String,
    /// Bearer token (`user:password` or an API key). Blank means no auth header.
    pub token: Option<String>,
    /// Database injected as `dbName` into every outbound request.
    pub database: String,
    pub timeout_secs: u64,
}

impl MilvusConfig {
    /// Settings for `uri` with the `default` database, no token and a 30s timeout.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            token: None,
            database: "default".to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Maximum accepted request body size; query vectors can be large.
    pub max_body_bytes: usize,
    pub milvus: MilvusConfig,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// `MILVUS_URI` is required; everything else falls back to a default.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let uri = lookup("MILVUS_URI")
            .filter(|uri| !uri.trim().is_empty())
            .context("MILVUS_URI must be set")?;

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port: var("PORT", "8080").parse().context("PORT")?,
            shutdown_timeout_secs: var("SHUTDOWN_TIMEOUT", "30")
                .parse()
                .context("SHUTDOWN_TIMEOUT")?,
            max_body_bytes: var("MAX_BODY_BYTES", "16777216")
                .parse()
                .context("MAX_BODY_BYTES")?,
            milvus: MilvusConfig {
                uri,
                token: lookup("MILVUS_TOKEN").filter(|token| !token.trim().is_empty()),
                database: var("MILVUS_DATABASE", "default"),
                timeout_secs: var("MILVUS_TIMEOUT_SECS", "30")
                    .parse()
                    .context("MILVUS_TIMEOUT_SECS")?,
            },
        })
    }
}
