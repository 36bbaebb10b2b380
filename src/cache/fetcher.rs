//! Attachment fetching
//!
//! The cache talks to the network through [`BlobFetcher`]; [`HttpFetcher`]
//! is the reqwest-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;

/// Fetch priority hint
///
/// Sent as an RFC 9218 `Priority` header so the foreground load is
/// scheduled ahead of speculative preloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPriority {
    /// Item the user is looking at
    High,
    /// Immediate neighbours
    Normal,
    /// Background queue
    Low,
}

impl FetchPriority {
    pub fn header_value(&self) -> &'static str {
        match self {
            FetchPriority::High => "u=0",
            FetchPriority::Normal => "u=3",
            FetchPriority::Low => "u=5, i",
        }
    }
}

/// Raw fetch result
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    pub bytes: Vec<u8>,
    /// Content type as declared by the server
    pub declared_type: Option<String>,
}

/// Fetch errors
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Fetch timed out after {0} seconds")]
    Timeout(u64),

    /// The host runtime revoked our context mid-fetch
    #[error("Host context invalidated")]
    ContextInvalidated,
}

/// Source of attachment payloads
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, url: &str, priority: FetchPriority) -> Result<FetchedBlob, FetchError>;
}

/// HTTP fetcher backed by reqwest
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl BlobFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, priority: FetchPriority) -> Result<FetchedBlob, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Priority", HeaderValue::from_static(priority.header_value()))
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let declared_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(FetchedBlob {
            bytes: bytes.to_vec(),
            declared_type,
        })
    }
}

impl HttpFetcher {
    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout_secs)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
