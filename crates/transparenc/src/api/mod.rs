//! API module - client side of the legislation service
//!
//! Two endpoints: `/doc-retrieval/` answers with one JSON document and
//! `/claude-stream` answers with a chunked plain-text body.

pub mod retrieval_api;
pub mod stream_api;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use serde_json::Value;

use crate::config::Config;

pub use retrieval_api::DocRetrievalRequest;
pub use stream_api::ChatStreamRequest;

/// Raw body chunks of a streamed answer.
pub type ByteStream = Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send>>;

/// The network seam the chat controller talks through.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn retrieve_documents(&self, query: &str, top_k: u8) -> anyhow::Result<Value>;

    async fn stream_chat(&self, request: ChatStreamRequest) -> anyhow::Result<ByteStream>;
}

/// reqwest-backed client for the legislation service.
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    doc_retrieval_url: String,
    claude_stream_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            doc_retrieval_url: config.doc_retrieval_url(),
            claude_stream_url: config.claude_stream_url(),
        })
    }
}
