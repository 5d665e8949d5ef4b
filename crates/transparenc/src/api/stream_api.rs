use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use super::{ApiClient, ByteStream, ChatBackend, DocRetrievalRequest};
use crate::chat::WireMessage;
use crate::metrics;

/// Body of POST /claude-stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatStreamRequest {
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_ids: Option<Vec<String>>,
}

impl ChatStreamRequest {
    /// Only the current question is sent; the service keeps no history.
    pub fn general(query: &str) -> Self {
        Self { messages: vec![WireMessage::user(query)], doc_ids: None }
    }

    pub fn about_documents(query: &str, doc_ids: Vec<String>) -> Self {
        Self { messages: vec![WireMessage::user(query)], doc_ids: Some(doc_ids) }
    }
}

/// Keeps the active-stream gauge and duration histogram honest even when
/// the consumer drops the stream early.
struct StreamTimer {
    started: Instant,
}

impl StreamTimer {
    fn start() -> Self {
        metrics::inc_streams();
        Self { started: Instant::now() }
    }
}

impl Drop for StreamTimer {
    fn drop(&mut self) {
        metrics::dec_streams();
        metrics::observe_stream_duration(self.started.elapsed().as_secs_f64());
    }
}

impl ApiClient {
    /// POST /claude-stream and hand back the raw body chunks.
    pub async fn claude_stream(&self, request: &ChatStreamRequest) -> anyhow::Result<ByteStream> {
        debug!(
            "Opening answer stream ({} doc ids)",
            request.doc_ids.as_ref().map_or(0, Vec::len)
        );
        let timer = StreamTimer::start();

        let resp = self
            .http_client
            .post(&self.claude_stream_url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                metrics::inc_request(metrics::ROUTE_CLAUDE_STREAM, "error");
                anyhow::anyhow!("Stream request failed: {}", e)
            })?;

        let status = resp.status();
        metrics::inc_request(metrics::ROUTE_CLAUDE_STREAM, status.as_str());

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Stream failed ({}): {}", status, body);
            return Err(anyhow::anyhow!("Stream failed ({}): {}", status, body));
        }

        let byte_stream = resp.bytes_stream();

        let chunks = async_stream::try_stream! {
            let _timer = timer;
            futures_util::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = chunk_result.map_err(|e| anyhow::anyhow!("Stream read error: {}", e))?;
                yield chunk;
            }
        };

        Ok(Box::pin(chunks))
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn retrieve_documents(&self, query: &str, top_k: u8) -> anyhow::Result<Value> {
        let request = DocRetrievalRequest { query: query.to_string(), top_k };
        self.doc_retrieval(&request).await
    }

    async fn stream_chat(&self, request: ChatStreamRequest) -> anyhow::Result<ByteStream> {
        self.claude_stream(&request).await
    }
}
