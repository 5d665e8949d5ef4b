use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};
use validator::Validate;

use super::ApiClient;
use crate::metrics;

#[derive(Debug, Clone, Serialize, Validate)]
pub struct DocRetrievalRequest {
    #[validate(length(min = 1))]
    pub query: String,
    #[validate(range(min = 1, max = 9))]
    pub top_k: u8,
}

impl ApiClient {
    /// POST /doc-retrieval/ and return the JSON body untouched.
    ///
    /// Shape interpretation is left to `RetrievalView::classify`.
    pub async fn doc_retrieval(&self, request: &DocRetrievalRequest) -> anyhow::Result<Value> {
        request
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid retrieval request: {}", e))?;

        debug!("Retrieving top {} documents for {:?}", request.top_k, request.query);

        let resp = self
            .http_client
            .post(&self.doc_retrieval_url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                metrics::inc_request(metrics::ROUTE_DOC_RETRIEVAL, "error");
                anyhow::anyhow!("Retrieval request failed: {}", e)
            })?;

        let status = resp.status();
        metrics::inc_request(metrics::ROUTE_DOC_RETRIEVAL, status.as_str());

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Retrieval failed ({}): {}", status, body);
            return Err(anyhow::anyhow!("Retrieval failed ({}): {}", status, body));
        }

        resp.json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse retrieval response: {}", e))
    }
}
