//! HTTP adapter for the council backend
//!
//! Implements both consumed interfaces: the conversation store over the
//! REST endpoints and the council pipeline over the SSE message stream.

mod sse;
mod types;

pub use sse::{decode_frame, SseDecoder};
pub use types::*;

use crate::config::ClientConfig;
use crate::conversation::{Conversation, ConversationSummary};
use crate::council::{PipelineError, PipelineEvent};
use crate::runtime::{ConversationStore, CouncilPipeline, PipelineStream, StoreError};
use async_trait::async_trait;
use futures::{future, stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Council backend reached over HTTP
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built (TLS backend setup).
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            timeout: config.request_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn status_error(status: StatusCode, body: &str) -> PipelineError {
        PipelineError::server(format!("HTTP {status}: {body}"))
    }

    fn request_error(e: &reqwest::Error) -> PipelineError {
        if e.is_timeout() {
            PipelineError::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            PipelineError::network(format!("Connection failed: {e}"))
        } else {
            PipelineError::network(format!("Request failed: {e}"))
        }
    }

    /// GET/POST helper for the store endpoints
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        id: Option<&str>,
    ) -> Result<T, StoreError> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| StoreError::Backend(Self::request_error(&e).to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to read response: {e}")))?;

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }
        if !status.is_success() {
            return Err(StoreError::Backend(Self::status_error(status, &body).to_string()));
        }

        serde_json::from_str(&body)
            .map_err(|e| StoreError::Malformed(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl ConversationStore for HttpBackend {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let listing: Vec<StoredSummary> = self
            .fetch(self.client.get(self.url("/api/conversations")), None)
            .await?;
        Ok(listing.into_iter().map(Into::into).collect())
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, StoreError> {
        let stored: StoredConversation = self
            .fetch(
                self.client.get(self.url(&format!("/api/conversations/{id}"))),
                Some(id),
            )
            .await?;
        stored.into_conversation()
    }

    async fn create_conversation(&self) -> Result<ConversationSummary, StoreError> {
        let stored: StoredConversation = self
            .fetch(
                self.client
                    .post(self.url("/api/conversations"))
                    .json(&CreateConversationRequest::default()),
                None,
            )
            .await?;
        Ok(stored.summary())
    }
}

#[async_trait]
impl CouncilPipeline for HttpBackend {
    async fn run_council(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<PipelineStream, PipelineError> {
        let response = self
            .client
            .post(self.url(&format!(
                "/api/conversations/{conversation_id}/message/stream"
            )))
            .timeout(self.timeout)
            .json(&SendMessageRequest { content: text })
            .send()
            .await
            .map_err(|e| Self::request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &body));
        }

        tracing::debug!(conv_id = %conversation_id, "Council stream opened");

        let chunks = response.bytes_stream().map(Some).chain(stream::once(future::ready(None)));
        let events = chunks
            .scan(SseDecoder::new(), |decoder, chunk| {
                let items: Vec<Result<PipelineEvent, PipelineError>> = match chunk {
                    Some(Ok(bytes)) => decoder
                        .push(&bytes)
                        .iter()
                        .filter_map(|data| decode_frame(data).transpose())
                        .collect(),
                    Some(Err(e)) => vec![Err(PipelineError::network(format!(
                        "Council stream interrupted: {e}"
                    )))],
                    // End of body: flush an unterminated last frame
                    None => decoder
                        .finish()
                        .and_then(|data| decode_frame(&data).transpose())
                        .into_iter()
                        .collect(),
                };
                future::ready(Some(stream::iter(items)))
            })
            .flatten();

        Ok(Box::pin(events))
    }
}
