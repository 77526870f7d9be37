use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::models::*;
use crate::providers::traits::AiProvider;
use crate::providers::types::{ChatRequest, ProviderError, StreamEvent};

/// Streams chat completions from an Ollama server's `/api/chat` endpoint.
pub struct OllamaProvider {
    client: Client,
    chat_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            chat_url: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<OllamaErrorResponse>(body) {
            return format!("HTTP {}: {}", status.as_u16(), parsed.error);
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    async fn stream_message(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        use super::stream::parse_ndjson_stream;

        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
        };

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat request to {}",
            self.chat_url
        );

        let send = self
            .client
            .post(&self.chat_url)
            .header("content-type", "application/json")
            .json(&body)
            .send();

        let response = tokio::select! {
            _ = tx.closed() => return Ok(()),
            response = send => response.map_err(|e| ProviderError::NetworkError(e.to_string()))?,
        };

        tracing::debug!("Upstream responded with status {}", response.status());

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        parse_ndjson_stream(response.bytes_stream(), tx).await;

        Ok(())
    }
}
