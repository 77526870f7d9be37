use std::sync::Arc;

use futures::{future, stream, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::providers::{AiProvider, ChatMessage, ChatRequest, StreamEvent};

const CHANNEL_CAPACITY: usize = 64;

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// One server-sent event of a relayed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// Always sent first, naming the model in use.
    Info(String),
    /// A content fragment from upstream.
    Fragment(String),
    /// Terminal upstream failure; nothing follows it.
    Error(String),
}

impl RelayFrame {
    /// The `data:` payload of this frame. Fragments are JSON-encoded so
    /// quotes and newlines survive SSE framing.
    pub fn data(&self) -> String {
        match self {
            RelayFrame::Info(model) => format!("[Using model: {}]", model),
            RelayFrame::Fragment(text) => {
                serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
            }
            RelayFrame::Error(message) => format!("[ERROR] {}", message),
        }
    }
}

/// Forwards prompts to the inference backend and re-frames its output.
#[derive(Clone)]
pub struct RelayService {
    provider: Arc<dyn AiProvider>,
    default_model: String,
}

impl RelayService {
    pub fn new(provider: Arc<dyn AiProvider>, default_model: impl Into<String>) -> Self {
        Self {
            provider,
            default_model: default_model.into(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Start a generation and return its frames.
    ///
    /// The upstream request runs on its own task and is abandoned once the
    /// returned stream is dropped. Upstream failures are never retried.
    pub fn relay(&self, request: GenerateRequest) -> impl Stream<Item = RelayFrame> + Send + 'static {
        let model = request
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model.clone());

        let mut messages = request.messages;
        messages.push(ChatMessage::user(request.prompt));

        tracing::debug!(model = %model, history = messages.len() - 1, "Relaying prompt");

        let chat_request = ChatRequest {
            model: model.clone(),
            messages,
        };

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let provider = self.provider.clone();
        tokio::spawn(async move {
            if let Err(e) = provider.stream_message(chat_request, tx.clone()).await {
                tracing::warn!("Upstream chat request failed: {}", e);
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
            }
        });

        let upstream = stream::unfold(Some(rx), |rx| async move {
            let mut rx = rx?;
            match rx.recv().await? {
                StreamEvent::Token(text) => Some((RelayFrame::Fragment(text), Some(rx))),
                StreamEvent::Error(message) => Some((RelayFrame::Error(message), None)),
                StreamEvent::Done => None,
            }
        });

        stream::once(future::ready(RelayFrame::Info(model))).chain(upstream)
    }
}
