use serde::{Deserialize, Serialize};

use crate::providers::types::ChatMessage;

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct OllamaChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
}

// --- Streaming types ---

/// One newline-delimited object from `/api/chat`. Only `message.content`
/// is consumed; everything else Ollama sends (`done`, timings) is ignored.
#[derive(Debug, Deserialize)]
pub struct OllamaStreamChunk {
    pub message: Option<OllamaDelta>,
}

#[derive(Debug, Deserialize)]
pub struct OllamaDelta {
    pub content: Option<String>,
}

// --- Error types ---

#[derive(Debug, Deserialize)]
pub struct OllamaErrorResponse {
    pub error: String,
}
