use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ChatRequest, ProviderError, StreamEvent};

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Stream a chat completion into `tx`.
    ///
    /// Implementations stop early once the receiving side of `tx` is dropped.
    async fn stream_message(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError>;
}
