use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::models::OllamaStreamChunk;
use crate::providers::types::StreamEvent;

/// Decode an Ollama NDJSON body and forward each `message.content` fragment.
///
/// Lines that are not JSON, or carry no `message.content`, are skipped.
/// A transport error ends the stream with a single [`StreamEvent::Error`].
pub async fn parse_ndjson_stream<S, E>(stream: S, tx: mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let chunk_result = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!("Relay receiver dropped, abandoning upstream stream");
                return;
            }
            next = stream.next() => next,
        };

        let Some(chunk_result) = chunk_result else {
            break;
        };

        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error(format!("Stream error: {}", e)))
                    .await;
                return;
            }
        };

        buffer.extend_from_slice(&bytes);

        // Lines are split on raw bytes so a multi-byte character spanning two
        // chunks is only decoded once complete.
        while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            if let Some(token) = decode_line(&line) {
                if tx.send(StreamEvent::Token(token)).await.is_err() {
                    return; // receiver dropped
                }
            }
        }
    }

    // Ollama terminates every line, but tolerate a final unterminated one.
    if let Some(token) = decode_line(&buffer) {
        if tx.send(StreamEvent::Token(token)).await.is_err() {
            return;
        }
    }

    let _ = tx.send(StreamEvent::Done).await;
}

fn decode_line(line: &[u8]) -> Option<String> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_slice::<OllamaStreamChunk>(line) {
        Ok(chunk) => chunk.message.and_then(|m| m.content),
        Err(e) => {
            tracing::trace!("Skipping undecodable upstream line: {}", e);
            None
        }
    }
}
