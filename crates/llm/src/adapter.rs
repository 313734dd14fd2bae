//! The `Adapter` contract (§4.7): anything that can turn an `AdapterInput`
//! into model output, batch or streamed.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use cogcore_continuity::DirectiveKind;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub speaker: Speaker,
    pub content: String,
}

/// Everything an adapter needs for one invocation. `route`/`model`/`timeout`
/// are already resolved by the caller (the config crate's invocation-type
/// router, §4.8) — adapters never look up routing themselves.
#[derive(Debug, Clone)]
pub struct AdapterInput {
    pub message: String,
    pub history: Vec<HistoryTurn>,
    pub system_prompt: String,
    pub route: String,
    pub workspace_path: PathBuf,
    pub effective_mode: String,
    pub model: String,
    pub timeout: Duration,
    /// The configured identity prefix, needed to recognize this agent's own
    /// directive markers in its output (§4.3).
    pub identity: String,
}

#[derive(Debug, Clone)]
pub struct ThoughtResult {
    pub text: String,
    pub clean_text: String,
    pub writebacks: Vec<DirectiveKind>,
    pub mode: String,
    pub model: String,
    pub elapsed: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StreamChunk {
    Text(String),
    Error(String),
    Done,
}

/// A live streaming invocation: a channel of chunks plus the ability to
/// cancel the underlying work early.
pub struct StreamHandle {
    receiver: mpsc::Receiver<StreamChunk>,
    abort_handle: AbortHandle,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamChunk>, abort_handle: AbortHandle) -> Self {
        Self { receiver, abort_handle }
    }

    pub async fn recv(&mut self) -> Option<StreamChunk> {
        self.receiver.recv().await
    }

    pub fn abort(&self) {
        self.abort_handle.abort();
    }
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: Option<String>,
    pub latency_ms: Option<u64>,
}

#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, input: &AdapterInput) -> ThoughtResult;
    async fn invoke_streaming(&self, input: &AdapterInput) -> StreamHandle;
    async fn health_check(&self) -> HealthStatus;

    /// Most adapters hold no persistent resources; the default is a no-op.
    async fn shutdown(&self) {}
}

/// Collected form of a stream: buffers `text` chunks, short-circuits on the
/// first `error` chunk, and extracts writebacks once on `done`.
pub struct CollectedResult {
    pub clean_text: String,
    pub raw_text: String,
    pub directives: Vec<DirectiveKind>,
    pub error: Option<String>,
}

pub async fn collect_stream_to_result(handle: &mut StreamHandle, identity: &str) -> CollectedResult {
    let mut buffer = String::new();
    while let Some(chunk) = handle.recv().await {
        match chunk {
            StreamChunk::Text(text) => buffer.push_str(&text),
            StreamChunk::Error(message) => {
                return CollectedResult {
                    clean_text: message.clone(),
                    raw_text: message.clone(),
                    directives: Vec::new(),
                    error: Some(message),
                };
            }
            StreamChunk::Done => {
                let extraction = cogcore_continuity::extract_directives(&buffer, identity);
                return CollectedResult {
                    clean_text: extraction.clean_response,
                    raw_text: buffer,
                    directives: extraction.directives,
                    error: None,
                };
            }
        }
    }
    CollectedResult {
        clean_text: String::new(),
        raw_text: buffer,
        directives: Vec::new(),
        error: Some("stream ended without a done or error chunk".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_stops_at_error_chunk() {
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(async {});
        let mut handle = StreamHandle::new(rx, task.abort_handle());
        tx.send(StreamChunk::Text("partial ".to_string())).await.unwrap();
        tx.send(StreamChunk::Error("that took too long".to_string())).await.unwrap();

        let result = collect_stream_to_result(&mut handle, "agent").await;
        assert_eq!(result.clean_text, "that took too long");
        assert!(result.directives.is_empty());
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn collect_extracts_directives_on_done() {
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(async {});
        let mut handle = StreamHandle::new(rx, task.abort_handle());
        tx.send(StreamChunk::Text("Hello. ".to_string())).await.unwrap();
        tx.send(StreamChunk::Text("<!--agent-proactive\nCheck in later.\n-->".to_string())).await.unwrap();
        tx.send(StreamChunk::Done).await.unwrap();

        let result = collect_stream_to_result(&mut handle, "agent").await;
        assert!(result.error.is_none());
        assert_eq!(result.clean_text.trim(), "Hello.");
        assert_eq!(result.directives.len(), 1);
    }
}
