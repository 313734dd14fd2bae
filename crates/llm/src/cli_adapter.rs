//! `CliAdapter` (§4.7): the reference concrete adapter, driving a subprocess
//! CLI over stdin/stdout as NDJSON. Grounded on the teacher pack's
//! subprocess-with-timeout-and-kill shape (`skynet-terminal`'s
//! `TerminalManager::exec`): spawn via `tokio::process::Command`, race the
//! read loop against a deadline, escalate to a signal when it's missed.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio::sync::{mpsc, Mutex};

use crate::adapter::{
    collect_stream_to_result, Adapter, AdapterInput, HealthStatus, HistoryTurn, Speaker, StreamChunk,
    StreamHandle, ThoughtResult,
};
use crate::error::AdapterError;
use crate::reference_code::reference_code;

const SIGKILL_GRACE: Duration = Duration::from_secs(3);
const CHANNEL_CAPACITY: usize = 64;

pub struct CliAdapter {
    name: String,
    binary: String,
}

impl CliAdapter {
    pub fn new(name: impl Into<String>, binary: impl Into<String>) -> Self {
        Self { name: name.into(), binary: binary.into() }
    }
}

#[async_trait]
impl Adapter for CliAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: &AdapterInput) -> ThoughtResult {
        let start = std::time::Instant::now();
        let mut handle = self.invoke_streaming(input).await;
        let collected = collect_stream_to_result(&mut handle, &input.identity).await;
        ThoughtResult {
            text: collected.raw_text,
            clean_text: collected.clean_text,
            writebacks: collected.directives,
            mode: input.effective_mode.clone(),
            model: input.model.clone(),
            elapsed: start.elapsed(),
            error: collected.error,
        }
    }

    async fn invoke_streaming(&self, input: &AdapterInput) -> StreamHandle {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut args = vec![
            "-p".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            input.model.clone(),
        ];
        if input.effective_mode == "yolo" {
            args.push("--dangerously-skip-permissions".to_string());
        }

        let binary = self.binary.clone();
        let stdin_payload = render_turns(&input.history, &input.message);
        let timeout = input.timeout;

        let task = tokio::spawn(async move {
            run_cli_process(binary, args, stdin_payload, timeout, tx).await;
        });

        StreamHandle::new(rx, task.abort_handle())
    }

    async fn health_check(&self) -> HealthStatus {
        let start = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            AsyncCommand::new(&self.binary).arg("--version").output(),
        )
        .await;

        match outcome {
            Ok(Ok(output)) if output.status.success() => HealthStatus {
                healthy: true,
                message: None,
                latency_ms: Some(start.elapsed().as_millis() as u64),
            },
            Ok(Ok(output)) => HealthStatus {
                healthy: false,
                message: Some(format!("exited with status {}", output.status)),
                latency_ms: None,
            },
            Ok(Err(err)) => HealthStatus { healthy: false, message: Some(err.to_string()), latency_ms: None },
            Err(_) => HealthStatus {
                healthy: false,
                message: Some("health check timed out".to_string()),
                latency_ms: None,
            },
        }
    }
}

fn render_turns(history: &[HistoryTurn], message: &str) -> String {
    let mut out = String::new();
    for turn in history {
        let prefix = match turn.speaker {
            Speaker::User => "Human",
            Speaker::Assistant => "Assistant",
        };
        out.push_str(prefix);
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out.push_str("Human: ");
    out.push_str(message);
    out.push('\n');
    out
}

async fn run_cli_process(
    binary: String,
    args: Vec<String>,
    stdin_payload: String,
    timeout: Duration,
    tx: mpsc::Sender<StreamChunk>,
) {
    let mut child = match AsyncCommand::new(&binary)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            emit_error(&tx, AdapterError::SpawnFailed(err)).await;
            return;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(stdin_payload.as_bytes()).await;
    }

    let stderr_capture = Arc::new(Mutex::new(String::new()));
    if let Some(mut stderr) = child.stderr.take() {
        let capture = stderr_capture.clone();
        tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            *capture.lock().await = buf;
        });
    }

    let pid = child.id();
    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            emit_error(&tx, AdapterError::MalformedStream("no stdout handle".to_string())).await;
            return;
        }
    };
    let mut lines = BufReader::new(stdout).lines();
    let mut got_full_response = false;
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match tokio::time::timeout_at(deadline, lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                if let Some(text) = parse_ndjson_line(&line, &mut got_full_response) {
                    if tx.send(StreamChunk::Text(text)).await.is_err() {
                        return;
                    }
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(err)) => {
                emit_error(&tx, AdapterError::MalformedStream(err.to_string())).await;
                return;
            }
            Err(_elapsed) => {
                escalate_kill(pid).await;
                emit_error(&tx, AdapterError::Timeout).await;
                return;
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => {
            let _ = tx.send(StreamChunk::Done).await;
        }
        Ok(status) => {
            let stderr_text = stderr_capture.lock().await.clone();
            tracing::debug!(stderr = %stderr_text, "cli adapter stderr on non-zero exit");
            emit_error(&tx, AdapterError::NonZeroExit(status.code().unwrap_or(-1))).await;
        }
        Err(err) => {
            emit_error(&tx, AdapterError::MalformedStream(err.to_string())).await;
        }
    }
}

async fn escalate_kill(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    #[cfg(unix)]
    {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        tokio::time::sleep(SIGKILL_GRACE).await;
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

async fn emit_error(tx: &mpsc::Sender<StreamChunk>, err: AdapterError) {
    let reference = reference_code(Utc::now());
    tracing::error!(reference = %reference, error = %err, "cli adapter error");
    let _ = tx.send(StreamChunk::Error(err.user_message(&reference))).await;
}

/// Parses one line of the CLI's NDJSON stream. Returns text to emit, if any;
/// `got_full_response` is set once an `assistant` event delivers the full
/// message so later `result` events on the same invocation are dropped.
fn parse_ndjson_line(line: &str, got_full_response: &mut bool) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    match value.get("type").and_then(|t| t.as_str())? {
        "content_block_delta" => {
            let delta = value.get("delta")?;
            if delta.get("type").and_then(|t| t.as_str()) != Some("text_delta") {
                return None;
            }
            delta.get("text").and_then(|t| t.as_str()).map(str::to_string)
        }
        "assistant" => {
            let content = value.get("message")?.get("content")?.as_array()?;
            let text: String = content
                .iter()
                .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
                .collect();
            if text.is_empty() {
                return None;
            }
            *got_full_response = true;
            Some(text)
        }
        "result" => {
            if *got_full_response {
                return None;
            }
            value.get("result").and_then(|r| r.as_str()).map(str::to_string)
        }
        _ => None,
    }
}
