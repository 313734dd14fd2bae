//! Cognitive scheduler (§4.1): decides *when* the agent thinks, without
//! blocking on user activity.

pub mod urgency;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use cogcore_memory::ThreadStore;
use cogcore_workspace::paths::WorkspaceRoot;
use cogcore_workspace::substantive::count_substantive_lines;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub use urgency::{adaptive_interval, compute_urgency, AttentionSnapshot};

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(15 * 60);
const STALE_THREAD_HOURS: i64 = 2;
const SHOULD_THINK_THRESHOLD: f64 = 0.35;

pub type AttentionCallback =
    Arc<dyn Fn(AttentionSnapshot) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// Produces no text; the callback is responsible for actually reflecting
/// when invoked. Owns a `tokio::task::JoinHandle` for its loop (§4.1.1):
/// `abort()` is safe because each tick's callback runs to completion before
/// the next `sleep` is issued, so there's never a concurrent callback to
/// interrupt mid-flight.
pub struct CognitiveScheduler {
    workspace: WorkspaceRoot,
    callback: AttentionCallback,
    handle: Mutex<Option<JoinHandle<()>>>,
    last_reflection_millis: Arc<AtomicU64>,
    last_user_message_millis: Arc<AtomicU64>,
    min_interval: Duration,
    max_interval: Duration,
}

impl CognitiveScheduler {
    /// `min_interval`/`max_interval` come from `SchedulerConfig` (§4.8, §6);
    /// callers that don't care can pass `DEFAULT_MIN_INTERVAL`/`DEFAULT_MAX_INTERVAL`.
    pub fn new(workspace: WorkspaceRoot, callback: AttentionCallback, min_interval: Duration, max_interval: Duration) -> Self {
        let now = now_millis();
        Self {
            workspace,
            callback,
            handle: Mutex::new(None),
            last_reflection_millis: Arc::new(AtomicU64::new(now)),
            last_user_message_millis: Arc::new(AtomicU64::new(now)),
            min_interval,
            max_interval,
        }
    }

    pub fn record_user_message(&self) {
        self.last_user_message_millis.store(now_millis(), Ordering::SeqCst);
    }

    pub async fn evaluate_attention(&self) -> AttentionSnapshot {
        let concerns_raw = tokio::fs::read_to_string(self.workspace.concerns()).await.unwrap_or_default();
        let active_concerns_count = count_active_concerns(&concerns_raw);

        let pending_raw = tokio::fs::read_to_string(self.workspace.pending_actions()).await.unwrap_or_default();
        let pending_actions_count = count_substantive_lines(&pending_raw) as u32;

        let has_stale_thread = match ThreadStore::load(&self.workspace).await {
            Ok(store) => !store.stale(Utc::now(), STALE_THREAD_HOURS).is_empty(),
            Err(err) => {
                tracing::warn!(error = %err, "evaluate_attention: failed to load thread store, assuming no stale threads");
                false
            }
        };

        let now = Utc::now();
        AttentionSnapshot {
            active_concerns_count,
            pending_actions_count,
            time_since_reflection: millis_elapsed(&self.last_reflection_millis, now),
            has_stale_thread,
            time_since_user_message: millis_elapsed(&self.last_user_message_millis, now),
            local_hour: now.hour(),
        }
    }

    pub fn should_think(&self, snapshot: &AttentionSnapshot) -> bool {
        compute_urgency(snapshot, self.max_interval) >= SHOULD_THINK_THRESHOLD
    }

    /// Idempotent: a second call while already running logs a warning and
    /// returns without spawning a competing loop.
    pub async fn start(self: &Arc<Self>) {
        let mut guard = self.handle.lock().await;
        if guard.is_some() {
            tracing::warn!("scheduler already running");
            return;
        }

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            scheduler.run_loop().await;
        });
        *guard = Some(handle);
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            let snapshot = self.evaluate_attention().await;
            if self.should_think(&snapshot) {
                if let Err(err) = (self.callback)(snapshot).await {
                    tracing::warn!(error = %err, "scheduler callback failed");
                }
                self.last_reflection_millis.store(now_millis(), Ordering::SeqCst);
            }

            let post_snapshot = self.evaluate_attention().await;
            let urgency = compute_urgency(&post_snapshot, self.max_interval);
            let delay = adaptive_interval(urgency, self.min_interval, self.max_interval);
            tokio::time::sleep(delay).await;
        }
    }
}

/// `concerns.md` is a two-section file (`## Active` / `## Resolved`, §3);
/// only the active section feeds urgency.
fn count_active_concerns(raw: &str) -> u32 {
    let after_active = raw.split_once("## Active").map(|(_, rest)| rest).unwrap_or(raw);
    let active_section = after_active.split("## Resolved").next().unwrap_or(after_active);
    count_substantive_lines(active_section) as u32
}

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn millis_elapsed(marker: &AtomicU64, now: DateTime<Utc>) -> Duration {
    let stored = marker.load(Ordering::SeqCst) as i64;
    let delta_ms = (now.timestamp_millis() - stored).max(0);
    Duration::from_millis(delta_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn workspace() -> (WorkspaceRoot, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("cogcore-scheduler-{}", uuid::Uuid::new_v4()));
        (WorkspaceRoot::new(&dir), dir)
    }

    #[tokio::test]
    async fn evaluate_attention_counts_substantive_concerns() {
        let (ws, dir) = workspace();
        ws.seed().await.unwrap();
        tokio::fs::write(
            ws.concerns(),
            "## Active\n\n- a concern worth remembering today\n- another one here\n\n## Resolved\n\n- done with this one",
        )
        .await
        .unwrap();

        let scheduler = Arc::new(CognitiveScheduler::new(
            ws,
            Arc::new(|_| Box::pin(async { Ok(()) })),
            DEFAULT_MIN_INTERVAL,
            DEFAULT_MAX_INTERVAL,
        ));
        let snapshot = scheduler.evaluate_attention().await;
        assert_eq!(snapshot.active_concerns_count, 2);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let (ws, dir) = workspace();
        ws.seed().await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let scheduler = Arc::new(CognitiveScheduler::new(
            ws,
            Arc::new(move |_| {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }),
            DEFAULT_MIN_INTERVAL,
            DEFAULT_MAX_INTERVAL,
        ));

        scheduler.start().await;
        scheduler.start().await;
        assert!(scheduler.handle.lock().await.is_some());
        scheduler.stop().await;
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[test]
    fn should_think_uses_urgency_threshold() {
        let snapshot = AttentionSnapshot {
            active_concerns_count: 0,
            pending_actions_count: 0,
            time_since_reflection: Duration::ZERO,
            has_stale_thread: false,
            time_since_user_message: Duration::ZERO,
            local_hour: 12,
        };
        assert!((compute_urgency(&snapshot, DEFAULT_MAX_INTERVAL) - 0.0).abs() < 1e-9);
    }
}
