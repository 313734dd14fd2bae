//! Thread tracker (§4.8.1): `memory/threads.json` behind the same
//! atomic-rewrite primitive as every other state file. The concrete
//! collaborator the proactive governor and reflection pipeline's `decide()`
//! both read to find stale conversations.

use chrono::{DateTime, Utc};
use cogcore_workspace::paths::WorkspaceRoot;
use cogcore_workspace::{atomic_write_json, load_json_or_default};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub topic: String,
    pub status: ThreadStatus,
    pub last_activity: DateTime<Utc>,
    pub participants: Vec<String>,
    pub message_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadState {
    #[serde(default)]
    threads: Vec<Thread>,
}

pub struct ThreadStore {
    state_path: std::path::PathBuf,
    state: ThreadState,
}

impl ThreadStore {
    pub async fn load(workspace: &WorkspaceRoot) -> anyhow::Result<Self> {
        let state_path = workspace.threads_state();
        let state: ThreadState = load_json_or_default(&state_path).await;
        Ok(Self { state_path, state })
    }

    pub fn all(&self) -> &[Thread] {
        &self.state.threads
    }

    /// Create-or-update a thread's activity, bumping `message_count` and
    /// merging `participant` into the participant list.
    pub fn touch(&mut self, thread_id: &str, topic: &str, participant: &str, now: DateTime<Utc>) {
        if let Some(thread) = self.state.threads.iter_mut().find(|t| t.id == thread_id) {
            thread.last_activity = now;
            thread.message_count += 1;
            if !thread.participants.iter().any(|p| p == participant) {
                thread.participants.push(participant.to_string());
            }
        } else {
            self.state.threads.push(Thread {
                id: thread_id.to_string(),
                topic: topic.to_string(),
                status: ThreadStatus::Active,
                last_activity: now,
                participants: vec![participant.to_string()],
                message_count: 1,
            });
        }
    }

    pub fn mark_resolved(&mut self, thread_id: &str) {
        if let Some(thread) = self.state.threads.iter_mut().find(|t| t.id == thread_id) {
            thread.status = ThreadStatus::Resolved;
        }
    }

    /// Active threads whose last activity is at least `min_stale_hours` old.
    pub fn stale(&self, now: DateTime<Utc>, min_stale_hours: i64) -> Vec<&Thread> {
        self.state
            .threads
            .iter()
            .filter(|t| t.status == ThreadStatus::Active)
            .filter(|t| now - t.last_activity >= chrono::Duration::hours(min_stale_hours))
            .collect()
    }

    pub async fn persist(&self) -> anyhow::Result<()> {
        atomic_write_json(&self.state_path, &self.state).await
    }
}
