//! `memory/proactive-state.json` (§3): sent-today ring plus per-thread
//! follow-up counters, owned exclusively by the proactive governor.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use cogcore_workspace::paths::WorkspaceRoot;
use cogcore_workspace::{atomic_write_json, load_json_or_default};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentRecord {
    pub thread_id: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowUpRecord {
    pub count: u32,
    pub last_at: Option<DateTime<Utc>>,
    pub ignored: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProactiveState {
    #[serde(default)]
    pub sent_today: Vec<SentRecord>,
    #[serde(default)]
    pub follow_ups_by_thread: HashMap<String, FollowUpRecord>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProactiveState {
    /// Prunes `sent_today` to the rolling 24-hour window. Called on every
    /// read, per §3's definition of the state shape.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.sent_today.retain(|record| now - record.sent_at < chrono::Duration::hours(24));
    }

    pub fn record_follow_up_sent(&mut self, thread_id: &str, now: DateTime<Utc>) {
        self.sent_today.push(SentRecord { thread_id: thread_id.to_string(), sent_at: now });
        let entry = self.follow_ups_by_thread.entry(thread_id.to_string()).or_default();
        entry.count += 1;
        entry.last_at = Some(now);
        self.last_updated = Some(now);
    }

    pub fn mark_ignored(&mut self, thread_id: &str) {
        if let Some(entry) = self.follow_ups_by_thread.get_mut(thread_id) {
            entry.ignored = true;
        }
    }
}

pub async fn load(workspace: &WorkspaceRoot, now: DateTime<Utc>) -> ProactiveState {
    let mut state: ProactiveState = load_json_or_default(&workspace.proactive_state()).await;
    state.prune(now);
    state
}

pub async fn persist(workspace: &WorkspaceRoot, state: &ProactiveState) -> anyhow::Result<()> {
    atomic_write_json(&workspace.proactive_state(), state).await
}
