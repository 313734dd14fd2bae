//! Engagement tracker (§4.8): a bounded outcome ring feeding adaptive
//! suppression, so a behavior that's been consistently ignored stops firing
//! even when it would otherwise pass its own thresholds.

use chrono::{DateTime, Utc};
use cogcore_workspace::paths::WorkspaceRoot;
use cogcore_workspace::{atomic_write_json, load_json_or_default};
use serde::{Deserialize, Serialize};

const MAX_RECORDS: usize = 500;
const CONSECUTIVE_REJECTION_THRESHOLD: usize = 2;
const MIN_SAMPLE_FOR_RATE: usize = 5;
const ENGAGEMENT_RATE_FLOOR: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Engaged,
    Acknowledged,
    Ignored,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub message_id: String,
    pub behavior_type: String,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EngagementState {
    #[serde(default)]
    records: Vec<EngagementRecord>,
}

pub struct EngagementTracker {
    state_path: std::path::PathBuf,
    state: EngagementState,
}

impl EngagementTracker {
    pub async fn load(workspace: &WorkspaceRoot) -> Self {
        let state_path = workspace.engagement_state();
        let state = load_json_or_default(&state_path).await;
        Self { state_path, state }
    }

    /// Records an outcome for `message_id`. An optimistic `Engaged` logged at
    /// send time and later corrected by a real transport signal overwrites
    /// the existing entry in place rather than appending a duplicate; a new
    /// `message_id` appends, evicting the oldest when the ring is full.
    pub fn record(&mut self, message_id: &str, behavior_type: &str, outcome: Outcome, now: DateTime<Utc>) {
        if let Some(existing) = self.state.records.iter_mut().find(|r| r.message_id == message_id) {
            existing.behavior_type = behavior_type.to_string();
            existing.outcome = outcome;
            existing.timestamp = now;
            return;
        }
        if self.state.records.len() >= MAX_RECORDS {
            self.state.records.remove(0);
        }
        self.state.records.push(EngagementRecord {
            message_id: message_id.to_string(),
            behavior_type: behavior_type.to_string(),
            outcome,
            timestamp: now,
        });
    }

    /// True if `behavior_type`'s most recent outcomes are at least two
    /// consecutive rejections, or it has ≥5 samples with an engagement rate
    /// (engaged+acknowledged)/total below 0.20.
    pub fn should_suppress(&self, behavior_type: &str) -> bool {
        let records: Vec<&EngagementRecord> =
            self.state.records.iter().filter(|r| r.behavior_type == behavior_type).collect();
        if records.is_empty() {
            return false;
        }

        let trailing_rejections = records
            .iter()
            .rev()
            .take(CONSECUTIVE_REJECTION_THRESHOLD)
            .all(|r| r.outcome == Outcome::Rejected);
        if records.len() >= CONSECUTIVE_REJECTION_THRESHOLD && trailing_rejections {
            return true;
        }

        if records.len() >= MIN_SAMPLE_FOR_RATE {
            let engaged = records
                .iter()
                .filter(|r| matches!(r.outcome, Outcome::Engaged | Outcome::Acknowledged))
                .count();
            let rate = engaged as f64 / records.len() as f64;
            if rate < ENGAGEMENT_RATE_FLOOR {
                return true;
            }
        }

        false
    }

    pub async fn persist(&self) -> anyhow::Result<()> {
        atomic_write_json(&self.state_path, &self.state).await
    }
}
