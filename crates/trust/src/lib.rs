//! Trust & scope engine (score-and-freeze model) plus the action-authority
//! tier map and proposal queue that sit on top of it.

mod authority;
mod state;

pub use authority::{ActionRequest, ActionResult, ProposalQueue, Tier, classify_action};
pub use state::{Signal, TrustState};

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use cogcore_workspace::{atomic_write_json, load_json_or_default};

const FREEZE_WINDOW_DAYS: i64 = 14;
const MAX_SIGNALS: usize = 50;
const LOW_THRESHOLD: f64 = 0.4;
const HIGH_THRESHOLD: f64 = 0.7;

/// Owns the persisted trust state for one workspace and the in-memory
/// proposal queue / action log that accumulate between restarts.
pub struct TrustEngine {
    state_path: PathBuf,
    state: TrustState,
    proposals: ProposalQueue,
    action_log: Vec<ActionResult>,
}

impl TrustEngine {
    pub async fn load(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let state: TrustState = load_json_or_default(&state_path).await;
        Self {
            state_path,
            state,
            proposals: ProposalQueue::default(),
            action_log: Vec::new(),
        }
    }

    pub fn state(&self) -> &TrustState {
        &self.state
    }

    pub fn proposals(&self) -> &ProposalQueue {
        &self.proposals
    }

    pub fn action_log(&self) -> &[ActionResult] {
        &self.action_log
    }

    /// Record a trust signal, recompute the score and (unless frozen)
    /// `allowed_tiers`, and persist. Append-in-call-order, pruned from the
    /// front to at most 50 signals.
    pub async fn record_signal(&mut self, positive: bool, value: f64, source: impl Into<String>) -> Result<()> {
        let delta = if positive { value } else { -value };
        self.state.trust_score = (self.state.trust_score + delta).clamp(0.0, 1.0);
        self.state.signals.push(Signal {
            positive,
            value,
            source: source.into(),
            timestamp: Utc::now(),
        });
        while self.state.signals.len() > MAX_SIGNALS {
            self.state.signals.remove(0);
        }
        self.recompute_tiers();
        self.state.last_updated = Utc::now();
        self.persist().await
    }

    /// A trust-annihilating event: collapses the score, forces
    /// autonomous-only scope, and starts a 14-day freeze window anchored on
    /// this signal's timestamp.
    pub async fn record_critical_failure(&mut self, reason: impl AsRef<str>) -> Result<()> {
        self.state.trust_score = 0.1;
        self.state.signals.push(Signal {
            positive: false,
            value: 0.0,
            source: format!("critical-failure: {}", reason.as_ref()),
            timestamp: Utc::now(),
        });
        while self.state.signals.len() > MAX_SIGNALS {
            self.state.signals.remove(0);
        }
        self.state.allowed_tiers = vec![Tier::Autonomous];
        self.state.last_updated = Utc::now();
        self.persist().await
    }

    /// Whether a critical failure within the last 14 days is present in the
    /// signal ring. Recomputed from persisted state on every call, so a
    /// freeze survives process restarts without any separate flag.
    pub fn is_frozen(&self) -> bool {
        self.is_frozen_at(Utc::now())
    }

    fn is_frozen_at(&self, now: DateTime<Utc>) -> bool {
        self.state
            .signals
            .iter()
            .filter(|s| s.source.starts_with("critical-failure:"))
            .map(|s| s.timestamp)
            .max()
            .map(|most_recent| now - most_recent < chrono::Duration::days(FREEZE_WINDOW_DAYS))
            .unwrap_or(false)
    }

    pub fn evaluate_scope(&self) -> Vec<Tier> {
        if self.is_frozen() {
            vec![Tier::Autonomous]
        } else {
            tiers_for_score(self.state.trust_score)
        }
    }

    fn recompute_tiers(&mut self) {
        self.state.allowed_tiers = if self.is_frozen() {
            vec![Tier::Autonomous]
        } else {
            tiers_for_score(self.state.trust_score)
        };
    }

    /// Classify and decide an action request against the current scope,
    /// logging the outcome regardless of approval.
    pub fn request_action(&mut self, request: ActionRequest) -> ActionResult {
        let frozen = self.is_frozen();
        let tier = classify_action(&request.category, frozen);
        let result = match tier {
            Tier::Autonomous => ActionResult {
                category: request.category,
                approved: true,
                reason: None,
            },
            Tier::Propose => {
                self.proposals.push(request.category.clone(), request.description.clone());
                ActionResult {
                    category: request.category,
                    approved: false,
                    reason: Some("pending_proposal".to_string()),
                }
            }
            Tier::Restricted => ActionResult {
                category: request.category,
                approved: false,
                reason: Some("restricted".to_string()),
            },
        };
        self.action_log.push(result.clone());
        result
    }

    async fn persist(&self) -> Result<()> {
        atomic_write_json(&self.state_path, &self.state).await
    }
}

fn tiers_for_score(score: f64) -> Vec<Tier> {
    if score >= HIGH_THRESHOLD {
        vec![Tier::Autonomous, Tier::Propose, Tier::Restricted]
    } else if score >= LOW_THRESHOLD {
        vec![Tier::Autonomous, Tier::Propose]
    } else {
        vec![Tier::Autonomous]
    }
}
