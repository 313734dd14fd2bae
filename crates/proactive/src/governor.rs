//! `ProactiveGovernor` (§4.6): decides whether to send unsolicited messages
//! on stale threads, with bounded frequency and adaptive suppression.
//! Grounded on the teacher's `run_proactive_check` — a single LLM call
//! scored and gated before any message leaves the process.

use chrono::{DateTime, Utc};
use cogcore_llm::{Adapter, AdapterInput};
use cogcore_memory::Thread;
use cogcore_workspace::paths::WorkspaceRoot;

use crate::engagement::EngagementTracker;
use crate::rate_limit::check_rate_limits;
use crate::state::{self, ProactiveState};

const MIN_STALE_HOURS: i64 = 4;
const SEND_THRESHOLD: f64 = 7.0;
const NOTE_THRESHOLD: f64 = 4.0;
const STALE_THREAD_BEHAVIOR: &str = "stale-thread-followup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Send,
    Note,
    Silence,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub thread_id: String,
    pub action: Action,
    pub rate_limit_reason: Option<&'static str>,
    pub score: Option<f64>,
    pub draft: Option<String>,
    pub reasoning: Option<String>,
    pub shadow: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct SignificanceScores {
    importance: f64,
    novelty: f64,
    timing: f64,
    confidence: f64,
    reasoning: Option<String>,
    draft_message: Option<String>,
}

impl SignificanceScores {
    fn in_range(&self) -> bool {
        [self.importance, self.novelty, self.timing, self.confidence]
            .iter()
            .all(|v| v.is_finite() && (0.0..=10.0).contains(v))
    }

    fn weighted(&self) -> f64 {
        0.40 * self.importance + 0.25 * self.novelty + 0.20 * self.timing + 0.15 * self.confidence
    }
}

pub struct ProactiveGovernor<'a> {
    workspace: &'a WorkspaceRoot,
    adapter: &'a dyn Adapter,
    shadow_mode: bool,
}

impl<'a> ProactiveGovernor<'a> {
    pub fn new(workspace: &'a WorkspaceRoot, adapter: &'a dyn Adapter, shadow_mode: bool) -> Self {
        Self { workspace, adapter, shadow_mode }
    }

    /// Evaluates stale threads in order, stopping as soon as one hits a rate
    /// limit (§4.6's batch behavior — no point evaluating further once the
    /// budget for the tick is spent). Returns an empty vec without calling
    /// the LLM at all if the engagement tracker says this behavior type is
    /// currently suppressed.
    pub async fn evaluate_stale_threads(
        &self,
        threads: &[Thread],
        engagement: &EngagementTracker,
        now: DateTime<Utc>,
    ) -> Vec<Evaluation> {
        if engagement.should_suppress(STALE_THREAD_BEHAVIOR) {
            tracing::debug!("proactive evaluation suppressed by engagement tracker");
            return Vec::new();
        }

        let proactive_state = state::load(self.workspace, now).await;
        let stale: Vec<&Thread> = threads
            .iter()
            .filter(|t| now - t.last_activity >= chrono::Duration::hours(MIN_STALE_HOURS))
            .collect();

        let mut evaluations = Vec::new();
        for thread in stale {
            if let Some(reason) = check_rate_limits(&proactive_state, &thread.id, now) {
                evaluations.push(Evaluation {
                    thread_id: thread.id.clone(),
                    action: Action::Silence,
                    rate_limit_reason: Some(reason),
                    score: None,
                    draft: None,
                    reasoning: None,
                    shadow: false,
                });
                break;
            }

            evaluations.push(self.score_thread(thread).await);
        }

        evaluations
    }

    async fn score_thread(&self, thread: &Thread) -> Evaluation {
        let prompt = format!(
            "A conversation thread about \"{topic}\" has gone quiet. Decide whether following up is \
             worth it. Respond only with strict JSON: {{\"importance\":0-10,\"novelty\":0-10,\
             \"timing\":0-10,\"confidence\":0-10,\"reasoning\":\"...\",\"draft_message\":\"...\"}}",
            topic = thread.topic,
        );
        let input = AdapterInput {
            message: prompt,
            history: Vec::new(),
            system_prompt: String::new(),
            route: "reflection".to_string(),
            workspace_path: self.workspace.root().to_path_buf(),
            effective_mode: "print".to_string(),
            model: String::new(),
            timeout: std::time::Duration::from_secs(60),
            identity: String::new(),
        };

        let result = self.adapter.invoke(&input).await;
        let Some(scores) = parse_significance(&result.clean_text) else {
            return Evaluation {
                thread_id: thread.id.clone(),
                action: Action::Silence,
                rate_limit_reason: None,
                score: None,
                draft: None,
                reasoning: None,
                shadow: self.shadow_mode,
            };
        };

        let weighted = scores.weighted();
        let action = if weighted >= SEND_THRESHOLD {
            Action::Send
        } else if weighted >= NOTE_THRESHOLD {
            Action::Note
        } else {
            Action::Silence
        };

        Evaluation {
            thread_id: thread.id.clone(),
            action,
            rate_limit_reason: None,
            score: Some(weighted),
            draft: scores.draft_message.clone(),
            reasoning: scores.reasoning.clone(),
            shadow: self.shadow_mode,
        }
    }

    pub async fn record_follow_up_sent(&self, thread_id: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut proactive_state = state::load(self.workspace, now).await;
        proactive_state.record_follow_up_sent(thread_id, now);
        state::persist(self.workspace, &proactive_state).await
    }
}

/// Strips a markdown code fence if present, then parses as strict JSON.
/// Rejects the result if any score is out of `[0, 10]` or non-finite.
fn parse_significance(raw: &str) -> Option<SignificanceScores> {
    let trimmed = raw.trim();
    let candidate = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim_end_matches("```")
        .trim();

    let scores: SignificanceScores = serde_json::from_str(candidate).ok()?;
    if !scores.in_range() {
        return None;
    }
    Some(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"importance\":8,\"novelty\":6,\"timing\":7,\"confidence\":9,\"reasoning\":\"r\",\"draft_message\":\"d\"}\n```";
        let scores = parse_significance(raw).unwrap();
        assert_eq!(scores.importance, 8.0);
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let raw = r#"{"importance":12,"novelty":6,"timing":7,"confidence":9}"#;
        assert!(parse_significance(raw).is_none());
    }

    #[test]
    fn weighted_score_matches_formula() {
        let scores = SignificanceScores {
            importance: 10.0,
            novelty: 10.0,
            timing: 10.0,
            confidence: 10.0,
            reasoning: None,
            draft_message: None,
        };
        assert!((scores.weighted() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn action_thresholds_match_spec() {
        let low = SignificanceScores { importance: 0.0, novelty: 0.0, timing: 0.0, confidence: 0.0, reasoning: None, draft_message: None };
        assert!(low.weighted() < NOTE_THRESHOLD);
        let mid = SignificanceScores { importance: 5.0, novelty: 5.0, timing: 5.0, confidence: 5.0, reasoning: None, draft_message: None };
        assert!(mid.weighted() >= NOTE_THRESHOLD && mid.weighted() < SEND_THRESHOLD);
        let high = SignificanceScores { importance: 9.0, novelty: 9.0, timing: 9.0, confidence: 9.0, reasoning: None, draft_message: None };
        assert!(high.weighted() >= SEND_THRESHOLD);
    }
}
