//! The reflection pipeline (§4.2): gather -> decide -> reflect, run as one
//! `runHeartbeat()` cycle with at-most-one-in-flight semantics enforced by
//! `CoreRuntime`'s reflection slot (§4.2.1).

use chrono::{DateTime, Utc};
use cogcore_config::InvocationType;
use cogcore_continuity::apply::{apply_writebacks, ApplyResults};
use cogcore_continuity::DirectiveKind;
use cogcore_llm::AdapterInput;
use cogcore_memory::{save_preparation, Thread, ThreadStore};
use cogcore_proactive::engagement::Outcome;
use cogcore_proactive::governor::Action;
use cogcore_proactive::ProactiveGovernor;
use cogcore_trust::Tier;
use cogcore_workspace::frontmatter::strip_frontmatter;
use cogcore_workspace::substantive::count_substantive_lines;

use crate::core::{route_mode_str, slugify, CoreRuntime};

const STALE_THREAD_HOURS: i64 = 2;

const REFLECTION_SYSTEM_PROMPT: &str = "You are thinking privately, not talking to anyone. This is not a \
conversation and nothing you write here is shown to the user unless you explicitly emit a -proactive \
directive. Review your current state below and decide what, if anything, deserves a memory update, a \
cached preparation, or a proactive message.";

#[derive(Debug, Clone)]
pub struct WorkingMemorySection {
    pub label: &'static str,
    pub content: String,
}

/// The pure read `gather()` produces (§4.2); never fails on its own — a
/// failed sub-read degrades to an empty/default value with a logged
/// warning rather than aborting the heartbeat.
#[derive(Debug, Clone)]
pub struct ReflectionSnapshot {
    pub working_memory: Vec<WorkingMemorySection>,
    pub active_threads: Vec<Thread>,
    pub stale_thread_ids: Vec<String>,
    pub trust_score: f64,
    pub allowed_tiers: Vec<Tier>,
    pub pending_proposals: usize,
    pub attention_substantive: bool,
    pub pending_actions_substantive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Skip,
    Reflect,
    Write,
    Message,
}

#[derive(Debug, Clone)]
pub struct HeartbeatResult {
    pub phase: Phase,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReflectionOutcome {
    pub response: Option<String>,
    pub writebacks: ApplyResults,
    pub proactive_message: Option<String>,
    pub preparations: Vec<cogcore_continuity::PreparationDirective>,
}

impl CoreRuntime {
    pub async fn gather(&self) -> ReflectionSnapshot {
        let mut working_memory = Vec::new();
        let mut attention_substantive = false;
        let mut pending_actions_substantive = false;

        for (label, path, is_tracked) in [
            ("Active Context", self.workspace.active_context(), None),
            ("Attention Queue", self.workspace.attention_queue(), Some(&mut attention_substantive)),
            ("Pending Actions", self.workspace.pending_actions(), Some(&mut pending_actions_substantive)),
        ] {
            let raw = tokio::fs::read_to_string(&path).await.unwrap_or_default();
            if let Some(flag) = is_tracked {
                *flag = count_substantive_lines(&raw) > 0;
            }
            let body = strip_frontmatter(&raw);
            if !body.trim().is_empty() {
                working_memory.push(WorkingMemorySection { label, content: body });
            }
        }

        let (active_threads, stale_thread_ids) = match ThreadStore::load(&self.workspace).await {
            Ok(store) => {
                let stale = store.stale(Utc::now(), STALE_THREAD_HOURS).iter().map(|t| t.id.clone()).collect();
                (store.all().to_vec(), stale)
            }
            Err(err) => {
                tracing::warn!(error = %err, "gather: failed to load thread store, assuming no threads");
                (Vec::new(), Vec::new())
            }
        };

        let trust = self.trust.lock().await;
        let trust_score = trust.state().trust_score;
        let allowed_tiers = trust.evaluate_scope();
        let pending_proposals = trust.proposals().len();
        drop(trust);

        ReflectionSnapshot {
            working_memory,
            active_threads,
            stale_thread_ids,
            trust_score,
            allowed_tiers,
            pending_proposals,
            attention_substantive,
            pending_actions_substantive,
        }
    }

    /// Rate-limits first, then checks the four "something needs attention"
    /// conditions in order (§4.2).
    pub async fn decide(&self, snapshot: &ReflectionSnapshot) -> (bool, &'static str) {
        if let Some(last) = *self.last_reflection_time.lock().await {
            let gap = chrono::Duration::milliseconds(self.config.scheduler.min_reflection_gap_ms as i64);
            if Utc::now() - last < gap {
                return (false, "rate-limited");
            }
        }

        if snapshot.pending_proposals > 0 {
            return (true, "pending proposals");
        }
        if snapshot.attention_substantive {
            return (true, "attention queue has substantive content");
        }
        if snapshot.pending_actions_substantive {
            return (true, "pending actions have substantive content");
        }
        if !snapshot.stale_thread_ids.is_empty() {
            return (true, "an active thread has gone stale");
        }
        (false, "nothing needs attention")
    }

    /// Invokes the reflection route, extracts the three directive kinds
    /// from the raw response, applies writebacks, saves preparations with a
    /// 3-day TTL, and stamps `last_reflection_time`. A null/error LLM result
    /// is not a fatal error — it yields an empty outcome (§4.2 step 2).
    pub async fn reflect(&self, snapshot: &ReflectionSnapshot) -> ReflectionOutcome {
        let adapter = match self.adapters.read().await.default_adapter() {
            Some(adapter) => adapter,
            None => {
                tracing::warn!("reflect: no adapter registered");
                return ReflectionOutcome::default();
            }
        };

        let route = self.config.resolve_route(InvocationType::Reflection);
        let identity = self.config.identity.directive_token();
        let input = AdapterInput {
            message: render_reflection_prompt(snapshot),
            history: Vec::new(),
            system_prompt: String::new(),
            route: InvocationType::Reflection.to_string(),
            workspace_path: self.workspace.root().to_path_buf(),
            effective_mode: route_mode_str(route.mode),
            model: route.model,
            timeout: route.timeout,
            identity,
        };

        let result = adapter.invoke(&input).await;
        if result.error.is_some() || result.text.trim().is_empty() {
            return ReflectionOutcome::default();
        }

        let mut writes = Vec::new();
        let mut proactive_message = None;
        let mut preparations = Vec::new();
        for directive in result.writebacks {
            match directive {
                DirectiveKind::Write(w) => writes.push(w),
                DirectiveKind::Proactive(message) => {
                    if proactive_message.is_none() {
                        proactive_message = Some(message);
                    }
                }
                DirectiveKind::Prepare(p) => preparations.push(p),
            }
        }

        let writebacks = apply_writebacks(&self.workspace, &writes).await;

        let now = Utc::now();
        for prep in &preparations {
            if prep.topic.trim().is_empty() || prep.content.trim().is_empty() {
                tracing::warn!(topic = %prep.topic, "reflect: skipping malformed preparation directive");
                continue;
            }
            let slug = slugify(&prep.topic);
            if let Err(err) =
                save_preparation(&self.workspace, &slug, &prep.keywords, &prep.content, now, chrono::Duration::days(3)).await
            {
                tracing::warn!(topic = %prep.topic, error = %err, "reflect: failed to save preparation");
            }
        }

        *self.last_reflection_time.lock().await = Some(now);

        ReflectionOutcome {
            response: Some(result.clean_text),
            writebacks,
            proactive_message,
            preparations,
        }
    }

    /// One full gather-decide-reflect-apply_writebacks-proactive_evaluate
    /// cycle (§4.2.1, §5). A second call while one is already running does
    /// not wait for the lock — it is dropped immediately, matching "a
    /// second tick that fires while one is running is dropped".
    pub async fn run_heartbeat(&self) -> HeartbeatResult {
        let Ok(_permit) = self.reflection_slot.clone().try_lock_owned() else {
            return HeartbeatResult {
                phase: Phase::Skip,
                reason: "skipping: previous reflection still in flight".to_string(),
            };
        };

        match self.run_heartbeat_inner().await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "run_heartbeat: unexpected failure");
                HeartbeatResult { phase: Phase::Skip, reason: format!("unexpected error: {err}") }
            }
        }
    }

    async fn run_heartbeat_inner(&self) -> anyhow::Result<HeartbeatResult> {
        let snapshot = self.gather().await;
        let (should_reflect, reason) = self.decide(&snapshot).await;
        if !should_reflect {
            return Ok(HeartbeatResult { phase: Phase::Skip, reason: reason.to_string() });
        }

        let outcome = self.reflect(&snapshot).await;
        let mut phase = Phase::Reflect;
        let mut reason = "reflected with nothing to report".to_string();
        if !outcome.writebacks.succeeded.is_empty() || !outcome.writebacks.failed.is_empty() {
            phase = Phase::Write;
            reason = format!("{} writeback(s) applied", outcome.writebacks.succeeded.len());
        }

        let now = Utc::now();
        let mut fired_message = false;
        if let Some(message) = &outcome.proactive_message {
            if self.dispatch_reflection_proactive(message).await {
                fired_message = true;
            }
        }
        if self.evaluate_and_dispatch_stale_threads(&snapshot, now).await? {
            fired_message = true;
        }

        if fired_message {
            phase = Phase::Message;
            reason = "proactive message dispatched".to_string();
        }

        Ok(HeartbeatResult { phase, reason })
    }

    /// Dispatches a reflection's own `-proactive` directive: not
    /// thread-gated, since it's the LLM flagging something mid-reflection
    /// rather than the governor's stale-thread evaluation.
    async fn dispatch_reflection_proactive(&self, message: &str) -> bool {
        let callback = self.proactive_callback.lock().await.clone();
        let Some(callback) = callback else {
            tracing::debug!("run_heartbeat: proactive message produced but no callback registered");
            return false;
        };
        if let Err(err) = callback(message.to_string(), "reflection".to_string()).await {
            tracing::warn!(error = %err, "run_heartbeat: proactive callback failed");
            return false;
        }
        true
    }

    /// Runs the proactive governor over every active thread regardless of
    /// whether the reflection itself flagged anything (§4.2's "after
    /// reflection ... asks the proactive governor to evaluate active
    /// threads"). Dispatches `Send` verdicts through the registered
    /// callback, records `recordFollowUpSent`, and optimistically logs an
    /// `engaged` engagement outcome.
    async fn evaluate_and_dispatch_stale_threads(
        &self,
        snapshot: &ReflectionSnapshot,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let adapter = match self.adapters.read().await.default_adapter() {
            Some(adapter) => adapter,
            None => return Ok(false),
        };

        let evaluations = {
            let engagement = self.engagement.lock().await;
            let governor = ProactiveGovernor::new(&self.workspace, &*adapter, self.config.proactive.shadow);
            governor.evaluate_stale_threads(&snapshot.active_threads, &engagement, now).await
        };

        let mut fired = false;
        for evaluation in evaluations {
            if evaluation.action != Action::Send || evaluation.shadow {
                continue;
            }

            let callback = self.proactive_callback.lock().await.clone();
            let Some(callback) = callback else {
                tracing::debug!(thread = %evaluation.thread_id, "stale-thread follow-up scored to send but no callback registered");
                continue;
            };

            let message = evaluation.draft.clone().unwrap_or_else(|| "Just checking in on this.".to_string());
            if let Err(err) = callback(message, evaluation.thread_id.clone()).await {
                tracing::warn!(thread = %evaluation.thread_id, error = %err, "failed to dispatch stale-thread follow-up");
                continue;
            }

            let governor = ProactiveGovernor::new(&self.workspace, &*adapter, self.config.proactive.shadow);
            governor.record_follow_up_sent(&evaluation.thread_id, now).await?;

            let mut engagement = self.engagement.lock().await;
            engagement.record(&evaluation.thread_id, "stale-thread-followup", Outcome::Engaged, now);
            engagement.persist().await?;

            fired = true;
        }

        Ok(fired)
    }
}

fn render_reflection_prompt(snapshot: &ReflectionSnapshot) -> String {
    let mut prompt = String::from(REFLECTION_SYSTEM_PROMPT);
    prompt.push_str("\n\n");

    if snapshot.working_memory.is_empty() {
        prompt.push_str("(working memory is empty)\n");
    } else {
        for section in &snapshot.working_memory {
            prompt.push_str("### ");
            prompt.push_str(section.label);
            prompt.push('\n');
            prompt.push_str(section.content.trim());
            prompt.push('\n');
        }
    }

    prompt.push_str("\n### Active Threads\n");
    if snapshot.active_threads.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        for thread in &snapshot.active_threads {
            prompt.push_str(&format!(
                "- {} (topic: {}, last activity: {})\n",
                thread.id,
                thread.topic,
                thread.last_activity.to_rfc3339()
            ));
        }
    }

    prompt.push_str(&format!(
        "\n### Trust\nscore={:.2} allowed_tiers={:?} pending_proposals={}\n",
        snapshot.trust_score, snapshot.allowed_tiers, snapshot.pending_proposals
    ));
    prompt.push_str(&format!("\n### Time\n{}\n", Utc::now().to_rfc3339()));
    prompt
}
