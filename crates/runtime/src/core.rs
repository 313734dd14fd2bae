//! `CoreRuntime` (§5, §9): the single owning value for every piece of
//! mutable state in the process — trust engine, proactive state, engagement
//! tracker, adapter registry, reflection slot. Constructed once at process
//! entry and passed around by `Arc`; there is no module-global state
//! anywhere in this crate graph.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cogcore_config::{InvocationType, RuntimeConfig};
use cogcore_continuity::apply::apply_writebacks;
use cogcore_continuity::DirectiveKind;
use cogcore_llm::{Adapter, AdapterInput, HealthStatus, HistoryTurn, ThoughtResult};
use cogcore_memory::{build_memory_context, save_preparation, ThreadStore};
use cogcore_proactive::EngagementTracker;
use cogcore_scheduler::{AttentionSnapshot, CognitiveScheduler};
use cogcore_trust::{Tier, TrustEngine};
use cogcore_workspace::paths::WorkspaceRoot;
use tokio::sync::{Mutex, OnceCell, RwLock};

/// A registered listener for governed or reflection-originated proactive
/// sends: `(message, thread_id) -> Result<()>`. One-way event hook
/// registered at startup (§9's "break the reflection/proactive/engagement
/// cycle" note).
pub type ProactiveCallback =
    Arc<dyn Fn(String, String) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

pub struct CoreRuntime {
    pub workspace: WorkspaceRoot,
    pub config: RuntimeConfig,
    pub(crate) adapters: RwLock<cogcore_llm::AdapterRegistry>,
    pub(crate) trust: Mutex<TrustEngine>,
    pub(crate) engagement: Mutex<EngagementTracker>,
    pub(crate) reflection_slot: Arc<Mutex<()>>,
    pub(crate) last_reflection_time: Mutex<Option<DateTime<Utc>>>,
    pub(crate) proactive_callback: Mutex<Option<ProactiveCallback>>,
    scheduler: OnceCell<Arc<CognitiveScheduler>>,
}

impl CoreRuntime {
    /// Seeds the workspace if needed and loads persisted trust/engagement
    /// state. The scheduler's callback closes over a `Weak` handle back to
    /// this runtime so the pair doesn't form a reference cycle.
    pub async fn new(workspace: WorkspaceRoot, config: RuntimeConfig) -> anyhow::Result<Arc<Self>> {
        workspace.seed().await?;
        let trust = TrustEngine::load(workspace.trust_metrics()).await;
        let engagement = EngagementTracker::load(&workspace).await;

        let runtime = Arc::new(Self {
            workspace: workspace.clone(),
            config,
            adapters: RwLock::new(cogcore_llm::AdapterRegistry::new()),
            trust: Mutex::new(trust),
            engagement: Mutex::new(engagement),
            reflection_slot: Arc::new(Mutex::new(())),
            last_reflection_time: Mutex::new(None),
            proactive_callback: Mutex::new(None),
            scheduler: OnceCell::new(),
        });

        let weak = Arc::downgrade(&runtime);
        let callback: cogcore_scheduler::AttentionCallback = Arc::new(move |_snapshot: AttentionSnapshot| {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(runtime) = weak.upgrade() {
                    runtime.run_heartbeat().await;
                }
                Ok(())
            })
        });
        let min_interval = std::time::Duration::from_millis(runtime.config.scheduler.min_interval_ms);
        let max_interval = std::time::Duration::from_millis(runtime.config.scheduler.max_interval_ms);
        let scheduler = Arc::new(CognitiveScheduler::new(workspace, callback, min_interval, max_interval));
        let _ = runtime.scheduler.set(scheduler);

        Ok(runtime)
    }

    pub async fn register_adapter(&self, adapter: Arc<dyn Adapter>) -> anyhow::Result<()> {
        self.adapters.write().await.register(adapter)
    }

    pub async fn start_scheduler(&self) {
        if let Some(scheduler) = self.scheduler.get() {
            scheduler.start().await;
        }
    }

    /// Waits for an in-flight reflection to finish before returning, per
    /// §5's "`stopReflectionHeartbeat()` waits ... before returning".
    pub async fn stop_scheduler(&self) {
        if let Some(scheduler) = self.scheduler.get() {
            scheduler.stop().await;
        }
        let _ = self.reflection_slot.lock().await;
    }

    pub fn record_user_activity(&self) {
        if let Some(scheduler) = self.scheduler.get() {
            scheduler.record_user_message();
        }
    }

    pub async fn on_proactive_message(&self, callback: ProactiveCallback) {
        *self.proactive_callback.lock().await = Some(callback);
    }

    /// External callback surface (§6): resolve a route, invoke the default
    /// adapter, apply any writeback directives the response carried, and
    /// touch the thread tracker for `chat_id`.
    pub async fn think(
        &self,
        message: &str,
        chat_id: &str,
        history: Vec<HistoryTurn>,
        mode: Option<String>,
        invocation_type: InvocationType,
    ) -> anyhow::Result<ThoughtResult> {
        self.record_user_activity();

        let route = self.config.resolve_route(invocation_type);
        let effective_mode = match invocation_type {
            InvocationType::Conversation => mode.unwrap_or_else(|| route_mode_str(route.mode)),
            _ => route_mode_str(route.mode),
        };

        let now = Utc::now();
        let (memory_context, _tokens) = build_memory_context(&self.workspace, chat_id, message, now).await?;
        let identity = self.config.identity.directive_token();

        let input = AdapterInput {
            message: message.to_string(),
            history,
            system_prompt: memory_context,
            route: invocation_type.to_string(),
            workspace_path: self.workspace.root().to_path_buf(),
            effective_mode,
            model: route.model,
            timeout: route.timeout,
            identity: identity.clone(),
        };

        let adapter = self
            .adapters
            .read()
            .await
            .default_adapter()
            .ok_or_else(|| anyhow::anyhow!("no adapter registered"))?;
        let mut result = adapter.invoke(&input).await;

        if result.error.is_none() {
            let mut writes = Vec::new();
            let mut preparations = Vec::new();
            for directive in std::mem::take(&mut result.writebacks) {
                match directive {
                    DirectiveKind::Write(w) => writes.push(w),
                    DirectiveKind::Prepare(p) => preparations.push(p),
                    DirectiveKind::Proactive(_) => {}
                }
            }

            let apply_results = apply_writebacks(&self.workspace, &writes).await;
            if let Some(note) = cogcore_continuity::writeback_failure_note(&apply_results.failed) {
                result.clean_text.push_str("\n\n");
                result.clean_text.push_str(&note);
            }
            for prep in &preparations {
                if prep.topic.trim().is_empty() || prep.content.trim().is_empty() {
                    continue;
                }
                let slug = slugify(&prep.topic);
                if let Err(err) =
                    save_preparation(&self.workspace, &slug, &prep.keywords, &prep.content, now, chrono::Duration::days(3)).await
                {
                    tracing::warn!(topic = %prep.topic, error = %err, "think: failed to save preparation directive");
                }
            }
        }

        if let Ok(mut store) = ThreadStore::load(&self.workspace).await {
            store.touch(chat_id, chat_id, "user", now);
            if let Err(err) = store.persist().await {
                tracing::warn!(error = %err, "think: failed to persist thread store");
            }
        }

        Ok(result)
    }

    pub async fn health_check_all(&self) -> BTreeMap<String, HealthStatus> {
        self.adapters.read().await.health_check_all().await.into_iter().collect()
    }

    pub async fn trust_summary(&self) -> (f64, Vec<Tier>, bool) {
        let trust = self.trust.lock().await;
        (trust.state().trust_score, trust.evaluate_scope(), trust.is_frozen())
    }

    pub async fn shutdown(&self) {
        self.stop_scheduler().await;
        self.adapters.write().await.shutdown_all().await;
    }
}

pub(crate) fn route_mode_str(mode: cogcore_config::RouteMode) -> String {
    match mode {
        cogcore_config::RouteMode::Yolo => "yolo",
        cogcore_config::RouteMode::Print => "print",
        cogcore_config::RouteMode::Api => "api",
    }
    .to_string()
}

/// Lower-cases and hyphenates a preparation topic into a filesystem-safe
/// slug; consecutive non-alphanumeric runs collapse to a single `-`.
pub(crate) fn slugify(topic: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;
    for ch in topic.trim().to_lowercase().chars() {
        if ch.is_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}
