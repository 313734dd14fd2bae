//! Layered memory context assembler (§4.8): composes the system-prompt
//! preamble from working memory, identity, user profile, session summary,
//! matched preparations, facts, and topics under a token budget.

use cogcore_workspace::frontmatter::strip_frontmatter;
use cogcore_workspace::paths::WorkspaceRoot;

use crate::facts::load_facts;
use crate::preparations::{list_active, match_preparations};
use crate::topics::load_topics;

pub const TOKEN_BUDGET: usize = 8000;
pub const BUDGET_WARNING_THRESHOLD: usize = 7000;

const MEMORY_INSTRUCTIONS: &str = "The sections below are your standing memory, assembled for this turn. \
Working memory reflects what you're focused on right now. Facts and topics are things you've \
previously chosen to remember; treat them as established unless the user corrects you. \
Preparations are context you cached in advance because you expected it to be useful now. \
None of this is visible to the user unless you choose to act on it.";

/// A conservative token estimator: roughly 3 characters per token, rounded
/// up so the budget errs on the side of trimming too early rather than
/// overflowing a real tokenizer.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(3)
}

struct WorkingMemoryFile {
    label: &'static str,
    content: String,
}

/// Builds the assembled context string and its estimated token count. An
/// entirely empty result (`("", 0)`) means nothing at all loaded — no header
/// is emitted in that case.
pub async fn build_memory_context(
    workspace: &WorkspaceRoot,
    chat_id: &str,
    latest_message: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> anyhow::Result<(String, usize)> {
    let mut always = String::new();

    let working_memory_files = [
        ("Active Context", workspace.active_context()),
        ("Attention Queue", workspace.attention_queue()),
        ("Pending Actions", workspace.pending_actions()),
    ];
    let mut working_memory = Vec::new();
    for (label, path) in working_memory_files {
        if let Ok(raw) = tokio::fs::read_to_string(&path).await {
            let body = strip_frontmatter(&raw);
            if !body.trim().is_empty() {
                working_memory.push(WorkingMemoryFile { label, content: body });
            }
        }
    }
    if !working_memory.is_empty() {
        always.push_str("### Working Memory\n");
        for file in &working_memory {
            always.push_str("#### ");
            always.push_str(file.label);
            always.push('\n');
            always.push_str(file.content.trim());
            always.push('\n');
        }
    }

    if let Ok(raw) = tokio::fs::read_to_string(&workspace.identity_self()).await {
        let body = strip_frontmatter(&raw);
        if !body.trim().is_empty() {
            always.push_str("### Identity\n");
            always.push_str(body.trim());
            always.push('\n');
        }
    }

    if let Ok(raw) = tokio::fs::read_to_string(&workspace.user_profile()).await {
        let body = strip_frontmatter(&raw);
        if !body.trim().is_empty() {
            always.push_str("### User Profile\n");
            always.push_str(body.trim());
            always.push('\n');
        }
    }

    if let Ok(raw) = tokio::fs::read_to_string(&workspace.session_summary(chat_id)).await {
        let body = strip_frontmatter(&raw);
        if !body.trim().is_empty() {
            always.push_str("### Session Summary\n");
            always.push_str(body.trim());
            always.push('\n');
        }
    }

    let mut conditional = String::new();
    let mut budget_used = estimate_tokens(&always);

    let preps = list_active(workspace, now).await.unwrap_or_default();
    let matched = match_preparations(latest_message, &preps);
    for prep in matched {
        let section = format!("### Prepared: {}\n{}\n", prep.topic, prep.content.trim());
        let cost = estimate_tokens(&section);
        if budget_used + cost > TOKEN_BUDGET {
            break;
        }
        conditional.push_str(&section);
        budget_used += cost;
    }

    let facts = load_facts(workspace).await.unwrap_or_default();
    if !facts.is_empty() {
        let mut facts_section = String::from("### Facts\n");
        let mut included_any = false;
        for fact in &facts {
            let line = format!("- {}\n", fact.body.trim());
            let cost = estimate_tokens(&line);
            if budget_used + estimate_tokens(&facts_section) + cost > TOKEN_BUDGET {
                continue;
            }
            facts_section.push_str(&line);
            budget_used += cost;
            included_any = true;
        }
        if included_any {
            conditional.push_str(&facts_section);
        }
    }

    let topics = load_topics(workspace).await.unwrap_or_default();
    if !topics.is_empty() {
        let mut topics_section = String::from("### Topics\n");
        let mut included_any = false;
        for topic in &topics {
            let section = format!("#### {}\n{}\n", topic.name, topic.body.trim());
            let cost = estimate_tokens(&section);
            if budget_used + estimate_tokens(&topics_section) + cost > TOKEN_BUDGET {
                continue;
            }
            topics_section.push_str(&section);
            budget_used += cost;
            included_any = true;
        }
        if included_any {
            conditional.push_str(&topics_section);
        }
    }

    if always.trim().is_empty() && conditional.trim().is_empty() {
        return Ok((String::new(), 0));
    }

    let mut out = String::new();
    out.push_str(MEMORY_INSTRUCTIONS);
    out.push_str("\n\n");
    out.push_str(&always);
    out.push_str(&conditional);

    let total = estimate_tokens(&out);
    if total > BUDGET_WARNING_THRESHOLD {
        tracing::warn!(tokens = total, "memory context exceeds budget warning threshold");
    }

    Ok((out, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (WorkspaceRoot, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("cogcore-memory-context-{}", uuid::Uuid::new_v4()));
        (WorkspaceRoot::new(&dir), dir)
    }

    #[tokio::test]
    async fn empty_workspace_produces_empty_context() {
        let (ws, dir) = workspace();
        ws.seed().await.unwrap();
        let (context, tokens) = build_memory_context(&ws, "chat1", "", chrono::Utc::now()).await.unwrap();
        assert!(context.is_empty());
        assert_eq!(tokens, 0);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn working_memory_and_identity_always_load() {
        let (ws, dir) = workspace();
        ws.seed().await.unwrap();
        tokio::fs::write(ws.active_context(), "Helping with a Rust project.").await.unwrap();
        tokio::fs::write(ws.identity_self(), "# Identity\n\nA helpful assistant.").await.unwrap();

        let (context, _) = build_memory_context(&ws, "chat1", "", chrono::Utc::now()).await.unwrap();
        assert!(context.contains("### Working Memory"));
        assert!(context.contains("Helping with a Rust project."));
        assert!(context.contains("### Identity"));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn matched_preparation_is_included() {
        let (ws, dir) = workspace();
        ws.seed().await.unwrap();
        let now = chrono::Utc::now();
        crate::preparations::save_preparation(
            &ws,
            "rust-async",
            &["tokio".to_string(), "async".to_string()],
            "They're learning tokio.",
            now,
            chrono::Duration::hours(24),
        )
        .await
        .unwrap();

        let (context, _) = build_memory_context(&ws, "chat1", "tell me about tokio async runtimes", now).await.unwrap();
        assert!(context.contains("Prepared: rust-async"));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
