use cogcore_workspace::frontmatter::{MemoryFile, serialize_memory_file};
use cogcore_workspace::paths::WorkspaceRoot;
use cogcore_workspace::{append_file, atomic_write};

use crate::directive::{WriteAction, WriteDirective};

#[derive(Debug, Default, Clone)]
pub struct ApplyResults {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Apply a batch of validated-at-extraction-time write directives under
/// `workspace`, in the order they appear. Path-traversal rejection happens
/// here (§4.3's validation step) — a rejected directive appears in neither
/// list, matching the invariant in §8.
pub async fn apply_writebacks(workspace: &WorkspaceRoot, directives: &[WriteDirective]) -> ApplyResults {
    let mut results = ApplyResults::default();
    for directive in directives {
        let Some(target) = workspace.resolve_relative(&directive.file) else {
            tracing::warn!(file = %directive.file, "writeback rejected: path escapes workspace");
            continue;
        };

        match apply_one(&target, directive).await {
            Ok(()) => results.succeeded.push(directive.file.clone()),
            Err(err) => results.failed.push((directive.file.clone(), err.to_string())),
        }
    }
    results
}

async fn apply_one(target: &std::path::Path, directive: &WriteDirective) -> anyhow::Result<()> {
    match directive.action {
        WriteAction::Create | WriteAction::Update => {
            let file = MemoryFile {
                frontmatter: directive.frontmatter.clone(),
                body: directive.content.clone(),
            };
            let rendered = serialize_memory_file(&file);
            atomic_write(target, rendered.as_bytes()).await
        }
        WriteAction::Append => {
            let body = if directive.content.starts_with('\n') {
                directive.content.clone()
            } else {
                format!("\n{}", directive.content)
            };
            append_file(target, &body).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn workspace() -> (WorkspaceRoot, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("cogcore-continuity-apply-{}", uuid::Uuid::new_v4()));
        (WorkspaceRoot::new(&dir), dir)
    }

    #[tokio::test]
    async fn create_directive_writes_file() {
        let (ws, dir) = workspace();
        let directive = WriteDirective {
            file: "memory/facts/router-test.md".to_string(),
            action: WriteAction::Create,
            frontmatter: BTreeMap::new(),
            content: "Router test fact.".to_string(),
        };
        let results = apply_writebacks(&ws, &[directive]).await;
        assert_eq!(results.succeeded, vec!["memory/facts/router-test.md".to_string()]);
        assert!(results.failed.is_empty());

        let written = tokio::fs::read_to_string(ws.root().join("memory/facts/router-test.md")).await.unwrap();
        assert_eq!(written, "Router test fact.");
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn traversal_directive_is_rejected_without_io() {
        let (ws, dir) = workspace();
        let directive = WriteDirective {
            file: "../../../etc/evil.md".to_string(),
            action: WriteAction::Create,
            frontmatter: BTreeMap::new(),
            content: "pwned".to_string(),
        };
        let results = apply_writebacks(&ws, &[directive]).await;
        assert!(results.succeeded.is_empty());
        assert!(results.failed.is_empty());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn append_adds_leading_newline_when_missing() {
        let (ws, dir) = workspace();
        tokio::fs::create_dir_all(ws.root().join("memory/facts")).await.unwrap();
        let path = ws.root().join("memory/facts/log.md");
        tokio::fs::write(&path, "first").await.unwrap();

        let directive = WriteDirective {
            file: "memory/facts/log.md".to_string(),
            action: WriteAction::Append,
            frontmatter: BTreeMap::new(),
            content: "second".to_string(),
        };
        apply_writebacks(&ws, &[directive]).await;
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "first\nsecond");
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
