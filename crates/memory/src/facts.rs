//! Loads `memory/facts/*.md` (§3): one extracted fact per file, frontmatter
//! stripped for rendering but kept around for freshness ordering.

use cogcore_workspace::frontmatter::parse_memory_file;
use cogcore_workspace::paths::WorkspaceRoot;

#[derive(Debug, Clone)]
pub struct Fact {
    pub file_name: String,
    pub body: String,
    pub created: Option<String>,
}

/// Loads every fact file, newest first by the `created` frontmatter field
/// (falling back to file name order when absent) — the order the context
/// assembler (§4.8) wants so it can drop the oldest when truncating.
pub async fn load_facts(workspace: &WorkspaceRoot) -> anyhow::Result<Vec<Fact>> {
    let dir = workspace.facts_dir();
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut facts = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let parsed = parse_memory_file(&raw);
        if parsed.body.trim().is_empty() {
            continue;
        }
        facts.push(Fact {
            file_name: path.file_name().unwrap_or_default().to_string_lossy().into_owned(),
            created: parsed.frontmatter.get("created").cloned(),
            body: parsed.body,
        });
    }

    facts.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.file_name.cmp(&a.file_name)));
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (WorkspaceRoot, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("cogcore-memory-facts-{}", uuid::Uuid::new_v4()));
        (WorkspaceRoot::new(&dir), dir)
    }

    #[tokio::test]
    async fn missing_facts_dir_returns_empty() {
        let (ws, dir) = workspace();
        assert!(load_facts(&ws).await.unwrap().is_empty());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn facts_sort_newest_first() {
        let (ws, dir) = workspace();
        tokio::fs::create_dir_all(ws.facts_dir()).await.unwrap();
        tokio::fs::write(ws.facts_dir().join("a.md"), "---\ncreated: 2026-01-01\n---\nOld fact.").await.unwrap();
        tokio::fs::write(ws.facts_dir().join("b.md"), "---\ncreated: 2026-06-01\n---\nNew fact.").await.unwrap();

        let facts = load_facts(&ws).await.unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].body, "New fact.");
        assert_eq!(facts[1].body, "Old fact.");
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn empty_fact_bodies_are_skipped() {
        let (ws, dir) = workspace();
        tokio::fs::create_dir_all(ws.facts_dir()).await.unwrap();
        tokio::fs::write(ws.facts_dir().join("empty.md"), "---\ncreated: 2026-01-01\n---\n").await.unwrap();
        assert!(load_facts(&ws).await.unwrap().is_empty());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
