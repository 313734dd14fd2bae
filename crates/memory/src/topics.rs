//! Loads `memory/topics/*.md` (§3): topic summaries, one file per topic.

use cogcore_workspace::frontmatter::parse_memory_file;
use cogcore_workspace::paths::WorkspaceRoot;

#[derive(Debug, Clone)]
pub struct Topic {
    pub name: String,
    pub body: String,
}

pub async fn load_topics(workspace: &WorkspaceRoot) -> anyhow::Result<Vec<Topic>> {
    let dir = workspace.topics_dir();
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut topics = Vec::new();
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
        let name = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
        topics.push(Topic { name, body: parsed.body });
    }

    topics.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(topics)
}
