//! Cached "I anticipated this" context (§3, §4.8): `preparations/<topic>.md`,
//! TTL-expired on read, surfaced automatically when a later message matches
//! enough of its keywords.

use chrono::{DateTime, Utc};
use cogcore_workspace::frontmatter::{MemoryFile, parse_memory_file, serialize_memory_file};
use cogcore_workspace::paths::WorkspaceRoot;
use cogcore_workspace::atomic_write;

const MIN_MATCHING_KEYWORDS: usize = 2;

#[derive(Debug, Clone)]
pub struct Preparation {
    pub topic: String,
    pub keywords: Vec<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Write (or overwrite) a preparation file. `ttl` controls how long it stays
/// eligible before `list_active` deletes it unread.
pub async fn save_preparation(
    workspace: &WorkspaceRoot,
    topic: &str,
    keywords: &[String],
    content: &str,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> anyhow::Result<()> {
    let expires_at = now + ttl;
    let mut frontmatter = std::collections::BTreeMap::new();
    frontmatter.insert("topic".to_string(), topic.to_string());
    frontmatter.insert("keywords".to_string(), keywords.join(","));
    frontmatter.insert("created".to_string(), now.to_rfc3339());
    frontmatter.insert("expires".to_string(), expires_at.to_rfc3339());

    let rendered = serialize_memory_file(&MemoryFile {
        frontmatter,
        body: content.to_string(),
    });
    atomic_write(&workspace.preparation(topic), rendered.as_bytes()).await
}

/// Load every non-expired preparation, deleting expired files as encountered
/// ("TTL-expired on read"). A file missing `topic`/`keywords`/`expires`
/// frontmatter is skipped rather than treated as malformed — preparations
/// are always machine-written, so a missing key means a hand-edited or
/// unrelated file landed in the directory.
pub async fn list_active(workspace: &WorkspaceRoot, now: DateTime<Utc>) -> anyhow::Result<Vec<Preparation>> {
    let dir = workspace.preparations_dir();
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut active = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let parsed = parse_memory_file(&raw);
        let Some(prep) = parse_preparation(&parsed, &path) else {
            continue;
        };

        if prep.expires_at <= now {
            tokio::fs::remove_file(&path).await.ok();
            continue;
        }
        active.push(prep);
    }

    Ok(active)
}

fn parse_preparation(parsed: &MemoryFile, path: &std::path::Path) -> Option<Preparation> {
    let topic = parsed.frontmatter.get("topic").cloned().unwrap_or_else(|| {
        path.file_stem().unwrap_or_default().to_string_lossy().into_owned()
    });
    let keywords: Vec<String> = parsed
        .frontmatter
        .get("keywords")?
        .split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    let created_at = parsed
        .frontmatter
        .get("created")
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let expires_at = parsed
        .frontmatter
        .get("expires")
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))?;

    Some(Preparation {
        topic,
        keywords,
        content: parsed.body.clone(),
        created_at,
        expires_at,
    })
}

/// A preparation "matches" a message when at least two of its keywords
/// appear in it, case-insensitively. Matches are returned sorted by match
/// count descending.
pub fn match_preparations<'a>(message: &str, preps: &'a [Preparation]) -> Vec<&'a Preparation> {
    let lower = message.to_lowercase();
    let mut scored: Vec<(usize, &Preparation)> = preps
        .iter()
        .map(|prep| {
            let count = prep
                .keywords
                .iter()
                .filter(|kw| lower.contains(&kw.to_lowercase()))
                .count();
            (count, prep)
        })
        .filter(|(count, _)| *count >= MIN_MATCHING_KEYWORDS)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, prep)| prep).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (WorkspaceRoot, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("cogcore-memory-prep-{}", uuid::Uuid::new_v4()));
        (WorkspaceRoot::new(&dir), dir)
    }

    #[tokio::test]
    async fn save_and_list_round_trips() {
        let (ws, dir) = workspace();
        let now = Utc::now();
        save_preparation(
            &ws,
            "rust-async",
            &["tokio".to_string(), "async".to_string()],
            "They're learning tokio.",
            now,
            chrono::Duration::hours(24),
        )
        .await
        .unwrap();

        let active = list_active(&ws, now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].topic, "rust-async");
        assert_eq!(active[0].keywords, vec!["tokio", "async"]);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn expired_preparations_are_deleted_on_read() {
        let (ws, dir) = workspace();
        let earlier = Utc::now() - chrono::Duration::hours(2);
        save_preparation(&ws, "stale", &["x".to_string(), "y".to_string()], "old", earlier, chrono::Duration::hours(1))
            .await
            .unwrap();

        let active = list_active(&ws, Utc::now()).await.unwrap();
        assert!(active.is_empty());
        assert!(!ws.preparation("stale").exists());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[test]
    fn match_requires_at_least_two_keywords() {
        let prep = Preparation {
            topic: "t".to_string(),
            keywords: vec!["rust".to_string(), "tokio".to_string()],
            content: "c".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        assert!(match_preparations("I'm writing Rust with Tokio today", &[prep.clone()]).len() == 1);
        assert!(match_preparations("I'm writing Rust today", &[prep]).is_empty());
    }

    #[test]
    fn matches_sort_by_count_descending() {
        let weak = Preparation {
            topic: "weak".to_string(),
            keywords: vec!["rust".to_string(), "tokio".to_string()],
            content: String::new(),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        let strong = Preparation {
            topic: "strong".to_string(),
            keywords: vec!["rust".to_string(), "tokio".to_string(), "async".to_string()],
            content: String::new(),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        let preparations = [weak, strong];
        let matches = match_preparations("rust tokio async", &preparations);
        assert_eq!(matches[0].topic, "strong");
    }
}
