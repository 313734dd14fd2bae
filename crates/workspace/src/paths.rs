//! The fixed workspace sub-layout (§3 of the design doc).

use std::path::{Path, PathBuf};

/// Handle to a rooted workspace directory. Every other crate resolves its
/// files relative to this rather than hard-coding path segments, so the
/// layout is defined in exactly one place.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn identity_self(&self) -> PathBuf {
        self.root.join("identity").join("self.md")
    }

    /// Not in the original layout table; added as a sibling of
    /// `identity/self.md` since the context assembler (§4.8) needs a
    /// standing place to load "user-profile" from and the data model is
    /// silent on where that file lives.
    pub fn user_profile(&self) -> PathBuf {
        self.root.join("identity").join("profile.md")
    }

    pub fn active_context(&self) -> PathBuf {
        self.root.join("working-memory").join("active-context.md")
    }

    pub fn attention_queue(&self) -> PathBuf {
        self.root.join("working-memory").join("attention-queue.md")
    }

    pub fn pending_actions(&self) -> PathBuf {
        self.root.join("working-memory").join("pending-actions.md")
    }

    pub fn trust_metrics(&self) -> PathBuf {
        self.root.join("working-memory").join("trust-metrics.json")
    }

    pub fn facts_dir(&self) -> PathBuf {
        self.root.join("memory").join("facts")
    }

    pub fn topics_dir(&self) -> PathBuf {
        self.root.join("memory").join("topics")
    }

    pub fn session_summary(&self, chat_id: &str) -> PathBuf {
        self.root
            .join("memory")
            .join("sessions")
            .join(format!("{chat_id}-summary.md"))
    }

    pub fn proactive_state(&self) -> PathBuf {
        self.root.join("memory").join("proactive-state.json")
    }

    pub fn engagement_state(&self) -> PathBuf {
        self.root.join("memory").join("engagement-state.json")
    }

    pub fn threads_state(&self) -> PathBuf {
        self.root.join("memory").join("threads.json")
    }

    pub fn preparations_dir(&self) -> PathBuf {
        self.root.join("preparations")
    }

    pub fn preparation(&self, slug: &str) -> PathBuf {
        self.preparations_dir().join(format!("{slug}.md"))
    }

    pub fn journal(&self) -> PathBuf {
        self.root.join("journal.md")
    }

    pub fn concerns(&self) -> PathBuf {
        self.root.join("concerns.md")
    }

    /// Resolve a directive-supplied relative path against this root,
    /// rejecting anything that would escape it. Returns `None` for any path
    /// containing a `..` component after normalization, or one that is
    /// absolute — the validation rule in §4.3.
    pub fn resolve_relative(&self, candidate: &str) -> Option<PathBuf> {
        let candidate_path = Path::new(candidate);
        if candidate_path.is_absolute() {
            return None;
        }
        for component in candidate_path.components() {
            match component {
                std::path::Component::ParentDir => return None,
                std::path::Component::Normal(_) | std::path::Component::CurDir => {}
                _ => return None,
            }
        }
        Some(self.root.join(candidate_path))
    }

    /// Create the fixed sub-layout under a fresh workspace root: empty
    /// placeholder markdown files and default-initialized JSON state. Used
    /// by `cogcore init` (§6.1) and by tests that need a ready-made
    /// workspace.
    pub async fn seed(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        for dir in [
            self.root.join("identity"),
            self.root.join("working-memory"),
            self.facts_dir(),
            self.topics_dir(),
            self.root.join("memory").join("sessions"),
            self.preparations_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }

        if !self.identity_self().exists() {
            crate::atomic_write(
                &self.identity_self(),
                b"# Identity\n\n(describe the character here)\n",
            )
            .await?;
        }
        for path in [
            self.active_context(),
            self.attention_queue(),
            self.pending_actions(),
            self.journal(),
            self.user_profile(),
        ] {
            if !path.exists() {
                crate::atomic_write(&path, b"").await?;
            }
        }
        if !self.concerns().exists() {
            crate::atomic_write(&self.concerns(), b"## Active\n\n## Resolved\n").await?;
        }
        Ok(())
    }
}
