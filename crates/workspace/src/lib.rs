//! Atomic file I/O and the lenient memory-file frontmatter format shared by
//! every other crate in the workspace.
//!
//! Nothing in here knows about reflection, trust, or directives — it is the
//! leaf the rest of the tree is built on, the way the teacher's
//! `MemoryEventLog` sits underneath its memory manager.

pub mod frontmatter;
pub mod paths;
pub mod substantive;

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Write `contents` to `path` such that a crash mid-write never leaves a
/// partially-written file at `path`: the bytes land in a sibling `<name>.tmp`
/// first, get `sync_all`'d, and only then are renamed onto the real path.
/// The tmp sibling is removed on any failure path.
pub async fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating parent dir for {}", path.display()))?;
    }

    let tmp_path = tmp_sibling(path);
    let result = write_and_sync(&tmp_path, contents).await;
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
        return result;
    }

    fs::rename(&tmp_path, path).await.with_context(|| {
        format!("renaming {} onto {}", tmp_path.display(), path.display())
    })?;
    Ok(())
}

async fn write_and_sync(tmp_path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = fs::File::create(tmp_path)
        .await
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` as pretty (2-space indent, matching serde_json's
/// default) JSON and atomically write it.
pub async fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing JSON for {}", path.display()))?;
    atomic_write(path, rendered.as_bytes()).await
}

/// Load JSON state from `path`, falling back to `T::default()` (logged at
/// `warn!`) when the file is missing or malformed. Matches the error-handling
/// policy for "malformed persisted JSON": logged and replaced with
/// default-initialized state, never fatal.
pub async fn load_json_or_default<T>(path: &Path) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read state file, using defaults");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "malformed state JSON, using defaults");
            T::default()
        }
    }
}

/// Append `body` to `path`, creating it if necessary. Used for append-only
/// workspace files (`journal.md`, append-style writebacks) where a torn write
/// can only lose the tail of the last record, never corrupt the file.
pub async fn append_file(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("opening {} for append", path.display()))?;
    file.write_all(body.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cogcore-workspace-test-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn atomic_write_round_trips() {
        let path = temp_path("atomic");
        atomic_write(&path, b"hello").await.unwrap();
        let read = fs::read_to_string(&path).await.unwrap();
        assert_eq!(read, "hello");
        assert!(!tmp_sibling(&path).exists());
        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn atomic_write_overwrites_existing() {
        let path = temp_path("overwrite");
        atomic_write(&path, b"first").await.unwrap();
        atomic_write(&path, b"second").await.unwrap();
        let read = fs::read_to_string(&path).await.unwrap();
        assert_eq!(read, "second");
        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn load_json_or_default_falls_back_on_missing_file() {
        #[derive(Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
        struct S {
            n: u32,
        }
        let path = temp_path("missing.json");
        let loaded: S = load_json_or_default(&path).await;
        assert_eq!(loaded, S::default());
    }

    #[tokio::test]
    async fn load_json_or_default_falls_back_on_corrupt_file() {
        #[derive(Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
        struct S {
            n: u32,
        }
        let path = temp_path("corrupt.json");
        fs::write(&path, b"{not json").await.unwrap();
        let loaded: S = load_json_or_default(&path).await;
        assert_eq!(loaded, S::default());
        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn append_file_creates_and_appends() {
        let path = temp_path("journal.md");
        append_file(&path, "first\n").await.unwrap();
        append_file(&path, "second\n").await.unwrap();
        let read = fs::read_to_string(&path).await.unwrap();
        assert_eq!(read, "first\nsecond\n");
        fs::remove_file(&path).await.unwrap();
    }
}
