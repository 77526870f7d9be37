//! Flat-file chat history kept for older front ends.
//!
//! [`LegacyHistory`] is the single global conversation behind `/api/history`.
//! [`HistoriesFile`] is the older multi-chat document; it is only ever read,
//! and only by the `import-histories` command.

use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rustix::fs::{flock, FlockOperation};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::{fs, task};

use crate::models::NewChat;

/// Single JSON document holding one conversation.
///
/// Writes go to a sibling temp file and are renamed into place; the lock
/// keeps one writer at a time and stops readers racing a delete.
#[derive(Debug, Clone)]
pub struct LegacyHistory {
    path: PathBuf,
    lock: Arc<RwLock<()>>,
}

impl LegacyHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(RwLock::new(())),
        }
    }

    /// The stored document, or an empty array when absent or unreadable.
    pub async fn get(&self) -> Value {
        let _guard = self.lock.read().await;
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed history file {}: {}", self.path.display(), e);
                Value::Array(Vec::new())
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Value::Array(Vec::new()),
            Err(e) => {
                tracing::warn!("Failed to read history file {}: {}", self.path.display(), e);
                Value::Array(Vec::new())
            }
        }
    }

    pub async fn replace(&self, document: &Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let tmp = temp_path(&self.path);

        let _guard = self.lock.write().await;
        fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.write().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read-only view of the multi-chat JSON array document.
///
/// Reads take an advisory shared `flock`, so they wait out any external
/// writer holding an exclusive lock. Nothing in this service writes the file.
#[derive(Debug, Clone)]
pub struct HistoriesFile {
    path: PathBuf,
}

impl HistoriesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All chats in the document; absent or malformed files read as empty.
    pub async fn load(&self) -> Vec<NewChat> {
        let path = self.path.clone();
        let result = task::spawn_blocking(move || read_shared(&path)).await;

        match result {
            Ok(Ok(chats)) => chats,
            Ok(Err(e)) => {
                tracing::warn!("Error loading histories from {}: {:#}", self.path.display(), e);
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Histories reader task failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn read_shared(path: &Path) -> Result<Vec<NewChat>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
    };

    flock(&file, FlockOperation::LockShared).context("Failed to take shared lock")?;
    let parsed = serde_json::from_reader(BufReader::new(&file));
    flock(&file, FlockOperation::Unlock).context("Failed to release shared lock")?;

    Ok(parsed?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = LegacyHistory::new(dir.path().join("chat_history.json"));
        assert_eq!(history.get().await, json!([]));
    }

    #[tokio::test]
    async fn test_replace_get_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        let history = LegacyHistory::new(&path);

        let doc = json!([
            {"role": "user", "content": "héllo \"there\""},
            {"role": "assistant", "content": "hi\nback"},
        ]);
        history.replace(&doc).await.unwrap();
        assert_eq!(history.get().await, doc);
        assert!(!temp_path(&path).exists());

        history.replace(&json!([])).await.unwrap();
        assert_eq!(history.get().await, json!([]));

        history.clear().await.unwrap();
        assert!(!path.exists());
        // Clearing twice is fine.
        history.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        std::fs::write(&path, "{not json").unwrap();

        let history = LegacyHistory::new(&path);
        assert_eq!(history.get().await, json!([]));
    }

    #[tokio::test]
    async fn test_histories_file_loads_chats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_histories.json");
        std::fs::write(
            &path,
            r#"[{"id": "c1", "timestamp": "2024-06-01T12:00:00", "title": "Old",
                 "messages": [{"role": "user", "content": "hey"}]},
                {"id": "c2"}]"#,
        )
        .unwrap();

        let chats = HistoriesFile::new(&path).load().await;
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].id, "c1");
        assert_eq!(chats[0].messages[0].content, "hey");
        assert!(chats[0].messages[0].timestamp.is_none());
        assert!(chats[1].messages.is_empty());
    }

    #[tokio::test]
    async fn test_histories_file_missing_or_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_histories.json");
        assert!(HistoriesFile::new(&path).load().await.is_empty());

        std::fs::write(&path, r#"{"id": "not-an-array"}"#).unwrap();
        assert!(HistoriesFile::new(&path).load().await.is_empty());
    }
}
