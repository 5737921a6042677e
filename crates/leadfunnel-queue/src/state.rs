//! Durable key/value storage for envelopes that ran out of attempts.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use uuid::Uuid;

use crate::error::StateError;

const FILE_EXTENSION: &str = ".json";

/// String key/value storage that outlives a single retry loop.
#[async_trait]
pub trait PersistedState: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StateError>;

    /// Removes and returns the value under `key`.
    ///
    /// When several callers race on the same key, at most one gets `Some`.
    async fn remove(&self, key: &str) -> Result<Option<String>, StateError>;

    async fn keys(&self) -> Result<Vec<String>, StateError>;
}

/// Process-local state. Useful for tests and single-process deployments
/// that accept losing pending envelopes on restart.
#[derive(Debug, Default)]
pub struct MemoryState {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PersistedState for MemoryState {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StateError> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.entries().remove(key))
    }

    async fn keys(&self) -> Result<Vec<String>, StateError> {
        Ok(self.entries().keys().cloned().collect())
    }
}

/// One JSON file per key inside a directory.
///
/// File names are the percent-encoded key plus `.json`. Writes go through a
/// temporary file and a rename; removal renames the file to a unique claim
/// name first, so concurrent processes sharing the directory never both
/// take the same entry.
#[derive(Debug, Clone)]
pub struct FileState {
    dir: PathBuf,
}

impl FileState {
    /// Opens `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StateError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| io_error(&dir, source))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for(key))
    }

    fn scratch_path(&self, key: &str, suffix: &str) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.{suffix}", file_name_for(key), Uuid::new_v4()))
    }
}

#[async_trait]
impl PersistedState for FileState {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StateError> {
        let path = self.path_for(key);
        let tmp = self.scratch_path(key, "tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))
    }

    async fn remove(&self, key: &str) -> Result<Option<String>, StateError> {
        let path = self.path_for(key);
        let claim = self.scratch_path(key, "claim");
        match tokio::fs::rename(&path, &claim).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        }

        let contents = tokio::fs::read_to_string(&claim)
            .await
            .map_err(|e| io_error(&claim, e))?;
        if let Err(e) = tokio::fs::remove_file(&claim).await {
            tracing::warn!(path = %claim.display(), error = %e, "failed to delete claimed state file");
        }
        Ok(Some(contents))
    }

    async fn keys(&self) -> Result<Vec<String>, StateError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Some(stem) = name.strip_suffix(FILE_EXTENSION) else {
                continue;
            };
            let key = percent_decode_str(stem)
                .decode_utf8()
                .map_err(|_| StateError::InvalidKey(name.to_string()))?;
            keys.push(key.into_owned());
        }
        keys.sort();
        Ok(keys)
    }
}

fn file_name_for(key: &str) -> String {
    format!("{}{FILE_EXTENSION}", utf8_percent_encode(key, NON_ALPHANUMERIC))
}

fn io_error(path: &Path, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_state_remove_returns_value_once() {
        let state = MemoryState::new();
        state.set("pendingSubmission:a", "{}".to_string()).await.unwrap();

        assert_eq!(state.keys().await.unwrap(), vec!["pendingSubmission:a"]);
        assert_eq!(
            state.remove("pendingSubmission:a").await.unwrap().as_deref(),
            Some("{}")
        );
        assert!(state.remove("pendingSubmission:a").await.unwrap().is_none());
        assert!(state.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_state_round_trips_keys_with_separators() {
        let dir = tempfile::tempdir().unwrap();
        let state = FileState::open(dir.path().join("pending")).await.unwrap();

        state
            .set("pendingSubmission:lead/1", r#"{"n":1}"#.to_string())
            .await
            .unwrap();
        state
            .set("pendingSubmission:lead/1", r#"{"n":2}"#.to_string())
            .await
            .unwrap();
        state.set("other", "x".to_string()).await.unwrap();

        assert_eq!(
            state.keys().await.unwrap(),
            vec!["other".to_string(), "pendingSubmission:lead/1".to_string()]
        );
        assert_eq!(
            state.get("pendingSubmission:lead/1").await.unwrap().as_deref(),
            Some(r#"{"n":2}"#)
        );
    }

    #[tokio::test]
    async fn file_state_remove_claims_once() {
        let dir = tempfile::tempdir().unwrap();
        let state = FileState::open(dir.path()).await.unwrap();
        state.set("k", "v".to_string()).await.unwrap();

        let other = FileState::open(dir.path()).await.unwrap();
        let (a, b) = tokio::join!(state.remove("k"), other.remove("k"));
        let claimed: Vec<String> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();

        assert_eq!(claimed, vec!["v".to_string()]);
        assert!(state.get("k").await.unwrap().is_none());
        assert!(state.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_state_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let state = FileState::open(dir.path()).await.unwrap();
        assert!(state.get("nope").await.unwrap().is_none());
        assert!(state.remove("nope").await.unwrap().is_none());
    }
}
