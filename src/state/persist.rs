//! JSON state files shared by every store.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::error::{BotError, Result};

/// A store persisted as a single JSON document
pub trait StateFile: Serialize + DeserializeOwned + Default + Send + Sync {
    /// File name inside the state directory
    const FILE_NAME: &'static str;

    /// Bump the last-updated timestamp after a mutation
    fn touch(&mut self);
}

pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Path of a store's file inside `state_dir`
pub fn state_path<T: StateFile>(state_dir: &str) -> String {
    Path::new(state_dir)
        .join(T::FILE_NAME)
        .to_string_lossy()
        .into_owned()
}

/// Load from a JSON file, or start empty if it does not exist
pub async fn load_state<T: StateFile>(path: &str) -> Result<T> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content).map_err(|e| BotError::StateParse {
            path: path.to_string(),
            source: e,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(BotError::StateLoad {
            path: path.to_string(),
            source: e,
        }),
    }
}

/// Save to a JSON file atomically
pub async fn save_state<T: StateFile>(state: &T, path: &str) -> Result<()> {
    let content = serde_json::to_string_pretty(state)?;

    // Write to temp file first, then rename for atomicity
    let temp_path = format!("{}.tmp", path);
    tokio::fs::write(&temp_path, &content)
        .await
        .map_err(|e| BotError::StateSave {
            path: path.to_string(),
            source: e,
        })?;

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| BotError::StateSave {
            path: path.to_string(),
            source: e,
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Counter {
        version: u32,
        last_updated: i64,
        counts: HashMap<String, u32>,
    }

    impl StateFile for Counter {
        const FILE_NAME: &'static str = "counter.json";

        fn touch(&mut self) {
            self.last_updated = now_timestamp();
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_default() {
        let state: Counter = load_state("/nonexistent/steward/counter.json").await.unwrap();
        assert_eq!(state, Counter::default());
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_state_error() {
        let dir = std::env::temp_dir().join(format!("steward-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = state_path::<Counter>(dir.to_str().unwrap());
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = load_state::<Counter>(&path).await.unwrap_err();
        assert!(matches!(err, BotError::StateParse { .. }));
        assert!(err.to_string().contains("state file"));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("steward-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = state_path::<Counter>(dir.to_str().unwrap());

        let mut state = Counter::default();
        state.counts.insert("wars".to_string(), 7);
        state.touch();
        save_state(&state, &path).await.unwrap();

        let loaded: Counter = load_state(&path).await.unwrap();
        assert_eq!(loaded, state);
        assert!(!Path::new(&format!("{}.tmp", path)).exists());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
