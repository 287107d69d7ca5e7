//! # Hearth Store
//!
//! Chat persistence. Each chat lives in its own directory:
//!
//! ```text
//! chats/
//! └── <name>/
//!     ├── metadata.json     - name, description, timestamps, message count
//!     ├── history.json      - the L2 message stream
//!     ├── scratchpad.json   - the L1 working memory
//!     └── memory/           - the chat's L3 index (owned by hearth-memory)
//! ```
//!
//! Every write is atomic at file granularity (temp-then-rename). There is
//! no cross-file transaction: state is reconstructible from history, and a
//! failed save never discards live state.

use chrono::{DateTime, Utc};
use hearth_core::error::StoreError;
use hearth_core::message::History;
use hearth_core::persist::write_atomic;
use hearth_core::scratchpad::Scratchpad;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per-chat metadata, stored as `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMetadata {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub created_at: DateTime<Utc>,

    pub last_saved: DateTime<Utc>,

    #[serde(default)]
    pub messages_count: usize,
}

/// A fully loaded chat.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub metadata: ChatMetadata,
    pub history: History,
    pub scratchpad: Scratchpad,
}

/// The chat store rooted at a `chats/` directory.
pub struct ChatStore {
    chats_dir: PathBuf,
}

impl ChatStore {
    pub fn new(chats_dir: PathBuf) -> Self {
        Self { chats_dir }
    }

    /// The directory of a chat.
    pub fn chat_path(&self, name: &str) -> PathBuf {
        self.chats_dir.join(name)
    }

    /// Whether a chat exists on disk.
    pub fn exists(&self, name: &str) -> bool {
        self.chat_path(name).join("metadata.json").is_file()
    }

    /// Save a chat. Preserves `created_at` from an existing metadata file;
    /// a failed write aborts the save without touching live state.
    pub fn save(
        &self,
        name: &str,
        history: &History,
        scratchpad: &Scratchpad,
        description: Option<&str>,
    ) -> Result<(), StoreError> {
        let dir = self.chat_path(name);
        let now = Utc::now();

        let existing = self.read_metadata(name).ok();
        let metadata = ChatMetadata {
            name: name.to_string(),
            description: description
                .map(str::to_string)
                .or(existing.as_ref().map(|m| m.description.clone()))
                .unwrap_or_default(),
            created_at: existing.map(|m| m.created_at).unwrap_or(now),
            last_saved: now,
            messages_count: history.len(),
        };

        self.write_json(&dir.join("metadata.json"), &metadata)?;
        self.write_json(&dir.join("history.json"), history)?;
        self.write_json(&dir.join("scratchpad.json"), scratchpad)?;

        info!(chat = name, messages = history.len(), "chat saved");
        Ok(())
    }

    /// Load a chat from disk.
    pub fn load(&self, name: &str) -> Result<ChatSnapshot, StoreError> {
        if !self.exists(name) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let dir = self.chat_path(name);

        let metadata: ChatMetadata = self.read_json(&dir.join("metadata.json"))?;
        let history: History = self.read_json(&dir.join("history.json"))?;
        let scratchpad: Scratchpad = self.read_json(&dir.join("scratchpad.json"))?;

        debug!(chat = name, messages = history.len(), "chat loaded");
        Ok(ChatSnapshot {
            metadata,
            history,
            scratchpad,
        })
    }

    /// List saved chats, most recently saved first. Unreadable entries are
    /// skipped with a warning.
    pub fn list(&self) -> Vec<ChatMetadata> {
        let Ok(entries) = std::fs::read_dir(&self.chats_dir) else {
            return Vec::new();
        };

        let mut chats: Vec<ChatMetadata> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                match self.read_metadata(&name) {
                    Ok(m) => Some(m),
                    Err(err) => {
                        warn!(chat = %name, error = %err, "skipping unreadable chat");
                        None
                    }
                }
            })
            .collect();

        chats.sort_by(|a, b| b.last_saved.cmp(&a.last_saved));
        chats
    }

    /// Delete a chat directory, including its memory index. Idempotent:
    /// deleting a missing chat is a no-op. The caller is responsible for
    /// refusing to delete the active chat.
    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        let dir = self.chat_path(name);
        if !dir.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(&dir).map_err(|e| StoreError::Io {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        info!(chat = name, "chat deleted");
        Ok(())
    }

    fn read_metadata(&self, name: &str) -> Result<ChatMetadata, StoreError> {
        self.read_json(&self.chat_path(name).join("metadata.json"))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        write_atomic(path, &json).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> Result<T, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::message::Message;

    fn sample_history() -> History {
        let mut h = History::new();
        h.push(Message::user("create file hello.py"));
        h.push(Message::assistant("<THOUGHT>...<TOOL>create_file"));
        h.push(Message::tool("Observation: file created"));
        h
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::new(dir.path().to_path_buf());

        let history = sample_history();
        let mut pad = Scratchpad::new();
        pad.begin_task("create file hello.py");

        store.save("demo", &history, &pad, Some("a demo chat")).unwrap();
        let snapshot = store.load("demo").unwrap();

        assert_eq!(snapshot.metadata.name, "demo");
        assert_eq!(snapshot.metadata.description, "a demo chat");
        assert_eq!(snapshot.metadata.messages_count, 3);
        assert_eq!(snapshot.history.len(), 3);
        assert_eq!(snapshot.scratchpad.goal, "create file hello.py");
    }

    #[test]
    fn roundtrip_is_byte_equivalent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::new(dir.path().to_path_buf());

        let history = sample_history();
        let pad = Scratchpad::new();
        store.save("demo", &history, &pad, None).unwrap();

        let first_history = std::fs::read(store.chat_path("demo").join("history.json")).unwrap();
        let first_pad = std::fs::read(store.chat_path("demo").join("scratchpad.json")).unwrap();

        // Load and re-save; content files must not change
        let snapshot = store.load("demo").unwrap();
        store
            .save("demo", &snapshot.history, &snapshot.scratchpad, None)
            .unwrap();

        let second_history = std::fs::read(store.chat_path("demo").join("history.json")).unwrap();
        let second_pad = std::fs::read(store.chat_path("demo").join("scratchpad.json")).unwrap();
        assert_eq!(first_history, second_history);
        assert_eq!(first_pad, second_pad);
    }

    #[test]
    fn created_at_preserved_across_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::new(dir.path().to_path_buf());
        let history = History::new();
        let pad = Scratchpad::new();

        store.save("keep", &history, &pad, None).unwrap();
        let created = store.load("keep").unwrap().metadata.created_at;

        store.save("keep", &history, &pad, Some("updated")).unwrap();
        let meta = store.load("keep").unwrap().metadata;
        assert_eq!(meta.created_at, created);
        assert_eq!(meta.description, "updated");
        assert!(meta.last_saved >= created);
    }

    #[test]
    fn load_missing_chat_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.load("ghost"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_sorted_by_last_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::new(dir.path().to_path_buf());
        let history = History::new();
        let pad = Scratchpad::new();

        store.save("older", &history, &pad, None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        store.save("newer", &history, &pad, None).unwrap();

        let chats = store.list();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].name, "newer");
        assert_eq!(chats[1].name, "older");
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::new(dir.path().to_path_buf());
        let history = History::new();
        let pad = Scratchpad::new();

        store.save("gone", &history, &pad, None).unwrap();
        store.delete("gone").unwrap();
        assert!(!store.exists("gone"));
        // Second delete is a no-op
        store.delete("gone").unwrap();
    }
}
