//! Document persistence
//!
//! Everything the engine persists is a JSON document behind a string key.
//! `DocumentStore` is the backend seam: `MemoryStore` for tests and embedded
//! use, `JsonFileStore` for one-file-per-document on disk. Writes are
//! last-write-wins upserts; the read-or-build decision lives in the rotation
//! engine, not here.
//!
//! Key scheme:
//!   session:{session_id}
//!   sessions:{user_id}            (ordered session-id index per user)
//!   history:{user_id}             (per-session shown-id records, newest last)
//!   premium:{user_id}
//!   rotation:{session_id}:{surface}:v1
//!   mood:{session_id}
//!   synergy:{session_id}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::types::{EngineError, History, SessionSnapshot};
use crate::COOLDOWN_SESSIONS;

// =============================================================================
// [K] KEY SCHEME
// =============================================================================

pub mod keys {
    use crate::types::Surface;

    pub fn session(session_id: &str) -> String {
        format!("session:{}", session_id)
    }

    pub fn sessions_index(user_id: &str) -> String {
        format!("sessions:{}", user_id)
    }

    pub fn history(user_id: &str) -> String {
        format!("history:{}", user_id)
    }

    pub fn premium(user_id: &str) -> String {
        format!("premium:{}", user_id)
    }

    pub fn rotation(session_id: &str, surface: &Surface) -> String {
        format!("rotation:{}:{}:v1", session_id, surface.as_str())
    }

    pub fn mood(session_id: &str) -> String {
        format!("mood:{}", session_id)
    }

    pub fn synergy(session_id: &str) -> String {
        format!("synergy:{}", session_id)
    }
}

// =============================================================================
// [S] DOCUMENT STORE
// =============================================================================

/// Backend seam: raw JSON documents behind string keys
pub trait DocumentStore: Send + Sync {
    /// None when the key has never been written
    fn get(&self, key: &str) -> Result<Option<Value>, EngineError>;

    /// Unconditional overwrite (last write wins)
    fn upsert(&self, key: &str, value: Value) -> Result<(), EngineError>;
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, EngineError> {
        let docs = self.docs.read().map_err(|_| EngineError::Storage {
            detail: "memory store lock poisoned".to_string(),
        })?;
        Ok(docs.get(key).cloned())
    }

    fn upsert(&self, key: &str, value: Value) -> Result<(), EngineError> {
        let mut docs = self.docs.write().map_err(|_| EngineError::Storage {
            detail: "memory store lock poisoned".to_string(),
        })?;
        docs.insert(key.to_string(), value);
        Ok(())
    }
}

/// One JSON file per document under a base directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Keys contain ':'; map them to filesystem-safe names. The sanitized
    /// prefix keeps the file readable, the digest tag keeps distinct keys
    /// distinct (sanitization alone would collide "a:b" with "a_b").
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let digest = Sha256::digest(key.as_bytes());
        let tag: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("{}_{}.json", name, tag))
    }
}

impl DocumentStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, EngineError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).map_err(|e| EngineError::Storage {
            detail: format!("read {}: {}", path.display(), e),
        })?;
        let value = serde_json::from_str(&json).map_err(|e| EngineError::Serialization {
            detail: e.to_string(),
        })?;
        Ok(Some(value))
    }

    fn upsert(&self, key: &str, value: Value) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(&value).map_err(|e| EngineError::Serialization {
            detail: e.to_string(),
        })?;
        std::fs::create_dir_all(&self.dir).map_err(|e| EngineError::Storage {
            detail: format!("create {}: {}", self.dir.display(), e),
        })?;
        let path = self.path_for(key);
        std::fs::write(&path, json).map_err(|e| EngineError::Storage {
            detail: format!("write {}: {}", path.display(), e),
        })?;
        Ok(())
    }
}

// =============================================================================
// [E] TYPED ENGINE STORE
// =============================================================================

/// One session's shown-insight ids, as recorded for cooldown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistoryEntry {
    pub session_id: String,
    pub shown: History,
}

/// Typed access over a raw document store
#[derive(Debug)]
pub struct EngineStore<S: DocumentStore> {
    inner: S,
}

impl<S: DocumentStore> EngineStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_doc<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, EngineError> {
        match self.inner.get(key)? {
            None => Ok(None),
            Some(value) => {
                let doc = serde_json::from_value(value).map_err(|e| EngineError::Serialization {
                    detail: e.to_string(),
                })?;
                Ok(Some(doc))
            }
        }
    }

    pub fn put_doc<T: Serialize>(&self, key: &str, doc: &T) -> Result<(), EngineError> {
        let value = serde_json::to_value(doc).map_err(|e| EngineError::Serialization {
            detail: e.to_string(),
        })?;
        self.inner.upsert(key, value)
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Missing key maps to SessionNotFound, not to an empty document
    pub fn load_session(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        self.get_doc(&keys::session(session_id))?
            .ok_or_else(|| EngineError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Persist the session and append it to the owner's index (once)
    pub fn save_session(&self, session: &SessionSnapshot) -> Result<(), EngineError> {
        self.put_doc(&keys::session(&session.session_id), session)?;
        let key = keys::sessions_index(&session.user_id);
        let mut index: Vec<String> = self.get_doc(&key)?.unwrap_or_default();
        if !index.contains(&session.session_id) {
            index.push(session.session_id.clone());
            self.put_doc(&key, &index)?;
        }
        Ok(())
    }

    /// Session ids for a user, oldest first
    pub fn user_sessions(&self, user_id: &str) -> Result<Vec<String>, EngineError> {
        Ok(self.get_doc(&keys::sessions_index(user_id))?.unwrap_or_default())
    }

    // -------------------------------------------------------------------------
    // Cooldown history
    // -------------------------------------------------------------------------

    /// Union of ids shown in the most recent sessions, excluding
    /// `current_session` itself so a rebuild never excludes its own picks
    pub fn recent_history(
        &self,
        user_id: &str,
        current_session: &str,
    ) -> Result<History, EngineError> {
        let entries: Vec<SessionHistoryEntry> =
            self.get_doc(&keys::history(user_id))?.unwrap_or_default();
        let mut merged = History::default();
        for entry in entries
            .iter()
            .filter(|e| e.session_id != current_session)
            .rev()
            .take(COOLDOWN_SESSIONS)
        {
            merged.insight_ids.extend(entry.shown.insight_ids.iter().cloned());
            merged.mood_ids.extend(entry.shown.mood_ids.iter().cloned());
            merged.paragraph_ids.extend(entry.shown.paragraph_ids.iter().cloned());
            merged.synergy_ids.extend(entry.shown.synergy_ids.iter().cloned());
        }
        Ok(merged)
    }

    /// Record what a session showed. Re-recording the same session merges
    /// into its existing entry instead of appending a duplicate.
    pub fn record_history(
        &self,
        user_id: &str,
        session_id: &str,
        shown: &History,
    ) -> Result<(), EngineError> {
        let key = keys::history(user_id);
        let mut entries: Vec<SessionHistoryEntry> = self.get_doc(&key)?.unwrap_or_default();
        if let Some(entry) = entries.iter_mut().find(|e| e.session_id == session_id) {
            entry.shown.insight_ids.extend(shown.insight_ids.iter().cloned());
            entry.shown.mood_ids.extend(shown.mood_ids.iter().cloned());
            entry.shown.paragraph_ids.extend(shown.paragraph_ids.iter().cloned());
            entry.shown.synergy_ids.extend(shown.synergy_ids.iter().cloned());
        } else {
            entries.push(SessionHistoryEntry {
                session_id: session_id.to_string(),
                shown: shown.clone(),
            });
        }
        // Keep a bounded tail; anything older can never affect cooldown
        let keep = COOLDOWN_SESSIONS + 1;
        if entries.len() > keep {
            entries.drain(..entries.len() - keep);
        }
        self.put_doc(&key, &entries)
    }

    // -------------------------------------------------------------------------
    // Premium
    // -------------------------------------------------------------------------

    pub fn is_premium(&self, user_id: &str) -> Result<bool, EngineError> {
        Ok(self.get_doc(&keys::premium(user_id))?.unwrap_or(false))
    }

    pub fn set_premium(&self, user_id: &str, premium: bool) -> Result<(), EngineError> {
        self.put_doc(&keys::premium(user_id), &premium)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").unwrap(), None);
        store.upsert("k", serde_json::json!({"a": 1})).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_memory_store_last_write_wins() {
        let store = MemoryStore::new();
        store.upsert("k", serde_json::json!(1)).unwrap();
        store.upsert("k", serde_json::json!(2)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(serde_json::json!(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!(
            "cadence-store-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let store = JsonFileStore::new(&dir);
        assert_eq!(store.get("rotation:s1:MISSION_END:v1").unwrap(), None);
        store
            .upsert("rotation:s1:MISSION_END:v1", serde_json::json!({"v": 1}))
            .unwrap();
        assert_eq!(
            store.get("rotation:s1:MISSION_END:v1").unwrap(),
            Some(serde_json::json!({"v": 1}))
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_distinct_keys_never_collide() {
        let dir = std::env::temp_dir().join(format!(
            "cadence-store-collide-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let store = JsonFileStore::new(&dir);
        // Both keys sanitize to the same name without the digest tag
        store.upsert("session:a:b", serde_json::json!(1)).unwrap();
        store.upsert("session:a_b", serde_json::json!(2)).unwrap();
        assert_eq!(store.get("session:a:b").unwrap(), Some(serde_json::json!(1)));
        assert_eq!(store.get("session:a_b").unwrap(), Some(serde_json::json!(2)));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_session_index_appends_once() {
        let store = EngineStore::new(MemoryStore::new());
        let session = SessionSnapshot {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            finalized: true,
            ..Default::default()
        };
        store.save_session(&session).unwrap();
        store.save_session(&session).unwrap();
        assert_eq!(store.user_sessions("u1").unwrap(), vec!["s1".to_string()]);
    }

    #[test]
    fn test_load_missing_session_is_not_found() {
        let store = EngineStore::new(MemoryStore::new());
        let err = store.load_session("nope").unwrap_err();
        assert_eq!(err.code(), "E103_SESSION_NOT_FOUND");
    }

    #[test]
    fn test_history_window_and_self_exclusion() {
        let store = EngineStore::new(MemoryStore::new());
        for i in 0..8 {
            let mut shown = History::default();
            shown.insight_ids.insert(format!("tip_{}_v1", i));
            store.record_history("u1", &format!("s{}", i), &shown).unwrap();
        }
        // Current session s7 excluded; window covers the 5 before it
        let merged = store.recent_history("u1", "s7").unwrap();
        assert!(!merged.insight_ids.contains("tip_7_v1"));
        assert!(merged.insight_ids.contains("tip_6_v1"));
        assert!(merged.insight_ids.contains("tip_3_v1"));
        // Entries beyond the retained tail are gone entirely
        assert!(!merged.insight_ids.contains("tip_0_v1"));
        assert!(merged.insight_ids.len() <= COOLDOWN_SESSIONS);
    }

    #[test]
    fn test_history_rerecord_merges() {
        let store = EngineStore::new(MemoryStore::new());
        let mut a = History::default();
        a.insight_ids.insert("tip_a_v1".to_string());
        let mut b = History::default();
        b.mood_ids.insert("mood_arc_recovery_arc_v1".to_string());
        store.record_history("u1", "s1", &a).unwrap();
        store.record_history("u1", "s1", &b).unwrap();
        let merged = store.recent_history("u1", "s2").unwrap();
        assert!(merged.insight_ids.contains("tip_a_v1"));
        assert!(merged.mood_ids.contains("mood_arc_recovery_arc_v1"));
    }

    #[test]
    fn test_premium_default_false() {
        let store = EngineStore::new(MemoryStore::new());
        assert!(!store.is_premium("u1").unwrap());
        store.set_premium("u1", true).unwrap();
        assert!(store.is_premium("u1").unwrap());
    }
}
