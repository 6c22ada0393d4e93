//! Draft persistence.
//!
//! The wizard keeps its step position and answers in a small key-value store
//! so an interrupted session can pick up where it left off. Every stored value
//! is wrapped in an [`Envelope`] carrying an absolute expiry.
//!
//! [`DraftStore`] is the only place where persistence errors are swallowed:
//! a store that is unavailable, full or holding corrupt data degrades to "no
//! saved progress" and never reaches the caller.

use crate::answers::AnswerSet;
use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

/// String key-value storage backing the draft.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: KvStore + ?Sized> KvStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// One JSON file per key under `.estimator/drafts/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: paths::drafts_dir(root),
        }
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        paths::validate_slug(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        crate::io::atomic_write(&self.path(key)?, value.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<()> {
        crate::io::remove_if_exists(&self.path(key)?)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store for sessions that should not outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Stored form of every draft value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub value: T,
    /// Epoch milliseconds after which the value is stale.
    pub expiry: i64,
}

impl<T> Envelope<T> {
    pub fn new(value: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            expiry: (now + ttl).timestamp_millis(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() > self.expiry
    }
}

// ---------------------------------------------------------------------------
// DraftStore
// ---------------------------------------------------------------------------

pub struct DraftStore<S> {
    store: S,
    ttl: Duration,
}

impl<S: KvStore> DraftStore<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn save_step(&self, step: usize, now: DateTime<Utc>) {
        self.save(paths::STEP_KEY, &step, now);
    }

    pub fn save_answers(&self, answers: &AnswerSet, now: DateTime<Utc>) {
        self.save(paths::DATA_KEY, answers, now);
    }

    pub fn load_step(&self, now: DateTime<Utc>) -> Option<usize> {
        self.load(paths::STEP_KEY, now)
    }

    pub fn load_answers(&self, now: DateTime<Utc>) -> Option<AnswerSet> {
        self.load(paths::DATA_KEY, now)
    }

    /// Drop both draft keys.
    pub fn clear(&self) {
        for key in [paths::STEP_KEY, paths::DATA_KEY] {
            self.discard(key);
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T, now: DateTime<Utc>) {
        let envelope = Envelope::new(value, now, self.ttl);
        let result = serde_json::to_string(&envelope)
            .map_err(Into::into)
            .and_then(|data| self.store.set(key, &data));
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "could not save draft; continuing without it");
        }
    }

    fn load<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "could not read draft; starting fresh");
                return None;
            }
        };
        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable draft");
                self.discard(key);
                return None;
            }
        };
        if envelope.is_expired(now) {
            tracing::debug!(key, expiry = envelope.expiry, "draft expired");
            self.discard(key);
            return None;
        }
        Some(envelope.value)
    }

    fn discard(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::debug!(key, error = %e, "could not remove draft");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::answers::{Feature, ProjectType};
    use crate::error::EstimatorError;
    use tempfile::TempDir;

    /// A store whose every operation fails, like a browser with storage
    /// disabled.
    pub(crate) struct BrokenStore;

    impl KvStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(EstimatorError::Io(std::io::Error::other("storage disabled")))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(EstimatorError::Io(std::io::Error::other("quota exceeded")))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(EstimatorError::Io(std::io::Error::other("storage disabled")))
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn envelope_wire_shape() {
        let env = Envelope::new(3usize, now(), Duration::hours(2));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["value"], 3);
        assert_eq!(
            json["expiry"],
            (now() + Duration::hours(2)).timestamp_millis()
        );
    }

    #[test]
    fn draft_roundtrip_within_ttl() {
        let mem = MemoryStore::new();
        let drafts = DraftStore::new(&mem, Duration::hours(2));
        let mut answers = AnswerSet::default();
        answers.project_type = Some(ProjectType::CrmPortal);
        answers.features.insert(Feature::Payments);

        drafts.save_step(3, now());
        drafts.save_answers(&answers, now());

        let later = now() + Duration::minutes(119);
        assert_eq!(drafts.load_step(later), Some(3));
        assert_eq!(drafts.load_answers(later), Some(answers));
    }

    #[test]
    fn expired_draft_is_discarded() {
        let mem = MemoryStore::new();
        let drafts = DraftStore::new(&mem, Duration::hours(2));
        drafts.save_step(5, now());
        drafts.save_answers(&AnswerSet::default(), now());

        let later = now() + Duration::hours(2) + Duration::milliseconds(1);
        assert_eq!(drafts.load_step(later), None);
        assert_eq!(drafts.load_answers(later), None);
        assert!(mem.is_empty(), "expired keys should be removed");
    }

    #[test]
    fn corrupt_draft_reads_as_missing() {
        let mem = MemoryStore::new();
        mem.set(paths::STEP_KEY, "{not json").unwrap();
        let drafts = DraftStore::new(&mem, Duration::hours(2));
        assert_eq!(drafts.load_step(now()), None);
        assert!(mem.get(paths::STEP_KEY).unwrap().is_none());
    }

    #[test]
    fn broken_store_is_swallowed() {
        let drafts = DraftStore::new(BrokenStore, Duration::hours(2));
        drafts.save_step(2, now());
        drafts.save_answers(&AnswerSet::default(), now());
        assert_eq!(drafts.load_step(now()), None);
        assert_eq!(drafts.load_answers(now()), None);
        drafts.clear();
    }

    #[test]
    fn clear_removes_both_keys() {
        let mem = MemoryStore::new();
        let drafts = DraftStore::new(&mem, Duration::hours(2));
        drafts.save_step(1, now());
        drafts.save_answers(&AnswerSet::default(), now());
        assert_eq!(mem.len(), 2);
        drafts.clear();
        assert!(mem.is_empty());
    }

    #[test]
    fn file_store_persists_per_key() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.get("estimate_step").unwrap(), None);
        store.set("estimate_step", "{\"value\":1,\"expiry\":0}").unwrap();
        assert!(dir.path().join(".estimator/drafts/estimate_step.json").exists());
        assert_eq!(
            store.get("estimate_step").unwrap().as_deref(),
            Some("{\"value\":1,\"expiry\":0}")
        );
        store.remove("estimate_step").unwrap();
        store.remove("estimate_step").unwrap();
        assert_eq!(store.get("estimate_step").unwrap(), None);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.set("../escape", "x"),
            Err(EstimatorError::InvalidSlug(_))
        ));
    }
}
