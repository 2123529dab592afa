//! The session registry: single source of truth for "does a runner exist".
//!
//! All operations go through one `RwLock`, so they are linearizable with
//! respect to each other; a `lookup` that starts after an `insert` completes
//! observes the inserted record. The container driver is only consulted to
//! reconcile at provision start or reap end, never to answer existence.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::RunnerRecord;

/// Why an insert was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    #[error("a runner already exists for session {0}")]
    SessionExists(String),
    #[error("the singleton runner slot is already occupied")]
    SingletonOccupied,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, RunnerRecord>,
    /// Session id of the shared runner when reuse mode is active.
    singleton: Option<String>,
}

/// Maps session ids to runner records and enforces the two provisioning
/// modes: per-session (one record per distinct session id) and reuse (a
/// single shared record returned to every caller).
pub struct SessionRegistry {
    reuse_mode: bool,
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new(reuse_mode: bool) -> Self {
        Self {
            reuse_mode,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn is_reuse_mode(&self) -> bool {
        self.reuse_mode
    }

    pub async fn lookup(&self, session_id: &str) -> Option<RunnerRecord> {
        self.inner.read().await.records.get(session_id).cloned()
    }

    /// Insert a new record keyed by its session id. Fails if the session
    /// already has a record, or if reuse mode's singleton slot is occupied.
    pub async fn insert(&self, record: RunnerRecord) -> Result<(), InsertError> {
        let mut inner = self.inner.write().await;
        if self.reuse_mode && inner.singleton.is_some() {
            return Err(InsertError::SingletonOccupied);
        }
        if inner.records.contains_key(&record.session_id) {
            return Err(InsertError::SessionExists(record.session_id.clone()));
        }
        if self.reuse_mode {
            inner.singleton = Some(record.session_id.clone());
        }
        inner.records.insert(record.session_id.clone(), record);
        Ok(())
    }

    pub async fn remove(&self, session_id: &str) -> Option<RunnerRecord> {
        let mut inner = self.inner.write().await;
        let record = inner.records.remove(session_id);
        if record.is_some() && inner.singleton.as_deref() == Some(session_id) {
            inner.singleton = None;
        }
        record
    }

    /// Refresh a record's last-activity timestamp. Timestamps never move
    /// backward. Returns `false` when the session is unknown.
    pub async fn touch(&self, session_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.records.get_mut(session_id) {
            Some(record) => {
                let now = Utc::now();
                if now > record.last_activity {
                    record.last_activity = now;
                }
                true
            }
            None => false,
        }
    }

    /// The shared record, when reuse mode is active and provisioned.
    pub async fn singleton(&self) -> Option<RunnerRecord> {
        let inner = self.inner.read().await;
        let key = inner.singleton.as_deref()?;
        inner.records.get(key).cloned()
    }

    /// A point-in-time copy of every record, for the reaper's sweep.
    pub async fn snapshot(&self) -> Vec<RunnerRecord> {
        self.inner.read().await.records.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NetworkMode;

    fn record(session: &str) -> RunnerRecord {
        RunnerRecord::new(session, format!("ctr-{session}"), Some(49000), NetworkMode::Default)
    }

    #[tokio::test]
    async fn insert_then_lookup_roundtrips() {
        let registry = SessionRegistry::new(false);
        registry.insert(record("s1")).await.unwrap();

        let found = registry.lookup("s1").await.expect("record should exist");
        assert_eq!(found.container_id, "ctr-s1");
        assert!(registry.lookup("s2").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_session_insert_conflicts() {
        let registry = SessionRegistry::new(false);
        registry.insert(record("s1")).await.unwrap();

        let err = registry.insert(record("s1")).await.unwrap_err();
        assert_eq!(err, InsertError::SessionExists("s1".to_string()));
    }

    #[tokio::test]
    async fn remove_deletes_exactly_one_record() {
        let registry = SessionRegistry::new(false);
        registry.insert(record("s1")).await.unwrap();
        registry.insert(record("s2")).await.unwrap();

        assert!(registry.remove("s1").await.is_some());
        assert!(registry.remove("s1").await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn touch_is_monotonic() {
        let registry = SessionRegistry::new(false);
        let mut stale = record("s1");
        stale.last_activity = Utc::now() - chrono::Duration::seconds(600);
        let before = stale.last_activity;
        registry.insert(stale).await.unwrap();

        assert!(registry.touch("s1").await);
        let after = registry.lookup("s1").await.unwrap().last_activity;
        assert!(after > before);

        // A second touch never moves the timestamp backward.
        assert!(registry.touch("s1").await);
        let third = registry.lookup("s1").await.unwrap().last_activity;
        assert!(third >= after);

        assert!(!registry.touch("missing").await);
    }

    #[tokio::test]
    async fn reuse_mode_holds_at_most_one_record() {
        let registry = SessionRegistry::new(true);
        registry.insert(record("shared")).await.unwrap();

        let err = registry.insert(record("other")).await.unwrap_err();
        assert_eq!(err, InsertError::SingletonOccupied);
        assert_eq!(registry.len().await, 1);

        let singleton = registry.singleton().await.expect("singleton exists");
        assert_eq!(singleton.session_id, "shared");
    }

    #[tokio::test]
    async fn removing_singleton_frees_the_slot() {
        let registry = SessionRegistry::new(true);
        registry.insert(record("shared")).await.unwrap();
        registry.remove("shared").await.expect("record exists");

        assert!(registry.singleton().await.is_none());
        registry.insert(record("next")).await.unwrap();
        assert_eq!(registry.singleton().await.unwrap().session_id, "next");
    }

    #[tokio::test]
    async fn snapshot_is_a_point_in_time_copy() {
        let registry = SessionRegistry::new(false);
        registry.insert(record("s1")).await.unwrap();
        registry.insert(record("s2")).await.unwrap();

        let snap = registry.snapshot().await;
        assert_eq!(snap.len(), 2);

        registry.remove("s1").await;
        // The snapshot is unaffected by later mutations.
        assert_eq!(snap.len(), 2);
    }
}
