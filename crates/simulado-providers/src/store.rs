//! Session store implementations: in-memory for tests and the offline
//! mode, one JSON file per session for real runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use simulado_core::error::StoreError;
use simulado_core::session::SessionSnapshot;
use simulado_core::traits::SessionStore;

/// In-memory store. Contents vanish with the process. Failure injection
/// covers the engine's save-error paths.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<Uuid, SessionSnapshot>>,
    /// Upcoming saves that will fail before saves succeed again.
    fail_saves: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` saves fail with an I/O error.
    pub fn fail_next_saves(&self, n: u32) {
        self.fail_saves.store(n, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let remaining = self.fail_saves.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_saves.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mock storage outage",
            )));
        }
        self.sessions
            .lock()
            .unwrap()
            .insert(snapshot.session_id, snapshot.clone());
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<SessionSnapshot>, StoreError> {
        Ok(self.sessions.lock().unwrap().get(&session_id).cloned())
    }

    async fn delete(&self, session_id: Uuid) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().remove(&session_id);
        Ok(())
    }
}

/// One pretty-printed JSON file per session under a base directory.
/// Writes go whole-file, last write wins.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn session_path(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(self.session_path(snapshot.session_id), json)?;
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<SessionSnapshot>, StoreError> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn delete(&self, session_id: Uuid) -> Result<(), StoreError> {
        let path = self.session_path(session_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulado_core::model::ExamConfig;
    use simulado_core::planner::plan_batches;
    use simulado_core::session::SessionState;

    fn snapshot() -> SessionSnapshot {
        let config = ExamConfig::full_day_b(9, 3600);
        let queue = plan_batches(&config);
        let mut state = SessionState::new(config, queue);
        state.record_answer(0, 2).unwrap();
        SessionSnapshot::new(Uuid::new_v4(), state)
    }

    #[tokio::test]
    async fn memory_store_roundtrip_and_delete() {
        let store = MemoryStore::new();
        let snap = snapshot();
        let id = snap.session_id;

        store.save(&snap).await.unwrap();
        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.state.answers, snap.state.answers);

        store.delete(id).await.unwrap();
        assert!(store.load(id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn memory_store_injected_save_failures_run_out() {
        let store = MemoryStore::new();
        store.fail_next_saves(1);
        let snap = snapshot();

        assert!(store.save(&snap).await.is_err());
        assert!(store.is_empty());
        store.save(&snap).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let snap = snapshot();
        let id = snap.session_id;

        store.save(&snap).await.unwrap();
        assert!(dir.path().join(format!("{id}.json")).exists());

        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.session_id, id);
        assert_eq!(loaded.state.queue, snap.state.queue);
    }

    #[tokio::test]
    async fn file_store_overwrites_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let mut snap = snapshot();
        let id = snap.session_id;

        store.save(&snap).await.unwrap();
        snap.state.seconds_remaining = 42;
        store.save(&snap).await.unwrap();

        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.state.seconds_remaining, 42);
    }

    #[tokio::test]
    async fn missing_session_loads_none_and_delete_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let id = Uuid::new_v4();

        assert!(store.load(id).await.unwrap().is_none());
        store.delete(id).await.unwrap();
    }
}
