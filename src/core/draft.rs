//! Draft recovery for manuals that have not been saved remotely yet
//!
//! A single slot holds the latest snapshot of the unsaved manual together
//! with the time it was written. Writes are debounced so that a burst of
//! edits produces one write of the final state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use super::debounce::Debouncer;
use super::document::ManualDocument;
use super::events::EditorEvent;

/// File name of the draft slot
pub const DRAFT_FILE_NAME: &str = "manual-draft.json";

/// Draft storage errors; never shown to the author
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("draft store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt draft payload: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("could not determine the data directory")]
    NoDataDir,
}

/// What gets persisted: the full document plus the write time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    #[serde(flatten)]
    pub document: ManualDocument,
    pub updated_at: DateTime<Utc>,
}

impl DraftRecord {
    pub fn encode(&self) -> Result<String, DraftError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(payload: &str) -> Result<Self, DraftError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// A single-slot recoverable store
pub trait DraftStore: Send + Sync {
    /// Read the slot; `None` when empty
    fn read(&self) -> Result<Option<String>, DraftError>;

    /// Replace the slot contents
    fn write(&self, payload: &str) -> Result<(), DraftError>;

    /// Empty the slot
    fn clear(&self) -> Result<(), DraftError>;
}

/// Draft slot backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform data directory
    pub fn default_location() -> Result<Self, DraftError> {
        ProjectDirs::from("gov", "manual-editor", "ManualEditor")
            .map(|dirs| Self::new(dirs.data_dir().join(DRAFT_FILE_NAME)))
            .ok_or(DraftError::NoDataDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DraftStore for FileDraftStore {
    fn read(&self) -> Result<Option<String>, DraftError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, payload: &str) -> Result<(), DraftError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash mid-write leaves the old draft intact.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), DraftError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Draft slot held in memory
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a payload already in the slot
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(payload.into())),
            writes: Mutex::new(0),
        }
    }

    /// Number of completed writes
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl DraftStore for MemoryDraftStore {
    fn read(&self) -> Result<Option<String>, DraftError> {
        Ok(self.slot.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn write(&self, payload: &str) -> Result<(), DraftError> {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(payload.to_string());
        *self.writes.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        Ok(())
    }

    fn clear(&self) -> Result<(), DraftError> {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = None;
        Ok(())
    }
}

/// Load the persisted draft, discarding anything that cannot be parsed
pub fn load_draft(store: &dyn DraftStore) -> Option<DraftRecord> {
    let payload = match store.read() {
        Ok(Some(payload)) => payload,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!("Failed to read draft, starting empty: {}", e);
            return None;
        }
    };

    match DraftRecord::decode(&payload) {
        Ok(record) => {
            tracing::info!("Loaded draft last updated at {}", record.updated_at);
            Some(record)
        }
        Err(e) => {
            tracing::warn!("Discarding corrupt draft: {}", e);
            if let Err(e) = store.clear() {
                tracing::warn!("Failed to clear corrupt draft: {}", e);
            }
            None
        }
    }
}

/// Write a snapshot immediately, returning the recorded timestamp
pub fn persist(store: &dyn DraftStore, document: ManualDocument) -> Result<DateTime<Utc>, DraftError> {
    let record = DraftRecord {
        document,
        updated_at: Utc::now(),
    };
    store.write(&record.encode()?)?;
    Ok(record.updated_at)
}

/// Debounced writer of draft snapshots
pub struct DraftAutosave {
    store: Arc<dyn DraftStore>,
    debouncer: Debouncer,
    events: Option<UnboundedSender<EditorEvent>>,
}

impl DraftAutosave {
    pub fn new(store: Arc<dyn DraftStore>, delay: Duration) -> Self {
        Self {
            store,
            debouncer: Debouncer::new(delay),
            events: None,
        }
    }

    /// Report each completed write on this channel
    pub fn with_events(mut self, events: UnboundedSender<EditorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Write `snapshot` once edits have been quiet for the debounce window,
    /// replacing any write still waiting
    pub fn schedule(&mut self, snapshot: ManualDocument) {
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        self.debouncer.call(move || match persist(store.as_ref(), snapshot) {
            Ok(updated_at) => {
                tracing::debug!("Draft auto-saved at {}", updated_at);
                if let Some(events) = events {
                    let _ = events.send(EditorEvent::DraftPersisted { updated_at });
                }
            }
            Err(e) => tracing::warn!("Failed to auto-save draft: {}", e),
        });
    }

    /// Drop the pending write, if any
    pub fn cancel(&mut self) {
        self.debouncer.cancel();
    }

    /// Whether a write is waiting for the window to elapse
    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Cancel the pending write and delete the persisted draft
    pub fn discard(&mut self) -> Result<(), DraftError> {
        self.cancel();
        self.store.clear()?;
        tracing::info!("Cleared persisted draft");
        Ok(())
    }
}

impl std::fmt::Debug for DraftAutosave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftAutosave")
            .field("delay", &self.debouncer.delay())
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::Bilingual;

    fn titled(title: &str) -> ManualDocument {
        let mut doc = ManualDocument::new();
        doc.title = Bilingual::new(title, title);
        doc
    }

    #[test]
    fn test_unparseable_draft_is_discarded_silently() {
        let store = MemoryDraftStore::with_payload("{not json");
        assert!(load_draft(&store).is_none());
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_draft_violating_scope_invariant_is_corrupt() {
        let payload = r#"{"title":{"ar":"","en":""},"steps":[{"id":"1","scope":"BENEFICIARY","beneficiaryType":null,"orderIndex":0}],"updatedAt":"2026-01-01T00:00:00Z"}"#;
        let store = MemoryDraftStore::with_payload(payload);
        assert!(load_draft(&store).is_none());
    }

    #[test]
    fn test_persist_then_load() {
        let store = MemoryDraftStore::new();
        let updated_at = persist(&store, titled("draft")).unwrap();

        let json: serde_json::Value = serde_json::from_str(&store.read().unwrap().unwrap()).unwrap();
        assert_eq!(json["title"]["en"], "draft");
        assert!(json.get("updatedAt").is_some());

        let record = load_draft(&store).unwrap();
        assert_eq!(record.document.title.en, "draft");
        assert_eq!(record.updated_at, updated_at);
    }

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join("nested").join(DRAFT_FILE_NAME));
        assert!(store.read().unwrap().is_none());

        store.write("{}").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("{}"));

        store.clear().unwrap();
        assert!(store.read().unwrap().is_none());
        store.clear().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_writes_latest_snapshot_once() {
        let store = Arc::new(MemoryDraftStore::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut autosave =
            DraftAutosave::new(store.clone(), Duration::from_millis(1000)).with_events(tx);

        for title in ["a", "ab", "abc"] {
            autosave.schedule(titled(title));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(store.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(store.write_count(), 1);
        assert_eq!(load_draft(store.as_ref()).unwrap().document.title.en, "abc");
        assert!(matches!(rx.try_recv(), Ok(EditorEvent::DraftPersisted { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_cancels_pending_write() {
        let store = Arc::new(MemoryDraftStore::with_payload("old"));
        let mut autosave = DraftAutosave::new(store.clone(), Duration::from_millis(1000));

        autosave.schedule(titled("late"));
        autosave.discard().unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;

        assert_eq!(store.write_count(), 0);
        assert!(store.read().unwrap().is_none());
    }
}
