use std::{
    collections::HashMap,
    fs,
    future::Future,
    io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use log::{debug, error, info, trace, warn};
use tokio::sync::watch;
use walkdir::WalkDir;

use crate::{load_note_from_file, write_json_atomic, Note, NoteId, NotesError, Result};

/// Durable keyed collection of notes with an owner-scoped live query.
///
/// Every list handed out by [`NoteStore::observe_notes_for_owner`] is ordered
/// by last-modified, newest first, and is republished after each write that
/// touches that owner.
pub trait NoteStore: Send + Sync + 'static {
    /// Live view of every note belonging to `owner_id`
    fn observe_notes_for_owner(&self, owner_id: &str) -> Result<watch::Receiver<Vec<Note>>>;

    /// Persists a note, assigning an id when `note.id` is 0
    fn insert(&self, note: Note) -> impl Future<Output = Result<NoteId>> + Send;

    /// Replaces an existing note
    fn update(&self, note: Note) -> impl Future<Output = Result<()>> + Send;

    /// Removes a note; removing an unknown note is not an error
    fn delete(&self, note: Note) -> impl Future<Output = Result<()>> + Send;

    fn get_by_id(&self, id: NoteId) -> impl Future<Output = Result<Option<Note>>> + Send;
}

#[derive(Default)]
struct StoreState {
    /// In-memory cache of notes, indexed by note ID
    notes: HashMap<NoteId, Note>,

    /// Id handed to the next inserted note
    next_id: NoteId,

    /// One live channel per observed owner
    channels: HashMap<String, watch::Sender<Vec<Note>>>,
}

impl StoreState {
    fn owner_notes(&self, owner_id: &str) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .notes
            .values()
            .filter(|note| note.owner_id == owner_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| b.id.cmp(&a.id))
        });
        notes
    }

    fn publish(&self, owner_id: &str) {
        if let Some(tx) = self.channels.get(owner_id) {
            let notes = self.owner_notes(owner_id);
            trace!("Publishing {} notes for owner {}", notes.len(), owner_id);
            tx.send_replace(notes);
        }
    }
}

/// Note store keeping one JSON file per note in a directory.
pub struct JsonNoteStore {
    /// Directory where notes are stored
    notes_dir: PathBuf,

    state: Mutex<StoreState>,
}

impl JsonNoteStore {
    /// Opens the store, creating the directory and loading existing notes.
    pub fn open(notes_dir: impl Into<PathBuf>) -> Result<Self> {
        let notes_dir = notes_dir.into();
        info!("Opening note store at {}", notes_dir.display());

        if !notes_dir.exists() {
            debug!(
                "Notes directory does not exist, creating: {}",
                notes_dir.display()
            );
            fs::create_dir_all(&notes_dir).map_err(|e| {
                error!("Failed to create notes directory: {}", e);
                NotesError::DirectoryError {
                    path: notes_dir.clone(),
                }
            })?;
        }

        let notes = load_notes(&notes_dir);
        let next_id = notes.keys().max().copied().unwrap_or(0) + 1;
        info!("Loaded {} notes into cache", notes.len());

        Ok(Self {
            notes_dir,
            state: Mutex::new(StoreState {
                notes,
                next_id,
                channels: HashMap::new(),
            }),
        })
    }

    pub fn notes_dir(&self) -> &Path {
        &self.notes_dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on notes cache".to_string(),
            })
    }

    fn note_path(&self, id: NoteId) -> PathBuf {
        self.notes_dir.join(format!("{}.json", id))
    }

    fn insert_note(&self, mut note: Note) -> Result<NoteId> {
        let mut state = self.lock()?;

        if note.id == 0 {
            note.id = state.next_id;
        }
        let id = note.id;

        write_json_atomic(&self.note_path(id), &note).map_err(|e| NotesError::StoreWrite {
            id,
            message: e.to_string(),
        })?;

        state.next_id = state.next_id.max(id + 1);
        let owner_id = note.owner_id.clone();
        if let Some(previous) = state.notes.insert(id, note) {
            if previous.owner_id != owner_id {
                state.publish(&previous.owner_id);
            }
        }
        state.publish(&owner_id);

        info!("Note inserted: {}", id);
        Ok(id)
    }

    fn update_note(&self, note: Note) -> Result<()> {
        let mut state = self.lock()?;

        let previous_owner = match state.notes.get(&note.id) {
            Some(existing) => existing.owner_id.clone(),
            None => {
                warn!("Attempted to update non-existent note: {}", note.id);
                return Err(NotesError::NoteNotFound { id: note.id });
            }
        };

        let id = note.id;
        write_json_atomic(&self.note_path(id), &note).map_err(|e| NotesError::StoreWrite {
            id,
            message: e.to_string(),
        })?;

        let owner_id = note.owner_id.clone();
        state.notes.insert(id, note);
        if previous_owner != owner_id {
            state.publish(&previous_owner);
        }
        state.publish(&owner_id);

        info!("Note updated: {}", id);
        Ok(())
    }

    fn delete_note(&self, note: &Note) -> Result<()> {
        let mut state = self.lock()?;

        match fs::remove_file(self.note_path(note.id)) {
            Ok(()) => debug!("Removed note file for {}", note.id),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No file to remove for note {}", note.id)
            }
            Err(e) => {
                error!("Failed to delete note file for {}: {}", note.id, e);
                return Err(NotesError::StoreWrite {
                    id: note.id,
                    message: e.to_string(),
                });
            }
        }

        if let Some(removed) = state.notes.remove(&note.id) {
            state.publish(&removed.owner_id);
            info!("Note deleted: {}", note.id);
        }
        Ok(())
    }
}

impl NoteStore for JsonNoteStore {
    fn observe_notes_for_owner(&self, owner_id: &str) -> Result<watch::Receiver<Vec<Note>>> {
        let mut state = self.lock()?;
        if let Some(tx) = state.channels.get(owner_id) {
            return Ok(tx.subscribe());
        }

        debug!("Opening note channel for owner {}", owner_id);
        let (tx, rx) = watch::channel(state.owner_notes(owner_id));
        state.channels.insert(owner_id.to_string(), tx);
        Ok(rx)
    }

    async fn insert(&self, note: Note) -> Result<NoteId> {
        self.insert_note(note)
    }

    async fn update(&self, note: Note) -> Result<()> {
        self.update_note(note)
    }

    async fn delete(&self, note: Note) -> Result<()> {
        self.delete_note(&note)
    }

    async fn get_by_id(&self, id: NoteId) -> Result<Option<Note>> {
        Ok(self.lock()?.notes.get(&id).cloned())
    }
}

/// Loads all notes from disk, skipping files that fail to parse
fn load_notes(notes_dir: &Path) -> HashMap<NoteId, Note> {
    let mut notes = HashMap::new();
    let mut load_errors = 0;

    for entry in WalkDir::new(notes_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            match load_note_from_file(path) {
                Ok(note) => {
                    notes.insert(note.id, note);
                }
                Err(e) => {
                    warn!("Failed to load note from {}: {}", path.display(), e);
                    load_errors += 1;
                }
            }
        }
    }

    if load_errors > 0 {
        error!("Encountered {} errors while loading notes", load_errors);
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn note_for(owner: &str, title: &str) -> Note {
        Note {
            title: title.to_string(),
            ..Note::new(owner)
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = JsonNoteStore::open(dir.path()).unwrap();

        let first = store.insert(note_for("a", "one")).await.unwrap();
        let second = store.insert(note_for("a", "two")).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(dir.path().join("1.json").exists());

        let reopened = JsonNoteStore::open(dir.path()).unwrap();
        let loaded = reopened.get_by_id(2).await.unwrap().unwrap();
        assert_eq!(loaded.title, "two");
        assert_eq!(reopened.insert(note_for("a", "three")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_observe_is_owner_scoped_and_ordered() {
        let dir = TempDir::new().unwrap();
        let store = JsonNoteStore::open(dir.path()).unwrap();
        let rx = store.observe_notes_for_owner("a").unwrap();
        assert!(rx.borrow().is_empty());

        let mut older = note_for("a", "older");
        older.last_modified = older.last_modified - Duration::minutes(5);
        store.insert(older).await.unwrap();
        store.insert(note_for("a", "newer")).await.unwrap();
        store.insert(note_for("b", "other owner")).await.unwrap();

        let titles: Vec<String> = rx.borrow().iter().map(|n| n.title.clone()).collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn test_update_unknown_note_fails() {
        let dir = TempDir::new().unwrap();
        let store = JsonNoteStore::open(dir.path()).unwrap();
        let mut note = note_for("a", "ghost");
        note.id = 42;
        assert!(matches!(
            store.update(note).await,
            Err(NotesError::NoteNotFound { id: 42 })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = JsonNoteStore::open(dir.path()).unwrap();
        let rx = store.observe_notes_for_owner("a").unwrap();

        let id = store.insert(note_for("a", "gone soon")).await.unwrap();
        let note = store.get_by_id(id).await.unwrap().unwrap();
        store.delete(note.clone()).await.unwrap();
        store.delete(note).await.unwrap();

        assert!(store.get_by_id(id).await.unwrap().is_none());
        assert!(rx.borrow().is_empty());
        assert!(!dir.path().join(format!("{}.json", id)).exists());
    }

    #[tokio::test]
    async fn test_corrupt_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("7.json"), "not json").unwrap();
        let store = JsonNoteStore::open(dir.path()).unwrap();
        assert!(store.get_by_id(7).await.unwrap().is_none());
        assert_eq!(store.insert(note_for("a", "fresh")).await.unwrap(), 1);
    }
}
