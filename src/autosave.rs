// src/autosave.rs - debounced saving of the note open in the editor
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, trace};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use crate::{Note, NoteOrganizer, NoteStore, NotesError, Result};

struct AutoSaveState {
    /// Last version of the note known to be persisted
    saved: Note,
    /// Edit waiting for the timer (title, content)
    pending: Option<(String, String)>,
    /// Armed timer, if any
    timer: Option<JoinHandle<()>>,
}

/// Saves editor changes once typing has paused.
///
/// Each [`AutoSaver::schedule`] call cancels the armed timer and starts a new
/// one, so only the last edit before a quiet period is written. Nothing is
/// written when the edit matches what is persisted, and a write keeps the
/// status flags the store currently holds for the note.
pub struct AutoSaver<S: NoteStore> {
    organizer: Arc<NoteOrganizer<S>>,
    delay: Duration,
    state: Arc<Mutex<AutoSaveState>>,
}

impl<S: NoteStore> AutoSaver<S> {
    pub fn new(organizer: Arc<NoteOrganizer<S>>, note: Note, delay: Duration) -> Self {
        Self {
            organizer,
            delay,
            state: Arc::new(Mutex::new(AutoSaveState {
                saved: note,
                pending: None,
                timer: None,
            })),
        }
    }

    /// Records an edit and re-arms the timer.
    pub fn schedule(&self, title: impl Into<String>, content: impl Into<String>) -> Result<()> {
        let mut state = lock(&self.state)?;
        if let Some(timer) = state.timer.take() {
            trace!("Re-arming auto-save timer");
            timer.abort();
        }
        state.pending = Some((title.into(), content.into()));

        let organizer = Arc::clone(&self.organizer);
        let shared = Arc::clone(&self.state);
        let delay = self.delay;
        state.timer = Some(tokio::spawn(async move {
            time::sleep(delay).await;

            let edit = match lock(&shared) {
                Ok(mut state) => {
                    // The write below must not be aborted by a later edit
                    state.timer = None;
                    state.pending.take().map(|edit| (state.saved.clone(), edit))
                }
                Err(e) => {
                    error!("Auto-save skipped: {}", e);
                    None
                }
            };

            if let Some((saved, (title, content))) = edit {
                if let Err(e) = commit(&organizer, &shared, saved, title, content).await {
                    error!("Auto-save failed: {}", e);
                }
            }
        }));
        Ok(())
    }

    /// Writes a pending edit right away instead of waiting for the timer.
    ///
    /// Returns the saved note, or `None` when nothing needed saving.
    pub async fn flush(&self) -> Result<Option<Note>> {
        let edit = {
            let mut state = lock(&self.state)?;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.pending.take().map(|edit| (state.saved.clone(), edit))
        };

        match edit {
            Some((saved, (title, content))) => {
                commit(&self.organizer, &self.state, saved, title, content).await
            }
            None => Ok(None),
        }
    }

    /// Drops a pending edit without saving it
    pub fn cancel(&self) -> Result<()> {
        let mut state = lock(&self.state)?;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending = None;
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.state).is_ok_and(|state| state.pending.is_some())
    }

    /// The last persisted version of the note
    pub fn saved_note(&self) -> Result<Note> {
        Ok(lock(&self.state)?.saved.clone())
    }
}

impl<S: NoteStore> Drop for AutoSaver<S> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
        }
    }
}

fn lock(state: &Mutex<AutoSaveState>) -> Result<MutexGuard<'_, AutoSaveState>> {
    state.lock().map_err(|_| NotesError::LockAcquisitionFailed {
        message: "Failed to acquire lock on auto-save state".to_string(),
    })
}

async fn commit<S: NoteStore>(
    organizer: &NoteOrganizer<S>,
    state: &Mutex<AutoSaveState>,
    saved: Note,
    title: String,
    content: String,
) -> Result<Option<Note>> {
    // Status flags may have changed since the editor opened the note
    let current = match organizer.store().get_by_id(saved.id).await? {
        Some(current) => current,
        None => {
            debug!("Note {} no longer exists, dropping auto-save", saved.id);
            return Ok(None);
        }
    };

    if current.title == title && current.content == content {
        debug!("Note {} unchanged, skipping auto-save", current.id);
        lock(state)?.saved = current;
        return Ok(None);
    }

    let updated = organizer
        .update_note(Note {
            title,
            content,
            ..current
        })
        .await?;
    debug!("Auto-saved note {}", updated.id);

    lock(state)?.saved = updated.clone();
    Ok(Some(updated))
}
