//! The note organizer: everything between the note store and the rendered list.
//!
//! The organizer mirrors the owner's notes from the store, combines them with
//! the transient UI state (inline query, category, selection, search mode) and
//! publishes the list that should be on screen. Status changes and bulk
//! actions are written back to the store and come back in through the same
//! live channel.
//!
//! Every piece of UI state lives in its own `watch` channel. A single
//! background task waits on the raw notes, the query and the category,
//! recomputes the visible list from the full current values whenever any of
//! them changes, and only publishes once the inputs have been quiet for the
//! configured debounce interval.
use std::{collections::HashSet, sync::Arc, time::Duration};

use log::{debug, error, info, trace, warn};
use tokio::{
    sync::watch,
    task::{JoinHandle, JoinSet},
    time,
};

use crate::{
    matches_query, BulkAction, BulkOutcome, Config, Note, NoteCategory, NoteId, NoteStore,
    NotesError, Result, SessionContext,
};

/// State of the full-screen search mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub active: bool,
    pub query: String,
    pub results: Vec<Note>,
}

/// Filters `notes` by query, then by category.
///
/// A blank query passes everything through.
pub fn project_notes(notes: &[Note], query: &str, category: NoteCategory) -> Vec<Note> {
    notes
        .iter()
        .filter(|note| matches_query(note, query))
        .filter(|note| category.includes(note))
        .cloned()
        .collect()
}

pub struct NoteOrganizer<S: NoteStore> {
    store: Arc<S>,
    session: SessionContext,
    untitled_title: String,

    /// Latest owner notes as published by the store
    raw_notes: watch::Receiver<Vec<Note>>,
    /// Holds the empty source open when nobody is signed in
    _empty_source: Option<watch::Sender<Vec<Note>>>,

    main_query: watch::Sender<String>,
    category: watch::Sender<NoteCategory>,
    selected_ids: watch::Sender<Vec<NoteId>>,
    selected_note: watch::Sender<Option<Note>>,
    search: watch::Sender<SearchState>,
    share_text: watch::Sender<Option<String>>,

    visible: watch::Receiver<Vec<Note>>,
    projection_task: JoinHandle<()>,
}

impl<S: NoteStore> NoteOrganizer<S> {
    /// Creates an organizer for the session's owner.
    ///
    /// Must be called from within a tokio runtime: the projection task is
    /// spawned here and lives until the organizer is dropped.
    pub fn new(store: Arc<S>, session: SessionContext, config: &Config) -> Result<Self> {
        let (raw_notes, empty_source) = match session.owner_id() {
            Some(owner_id) => (store.observe_notes_for_owner(owner_id)?, None),
            None => {
                debug!("No signed-in owner, organizer starts with no notes");
                let (tx, rx) = watch::channel(Vec::new());
                (rx, Some(tx))
            }
        };

        let (main_query, query_rx) = watch::channel(String::new());
        let (category, category_rx) = watch::channel(NoteCategory::All);
        let (visible_tx, visible) = watch::channel(Vec::new());

        let projection_task = tokio::spawn(run_projection(
            raw_notes.clone(),
            query_rx,
            category_rx,
            visible_tx,
            config.projection_debounce(),
        ));

        Ok(Self {
            store,
            session,
            untitled_title: config.untitled_title.clone(),
            raw_notes,
            _empty_source: empty_source,
            main_query,
            category,
            selected_ids: watch::channel(Vec::new()).0,
            selected_note: watch::channel(None).0,
            search: watch::channel(SearchState::default()).0,
            share_text: watch::channel(None).0,
            visible,
            projection_task,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ---- projection -------------------------------------------------------

    /// Live, debounced list of the notes that should be on screen
    pub fn observe_visible_notes(&self) -> watch::Receiver<Vec<Note>> {
        self.visible.clone()
    }

    /// Last published visible list
    pub fn visible_notes(&self) -> Vec<Note> {
        self.visible.borrow().clone()
    }

    /// Every note of the owner, unfiltered
    pub fn raw_notes(&self) -> Vec<Note> {
        self.raw_notes.borrow().clone()
    }

    /// The visible list computed right now from current state, bypassing the
    /// debounce.
    pub fn current_projection(&self) -> Vec<Note> {
        let query = self.main_query.borrow().clone();
        project_notes(&self.raw_notes.borrow(), &query, self.category())
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.main_query.send_replace(query.into());
    }

    pub fn query(&self) -> String {
        self.main_query.borrow().clone()
    }

    /// Switches the category view. The selection never survives a switch.
    pub fn set_category(&self, category: NoteCategory) {
        self.category.send_replace(category);
        self.clear_selection();
    }

    pub fn category(&self) -> NoteCategory {
        *self.category.borrow()
    }

    // ---- selection --------------------------------------------------------

    pub fn selected_ids(&self) -> Vec<NoteId> {
        self.selected_ids.borrow().clone()
    }

    pub fn observe_selected_ids(&self) -> watch::Receiver<Vec<NoteId>> {
        self.selected_ids.subscribe()
    }

    pub fn is_selection_mode(&self) -> bool {
        !self.selected_ids.borrow().is_empty()
    }

    pub fn toggle_selection(&self, id: NoteId) {
        self.selected_ids.send_modify(|ids| {
            if let Some(pos) = ids.iter().position(|selected| *selected == id) {
                ids.remove(pos);
            } else {
                ids.push(id);
            }
        });
    }

    pub fn select_all(&self, notes: &[Note]) {
        self.selected_ids
            .send_replace(notes.iter().map(|note| note.id).collect());
    }

    pub fn unselect(&self, notes: &[Note]) {
        let drop: HashSet<NoteId> = notes.iter().map(|note| note.id).collect();
        self.selected_ids
            .send_modify(|ids| ids.retain(|id| !drop.contains(id)));
    }

    pub fn clear_selection(&self) {
        self.selected_ids.send_replace(Vec::new());
    }

    /// Selects every visible note, or clears the selection when it already
    /// covers the visible list.
    pub fn toggle_select_all_visible(&self) {
        let visible = self.visible_notes();
        if self.selected_ids.borrow().len() < visible.len() {
            self.select_all(&visible);
        } else {
            self.clear_selection();
        }
    }

    fn deselect(&self, id: NoteId) {
        self.selected_ids.send_if_modified(|ids| {
            let before = ids.len();
            ids.retain(|selected| *selected != id);
            ids.len() != before
        });
    }

    // ---- open note --------------------------------------------------------

    /// The note open in the detail view, if loaded
    pub fn selected_note(&self) -> Option<Note> {
        self.selected_note.borrow().clone()
    }

    pub fn observe_selected_note(&self) -> watch::Receiver<Option<Note>> {
        self.selected_note.subscribe()
    }

    /// Loads a note into the detail view. A missing id leaves it empty.
    pub async fn load_note_by_id(&self, id: NoteId) -> Result<Option<Note>> {
        let note = self.store.get_by_id(id).await?;
        if note.is_none() {
            debug!("Note {} not found, detail view stays empty", id);
        }
        self.selected_note.send_replace(note.clone());
        Ok(note)
    }

    pub fn clear_selected_note(&self) {
        self.selected_note.send_replace(None);
    }

    fn refresh_open_note(&self, note: &Note) {
        self.selected_note.send_if_modified(|open| match open {
            Some(current) if current.id == note.id => {
                *current = note.clone();
                true
            }
            _ => false,
        });
    }

    fn close_open_note_if(&self, id: NoteId) {
        self.selected_note.send_if_modified(|open| {
            if open.as_ref().is_some_and(|current| current.id == id) {
                *open = None;
                true
            } else {
                false
            }
        });
    }

    // ---- single-note writes -----------------------------------------------

    /// Creates an empty note for the signed-in owner and returns its id
    pub async fn add_note(&self) -> Result<NoteId> {
        let owner_id = self.session.owner_id().ok_or(NotesError::NoActiveSession)?;
        let id = self.store.insert(Note::new(owner_id)).await?;
        info!("Created note {} for {}", id, owner_id);
        Ok(id)
    }

    /// Persists an edited note with a fresh timestamp and opens it
    pub async fn update_note(&self, note: Note) -> Result<Note> {
        let updated = note.touched();
        self.store.update(updated.clone()).await?;
        self.selected_note.send_replace(Some(updated.clone()));
        Ok(updated)
    }

    /// Saves the editor contents on the way out of the detail view.
    ///
    /// A note left with blank title and content is deleted and `None` is
    /// returned.
    pub async fn save_and_close(&self, note: &Note, title: &str, content: &str) -> Result<Option<Note>> {
        let saved = match note.edited_for_save(title, content, &self.untitled_title) {
            Some(edited) => Some(self.update_note(edited).await?),
            None => {
                debug!("Note {} left blank, deleting", note.id);
                self.delete_note(note).await?;
                None
            }
        };
        self.clear_selected_note();
        Ok(saved)
    }

    pub async fn delete_note(&self, note: &Note) -> Result<()> {
        self.store.delete(note.clone()).await?;
        self.deselect(note.id);
        self.close_open_note_if(note.id);
        Ok(())
    }

    /// Toggles one status flag exclusively and persists the result.
    ///
    /// Mirrors (open note, selection) only change after the write succeeded.
    pub async fn set_note_category_exclusive(&self, note: &Note, category: NoteCategory) -> Result<Note> {
        let updated = note.clone().with_exclusive_category(category);
        self.store.update(updated.clone()).await?;

        self.refresh_open_note(&updated);
        if updated.is_archived {
            self.deselect(updated.id);
        }
        debug!(
            "Note {} now pinned={} archived={} favorite={}",
            updated.id, updated.is_pinned, updated.is_archived, updated.is_favorite
        );
        Ok(updated)
    }

    // ---- bulk -------------------------------------------------------------

    /// Applies `action` to every selected note, then clears the selection.
    ///
    /// Selected ids are resolved against the raw notes, not the visible list.
    /// Each note is written independently; failures are collected in the
    /// outcome and never stop the other writes.
    pub async fn apply_bulk(&self, action: BulkAction) -> BulkOutcome {
        let selected: HashSet<NoteId> = self.selected_ids.borrow().iter().copied().collect();
        let targets: Vec<Note> = self
            .raw_notes
            .borrow()
            .iter()
            .filter(|note| selected.contains(&note.id))
            .cloned()
            .collect();

        let mut outcome = BulkOutcome {
            attempted: targets.len(),
            ..BulkOutcome::default()
        };
        info!("Applying {:?} to {} notes", action, targets.len());

        let mut writes = JoinSet::new();
        for note in targets {
            let store = Arc::clone(&self.store);
            writes.spawn(async move {
                let id = note.id;
                let result = match note.clone().with_bulk_action(action) {
                    Some(updated) => store.update(updated.clone()).await.map(|()| Some(updated)),
                    None => store.delete(note).await.map(|()| None),
                };
                (id, result)
            });
        }

        while let Some(joined) = writes.join_next().await {
            match joined {
                Ok((id, Ok(written))) => {
                    outcome.succeeded += 1;
                    match written {
                        Some(updated) => self.refresh_open_note(&updated),
                        None => self.close_open_note_if(id),
                    }
                }
                Ok((id, Err(e))) => {
                    warn!("Bulk {:?} failed for note {}: {}", action, id, e);
                    outcome.failed.push((id, e.to_string()));
                }
                Err(e) => error!("Bulk write task did not complete: {}", e),
            }
        }

        self.clear_selection();
        if !outcome.is_complete() {
            warn!(
                "Bulk {:?}: {} of {} notes succeeded",
                action, outcome.succeeded, outcome.attempted
            );
        }
        outcome
    }

    // ---- search mode ------------------------------------------------------

    pub fn search_state(&self) -> SearchState {
        self.search.borrow().clone()
    }

    pub fn observe_search(&self) -> watch::Receiver<SearchState> {
        self.search.subscribe()
    }

    pub fn open_search(&self) {
        self.search.send_replace(SearchState {
            active: true,
            ..SearchState::default()
        });
    }

    pub fn close_search(&self) {
        self.search.send_replace(SearchState::default());
    }

    /// Searches every owner note regardless of status
    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        let results = if query.trim().is_empty() {
            Vec::new()
        } else {
            self.raw_notes
                .borrow()
                .iter()
                .filter(|note| matches_query(note, &query))
                .cloned()
                .collect()
        };
        self.search.send_modify(|state| {
            state.query = query;
            state.results = results;
        });
    }

    // ---- share ------------------------------------------------------------

    /// Publishes the shareable text of `note` and returns it
    pub fn request_note_share(&self, note: &Note) -> String {
        let text = note.share_text();
        self.share_text.send_replace(Some(text.clone()));
        text
    }

    pub fn pending_share(&self) -> Option<String> {
        self.share_text.borrow().clone()
    }

    pub fn on_note_shared(&self) {
        self.share_text.send_replace(None);
    }
}

impl<S: NoteStore> Drop for NoteOrganizer<S> {
    fn drop(&mut self) {
        self.projection_task.abort();
    }
}

/// Recombines raw notes, query and category into the visible list.
///
/// Runs until one of its inputs is closed.
async fn run_projection(
    mut raw: watch::Receiver<Vec<Note>>,
    mut query: watch::Receiver<String>,
    mut category: watch::Receiver<NoteCategory>,
    visible: watch::Sender<Vec<Note>>,
    debounce: Duration,
) {
    debug!("Projection task started");

    loop {
        // Wait until the inputs have been quiet for a full debounce window
        loop {
            tokio::select! {
                _ = time::sleep(debounce) => break,
                changed = raw.changed() => if changed.is_err() { break },
                changed = query.changed() => if changed.is_err() { break },
                changed = category.changed() => if changed.is_err() { break },
            }
        }

        let notes = raw.borrow_and_update().clone();
        let current_query = query.borrow_and_update().clone();
        let current_category = *category.borrow_and_update();
        let projected = project_notes(&notes, &current_query, current_category);
        trace!(
            "Projected {} of {} notes for {:?}",
            projected.len(),
            notes.len(),
            current_category
        );
        visible.send_replace(projected);

        tokio::select! {
            changed = raw.changed() => if changed.is_err() { break },
            changed = query.changed() => if changed.is_err() { break },
            changed = category.changed() => if changed.is_err() { break },
        }
    }

    debug!("Projection task stopped");
}
