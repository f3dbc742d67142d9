use std::{collections::HashSet, sync::Arc, sync::Mutex, time::Duration};

use tempfile::TempDir;
use tokio::sync::watch;

use pocketnotes::{
    AutoSaver, BulkAction, Config, JsonNoteStore, Note, NoteCategory, NoteId, NoteOrganizer,
    NoteStore, NotesError, Result, SessionContext,
};

const OWNER: &str = "ann@example.com";

/// Wraps a real store and rejects updates to chosen notes.
struct FailingStore {
    inner: JsonNoteStore,
    failing: Mutex<HashSet<NoteId>>,
}

impl FailingStore {
    fn fail_updates_for(&self, id: NoteId) {
        self.failing.lock().unwrap().insert(id);
    }

    fn should_fail(&self, id: NoteId) -> bool {
        self.failing.lock().unwrap().contains(&id)
    }
}

impl NoteStore for FailingStore {
    fn observe_notes_for_owner(&self, owner_id: &str) -> Result<watch::Receiver<Vec<Note>>> {
        self.inner.observe_notes_for_owner(owner_id)
    }

    async fn insert(&self, note: Note) -> Result<NoteId> {
        self.inner.insert(note).await
    }

    async fn update(&self, note: Note) -> Result<()> {
        if self.should_fail(note.id) {
            return Err(NotesError::StoreWrite {
                id: note.id,
                message: "simulated disk failure".to_string(),
            });
        }
        self.inner.update(note).await
    }

    async fn delete(&self, note: Note) -> Result<()> {
        self.inner.delete(note).await
    }

    async fn get_by_id(&self, id: NoteId) -> Result<Option<Note>> {
        self.inner.get_by_id(id).await
    }
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::with_data_dir(dir.path());
    config.projection_debounce_ms = 20;
    config.autosave_debounce_ms = 40;
    config
}

fn organizer(dir: &TempDir) -> NoteOrganizer<FailingStore> {
    let config = test_config(dir);
    let store = Arc::new(FailingStore {
        inner: JsonNoteStore::open(config.notes_dir()).unwrap(),
        failing: Mutex::new(HashSet::new()),
    });
    NoteOrganizer::new(store, SessionContext::signed_in(OWNER), &config).unwrap()
}

async fn add<S: NoteStore>(org: &NoteOrganizer<S>, title: &str) -> Note {
    let id = org.add_note().await.unwrap();
    let note = org.load_note_by_id(id).await.unwrap().unwrap();
    org.update_note(Note {
        title: title.to_string(),
        ..note
    })
    .await
    .unwrap()
}

async fn wait_for_visible<S, F>(org: &NoteOrganizer<S>, pred: F) -> Vec<Note>
where
    S: NoteStore,
    F: Fn(&[Note]) -> bool,
{
    let mut rx = org.observe_visible_notes();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let current = rx.borrow_and_update();
                if pred(&current) {
                    return current.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("visible notes never reached the expected state")
}

fn ids(notes: &[Note]) -> Vec<NoteId> {
    notes.iter().map(|note| note.id).collect()
}

fn has(notes: &[Note], id: NoteId) -> bool {
    notes.iter().any(|note| note.id == id)
}

#[tokio::test]
async fn create_edit_pin_archive_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let store = Arc::new(JsonNoteStore::open(config.notes_dir()).unwrap());
    let shared = Arc::new(
        NoteOrganizer::new(Arc::clone(&store), SessionContext::signed_in(OWNER), &config).unwrap(),
    );
    let org = shared.as_ref();

    // New notes show up immediately with empty title and content
    let id = org.add_note().await.unwrap();
    let visible = wait_for_visible(org, |notes| has(notes, id)).await;
    assert_eq!(visible[0].title, "");
    assert_eq!(visible[0].content, "");

    let created = org.load_note_by_id(id).await.unwrap().unwrap();
    let saver = AutoSaver::new(Arc::clone(&shared), created.clone(), config.autosave_debounce());
    saver.schedule("Shop", "").unwrap();
    saver.schedule("Shopping", "eg").unwrap();
    saver.schedule("Shopping", "eggs").unwrap();

    let visible = wait_for_visible(org, |notes| {
        notes.iter().any(|n| n.id == id && n.title == "Shopping" && n.content == "eggs")
    })
    .await;
    let edited = visible.into_iter().find(|n| n.id == id).unwrap();
    assert!(edited.last_modified > created.last_modified);
    let stored = store.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored, edited);

    // Pin: shows under PINNED and still under ALL
    let pinned = org
        .set_note_category_exclusive(&edited, NoteCategory::Pinned)
        .await
        .unwrap();
    wait_for_visible(org, |notes| notes.iter().any(|n| n.id == id && n.is_pinned)).await;
    org.set_category(NoteCategory::Pinned);
    wait_for_visible(org, |notes| ids(notes) == vec![id]).await;

    // Archive: leaves PINNED and ALL, appears under ARCHIVED, unpinned
    let archived = org
        .set_note_category_exclusive(&pinned, NoteCategory::Archived)
        .await
        .unwrap();
    assert!(!archived.is_pinned);
    wait_for_visible(org, |notes| notes.is_empty()).await;
    org.set_category(NoteCategory::All);
    wait_for_visible(org, |notes| notes.is_empty()).await;
    org.set_category(NoteCategory::Archived);
    let visible = wait_for_visible(org, |notes| ids(notes) == vec![id]).await;
    assert!(visible[0].is_archived && !visible[0].is_pinned && !visible[0].is_favorite);

    // Unarchive reverses it
    org.set_note_category_exclusive(&archived, NoteCategory::Archived)
        .await
        .unwrap();
    wait_for_visible(org, |notes| notes.is_empty()).await;
    org.set_category(NoteCategory::All);
    wait_for_visible(org, |notes| ids(notes) == vec![id]).await;
}

#[tokio::test]
async fn bulk_archive_survives_a_failing_note() {
    let dir = TempDir::new().unwrap();
    let org = organizer(&dir);
    let first = add(&org, "first").await;
    let second = add(&org, "second").await;
    let third = org
        .set_note_category_exclusive(&add(&org, "third").await, NoteCategory::Favorites)
        .await
        .unwrap();
    org.store().fail_updates_for(second.id);

    for note in [&first, &second, &third] {
        org.toggle_selection(note.id);
    }
    let outcome = org.apply_bulk(BulkAction::Archive).await;

    assert_eq!(outcome.attempted, 3);
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(ids_of_failures(&outcome.failed), vec![second.id]);
    assert!(!outcome.is_complete());
    assert!(org.selected_ids().is_empty());

    let raw = org.raw_notes();
    let find = |id: NoteId| raw.iter().find(|n| n.id == id).unwrap().clone();
    assert!(find(first.id).is_archived);
    let third_now = find(third.id);
    assert!(third_now.is_archived && !third_now.is_favorite);
    let second_now = find(second.id);
    assert_eq!(second_now.flags(), second.flags());
    assert_eq!(second_now.last_modified, second.last_modified);

    org.set_category(NoteCategory::Archived);
    let visible = wait_for_visible(&org, |notes| notes.len() == 2).await;
    assert!(!has(&visible, second.id));
}

fn ids_of_failures(failed: &[(NoteId, String)]) -> Vec<NoteId> {
    failed.iter().map(|(id, _)| *id).collect()
}

#[tokio::test]
async fn bulk_burst_settles_into_one_consistent_view() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.projection_debounce_ms = 150;
    let store = Arc::new(JsonNoteStore::open(config.notes_dir()).unwrap());
    let org = NoteOrganizer::new(store, SessionContext::signed_in(OWNER), &config).unwrap();
    for i in 0..20 {
        add(&org, &format!("note {}", i)).await;
    }
    let visible = wait_for_visible(&org, |notes| {
        notes.len() == 20 && notes.iter().all(|n| n.title.starts_with("note "))
    })
    .await;

    let mut rx = org.observe_visible_notes();
    rx.borrow_and_update();
    org.toggle_select_all_visible();
    assert_eq!(org.selected_ids().len(), 20);
    let outcome = org.apply_bulk(BulkAction::Archive).await;
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded, visible.len());

    // The whole burst of store updates lands as a single emission
    let mut emissions = 0;
    let quiet = Duration::from_millis(600);
    while let Ok(changed) = tokio::time::timeout(quiet, rx.changed()).await {
        changed.unwrap();
        emissions += 1;
    }
    assert_eq!(emissions, 1);
    assert!(rx.borrow().is_empty());

    org.set_category(NoteCategory::Archived);
    let archived = wait_for_visible(&org, |notes| notes.len() == 20).await;
    assert!(archived.iter().all(|n| n.flags().is_exclusive()));
}

#[tokio::test]
async fn switching_category_drops_stale_selection() {
    let dir = TempDir::new().unwrap();
    let org = organizer(&dir);
    let pinned = org
        .set_note_category_exclusive(&add(&org, "pinned").await, NoteCategory::Pinned)
        .await
        .unwrap();
    let archived = org
        .set_note_category_exclusive(&add(&org, "archived").await, NoteCategory::Archived)
        .await
        .unwrap();

    org.set_category(NoteCategory::Pinned);
    wait_for_visible(&org, |notes| ids(notes) == vec![pinned.id]).await;
    org.toggle_select_all_visible();
    assert_eq!(org.selected_ids(), vec![pinned.id]);

    org.set_category(NoteCategory::Archived);
    wait_for_visible(&org, |notes| ids(notes) == vec![archived.id]).await;
    let outcome = org.apply_bulk(BulkAction::Delete).await;
    assert_eq!(outcome.attempted, 0);

    let raw = org.raw_notes();
    assert!(has(&raw, pinned.id));
    assert!(has(&raw, archived.id));

    // Selecting under the new view acts on exactly that view
    org.toggle_select_all_visible();
    let outcome = org.apply_bulk(BulkAction::Delete).await;
    assert_eq!(outcome.succeeded, 1);
    let raw = org.raw_notes();
    assert!(has(&raw, pinned.id));
    assert!(!has(&raw, archived.id));
}

#[tokio::test]
async fn deleted_note_in_selection_is_harmless() {
    let dir = TempDir::new().unwrap();
    let org = organizer(&dir);
    let doomed = add(&org, "doomed").await;
    let kept = add(&org, "kept").await;

    org.toggle_selection(doomed.id);
    org.toggle_selection(kept.id);
    org.store().inner.delete(doomed.clone()).await.unwrap();

    let outcome = org.apply_bulk(BulkAction::Star).await;
    assert_eq!(outcome.attempted, 1);
    assert!(outcome.is_complete());

    org.toggle_selection(doomed.id);
    org.clear_selection();
    assert!(org.selected_ids().is_empty());
}

#[tokio::test]
async fn blank_query_is_a_no_op_filter() {
    let dir = TempDir::new().unwrap();
    let org = organizer(&dir);
    add(&org, "Grocery").await;
    let other = add(&org, "Work").await;
    org.set_note_category_exclusive(&other, NoteCategory::Favorites)
        .await
        .unwrap();

    org.set_category(NoteCategory::Favorites);
    let unfiltered = wait_for_visible(&org, |notes| notes.len() == 1).await;
    org.set_query("   ");
    assert_eq!(org.current_projection(), unfiltered);

    org.set_query("groc");
    wait_for_visible(&org, |notes| notes.is_empty()).await;
    org.set_category(NoteCategory::All);
    let visible = wait_for_visible(&org, |notes| notes.len() == 1).await;
    assert_eq!(visible[0].title, "Grocery");
}

#[tokio::test]
async fn notes_of_other_owners_stay_invisible() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let store = Arc::new(JsonNoteStore::open(config.notes_dir()).unwrap());
    let ann = NoteOrganizer::new(Arc::clone(&store), SessionContext::signed_in(OWNER), &config)
        .unwrap();
    let bob = NoteOrganizer::new(
        Arc::clone(&store),
        SessionContext::signed_in("bob@example.com"),
        &config,
    )
    .unwrap();

    let id = ann.add_note().await.unwrap();
    wait_for_visible(&ann, |notes| ids(notes) == vec![id]).await;

    bob.add_note().await.unwrap();
    wait_for_visible(&bob, |notes| notes.len() == 1).await;
    bob.open_search();
    bob.set_search_query("");
    assert!(bob.search_state().results.is_empty());
    assert_eq!(ann.raw_notes().len(), 1);
}

#[tokio::test]
async fn missing_session_cannot_create_notes() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let store = Arc::new(JsonNoteStore::open(config.notes_dir()).unwrap());
    let org = NoteOrganizer::new(store, SessionContext::anonymous(), &config).unwrap();
    assert!(matches!(
        org.add_note().await,
        Err(NotesError::NoActiveSession)
    ));
}
