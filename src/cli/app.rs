//! CLI module for the pocketnotes application
//!
//! This module handles the command-line interface for interacting with the
//! note organizer, accounts and preferences.
use std::sync::Arc;

use log::{info, warn};

use crate::{
    launch_screen, AuthController, AuthProvider, AuthState, BulkAction, Commands, Config,
    JsonAccountStore, JsonNoteStore, Note, NoteCategory, NoteId, NoteOrganizer, NotesError,
    PreferenceStore, Result, Screen, SessionManager,
};

/// CLI Application handler - processes CLI commands against the local data directory
pub struct App {
    /// Application configuration
    config: Config,

    /// The note storage backend
    store: Arc<JsonNoteStore>,

    auth: AuthController<JsonAccountStore>,

    preferences: PreferenceStore,
}

impl App {
    /// Opens every store under the configured data directory
    pub fn open(config: Config) -> Result<Self> {
        info!("Using data directory {}", config.data_dir.display());
        let store = Arc::new(JsonNoteStore::open(config.notes_dir())?);
        let accounts = JsonAccountStore::open(config.accounts_path())?;
        let auth = AuthController::new(accounts, SessionManager::new(config.session_path()))?;
        let preferences = PreferenceStore::open(config.preferences_path())?;

        Ok(Self {
            config,
            store,
            auth,
            preferences,
        })
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Register { email, password } => {
                let state = self.auth.register(&email, &password).await;
                self.report_auth(state, &email)?
            }

            Commands::Login { email, password } => {
                let state = self.auth.login(&email, &password).await;
                self.report_auth(state, &email)?
            }

            Commands::Logout => {
                self.auth.logout()?;
                println!("Signed out");
            }

            Commands::Whoami => self.handle_whoami().await?,

            Commands::Add { title, content } => self.handle_add(title, content).await?,

            Commands::View { id, json } => {
                let organizer = self.organizer()?;
                let note = find_note(&organizer, id)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&note)?);
                } else {
                    self.display_notes_text(&[note], true);
                }
            }

            Commands::Edit { id, title, content } => self.handle_edit(id, title, content).await?,

            Commands::Delete { id } => {
                let organizer = self.organizer()?;
                let note = find_note(&organizer, id)?;
                organizer.delete_note(&note).await?;
                println!("Note {} deleted", id);
            }

            Commands::List {
                category,
                query,
                json,
            } => {
                let organizer = self.organizer()?;
                organizer.set_category(category);
                organizer.set_query(query.unwrap_or_default());
                let notes = organizer.current_projection();
                self.display_notes(&notes, json)?;
            }

            Commands::Search { query, json } => {
                let organizer = self.organizer()?;
                organizer.open_search();
                organizer.set_search_query(query.as_str());
                let results = organizer.search_state().results;
                organizer.close_search();

                if results.is_empty() {
                    println!("No notes found matching query: \"{}\"", query);
                } else {
                    self.display_notes(&results, json)?;
                }
            }

            Commands::Toggle { id, category } => {
                let organizer = self.organizer()?;
                let note = find_note(&organizer, id)?;
                let updated = organizer
                    .set_note_category_exclusive(&note, category)
                    .await?;
                println!("Note {} is now {}", id, status_label(&updated));
            }

            Commands::Bulk { action, ids } => self.handle_bulk(action, ids).await?,

            Commands::Share { id } => {
                let organizer = self.organizer()?;
                let note = find_note(&organizer, id)?;
                println!("{}", organizer.request_note_share(&note));
                organizer.on_note_shared();
            }

            Commands::Theme { mode } => {
                if let Some(mode) = mode {
                    self.preferences.set_theme_mode(mode)?;
                }
                println!("Theme: {:?}", self.preferences.theme_mode());
            }
        }

        Ok(())
    }

    /// Organizer bound to the signed-in account
    fn organizer(&self) -> Result<NoteOrganizer<JsonNoteStore>> {
        let session = self.auth.session_context()?;
        if session.owner_id().is_none() {
            return Err(NotesError::NoActiveSession);
        }
        NoteOrganizer::new(Arc::clone(&self.store), session, &self.config)
    }

    fn report_auth(&self, state: AuthState, email: &str) -> Result<()> {
        match state {
            AuthState::Success => {
                println!("Signed in as {}", email);
                Ok(())
            }
            AuthState::Error(message) => Err(NotesError::ApplicationError { message }),
            other => Err(NotesError::ApplicationError {
                message: format!("Unexpected authentication state: {:?}", other),
            }),
        }
    }

    async fn handle_whoami(&self) -> Result<()> {
        if let Some(email) = self.auth.session_context()?.owner_id() {
            println!("Signed in as {}", email);
            return Ok(());
        }

        let has_accounts = self.auth.provider().has_any_accounts().await?;
        match launch_screen(has_accounts) {
            Screen::Welcome => println!("No accounts yet. Create one with `pocketnotes register`."),
            _ => println!("Not signed in. Use `pocketnotes login`."),
        }
        Ok(())
    }

    async fn handle_add(&self, title: Option<String>, content: Option<String>) -> Result<()> {
        let organizer = self.organizer()?;
        let id = organizer.add_note().await?;

        if title.is_some() || content.is_some() {
            let note = organizer
                .load_note_by_id(id)
                .await?
                .ok_or(NotesError::NoteNotFound { id })?;
            let title = title.unwrap_or_default();
            let content = content.unwrap_or_default();
            if organizer.save_and_close(&note, &title, &content).await?.is_none() {
                println!("Nothing to save, note discarded");
                return Ok(());
            }
        }

        println!("Note created with ID: {}", id);
        Ok(())
    }

    async fn handle_edit(
        &self,
        id: NoteId,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<()> {
        let organizer = self.organizer()?;
        let note = find_note(&organizer, id)?;

        let title = title.unwrap_or_else(|| note.title.clone());
        let content = content.unwrap_or_else(|| note.content.clone());

        match organizer.save_and_close(&note, &title, &content).await? {
            Some(saved) => println!("Note {} saved as \"{}\"", id, saved.title),
            None => println!("Note {} was left blank and has been deleted", id),
        }
        Ok(())
    }

    async fn handle_bulk(&self, action: BulkAction, ids: Vec<NoteId>) -> Result<()> {
        let organizer = self.organizer()?;
        let known: Vec<NoteId> = organizer.raw_notes().iter().map(|note| note.id).collect();

        for id in ids {
            if known.contains(&id) {
                if !organizer.selected_ids().contains(&id) {
                    organizer.toggle_selection(id);
                }
            } else {
                warn!("Note {} not found, skipping", id);
                println!("Note {} not found, skipping", id);
            }
        }

        let outcome = organizer.apply_bulk(action).await;
        println!(
            "{:?}: {} of {} notes succeeded",
            action, outcome.succeeded, outcome.attempted
        );
        for (id, message) in &outcome.failed {
            println!("  note {}: {}", id, message);
        }

        if outcome.is_complete() {
            Ok(())
        } else {
            Err(NotesError::ApplicationError {
                message: format!(
                    "{} of {} notes could not be updated",
                    outcome.attempted - outcome.succeeded,
                    outcome.attempted
                ),
            })
        }
    }

    /// Display notes in the requested format
    fn display_notes(&self, notes: &[Note], json: bool) -> Result<()> {
        if notes.is_empty() {
            println!("No notes found matching the criteria.");
            return Ok(());
        }

        if json {
            println!("{}", serde_json::to_string_pretty(notes)?);
        } else {
            self.display_notes_text(notes, false);
            // Print count at the end
            println!(
                "\nFound {} note{}",
                notes.len(),
                if notes.len() == 1 { "" } else { "s" }
            );
        }

        Ok(())
    }

    /// Display notes in text format
    fn display_notes_text(&self, notes: &[Note], detailed: bool) {
        // Use terminal width for formatting if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, note) in notes.iter().enumerate() {
            // Add separator between notes (except before the first)
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let modified = note.last_modified.format("%Y-%m-%d %H:%M");
            println!("ID: {} | Modified: {}", note.id, modified);

            let title = if note.title.is_empty() {
                &self.config.untitled_title
            } else {
                &note.title
            };
            println!("Title: {}", console::style(title).bold());

            let status = status_label(note);
            if status != "active" {
                println!("Status: {}", console::style(status).cyan());
            }

            if detailed {
                println!("\n{}", note.content);
            } else {
                let preview = get_content_preview(&note.content, 100);
                if !preview.is_empty() {
                    println!("\n{}", preview);
                }
            }
        }
    }
}

/// Looks a note up among the signed-in owner's notes
fn find_note(organizer: &NoteOrganizer<JsonNoteStore>, id: NoteId) -> Result<Note> {
    organizer
        .raw_notes()
        .into_iter()
        .find(|note| note.id == id)
        .ok_or(NotesError::NoteNotFound { id })
}

fn status_label(note: &Note) -> &'static str {
    if NoteCategory::Archived.includes(note) {
        "archived"
    } else if NoteCategory::Pinned.includes(note) {
        "pinned"
    } else if NoteCategory::Favorites.includes(note) {
        "favorite"
    } else {
        "active"
    }
}

/// Generate a content preview for displaying brief notes
fn get_content_preview(content: &str, max_len: usize) -> String {
    // Get first non-empty line
    let first_line = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");

    if first_line.chars().count() <= max_len {
        first_line.to_string()
    } else {
        format!("{}...", first_line.chars().take(max_len).collect::<String>())
    }
}
