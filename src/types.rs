//! Core data structures for the pocketnotes application.
//!
//! This module contains the small shared types used throughout the
//! application: identifiers, view categories, bulk actions and the CLI
//! command set.
use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::{Note, NotesError, ThemeMode};

/// A specialized Result type for pocketnotes operations.
pub type Result<T> = std::result::Result<T, NotesError>;

/// Store-assigned note identifier. `0` means "not yet persisted".
pub type NoteId = i64;

/// Coarse view filter over an owner's notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteCategory {
    /// Everything that is not archived
    #[default]
    All,
    /// Pinned and not archived
    Pinned,
    /// Archived only
    Archived,
    /// Favorite and not archived
    Favorites,
}

impl NoteCategory {
    /// Whether `note` belongs in this view. Archived notes only show under
    /// `Archived`.
    pub fn includes(&self, note: &Note) -> bool {
        match self {
            NoteCategory::All => !note.is_archived,
            NoteCategory::Pinned => note.is_pinned && !note.is_archived,
            NoteCategory::Archived => note.is_archived,
            NoteCategory::Favorites => note.is_favorite && !note.is_archived,
        }
    }
}

/// An operation applied to every note of the selection set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BulkAction {
    Pin,
    Unpin,
    Archive,
    Unarchive,
    Star,
    Unstar,
    Delete,
}

/// Summary of a bulk operation over the selection set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Number of selected notes that resolved against the current snapshot
    pub attempted: usize,
    /// Number of notes whose write succeeded
    pub succeeded: usize,
    /// Notes that failed to persist
    pub failed: Vec<(NoteId, String)>, // (note_id, error_message)
}

impl BulkOutcome {
    /// True when every attempted write went through.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.succeeded == self.attempted
    }
}

/// Available subcommands for the pocketnotes application
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new account and sign in
    Register {
        /// Account email
        email: String,
        /// Account password
        password: String,
    },

    /// Sign in with an existing account
    Login {
        /// Account email
        email: String,
        /// Account password
        password: String,
    },

    /// Sign out and clear the stored session
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Create a new note
    Add {
        /// Title of the note
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// Content of the note
        #[clap(short, long)]
        content: Option<String>,
    },

    /// View a note by ID
    View {
        /// ID of the note to view
        id: NoteId,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Edit an existing note; blank title and content deletes it
    Edit {
        /// ID of the note to edit
        id: NoteId,

        /// New title for the note
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// New content for the note
        #[clap(short, long)]
        content: Option<String>,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note to delete
        id: NoteId,
    },

    /// List notes in a category, optionally filtered by a query
    List {
        /// Category to show
        #[clap(short = 'C', long, value_enum, default_value_t = NoteCategory::All)]
        category: NoteCategory,

        /// Only notes whose title or content contains this text
        #[clap(short, long)]
        query: Option<String>,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Search across all notes regardless of status
    Search {
        /// Search query text
        query: String,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Toggle a note's pinned, archived or favorite status
    Toggle {
        /// ID of the note to modify
        id: NoteId,

        /// Status to toggle; `all` clears every status
        #[clap(value_enum)]
        category: NoteCategory,
    },

    /// Apply one action to several notes at once
    Bulk {
        /// Action to apply
        #[clap(value_enum)]
        action: BulkAction,

        /// IDs of the notes to act on
        #[clap(required = true)]
        ids: Vec<NoteId>,
    },

    /// Print the shareable text of a note
    Share {
        /// ID of the note to share
        id: NoteId,
    },

    /// Show or change the theme preference
    Theme {
        /// New theme mode
        #[clap(value_enum)]
        mode: Option<ThemeMode>,
    },
}
