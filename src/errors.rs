//! Failures surfaced by the note store, the organizer and the account layer.
//!
//! Authentication outcomes are not errors: bad credentials and duplicate
//! registrations are reported through [`crate::AuthState`].

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::NoteId;

#[derive(Error, Debug)]
pub enum NotesError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A note, account, session or preference file could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Update or lookup of an id the store does not hold.
    #[error("No note with id {id}")]
    NoteNotFound { id: NoteId },

    /// A note operation needs an owner but nobody is signed in.
    #[error("Not signed in")]
    NoActiveSession,

    /// A note file parsed but holds unusable data.
    #[error("Malformed note file: {message}")]
    InvalidFormat { message: String },

    #[error("Bad configuration: {message}")]
    ConfigError { message: String },

    /// The data directory (or one below it) is missing and could not be created.
    #[error("Cannot use data directory {path}")]
    DirectoryError { path: PathBuf },

    /// A mutex was poisoned by a panicking holder
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// The store refused or failed a write for one note.
    #[error("Failed to persist note {id}: {message}")]
    StoreWrite { id: NoteId, message: String },

    #[error("{message}")]
    ApplicationError { message: String },
}
