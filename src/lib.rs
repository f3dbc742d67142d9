//! Personal note-taking library
//!
//! This library provides the note organizer behind a small notes application:
//! a durable note store, account sign-in, and the reactive view state that
//! filters, searches, pins, archives and bulk-edits an owner's notes.

mod auth;
mod autosave;
mod cli;
mod config;
mod errors;
mod helper;
mod navigation;
mod note;
mod organizer;
mod preferences;
mod session;
mod storage;
mod types;

// Re-export key components
pub use auth::*;
pub use autosave::*;
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use helper::*;
pub use navigation::*;
pub use note::*;
pub use organizer::*;
pub use preferences::*;
pub use session::*;
pub use storage::*;
pub use types::*;
