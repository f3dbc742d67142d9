//! Session state: who is signed in.
//!
//! [`SessionContext`] is the value handed to a [`crate::NoteOrganizer`] at
//! construction; [`SessionManager`] is the durable record it is read from.
use std::path::PathBuf;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{read_json_file, write_json_atomic, Result};

/// Identity of the signed-in owner, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    owner_id: Option<String>,
}

impl SessionContext {
    pub fn signed_in(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionRecord {
    email: Option<String>,
    logged_in: bool,
}

/// Durable session record, surviving process restarts.
pub struct SessionManager {
    path: PathBuf,
}

impl SessionManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<SessionRecord> {
        Ok(read_json_file(&self.path)?.unwrap_or_default())
    }

    pub fn save_user_session(&self, email: &str) -> Result<()> {
        let record = SessionRecord {
            email: Some(email.to_string()),
            logged_in: true,
        };
        write_json_atomic(&self.path, &record)?;
        info!("Session saved for {}", email);
        Ok(())
    }

    /// The signed-in email, or `None` unless the logged-in flag is set
    pub fn current_user(&self) -> Result<Option<String>> {
        let record = self.read()?;
        if !record.logged_in {
            return Ok(None);
        }
        Ok(record.email)
    }

    pub fn is_logged_in(&self) -> Result<bool> {
        Ok(self.read()?.logged_in)
    }

    pub fn clear_session(&self) -> Result<()> {
        write_json_atomic(&self.path, &SessionRecord::default())?;
        debug!("Session cleared");
        Ok(())
    }

    /// Session context for building a note organizer
    pub fn context(&self) -> Result<SessionContext> {
        Ok(SessionContext {
            owner_id: self.current_user()?,
        })
    }
}
