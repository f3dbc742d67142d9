//! The note entity and its status rules.
//!
//! A note carries three status flags (pinned, archived, favorite) of which at
//! most one may be set. Every mutation helper here goes through
//! [`StatusFlags`] so the rule holds no matter which path changed the note.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{BulkAction, NoteCategory, NoteId};

/// Represents a single note in our system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned identifier, 0 until the note is first persisted
    #[serde(default)]
    pub id: NoteId,
    /// Note title
    pub title: String,
    /// Note body
    pub content: String,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_favorite: bool,
    /// Identity of the account that owns the note
    pub owner_id: String,
}

/// The pinned/archived/favorite triple of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags {
    pub pinned: bool,
    pub archived: bool,
    pub favorite: bool,
}

impl StatusFlags {
    /// Flips the flag behind `category` and clears the other two.
    ///
    /// `NoteCategory::All` clears everything, which is how a note's status is
    /// reset from the detail view.
    pub fn toggled(self, category: NoteCategory) -> Self {
        match category {
            NoteCategory::Pinned => Self {
                pinned: !self.pinned,
                ..Self::default()
            },
            NoteCategory::Archived => Self {
                archived: !self.archived,
                ..Self::default()
            },
            NoteCategory::Favorites => Self {
                favorite: !self.favorite,
                ..Self::default()
            },
            NoteCategory::All => Self::default(),
        }
    }

    /// Flags after a bulk action, or `None` for [`BulkAction::Delete`].
    ///
    /// Setting a flag forces it on and clears the others; unsetting only
    /// clears the named flag.
    pub fn after_bulk(self, action: BulkAction) -> Option<Self> {
        let flags = match action {
            BulkAction::Pin => Self {
                pinned: true,
                ..Self::default()
            },
            BulkAction::Archive => Self {
                archived: true,
                ..Self::default()
            },
            BulkAction::Star => Self {
                favorite: true,
                ..Self::default()
            },
            BulkAction::Unpin => Self {
                pinned: false,
                ..self
            },
            BulkAction::Unarchive => Self {
                archived: false,
                ..self
            },
            BulkAction::Unstar => Self {
                favorite: false,
                ..self
            },
            BulkAction::Delete => return None,
        };
        Some(flags)
    }

    /// At most one flag is set.
    pub fn is_exclusive(&self) -> bool {
        [self.pinned, self.archived, self.favorite]
            .iter()
            .filter(|set| **set)
            .count()
            <= 1
    }
}

impl Note {
    /// Creates an empty, not yet persisted note for `owner_id`
    pub fn new(owner_id: impl Into<String>) -> Self {
        Note {
            id: 0,
            title: String::new(),
            content: String::new(),
            last_modified: Utc::now(),
            is_pinned: false,
            is_archived: false,
            is_favorite: false,
            owner_id: owner_id.into(),
        }
    }

    pub fn flags(&self) -> StatusFlags {
        StatusFlags {
            pinned: self.is_pinned,
            archived: self.is_archived,
            favorite: self.is_favorite,
        }
    }

    pub fn with_flags(mut self, flags: StatusFlags) -> Self {
        self.is_pinned = flags.pinned;
        self.is_archived = flags.archived;
        self.is_favorite = flags.favorite;
        self
    }

    /// Refreshes `last_modified`, never moving it backwards or standing still.
    pub fn touched(mut self) -> Self {
        let now = Utc::now();
        self.last_modified = if now > self.last_modified {
            now
        } else {
            self.last_modified + Duration::milliseconds(1)
        };
        self
    }

    /// The note after toggling `category` exclusively, with a fresh timestamp.
    pub fn with_exclusive_category(self, category: NoteCategory) -> Self {
        let flags = self.flags().toggled(category);
        self.with_flags(flags).touched()
    }

    /// The note after a bulk status action, or `None` when the action deletes.
    pub fn with_bulk_action(self, action: BulkAction) -> Option<Self> {
        let flags = self.flags().after_bulk(action)?;
        Some(self.with_flags(flags).touched())
    }

    /// Applies an edit the way leaving the editor saves it.
    ///
    /// Returns `None` when title and content are both blank (the note should
    /// be deleted). Otherwise the title is trimmed and falls back to
    /// `placeholder`, and the content is trimmed.
    pub fn edited_for_save(&self, title: &str, content: &str, placeholder: &str) -> Option<Self> {
        if title.trim().is_empty() && content.trim().is_empty() {
            return None;
        }

        let title = match title.trim() {
            "" => placeholder.to_string(),
            trimmed => trimmed.to_string(),
        };

        Some(Note {
            title,
            content: content.trim().to_string(),
            ..self.clone()
        })
    }

    /// Plain-text rendering handed to a share target
    pub fn share_text(&self) -> String {
        format!("📝 {}\n\n{}", self.title, self.content)
    }
}
