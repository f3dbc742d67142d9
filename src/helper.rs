use std::{fs, io::Write, path::Path};

use log::{debug, error, trace};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::{Note, NotesError, Result};

/// Case-insensitive substring match against title or content.
///
/// A blank query matches every note.
pub fn matches_query(note: &Note, query: &str) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    note.title.to_lowercase().contains(&needle) || note.content.to_lowercase().contains(&needle)
}

/// Writes `value` as pretty JSON to `path`, replacing the file atomically
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    // Ensure the parent directory exists
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    if !dir.exists() {
        debug!("Creating parent directory: {}", dir.display());
        fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create directory {}: {}", dir.display(), e);
            NotesError::DirectoryError {
                path: dir.to_path_buf(),
            }
        })?;
    }

    // Create a temporary file in the same directory (for atomic operation)
    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        error!("Failed to create temporary file: {}", e);
        NotesError::Io(e)
    })?;

    trace!("Serializing {} to JSON", path.display());
    let json = serde_json::to_string_pretty(value)?;

    temp_file.write_all(json.as_bytes()).map_err(|e| {
        error!("Failed to write to temporary file: {}", e);
        NotesError::Io(e)
    })?;
    temp_file.flush()?;

    temp_file.persist(path).map_err(|e| {
        error!("Failed to persist file {}: {}", path.display(), e.error);
        NotesError::Io(e.error)
    })?;

    Ok(())
}

/// Reads a JSON file, returning `None` when it does not exist
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        trace!("No file at {}", path.display());
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open {}: {}", path.display(), e);
        NotesError::Io(e)
    })?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Helper method to load a single note from file
pub fn load_note_from_file(path: &Path) -> Result<Note> {
    debug!("Loading note from file: {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open note file {}: {}", path.display(), e);
        NotesError::Io(e)
    })?;

    let note: Note = serde_json::from_str(&content)?;

    // Validate note
    if note.id <= 0 {
        let error_mgs = format!("Note from {} has no valid ID", path.display());
        error!("{}", error_mgs);
        return Err(NotesError::InvalidFormat { message: error_mgs });
    }

    trace!("Successfully loaded note: {}", note.id);
    Ok(note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_matches_query_title_or_content() {
        let note = Note {
            title: "Grocery".to_string(),
            content: "milk".to_string(),
            ..Note::new("a@b.c")
        };
        assert!(matches_query(&note, "grocery"));
        assert!(matches_query(&note, "MILK"));
        assert!(matches_query(&note, "roc"));
        assert!(matches_query(&note, "   "));
        assert!(!matches_query(&note, "bread"));
    }

    #[test]
    fn test_write_and_read_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("value.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        let back: Option<Vec<i32>> = read_json_file(&path).unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        let missing: Option<Vec<i32>> = read_json_file(&dir.path().join("nope.json")).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_load_note_rejects_missing_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0.json");
        write_json_atomic(&path, &Note::new("a@b.c")).unwrap();
        assert!(matches!(
            load_note_from_file(&path),
            Err(NotesError::InvalidFormat { .. })
        ));
    }
}
