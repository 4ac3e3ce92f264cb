//! Durable pagination cursor storage.
//!
//! The cursor is the only piece of state the engine persists outside the
//! logs. It is written *after* a cycle's appends succeed, which is what makes
//! crash-and-retry idempotent: a crash before the write re-fetches the same
//! page, and dedup discards what already landed.
//!
//! The store is a trait so the engine doesn't care where the cursor lives; a
//! database row or key-value entry slots in without touching engine logic.

use crate::error::Result;
use std::fs;
use std::path::PathBuf;

/// Read/write access to the persisted pagination cursor.
pub trait CursorStore {
    /// Load the last committed cursor. `None` means "start from the
    /// beginning" (subject to the configured min-block floor).
    fn load(&self) -> Result<Option<String>>;

    /// Durably replace the cursor.
    fn store(&self, cursor: &str) -> Result<()>;
}

/// File-backed cursor store: one opaque line in a small file.
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    /// Create a store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, cursor: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // Stage and rename so a crash never leaves a torn cursor.
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, cursor)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let store = FileCursorStore::new(tmp.path().join("cursor"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_store_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = FileCursorStore::new(tmp.path().join("cursor"));

        store.store("b3Bhc3VyZQ==").unwrap();
        assert_eq!(store.load().unwrap(), Some("b3Bhc3VyZQ==".to_string()));

        store.store("next").unwrap();
        assert_eq!(store.load().unwrap(), Some("next".to_string()));
    }

    #[test]
    fn test_load_trims_whitespace() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cursor");
        fs::write(&path, "  abc\n").unwrap();

        let store = FileCursorStore::new(&path);
        assert_eq!(store.load().unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn test_load_empty_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cursor");
        fs::write(&path, "\n").unwrap();

        let store = FileCursorStore::new(&path);
        assert!(store.load().unwrap().is_none());
    }
}
