use crate::error::CrmResult;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default location of the persisted token, relative to the working directory
pub const DEFAULT_TOKEN_FILE: &str = "AccessToken.txt";

/// Persistence for the raw token produced by the authenticator.
///
/// The stored form is opaque. An empty value means "no token".
pub trait TokenStore: Send + Sync {
    /// Load the persisted token, `None` when nothing usable is stored
    fn load(&self) -> CrmResult<Option<String>>;

    /// Overwrite the persisted token
    fn save(&self, raw: &str) -> CrmResult<()>;

    /// Forget the persisted token
    fn clear(&self) -> CrmResult<()> {
        self.save("")
    }
}

/// Token persisted in a plain text file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> CrmResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, raw: &str) -> CrmResult<()> {
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// Process-local token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    raw: Mutex<String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token
    pub fn with_token(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(raw.into()),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> CrmResult<Option<String>> {
        let raw = self.raw.lock().unwrap_or_else(|e| e.into_inner());
        if raw.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(raw.clone()))
        }
    }

    fn save(&self, raw: &str) -> CrmResult<()> {
        let mut stored = self.raw.lock().unwrap_or_else(|e| e.into_inner());
        *stored = raw.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save("{\"access_token\":\"abc\"}").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("{\"access_token\":\"abc\"}"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("AccessToken.txt"));

        // Missing file means no token
        assert_eq!(store.load().unwrap(), None);

        store.save("opaque-token").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("opaque-token"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        assert!(store.path().exists(), "clear writes an empty file");
    }

    #[test]
    fn test_file_store_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token"));

        store.save("first-token-that-is-longer").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_default_file_store_path() {
        assert_eq!(FileTokenStore::default().path(), Path::new(DEFAULT_TOKEN_FILE));
    }
}
