use crate::auth::token::Token;
use log::{info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Persists the OAuth token at a fixed path as JSON
///
/// Corrupted files are deleted and treated as absent, forcing a full
/// re-authorization instead of crashing the loader.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted token, if a readable one exists
    pub fn load(&self) -> Option<Token> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Token>(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(
                    "Corrupted token file {} ({}), deleting it",
                    self.path.display(),
                    e
                );
                if let Err(e) = fs::remove_file(&self.path) {
                    warn!("Failed to delete corrupted token file: {}", e);
                }
                None
            }
        }
    }

    /// Persist a token, replacing any previous one
    pub fn save(&self, token: &Token) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)?;
        info!("Persisted token to {}", self.path.display());
        Ok(())
    }

    /// Delete the persisted token, ignoring a missing file
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("autotrader-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_round_trip() {
        let path = temp_path("round-trip.json");
        let store = TokenStore::new(&path);
        let token = Token::new("acc".to_string(), Some("ref".to_string()), 99);

        store.save(&token).unwrap();
        assert_eq!(store.load(), Some(token));

        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        let store = TokenStore::new(temp_path("never-created.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupted_file_deleted() {
        let path = temp_path("corrupt.json");
        fs::write(&path, "{not json at all").unwrap();

        let store = TokenStore::new(&path);
        assert!(store.load().is_none());
        // The corrupted file must be gone so the next run re-authorizes
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_missing_is_ok() {
        let store = TokenStore::new(temp_path("clear-missing.json"));
        assert!(store.clear().is_ok());
    }
}
