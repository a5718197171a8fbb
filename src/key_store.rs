//! API key resolution and the on-disk key cache.

use crate::report::RunLog;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the saved key, next to the installed node.
pub const KEY_FILE_NAME: &str = "api_key.txt";

/// Keys must be longer than this many characters to be accepted.
const MIN_KEY_CHARS: usize = 10;

/// Storage for the last used API key. Last write wins; there is no expiry.
pub trait KeyStore: Send + Sync {
    /// Loads the saved key, if any.
    fn load(&self) -> io::Result<Option<String>>;

    /// Saves `key`, replacing any previous value.
    fn save(&self, key: &str) -> io::Result<()>;
}

/// Plain-text key file.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    /// Stores the key at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `api_key.txt` beside the running executable,
    /// or in the working directory when that cannot be determined.
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(KEY_FILE_NAME)
    }

    /// Path of the key file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileKeyStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, key: &str) -> io::Result<()> {
        std::fs::write(&self.path, key)
    }
}

/// In-memory key store.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    key: Mutex<Option<String>>,
}

impl MemoryKeyStore {
    /// Creates a store holding `key`.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Mutex::new(Some(key.into())),
        }
    }

    /// Returns the stored key.
    pub fn get(&self) -> Option<String> {
        self.key.lock().ok().and_then(|guard| guard.clone())
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.get())
    }

    fn save(&self, key: &str) -> io::Result<()> {
        let mut guard = self
            .key
            .lock()
            .map_err(|_| io::Error::other("key store lock poisoned"))?;
        *guard = Some(key.to_string());
        Ok(())
    }
}

fn is_plausible_key(key: &str) -> bool {
    key.chars().count() > MIN_KEY_CHARS
}

/// Picks the API key for this invocation.
///
/// A plausible `input` is saved and used; otherwise the saved key is tried.
/// Store failures are logged and never fatal. Returns `None` when no usable
/// key exists.
pub fn resolve_api_key(input: &str, store: &dyn KeyStore, log: &mut RunLog) -> Option<String> {
    if is_plausible_key(input) {
        log.push("Using the API key entered in the node");
        match store.save(input) {
            Ok(()) => log.push("Saved the API key to the node directory"),
            Err(e) => log.push_error(format!("Failed to save the API key: {e}")),
        }
        return Some(input.to_string());
    }

    match store.load() {
        Ok(Some(saved)) => {
            let saved = saved.trim();
            if is_plausible_key(saved) {
                log.push("Using the saved API key");
                return Some(saved.to_string());
            }
        }
        Ok(None) => {}
        Err(e) => log.push_error(format!("Failed to read the saved API key: {e}")),
    }

    log.push_error("Warning: no valid API key provided");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "sk-0123456789abcdef";

    #[test]
    fn test_input_key_is_saved_and_used() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join(KEY_FILE_NAME));
        let mut log = RunLog::new();

        assert_eq!(resolve_api_key(KEY, &store, &mut log).as_deref(), Some(KEY));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), KEY);
        assert!(log.joined().contains("Saved the API key"));
    }

    #[test]
    fn test_input_key_overwrites_previous() {
        let store = MemoryKeyStore::with_key("sk-old-key-000000");
        let mut log = RunLog::new();
        resolve_api_key(KEY, &store, &mut log);
        assert_eq!(store.get().as_deref(), Some(KEY));
    }

    #[test]
    fn test_short_input_falls_back_to_saved_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEY_FILE_NAME);
        std::fs::write(&path, format!("  {KEY}\n")).unwrap();
        let store = FileKeyStore::new(&path);
        let mut log = RunLog::new();

        assert_eq!(
            resolve_api_key("short", &store, &mut log).as_deref(),
            Some(KEY)
        );
        // a rejected input must not clobber the saved key
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("  {KEY}\n"));
        assert!(log.joined().contains("Using the saved API key"));
    }

    #[test]
    fn test_exactly_ten_chars_is_rejected() {
        let store = MemoryKeyStore::default();
        let mut log = RunLog::new();
        assert_eq!(resolve_api_key("0123456789", &store, &mut log), None);
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_no_input_and_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join(KEY_FILE_NAME));
        let mut log = RunLog::new();

        assert_eq!(resolve_api_key("", &store, &mut log), None);
        assert!(log.joined().contains("no valid API key"));
    }

    #[test]
    fn test_saved_key_too_short_is_ignored() {
        let store = MemoryKeyStore::with_key("tiny");
        let mut log = RunLog::new();
        assert_eq!(resolve_api_key("", &store, &mut log), None);
    }

    #[test]
    fn test_unreadable_store_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be read as a file
        let store = FileKeyStore::new(dir.path());
        let mut log = RunLog::new();

        assert_eq!(resolve_api_key("", &store, &mut log), None);
        assert!(log.joined().contains("Failed to read the saved API key"));
    }

    #[test]
    fn test_save_failure_still_uses_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("missing").join(KEY_FILE_NAME));
        let mut log = RunLog::new();

        assert_eq!(resolve_api_key(KEY, &store, &mut log).as_deref(), Some(KEY));
        assert!(log.joined().contains("Failed to save the API key"));
    }
}
