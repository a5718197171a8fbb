//! Node settings and their environment overrides.

use crate::image::providers::DEFAULT_ENDPOINT;
use crate::image::EncodeOptions;
use crate::key_store::FileKeyStore;
use std::path::PathBuf;

/// Overrides the generateContent endpoint.
pub const ENV_API_URL: &str = "NANOBANANA_API_URL";
/// Overrides the key file location.
pub const ENV_KEY_FILE: &str = "NANOBANANA_KEY_FILE";

/// Size of the gray image returned on failure.
pub const PLACEHOLDER_SIZE: (usize, usize) = (512, 512);
/// Channel value of the failure placeholder.
pub const PLACEHOLDER_GRAY: f32 = 0.2;

/// Settings for one node instance.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSettings {
    /// Full generateContent URL.
    pub endpoint: String,
    /// Where the last used API key is kept.
    pub key_file: PathBuf,
    /// How reference images are encoded.
    pub encode: EncodeOptions,
    /// `(width, height)` of the failure placeholder.
    pub placeholder_size: (usize, usize),
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            key_file: FileKeyStore::default_path(),
            encode: EncodeOptions::default(),
            placeholder_size: PLACEHOLDER_SIZE,
        }
    }
}

impl NodeSettings {
    /// Defaults with `NANOBANANA_API_URL` / `NANOBANANA_KEY_FILE` applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.endpoint = url.trim().to_string();
        }
        if let Some(path) = lookup(ENV_KEY_FILE).filter(|v| !v.trim().is_empty()) {
            self.key_file = PathBuf::from(path.trim());
        }
        self
    }

    /// Sets the endpoint URL.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    /// Sets the key file path.
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = path.into();
        self
    }
}
