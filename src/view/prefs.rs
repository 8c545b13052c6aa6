//! Font-size preference persistence.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Key under which the preference is stored.
pub const FONT_SIZE_KEY: &str = "fontSize";

/// Font size used when nothing has been stored.
pub const DEFAULT_FONT_SIZE: u32 = 16;

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Failed to write preferences to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Get/set of the single font-size preference.
pub trait PreferenceStore {
    /// Stored font size; `None` when absent.
    fn font_size(&self) -> Option<u32>;

    fn set_font_size(&mut self, size: u32) -> Result<(), PreferenceError>;

    fn font_size_or_default(&self) -> u32 {
        self.font_size().unwrap_or(DEFAULT_FONT_SIZE)
    }
}

/// Preferences kept in a small JSON object on disk.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[allow(dead_code)] // Accessor for embedders
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing or unreadable file is an empty object.
    fn read(&self) -> Map<String, Value> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str::<Value>(&content).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default()
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn font_size(&self) -> Option<u32> {
        self.read()
            .get(FONT_SIZE_KEY)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
    }

    fn set_font_size(&mut self, size: u32) -> Result<(), PreferenceError> {
        let mut prefs = self.read();
        prefs.insert(FONT_SIZE_KEY.to_string(), Value::from(size));

        let content = serde_json::to_string_pretty(&Value::Object(prefs))?;
        std::fs::write(&self.path, content).map_err(|source| PreferenceError::Write {
            path: self.path.display().to_string(),
            source,
        })?;

        debug!("Stored font size {} in {}", size, self.path.display());
        Ok(())
    }
}
