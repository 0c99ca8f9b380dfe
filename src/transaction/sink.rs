//! Persistence sinks

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

use super::snapshot::SettingsSnapshot;
use crate::error::SettingsError;

/// Errors reported by a sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(String),
}

impl From<SinkError> for SettingsError {
    fn from(err: SinkError) -> Self {
        SettingsError::Persistence(err.to_string())
    }
}

/// Durable storage for settings snapshots.
///
/// `save` either stores the whole snapshot or fails without a partial
/// write becoming visible to `load`.
pub trait SettingsSink: Send + Sync {
    fn save(&self, snapshot: &SettingsSnapshot) -> Result<(), SinkError>;

    /// Last stored snapshot; `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<SettingsSnapshot>, SinkError>;
}

/// JSON file written with write-then-rename
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    pretty: bool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: true,
        }
    }

    /// Write compact JSON instead of indented JSON.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsSink for FileSink {
    fn save(&self, snapshot: &SettingsSnapshot) -> Result<(), SinkError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(snapshot)?
        } else {
            serde_json::to_string(snapshot)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write to temp file first
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &json)?;

        // Atomic rename
        fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), bytes = json.len(), "settings written");
        Ok(())
    }

    fn load(&self) -> Result<Option<SettingsSnapshot>, SinkError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

/// In-process sink with failure injection
#[derive(Debug, Default)]
pub struct MemorySink {
    stored: Mutex<Option<SettingsSnapshot>>,
    fail_next: AtomicBool,
    saves: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that starts out holding `snapshot`.
    pub fn with_snapshot(snapshot: SettingsSnapshot) -> Self {
        Self {
            stored: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Make the next `save` fail without storing anything.
    pub fn fail_next_save(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Currently stored snapshot.
    pub fn stored(&self) -> Option<SettingsSnapshot> {
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SettingsSink for MemorySink {
    fn save(&self, snapshot: &SettingsSnapshot) -> Result<(), SinkError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SinkError::Rejected("injected save failure".to_string()));
        }
        *self
            .stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self) -> Result<Option<SettingsSnapshot>, SinkError> {
        Ok(self.stored())
    }
}
