//! Persisted review-ask state.

use std::path::{Path, PathBuf};

use studio_core::FeedbackGate;

/// JSON file holding the [`FeedbackGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewAskFile {
    path: PathBuf,
}

impl ReviewAskFile {
    /// Wrap a file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the gate, falling back to a fresh one if the file is missing or
    /// unreadable.
    #[must_use]
    pub fn load(&self) -> FeedbackGate {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return FeedbackGate::new(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}", self.path.display());
                return FeedbackGate::new();
            }
        };
        FeedbackGate::from_json(&contents).unwrap_or_else(|e| {
            tracing::warn!("Ignoring corrupt {}: {e}", self.path.display());
            FeedbackGate::new()
        })
    }

    /// Write the gate. Failures are logged, not returned.
    pub fn save(&self, gate: &FeedbackGate) {
        let json = match gate.to_json() {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("Failed to serialize review-ask state: {e}");
                return;
            }
        };
        if let Some(dir) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!("Failed to create {}: {e}", dir.display());
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::warn!(
                "Failed to persist review-ask state to {}: {e}",
                self.path.display()
            );
        }
    }
}
