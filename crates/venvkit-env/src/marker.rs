//! Completion marker: JSON record written into the env after a successful run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ProvisionError;
use crate::layout::VenvLayout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    /// Interpreter that created the environment.
    pub interpreter: PathBuf,
    pub requirements_file: PathBuf,
    pub requirements_sha256: String,
    pub requirements_count: usize,
    pub completed_at: DateTime<Utc>,
    pub tool_version: String,
}

impl CompletionMarker {
    pub fn new(interpreter: PathBuf, requirements_file: PathBuf, sha256: String, count: usize) -> Self {
        Self {
            interpreter,
            requirements_file,
            requirements_sha256: sha256,
            requirements_count: count,
            completed_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// `None` when the marker is missing or not valid JSON (older or hand-made markers).
    pub fn read(layout: &VenvLayout) -> Option<Self> {
        let content = std::fs::read_to_string(layout.marker_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn write(&self, layout: &VenvLayout) -> Result<(), ProvisionError> {
        let path = layout.marker_path();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ProvisionError::path(&path, format!("cannot serialize marker: {}", e)))?;
        std::fs::write(&path, json).map_err(|e| ProvisionError::path(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::EnvState;

    #[test]
    fn test_write_then_read_marks_complete() {
        let dir = tempfile::tempdir().unwrap();
        let layout = VenvLayout::new(dir.path().join("venv"));
        std::fs::create_dir_all(layout.root()).unwrap();

        let marker = CompletionMarker::new(
            PathBuf::from("/usr/bin/python3"),
            PathBuf::from("requirements.txt"),
            "ab".repeat(32),
            2,
        );
        marker.write(&layout).unwrap();
        assert_eq!(layout.state(), EnvState::Complete);
        assert_eq!(CompletionMarker::read(&layout), Some(marker));
    }

    #[test]
    fn test_legacy_empty_marker_still_complete() {
        let dir = tempfile::tempdir().unwrap();
        let layout = VenvLayout::new(dir.path());
        std::fs::write(layout.marker_path(), "").unwrap();
        assert_eq!(layout.state(), EnvState::Complete);
        assert_eq!(CompletionMarker::read(&layout), None);
    }

    #[test]
    fn test_write_into_missing_env_fails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = VenvLayout::new(dir.path().join("gone"));
        let marker = CompletionMarker::new(PathBuf::new(), PathBuf::new(), String::new(), 0);
        assert!(matches!(
            marker.write(&layout),
            Err(ProvisionError::PathUnavailable { .. })
        ));
    }
}
