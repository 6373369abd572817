//! Write-once, delete-once settings snapshot shared by all workers.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::core::params::ProcessingSettings;
use crate::error::Result;
use crate::types::BatchMode;

/// Everything a worker needs besides the input path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub settings: ProcessingSettings,
    pub mode: BatchMode,
    /// Destination for `Individual` mode.
    pub output_dir: Option<PathBuf>,
}

impl BatchSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Serialized snapshot on disk. Deleted by [`SettingsSnapshot::release`], or
/// on drop if the executor unwinds early.
#[derive(Debug)]
pub struct SettingsSnapshot {
    path: PathBuf,
    file: Option<TempPath>,
}

impl SettingsSnapshot {
    pub fn create(snapshot: &BatchSnapshot) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("prodshot-settings-")
            .suffix(".json")
            .tempfile()?;
        let (file, temp_path) = file.into_parts();
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
        let path = temp_path.to_path_buf();
        debug!("Settings snapshot written to {:?}", path);
        Ok(Self {
            path,
            file: Some(temp_path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the snapshot. Consumes self so it can only happen once.
    pub fn release(mut self) {
        if let Some(temp) = self.file.take() {
            match temp.close() {
                Ok(()) => debug!("Settings snapshot {:?} removed", self.path),
                Err(e) => warn!("Failed to remove settings snapshot {:?}: {}", self.path, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BatchSnapshot {
        let mut settings = ProcessingSettings::default();
        settings.whitening.enabled = true;
        BatchSnapshot {
            settings,
            mode: BatchMode::Collage,
            output_dir: None,
        }
    }

    #[test]
    fn snapshot_is_readable_until_released() {
        let snap = SettingsSnapshot::create(&sample()).unwrap();
        let path = snap.path().to_path_buf();
        assert_eq!(BatchSnapshot::load(&path).unwrap(), sample());
        snap.release();
        assert!(!path.exists());
    }

    #[test]
    fn dropping_removes_file() {
        let snap = SettingsSnapshot::create(&sample()).unwrap();
        let path = snap.path().to_path_buf();
        drop(snap);
        assert!(!path.exists());
    }
}
