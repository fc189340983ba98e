//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::file::File;

/// Where the console keeps its settings and logs
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Shell line history
    pub fn history_file(&self) -> PathBuf {
        self.base_dir.join("history.txt")
    }
}

impl Default for StorageLayout {
    /// `~/.updater-console`, or the working directory when there is no home
    fn default() -> Self {
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".updater-console");
        Self::new(base_dir)
    }
}
