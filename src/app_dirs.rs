use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("vocab-drill");
            Some(state_dir.join("vocab.db"))
        } else {
            ProjectDirs::from("", "", "vocab-drill")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("vocab.db"))
        }
    }

    /// Where rendered papers go unless the config says otherwise
    pub fn papers_dir() -> PathBuf {
        ProjectDirs::from("", "", "vocab-drill")
            .map(|proj_dirs| proj_dirs.data_dir().join("papers"))
            .unwrap_or_else(|| PathBuf::from("papers"))
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", "vocab-drill")
            .map(|proj_dirs| proj_dirs.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("vocab_drill_config.json"))
    }
}
