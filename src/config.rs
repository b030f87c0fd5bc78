//! Workspace configuration.
//!
//! Settings live in `attendance.config.json` next to the class index. Every
//! field has a default so a missing or partial file still yields a usable
//! configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "attendance.config.json";

/// What happens to existing counters when a roster is imported again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ReimportStatsPolicy {
    /// Students whose id survives the re-import keep their counts.
    #[default]
    Preserve,
    /// Every statistics row starts again from zero.
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnouncementConfig {
    pub enabled: bool,
    /// Speech program to launch for each announcement.
    pub program: String,
    /// Arguments; `{text}` is replaced by the student name.
    pub args: Vec<String>,
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "espeak".to_string(),
            // 150 words per minute at 80% amplitude.
            args: vec![
                "-s".to_string(),
                "150".to_string(),
                "-a".to_string(),
                "80".to_string(),
                "{text}".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub announcements: AnnouncementConfig,
    pub stats_on_reimport: ReimportStatsPolicy,
    pub backup_dir_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            announcements: AnnouncementConfig::default(),
            stats_on_reimport: ReimportStatsPolicy::default(),
            backup_dir_name: "deleted_classes".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults rooted at `data_dir`, with announcements switched off.
    pub fn quiet(data_dir: impl Into<PathBuf>) -> Self {
        let mut cfg = Self {
            data_dir: data_dir.into(),
            ..Self::default()
        };
        cfg.announcements.enabled = false;
        cfg
    }

    /// Load the workspace config, falling back to defaults when the file does
    /// not exist.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut cfg = if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
            serde_json::from_str::<EngineConfig>(&text)
                .with_context(|| format!("invalid config {}", path.to_string_lossy()))?
        } else {
            EngineConfig::default()
        };
        cfg.data_dir = data_dir.to_path_buf();
        Ok(cfg)
    }

    pub fn backup_root(&self) -> PathBuf {
        self.data_dir.join(&self.backup_dir_name)
    }
}
