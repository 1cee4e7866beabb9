use crate::context::ControlMode;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub control_mode: ControlMode,
    pub language: String,
    /// Starting interval between snake moves
    pub speed_ms: u64,
    /// Minimum engine confidence for a transcript to count
    pub confidence_threshold: f32,
    /// Confidence the console engine attaches to typed transcripts
    pub voice_confidence: f32,
    /// Silence after which the console engine ends its session
    pub silence_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_mode: ControlMode::Keyboard,
            language: "en-US".to_string(),
            speed_ms: 200,
            confidence_threshold: crate::classifier::CONFIDENCE_THRESHOLD,
            voice_confidence: 0.9,
            silence_secs: 8,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "voxsnake") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("voxsnake_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|err| {
                tracing::warn!(%err, path = %self.path.display(), "ignoring unreadable config");
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
