use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::spectrogram::SpectrogramParameters;
use crate::types::DEVICE_BUFFER_FRAMES;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "sonotate.yaml";

/// Default log file name
pub const DEFAULT_LOG_FILE: &str = "sonotate.log";

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub spectrogram: SpectrogramParameters,

    /// Where log output goes (default: sonotate.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Playback configuration
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub volume: f32,

    #[serde(rename = "loop")]
    pub loop_enabled: bool,

    /// Device buffer size in frames (None = device default)
    pub buffer_frames: Option<u32>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            loop_enabled: false,
            buffer_frames: Some(DEVICE_BUFFER_FRAMES),
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or defaults when the default file is absent
    ///
    /// An explicitly requested file that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                Self::from_file(path)
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Effective log file path
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let volume = self.playback.volume;
        if !(0.0..=1.0).contains(&volume) {
            bail!("Playback volume must be between 0.0 and 1.0, got {}", volume);
        }

        if let Some(frames) = self.playback.buffer_frames {
            if frames == 0 {
                bail!("Playback buffer_frames must be > 0");
            }
        }

        self.spectrogram
            .validate()
            .context("Invalid spectrogram configuration")?;

        Ok(())
    }
}
