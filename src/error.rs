//! Error types for the playback and spectrogram engines

use thiserror::Error;

/// Errors raised by the playback engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// No output device available
    #[error("No audio output device found")]
    NoOutputDevice,

    /// Device refused the requested stream configuration
    #[error("Failed to get output config: {0}")]
    StreamConfig(String),

    /// Failed to build the output stream
    #[error("Failed to build audio output stream: {0}")]
    StreamBuild(String),

    /// Failed to start the output stream
    #[error("Failed to start audio output stream: {0}")]
    StreamPlay(String),

    /// Transport command issued before any audio was loaded
    #[error("No audio loaded")]
    NoAudioLoaded,

    /// Region bounds are empty or inverted
    #[error("Invalid region: start {start} must be before end {end}")]
    InvalidRegion { start: u64, end: u64 },
}

impl PlaybackError {
    /// Whether this error means the output device is unusable
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::NoOutputDevice
                | PlaybackError::StreamConfig(_)
                | PlaybackError::StreamBuild(_)
                | PlaybackError::StreamPlay(_)
        )
    }
}

/// Errors raised by the spectrogram engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpectrogramError {
    #[error("Invalid spectrogram parameters: {0}")]
    InvalidParameters(String),

    #[error("Audio too short: {samples} samples available, analysis window needs {window}")]
    AudioTooShort { samples: usize, window: usize },

    #[error("A spectrogram computation is already running")]
    Busy,

    /// Cooperative abort; never reported to observers
    #[error("Spectrogram computation cancelled")]
    Cancelled,

    #[error("Spectrogram worker is not running")]
    WorkerGone,
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;
pub type SpectrogramResult<T> = Result<T, SpectrogramError>;
