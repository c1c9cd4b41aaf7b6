//! Playback and spectrogram engines for audio annotation
//!
//! [`audio::PlaybackEngine`] streams a [`store::SampleStore`] to the output
//! device from a real-time callback. [`spectrogram::SpectrogramEngine`] turns
//! the same store into a colour-mapped STFT image on a worker thread.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod spectrogram;
pub mod store;
pub mod types;

pub use error::{PlaybackError, SpectrogramError};
pub use store::SampleStore;
