use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Frames per hardware buffer requested from the output device (low latency)
pub const DEVICE_BUFFER_FRAMES: u32 = 256;

/// Interval between position notifications (~20 Hz)
pub const UI_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Capacity of the render -> notifier event queue
pub const RENDER_EVENT_CAPACITY: usize = 64;

/// Longest stretch of audio a single spectrogram covers (seconds)
pub const MAX_ANALYSIS_SECONDS: f64 = 20.0;

/// Atomic float wrapper for real-time audio thread safety
#[derive(Debug)]
pub struct AtomicF32 {
    storage: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            storage: AtomicU32::new(value.to_bits()),
        }
    }

    pub fn load(&self, ordering: Ordering) -> f32 {
        f32::from_bits(self.storage.load(ordering))
    }

    pub fn store(&self, value: f32, ordering: Ordering) {
        self.storage.store(value.to_bits(), ordering);
    }
}

/// Transport state as seen by observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
        }
    }
}

/// Convert a frame count to seconds at the given rate
pub fn frames_to_seconds(frames: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    frames as f64 / sample_rate as f64
}

/// Convert seconds to a frame index at the given rate (negative clamps to 0)
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> u64 {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f32_roundtrip() {
        let value = AtomicF32::new(0.25);
        assert_eq!(value.load(Ordering::Relaxed), 0.25);
        value.store(-1.5, Ordering::Relaxed);
        assert_eq!(value.load(Ordering::Relaxed), -1.5);
    }

    #[test]
    fn test_frame_conversions() {
        assert_eq!(seconds_to_frames(0.5, 44100), 22050);
        assert_eq!(seconds_to_frames(-3.0, 44100), 0);
        assert!((frames_to_seconds(88200, 44100) - 2.0).abs() < 1e-9);
        assert_eq!(frames_to_seconds(100, 0), 0.0);
    }
}
