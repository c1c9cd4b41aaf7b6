use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::types::{AtomicF32, PlaybackStatus};

/// Transport state shared between the control thread and the render callback
///
/// Every field is its own atomic. There is no cross-field consistency: the
/// callback reads each field once per buffer and a half-applied region update
/// only moves a loop boundary for one buffer.
#[derive(Debug)]
pub struct PlaybackState {
    /// Current playback position (frame index)
    pub position: AtomicU64,

    /// Whether the callback is rendering audio
    pub playing: AtomicBool,

    /// Whether playback is paused (position retained)
    pub paused: AtomicBool,

    /// Output volume (0.0 - 1.0)
    pub volume: AtomicF32,

    /// Whether to loop the region, or the whole file when no region is set
    pub loop_enabled: AtomicBool,

    /// Whether a playback region is active
    pub has_region: AtomicBool,

    /// Region start (frame index, inclusive)
    pub region_start: AtomicU64,

    /// Region end (frame index, exclusive)
    pub region_end: AtomicU64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            volume: AtomicF32::new(1.0),
            loop_enabled: AtomicBool::new(false),
            has_region: AtomicBool::new(false),
            region_start: AtomicU64::new(0),
            region_end: AtomicU64::new(0),
        }
    }

    /// Get current playback position (frame index)
    pub fn get_position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    /// Set playback position
    pub fn set_position(&self, pos: u64) {
        self.position.store(pos, Ordering::Release);
    }

    /// Store `pos` only if the position is still `expected`
    ///
    /// Used by the render callback so a seek made while a buffer renders is
    /// not overwritten. Returns false when the control thread moved it.
    pub fn commit_position(&self, expected: u64, pos: u64) -> bool {
        self.position
            .compare_exchange(expected, pos, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    /// Get volume (audio-thread safe)
    pub fn get_volume(&self) -> f32 {
        self.volume.load(Ordering::Relaxed)
    }

    /// Set volume (0.0 - 1.0)
    pub fn set_volume(&self, volume: f32) {
        let clamped = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.volume.store(clamped, Ordering::Relaxed);
    }

    pub fn is_looping(&self) -> bool {
        self.loop_enabled.load(Ordering::Relaxed)
    }

    pub fn set_looping(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Active region as (start, end), if any
    pub fn region(&self) -> Option<(u64, u64)> {
        if self.has_region.load(Ordering::Acquire) {
            Some((
                self.region_start.load(Ordering::Relaxed),
                self.region_end.load(Ordering::Relaxed),
            ))
        } else {
            None
        }
    }

    /// Store region bounds; callers validate `start < end`
    pub fn set_region(&self, start: u64, end: u64) {
        self.region_start.store(start, Ordering::Relaxed);
        self.region_end.store(end, Ordering::Relaxed);
        self.has_region.store(true, Ordering::Release);
    }

    pub fn clear_region(&self) {
        self.has_region.store(false, Ordering::Release);
    }

    /// Derived transport state
    pub fn status(&self) -> PlaybackStatus {
        if self.is_paused() {
            PlaybackStatus::Paused
        } else if self.is_playing() {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Stopped
        }
    }

    /// Return to the freshly loaded state, keeping volume and loop settings
    pub fn reset(&self) {
        self.set_playing(false);
        self.set_paused(false);
        self.set_position(0);
        self.clear_region();
        self.region_start.store(0, Ordering::Relaxed);
        self.region_end.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_clamping() {
        let state = PlaybackState::new();
        state.set_volume(1.5);
        assert_eq!(state.get_volume(), 1.0);
        state.set_volume(-0.5);
        assert_eq!(state.get_volume(), 0.0);
        state.set_volume(f32::NAN);
        assert_eq!(state.get_volume(), 0.0);
    }

    #[test]
    fn test_status_derivation() {
        let state = PlaybackState::new();
        assert_eq!(state.status(), PlaybackStatus::Stopped);

        state.set_playing(true);
        assert_eq!(state.status(), PlaybackStatus::Playing);

        state.set_playing(false);
        state.set_paused(true);
        assert_eq!(state.status(), PlaybackStatus::Paused);
    }

    #[test]
    fn test_region_set_and_clear() {
        let state = PlaybackState::new();
        assert_eq!(state.region(), None);

        state.set_region(100, 200);
        assert_eq!(state.region(), Some((100, 200)));

        state.clear_region();
        assert_eq!(state.region(), None);
    }

    #[test]
    fn test_reset_keeps_volume_and_loop() {
        let state = PlaybackState::new();
        state.set_volume(0.3);
        state.set_looping(true);
        state.set_position(42);
        state.set_region(1, 2);
        state.set_playing(true);

        state.reset();

        assert_eq!(state.get_position(), 0);
        assert_eq!(state.region(), None);
        assert_eq!(state.status(), PlaybackStatus::Stopped);
        assert_eq!(state.get_volume(), 0.3);
        assert!(state.is_looping());
    }
}
