use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::frames_to_seconds;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Decoded audio, one sample vector per channel
///
/// Read-only once built. Both engines hold it behind an `Arc`; a different
/// file means a new store, never an in-place mutation.
#[derive(Debug)]
pub struct SampleStore {
    id: u64,
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl SampleStore {
    /// Build a store from per-channel sample vectors
    ///
    /// Channels of unequal length are truncated to the shortest one.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.truncate(frames);
        }

        Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            sample_rate,
            channels,
        }
    }

    /// Build a store from interleaved samples (frame-major)
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, interleaved: &[f32]) -> Self {
        if channel_count == 0 {
            return Self::new(sample_rate, Vec::new());
        }

        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (ch, sample) in frame.iter().enumerate() {
                channels[ch].push(*sample);
            }
        }

        Self::new(sample_rate, channels)
    }

    /// Identity used to key caches; unique per store within the process
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        frames_to_seconds(self.frame_count() as u64, self.sample_rate)
    }

    /// Samples of a single channel
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Average of all channels
    pub fn mixdown(&self) -> Vec<f32> {
        self.mixdown_range(0..self.frame_count())
    }

    /// Average of all channels over `range` (frames), clipped to the store
    pub fn mixdown_range(&self, range: Range<usize>) -> Vec<f32> {
        let end = range.end.min(self.frame_count());
        let start = range.start.min(end);

        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0][start..end].to_vec(),
            n => {
                let scale = 1.0 / n as f32;
                (start..end)
                    .map(|i| self.channels.iter().map(|ch| ch[i]).sum::<f32>() * scale)
                    .collect()
            }
        }
    }

    /// Largest absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}
