//! Short-time Fourier transform over a sample range
//!
//! Pure computation: no threads, no shared state besides the cancel flag.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use realfft::RealFftPlanner;

use crate::error::{SpectrogramError, SpectrogramResult};
use crate::spectrogram::colormap::map_value;
use crate::spectrogram::image::SpectrogramImage;
use crate::spectrogram::params::SpectrogramParameters;
use crate::spectrogram::window::coefficients;

/// Largest integer downsample factor
pub const MAX_DOWNSAMPLE_FACTOR: usize = 8;

/// Progress is reported every this many frames
pub const PROGRESS_INTERVAL_FRAMES: usize = 100;

/// Added to magnitudes before taking the log
const MAGNITUDE_EPSILON: f32 = 1e-10;

/// Integer decimation factor for the pre-pass
///
/// Only above 1 when `max_frequency` is below half the Nyquist frequency.
pub fn downsample_factor(sample_rate: u32, max_frequency: f64) -> usize {
    let nyquist = sample_rate as f64 / 2.0;
    if max_frequency <= 0.0 || max_frequency >= nyquist / 2.0 {
        return 1;
    }

    let factor = (nyquist / (max_frequency * 2.0)) as usize;
    factor.clamp(1, MAX_DOWNSAMPLE_FACTOR)
}

/// Block-average decimation; the last block may be shorter
pub fn downsample(samples: &[f32], factor: usize) -> Vec<f32> {
    if factor <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(factor)
        .map(|block| block.iter().sum::<f32>() / block.len() as f32)
        .collect()
}

/// Frame layout of one computation, in (possibly downsampled) samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisGeometry {
    /// Sample rate after the downsample pre-pass
    pub sample_rate: u32,
    pub start_sample: usize,
    pub end_sample: usize,
    pub window_size: usize,
    pub hop: usize,
    pub fft_size: usize,
    pub frame_count: usize,
    pub min_bin: usize,
    /// Exclusive
    pub max_bin: usize,
}

impl AnalysisGeometry {
    /// Lay out frames over `num_samples` samples at `sample_rate`
    ///
    /// `duration` is the length of the source audio in seconds.
    pub fn new(
        num_samples: usize,
        sample_rate: u32,
        duration: f64,
        params: &SpectrogramParameters,
    ) -> SpectrogramResult<Self> {
        if sample_rate == 0 {
            return Err(SpectrogramError::InvalidParameters(
                "sample rate is 0".to_string(),
            ));
        }
        let rate = sample_rate as f64;

        let window_size = (params.time_window * rate) as usize;
        let hop = (params.time_step * rate) as usize;
        if window_size == 0 || hop == 0 {
            return Err(SpectrogramError::InvalidParameters(format!(
                "window ({} samples) and hop ({} samples) must both be positive at {} Hz",
                window_size, hop, sample_rate
            )));
        }

        if num_samples == 0 {
            return Err(SpectrogramError::AudioTooShort {
                samples: 0,
                window: window_size,
            });
        }

        let requested = if params.window_duration > 0.0 {
            params.window_duration
        } else {
            params.max_duration
        };
        let span = requested
            .min(params.max_duration)
            .min(duration - params.start_time);

        let start_sample = ((params.start_time * rate).max(0.0) as usize).min(num_samples - 1);
        let end_sample = (((params.start_time + span) * rate).max(0.0) as usize)
            .min(num_samples)
            .max(start_sample + 1);

        let available = end_sample - start_sample;
        if available < window_size {
            return Err(SpectrogramError::AudioTooShort {
                samples: available,
                window: window_size,
            });
        }
        let frame_count = (available - window_size) / hop + 1;

        let fft_size = window_size
            .max(params.fft_size.unwrap_or(0))
            .next_power_of_two();

        let bin_count = fft_size / 2 + 1;
        let min_bin = ((params.min_frequency * fft_size as f64 / rate) as usize).min(bin_count - 1);
        let max_bin = ((params.max_frequency * fft_size as f64 / rate) as usize)
            .min(bin_count)
            .max(min_bin + 1);

        Ok(Self {
            sample_rate,
            start_sample,
            end_sample,
            window_size,
            hop,
            fft_size,
            frame_count,
            min_bin,
            max_bin,
        })
    }

    /// Number of displayed frequency bins (image height)
    pub fn display_bins(&self) -> usize {
        self.max_bin - self.min_bin
    }
}

/// Source samples covered by the requested time range
///
/// Starts at `start_time` and spans the requested duration (or
/// `max_duration`), clipped to the audio.
pub fn analysis_range(num_samples: usize, sample_rate: u32, params: &SpectrogramParameters) -> Range<usize> {
    let rate = sample_rate as f64;
    let requested = if params.window_duration > 0.0 {
        params.window_duration
    } else {
        params.max_duration
    };
    let span = requested.min(params.max_duration);

    let start = ((params.start_time * rate).max(0.0) as usize).min(num_samples);
    let end = (((params.start_time + span) * rate).max(0.0) as usize)
        .min(num_samples)
        .max(start);
    start..end
}

/// Compute a colour-mapped spectrogram of `samples`
///
/// Only the range selected by `params` is analysed. `cancel` is checked
/// before every frame. `progress` receives percentages every
/// [`PROGRESS_INTERVAL_FRAMES`] frames and 100 on completion.
pub fn compute_spectrogram(
    samples: &[f32],
    sample_rate: u32,
    params: &SpectrogramParameters,
    cancel: &AtomicBool,
    progress: impl FnMut(u8),
) -> SpectrogramResult<SpectrogramImage> {
    let range = analysis_range(samples.len(), sample_rate, params);
    compute_excerpt(&samples[range], sample_rate, params, cancel, progress)
}

/// Compute a spectrogram of an excerpt already cut by [`analysis_range`]
pub fn compute_excerpt(
    excerpt: &[f32],
    sample_rate: u32,
    params: &SpectrogramParameters,
    cancel: &AtomicBool,
    mut progress: impl FnMut(u8),
) -> SpectrogramResult<SpectrogramImage> {
    params.validate()?;

    let duration = if sample_rate > 0 {
        excerpt.len() as f64 / sample_rate as f64
    } else {
        0.0
    };

    let factor = downsample_factor(sample_rate, params.max_frequency);
    let decimated;
    let (samples, sample_rate) = if factor > 1 {
        decimated = downsample(excerpt, factor);
        (decimated.as_slice(), sample_rate / factor as u32)
    } else {
        (excerpt, sample_rate)
    };

    // The excerpt starts at the requested start time
    let local = params.with_range(0.0, params.window_duration);
    let geometry = AnalysisGeometry::new(samples.len(), sample_rate, duration, &local)?;
    let bins = geometry.display_bins();
    let frames = geometry.frame_count;

    let window = coefficients(params.window, geometry.window_size);
    let emphasis = params.pre_emphasis_factor as f32;

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(geometry.fft_size);
    let mut frame_buf = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();
    let mut scratch = fft.make_scratch_vec();

    // Frame-major dB magnitudes of the displayed bins
    let mut magnitudes = vec![0.0f32; frames * bins];
    let mut max_db = f32::NEG_INFINITY;

    for frame_idx in 0..frames {
        if cancel.load(Ordering::Relaxed) {
            return Err(SpectrogramError::Cancelled);
        }

        if frame_idx % PROGRESS_INTERVAL_FRAMES == 0 {
            progress((frame_idx * 100 / frames) as u8);
        }

        let frame_start = geometry.start_sample + frame_idx * geometry.hop;
        let frame_end = (frame_start + geometry.window_size).min(geometry.end_sample);

        frame_buf.fill(0.0);
        let filled = frame_end.saturating_sub(frame_start);
        frame_buf[..filled].copy_from_slice(&samples[frame_start..frame_end]);

        for (x, w) in frame_buf.iter_mut().zip(&window) {
            *x *= w;
        }

        if params.pre_emphasis {
            for i in (1..geometry.window_size).rev() {
                frame_buf[i] -= emphasis * frame_buf[i - 1];
            }
        }

        fft.process_with_scratch(&mut frame_buf, &mut spectrum, &mut scratch)
            .map_err(|e| SpectrogramError::InvalidParameters(format!("FFT failed: {:?}", e)))?;

        let row = &mut magnitudes[frame_idx * bins..(frame_idx + 1) * bins];
        for (out, bin) in row.iter_mut().zip(&spectrum[geometry.min_bin..geometry.max_bin]) {
            let db = 20.0 * (bin.norm() + MAGNITUDE_EPSILON).log10();
            *out = db;
            if db > max_db {
                max_db = db;
            }
        }
    }

    let dynamic_range = params.dynamic_range as f32;
    let floor = max_db - dynamic_range;

    let mut image = SpectrogramImage::new(frames, bins, params.cache_key());
    for x in 0..frames {
        for y in 0..bins {
            let normalized = ((magnitudes[x * bins + y] - floor) / dynamic_range).clamp(0.0, 1.0);
            // Low frequencies at the bottom
            image.set(x, bins - 1 - y, map_value(params.color_map, normalized));
        }
    }

    progress(100);
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrogram::image::Rgb;
    use crate::spectrogram::params::{ColorMap, WindowKind};

    fn no_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    fn tone(freq: f32, sample_rate: u32, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_short_clip_geometry() {
        // 16 kHz, 0.05 s, 30 ms window, 10 ms step
        let params = SpectrogramParameters {
            time_window: 0.03,
            time_step: 0.01,
            ..Default::default()
        };
        let geometry = AnalysisGeometry::new(800, 16000, 0.05, &params).unwrap();

        assert_eq!(geometry.window_size, 480);
        assert_eq!(geometry.hop, 160);
        assert_eq!(geometry.frame_count, 3);
        assert_eq!(geometry.fft_size, 512);

        let image = compute_spectrogram(&vec![0.1; 800], 16000, &params, &no_cancel(), |_| {}).unwrap();
        assert_eq!(image.width(), 3);
        assert_eq!(image.height(), geometry.display_bins());
        assert_eq!(image.height(), 256);
    }

    #[test]
    fn test_fft_size_is_power_of_two_covering_window() {
        for window_ms in [1.0, 2.5, 10.0, 25.0, 31.0, 64.0] {
            for fft_size in [None, Some(100), Some(4096)] {
                let params = SpectrogramParameters {
                    time_window: window_ms / 1000.0,
                    fft_size,
                    ..Default::default()
                };
                let g = AnalysisGeometry::new(44100, 44100, 1.0, &params).unwrap();
                assert!(g.fft_size.is_power_of_two());
                assert!(g.fft_size >= g.window_size);
                if let Some(min) = fft_size {
                    assert!(g.fft_size >= min);
                }
            }
        }
    }

    #[test]
    fn test_downsample_factor_bounds() {
        assert_eq!(downsample_factor(44100, 8000.0), 1);
        assert_eq!(downsample_factor(44100, 11025.0), 1);
        assert_eq!(downsample_factor(44100, 2000.0), 5);
        assert_eq!(downsample_factor(44100, 100.0), 8);
        assert_eq!(downsample_factor(16000, 8000.0), 1);

        for max in [10.0, 500.0, 1000.0, 3000.0, 5000.0, 20000.0] {
            let f = downsample_factor(48000, max);
            assert!((1..=MAX_DOWNSAMPLE_FACTOR).contains(&f));
            if max >= 12000.0 {
                assert_eq!(f, 1);
            }
        }
    }

    #[test]
    fn test_downsample_averages_blocks() {
        assert_eq!(downsample(&[1.0, 2.0, 3.0, 4.0, 5.0], 2), vec![1.5, 3.5, 5.0]);
        assert_eq!(downsample(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn test_tone_lands_in_expected_row() {
        // 1 kHz at 8 kHz with a 256-sample rectangular window: bin 32
        let params = SpectrogramParameters {
            time_window: 0.032,
            time_step: 0.016,
            window: WindowKind::Rectangular,
            max_frequency: 4000.0,
            ..Default::default()
        };
        let samples = tone(1000.0, 8000, 4000);
        let image = compute_spectrogram(&samples, 8000, &params, &no_cancel(), |_| {}).unwrap();

        assert_eq!(image.height(), 128);
        let column: Vec<Rgb> = (0..image.height()).map(|y| image.get(1, y).unwrap()).collect();
        let brightest = column
            .iter()
            .enumerate()
            .max_by_key(|(_, px)| px.r)
            .map(|(y, _)| y)
            .unwrap();
        assert_eq!(brightest, 127 - 32);
        assert!(column[brightest].r >= 250);
        assert_eq!(column[0], Rgb::new(0, 0, 0));
    }

    #[test]
    fn test_downsampled_analysis_still_covers_range() {
        let params = SpectrogramParameters {
            max_frequency: 2000.0,
            ..Default::default()
        };
        let samples = tone(500.0, 44100, 44100);
        let image = compute_spectrogram(&samples, 44100, &params, &no_cancel(), |_| {}).unwrap();

        // 44100 / 5 = 8820 Hz; 25 ms window = 220 samples -> 256-point FFT
        let g = AnalysisGeometry::new(8820, 8820, 1.0, &params).unwrap();
        assert_eq!(g.fft_size, 256);
        assert_eq!(image.width(), g.frame_count);
        assert_eq!(image.height(), g.display_bins());
    }

    #[test]
    fn test_analysis_range_is_bounded() {
        let params = SpectrogramParameters {
            start_time: 1.0,
            window_duration: 0.5,
            ..Default::default()
        };
        let g = AnalysisGeometry::new(16000 * 3, 16000, 3.0, &params).unwrap();
        assert_eq!(g.start_sample, 16000);
        assert_eq!(g.end_sample, 24000);

        // Past the end: clipped to what remains
        let late = params.with_range(2.5, 5.0);
        let g = AnalysisGeometry::new(16000 * 3, 16000, 3.0, &late).unwrap();
        assert_eq!(g.end_sample, 48000);

        // No requested duration: capped at max_duration
        let long = SpectrogramParameters::default();
        let g = AnalysisGeometry::new(16000 * 60, 16000, 60.0, &long).unwrap();
        assert_eq!(g.end_sample - g.start_sample, 16000 * 20);
    }

    #[test]
    fn test_excerpt_matches_full_buffer() {
        let params = SpectrogramParameters {
            start_time: 0.5,
            window_duration: 0.25,
            ..Default::default()
        };
        let samples = tone(700.0, 16000, 16000 * 3);

        let range = analysis_range(samples.len(), 16000, &params);
        assert_eq!(range, 8000..12000);

        let full = compute_spectrogram(&samples, 16000, &params, &no_cancel(), |_| {}).unwrap();
        let excerpt =
            compute_excerpt(&samples[range], 16000, &params, &no_cancel(), |_| {}).unwrap();
        assert_eq!(full, excerpt);
        assert_eq!(full.width(), (4000 - 400) / 80 + 1);
    }

    #[test]
    fn test_analysis_range_clips_to_audio() {
        let params = SpectrogramParameters::default();
        assert_eq!(analysis_range(16000 * 60, 16000, &params), 0..16000 * 20);
        assert_eq!(analysis_range(100, 16000, &params.with_range(1.0, 1.0)), 100..100);
    }

    #[test]
    fn test_too_short_and_invalid_sizes() {
        let params = SpectrogramParameters {
            time_window: 0.03,
            time_step: 0.01,
            ..Default::default()
        };
        assert_eq!(
            compute_spectrogram(&[0.0; 100], 16000, &params, &no_cancel(), |_| {}),
            Err(SpectrogramError::AudioTooShort { samples: 100, window: 480 })
        );
        assert!(matches!(
            compute_spectrogram(&[], 16000, &params, &no_cancel(), |_| {}),
            Err(SpectrogramError::AudioTooShort { samples: 0, .. })
        ));

        let tiny_hop = SpectrogramParameters {
            time_step: 0.00001,
            ..Default::default()
        };
        assert!(matches!(
            compute_spectrogram(&[0.0; 16000], 16000, &tiny_hop, &no_cancel(), |_| {}),
            Err(SpectrogramError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_cancelled_before_first_frame() {
        let cancel = AtomicBool::new(true);
        let result = compute_spectrogram(
            &[0.0; 16000],
            16000,
            &SpectrogramParameters::default(),
            &cancel,
            |_| {},
        );
        assert_eq!(result, Err(SpectrogramError::Cancelled));
    }

    #[test]
    fn test_progress_reports() {
        // 1024 Hz, 64-sample window, 2-sample hop: 481 frames
        let params = SpectrogramParameters {
            time_window: 0.0625,
            time_step: 0.001953125,
            ..Default::default()
        };
        let mut reports = Vec::new();
        let image = compute_spectrogram(&vec![0.2; 1024], 1024, &params, &no_cancel(), |p| {
            reports.push(p)
        })
        .unwrap();

        assert_eq!(image.width(), 481);
        assert_eq!(reports, vec![0, 20, 41, 62, 83, 100]);
    }

    #[test]
    fn test_deterministic_output() {
        let params = SpectrogramParameters {
            color_map: ColorMap::Viridis,
            pre_emphasis: true,
            ..Default::default()
        };
        let samples = tone(300.0, 16000, 8000);
        let a = compute_spectrogram(&samples, 16000, &params, &no_cancel(), |_| {}).unwrap();
        let b = compute_spectrogram(&samples, 16000, &params, &no_cancel(), |_| {}).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.params_key(), params.cache_key());
    }
}
