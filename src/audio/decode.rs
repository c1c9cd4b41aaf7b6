use std::path::Path;

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};

use crate::store::SampleStore;

/// Decode a WAV file into a [`SampleStore`]
///
/// Integer PCM (8/16/24/32 bit) is scaled to -1.0..1.0; float files are taken
/// as is. Any channel count is accepted.
pub fn load_wav_file(filepath: &Path) -> Result<SampleStore> {
    let mut reader = WavReader::open(filepath)
        .with_context(|| format!("Failed to open WAV file: {}", filepath.display()))?;
    let spec = reader.spec();

    if spec.channels == 0 {
        bail!("WAV file '{}' has no channels", filepath.display());
    }

    if spec.sample_rate == 0 {
        bail!("WAV file '{}' has a sample rate of 0", filepath.display());
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to read WAV samples: {}", e))?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            if !matches!(bits, 8 | 16 | 24 | 32) {
                bail!(
                    "Unsupported bit depth: file '{}' has {} bits per sample",
                    filepath.display(),
                    bits
                );
            }

            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("Failed to read WAV samples: {}", e))?
        }
    };

    let store = SampleStore::from_interleaved(spec.sample_rate, spec.channels as usize, &samples);

    log::info!(
        "Decoded '{}': {} frames, {} Hz, {} channel(s), {:.2}s",
        filepath.display(),
        store.frame_count(),
        store.sample_rate(),
        store.channel_count(),
        store.duration()
    );

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::TempDir;

    #[test]
    fn test_load_16bit_stereo() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(-16384i16).unwrap();
        }
        writer.finalize().unwrap();

        let store = load_wav_file(&path).unwrap();
        assert_eq!(store.sample_rate(), 22050);
        assert_eq!(store.channel_count(), 2);
        assert_eq!(store.frame_count(), 100);
        assert!((store.channel(0).unwrap()[0] - 0.5).abs() < 1e-6);
        assert!((store.channel(1).unwrap()[99] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_load_float_mono() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");

        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..1600 {
            writer.write_sample(i as f32 / 1600.0).unwrap();
        }
        writer.finalize().unwrap();

        let store = load_wav_file(&path).unwrap();
        assert_eq!(store.frame_count(), 1600);
        assert!((store.duration() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_load_24bit_scaling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep.wav");

        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(1i32 << 22).unwrap();
        writer.write_sample(-(1i32 << 23)).unwrap();
        writer.finalize().unwrap();

        let store = load_wav_file(&path).unwrap();
        let samples = store.channel(0).unwrap();
        assert!((samples[0] - 0.5).abs() < 1e-6);
        assert!((samples[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_wav_file(&dir.path().join("absent.wav")).is_err());
    }
}
