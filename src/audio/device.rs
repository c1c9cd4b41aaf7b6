use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, StreamConfig};

use crate::error::{PlaybackError, PlaybackResult};

/// Audio device information
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub max_output_channels: usize,
    pub sample_rate: u32,
}

/// Get the default audio host
pub fn get_host() -> Host {
    cpal::default_host()
}

/// Get the default output device
pub fn get_default_output_device() -> PlaybackResult<Device> {
    get_host()
        .default_output_device()
        .ok_or(PlaybackError::NoOutputDevice)
}

/// Human readable device name
pub fn device_name(device: &Device) -> String {
    device
        .description()
        .map(|desc| desc.name().to_string())
        .unwrap_or_else(|_| "Unknown".to_string())
}

/// List all available output devices
pub fn list_output_devices() -> anyhow::Result<Vec<AudioDeviceInfo>> {
    let host = get_host();
    let default_name = host.default_output_device().map(|d| device_name(&d));

    let mut devices = Vec::new();

    for device in host.output_devices()? {
        let name = device_name(&device);
        let is_default = Some(&name) == default_name.as_ref();

        let (max_channels, sample_rate) = match device.default_output_config() {
            Ok(cfg) => (cfg.channels() as usize, cfg.sample_rate()),
            Err(_) => (0, 0),
        };

        devices.push(AudioDeviceInfo {
            name,
            is_default,
            max_output_channels: max_channels,
            sample_rate,
        });
    }

    Ok(devices)
}

/// Check that the device can play `channels` at `sample_rate`
///
/// Falls back to accepting the request when the device cannot enumerate its
/// configurations; the stream build reports the real failure then.
pub fn check_output_support(device: &Device, channels: u16, sample_rate: u32) -> PlaybackResult<()> {
    let configs = match device.supported_output_configs() {
        Ok(configs) => configs,
        Err(_) => return Ok(()),
    };

    let supported = configs.into_iter().any(|range| {
        range.channels() == channels
            && range.min_sample_rate() <= sample_rate
            && sample_rate <= range.max_sample_rate()
    });

    if supported {
        Ok(())
    } else {
        Err(PlaybackError::StreamConfig(format!(
            "device '{}' does not support {} channel(s) at {} Hz",
            device_name(device),
            channels,
            sample_rate
        )))
    }
}

/// Stream configuration sized to the loaded audio
pub fn output_stream_config(channels: u16, sample_rate: u32, buffer_frames: Option<u32>) -> StreamConfig {
    StreamConfig {
        channels,
        sample_rate,
        buffer_size: match buffer_frames {
            Some(frames) => cpal::BufferSize::Fixed(frames),
            None => cpal::BufferSize::Default,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // This test may fail on systems without audio devices
        if let Ok(devices) = list_output_devices() {
            println!("Found {} output devices", devices.len());
            for device in devices {
                println!(
                    "  - {} ({}ch @ {}Hz) {}",
                    device.name,
                    device.max_output_channels,
                    device.sample_rate,
                    if device.is_default { "[DEFAULT]" } else { "" }
                );
            }
        }
    }

    #[test]
    fn test_stream_config_buffer_size() {
        let fixed = output_stream_config(2, 44100, Some(256));
        assert_eq!(fixed.channels, 2);
        assert_eq!(fixed.sample_rate, 44100);
        assert!(matches!(fixed.buffer_size, cpal::BufferSize::Fixed(256)));

        let default = output_stream_config(1, 16000, None);
        assert!(matches!(default.buffer_size, cpal::BufferSize::Default));
    }
}
