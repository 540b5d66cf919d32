//! Output Device Enumeration and Selection

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// An output device as seen by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDevice {
    /// Human-readable device name
    pub name: String,

    /// Whether this is the system default output
    pub is_default: bool,

    /// Lowest and highest supported sample rate (0, 0 if querying failed)
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,

    /// Maximum supported channels
    pub max_channels: u16,
}

/// Enumerate the output devices of the default host
pub fn list_output_devices() -> EngineResult<Vec<OutputDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .map_err(|e| EngineError::DeviceOpenFailure(e.to_string()))?;

    let mut out = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else {
            continue;
        };

        let mut min_rate = u32::MAX;
        let mut max_rate = 0;
        let mut max_channels = 0;
        if let Ok(configs) = device.supported_output_configs() {
            for range in configs {
                min_rate = min_rate.min(range.min_sample_rate().0);
                max_rate = max_rate.max(range.max_sample_rate().0);
                max_channels = max_channels.max(range.channels());
            }
        }
        if max_rate == 0 {
            min_rate = 0;
        }

        out.push(OutputDevice {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            min_sample_rate: min_rate,
            max_sample_rate: max_rate,
            max_channels,
        });
    }

    if out.is_empty() {
        return Err(EngineError::NoDevicesFound);
    }
    Ok(out)
}

/// Pick the first output device whose name contains `needle`
/// (case-insensitive), or the host default when `needle` is `None`
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> EngineResult<cpal::Device> {
    let Some(needle) = needle else {
        return host
            .default_output_device()
            .ok_or(EngineError::NoDevicesFound);
    };

    let devices = host
        .output_devices()
        .map_err(|e| EngineError::DeviceOpenFailure(e.to_string()))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if matches_device_name(&name, needle) {
                debug!(device = %name, needle, "matched output device");
                return Ok(device);
            }
        }
    }

    Err(EngineError::DeviceOpenFailure(format!(
        "no output device matched '{needle}'"
    )))
}

/// Choose a stream config that can play mono audio at `sample_rate`
///
/// Prefers the fewest channels (mono first), then the best sample format.
/// Fails when no config supports the rate; resampling is not done.
pub fn pick_output_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> EngineResult<cpal::SupportedStreamConfig> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| EngineError::DeviceOpenFailure(e.to_string()))?;

    let mut best: Option<(u16, u8, cpal::SupportedStreamConfigRange)> = None;
    for range in ranges {
        let supports_rate = range.min_sample_rate().0 <= sample_rate
            && sample_rate <= range.max_sample_rate().0;
        let rank = sample_format_rank(range.sample_format());
        if !supports_rate || rank == u8::MAX {
            continue;
        }
        let candidate = (range.channels(), rank);
        let replace = match &best {
            None => true,
            Some((channels, best_rank, _)) => candidate < (*channels, *best_rank),
        };
        if replace {
            best = Some((candidate.0, candidate.1, range));
        }
    }

    best.map(|(_, _, range)| range.with_sample_rate(cpal::SampleRate(sample_rate)))
        .ok_or_else(|| {
            EngineError::DeviceOpenFailure(format!(
                "device does not support {sample_rate} Hz output"
            ))
        })
}

/// Request a fixed buffer equal to the block size when the device allows it
pub fn pick_buffer_size(
    supported: &cpal::SupportedBufferSize,
    block_frames: usize,
) -> cpal::BufferSize {
    let frames = block_frames as u32;
    match supported {
        cpal::SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => {
            cpal::BufferSize::Fixed(frames)
        }
        _ => cpal::BufferSize::Default,
    }
}

/// Sample formats the renderer can convert to; lower is better
fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I16 => 1,
        cpal::SampleFormat::U16 => 2,
        _ => u8::MAX,
    }
}

/// Case-insensitive substring match on device names
pub fn matches_device_name(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB Audio Interface", "usb"));
        assert!(matches_device_name("Built-in Output", "OUTPUT"));
        assert!(!matches_device_name("HDMI", "usb"));
    }

    #[test]
    fn test_pick_buffer_size_in_range() {
        let supported = cpal::SupportedBufferSize::Range { min: 64, max: 4096 };
        assert_eq!(
            pick_buffer_size(&supported, 1024),
            cpal::BufferSize::Fixed(1024)
        );
    }

    #[test]
    fn test_pick_buffer_size_falls_back_to_default() {
        let supported = cpal::SupportedBufferSize::Range { min: 64, max: 512 };
        assert_eq!(pick_buffer_size(&supported, 1024), cpal::BufferSize::Default);
        assert_eq!(
            pick_buffer_size(&cpal::SupportedBufferSize::Unknown, 1024),
            cpal::BufferSize::Default
        );
    }

    #[test]
    fn test_sample_format_rank() {
        assert!(sample_format_rank(cpal::SampleFormat::F32) < sample_format_rank(cpal::SampleFormat::I16));
        assert!(sample_format_rank(cpal::SampleFormat::I16) < sample_format_rank(cpal::SampleFormat::U16));
        assert_eq!(sample_format_rank(cpal::SampleFormat::I64), u8::MAX);
    }

    // Hardware-dependent tests
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_list_output_devices() {
        let devices = list_output_devices().unwrap();
        assert!(!devices.is_empty());
        assert!(devices.iter().filter(|d| d.is_default).count() <= 1);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_default_device_supports_44100() {
        let host = cpal::default_host();
        let device = pick_device(&host, None).unwrap();
        let config = pick_output_config(&device, 44100).unwrap();
        assert_eq!(config.sample_rate(), cpal::SampleRate(44100));
    }
}
