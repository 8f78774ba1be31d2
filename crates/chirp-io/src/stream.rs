//! Output device enumeration via cpal.

use crate::Result;
use crate::backend::{FALLBACK_CHANNELS, FALLBACK_SAMPLE_RATE};
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports audio input.
    pub is_input: bool,
    /// Whether the device supports audio output.
    pub is_output: bool,
    /// Default output sample rate in Hz.
    pub default_sample_rate: u32,
    /// Default output channel count.
    pub default_channels: u16,
}

fn describe_output(device: &Device) -> Option<AudioDevice> {
    let name = device_name(device).ok()?;
    let (default_sample_rate, default_channels) = device
        .default_output_config()
        .map(|c| (c.sample_rate(), c.channels()))
        .unwrap_or((FALLBACK_SAMPLE_RATE, FALLBACK_CHANNELS));

    Some(AudioDevice {
        name,
        is_input: device.default_input_config().is_ok(),
        is_output: true,
        default_sample_rate,
        default_channels,
    })
}

/// List every output device of the default host.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let mut devices: Vec<AudioDevice> = Vec::new();

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Some(info) = describe_output(&device) {
                // Some hosts list the same device twice
                if devices.iter().any(|d| d.name == info.name) {
                    continue;
                }
                devices.push(info);
            }
        }
    }

    Ok(devices)
}

/// Get the default output device info.
pub fn default_output_device() -> Result<Option<AudioDevice>> {
    let host = cpal::default_host();
    Ok(host.default_output_device().as_ref().and_then(describe_output))
}
