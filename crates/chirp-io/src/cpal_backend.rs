//! cpal-based audio output backend.
//!
//! [`CpalBackend`] is the default [`AudioBackend`]: ALSA on Linux, CoreAudio on
//! macOS, WASAPI on Windows.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chirp_io::{AudioBackend, BackendStreamConfig, CpalBackend};
//!
//! let backend = CpalBackend::new();
//! let config = backend.negotiate_output(&BackendStreamConfig::default())?;
//! let stream = backend.build_output_stream(
//!     &config,
//!     Box::new(|buffer: &mut [f32]| buffer.fill(0.0)),
//!     Box::new(|err| eprintln!("Audio error: {}", err)),
//! )?;
//! // Plays silence until `stream` is dropped.
//! # drop(stream);
//! # Ok::<(), chirp_io::Error>(())
//! ```

use crate::backend::{AudioBackend, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle};
use crate::stream::device_name;
use crate::{AudioDevice, Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Host, SupportedBufferSize};

/// cpal-based audio backend holding the platform's default host.
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    /// Create a new cpal backend using the platform's default audio host.
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal backend initialized");
        Self { host }
    }

    /// Find a cpal output device whose name contains `name` (case-insensitive),
    /// or return the default.
    fn find_output_device(&self, name: Option<&str>) -> Result<cpal::Device> {
        match name {
            Some(search) => {
                let search_lower = search.to_lowercase();
                let devices = self
                    .host
                    .output_devices()
                    .map_err(|e| Error::Stream(e.to_string()))?;

                for device in devices {
                    if let Ok(dev_name) = device_name(&device)
                        && dev_name.to_lowercase().contains(search_lower.as_str())
                    {
                        return Ok(device);
                    }
                }
                Err(Error::DeviceNotFound(format!(
                    "no output device matching '{}'",
                    search
                )))
            }
            None => self.host.default_output_device().ok_or(Error::NoDevice),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        crate::stream::list_devices()
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        crate::stream::default_output_device()
    }

    fn negotiate_output(&self, config: &BackendStreamConfig) -> Result<BackendStreamConfig> {
        let device = self.find_output_device(config.device_name.as_deref())?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;

        let mut negotiated = config.clone();
        if negotiated.sample_rate == 0 {
            negotiated.sample_rate = supported.sample_rate();
        }
        if negotiated.channels == 0 {
            negotiated.channels = supported.channels();
        }
        if let SupportedBufferSize::Range { min, max } = supported.buffer_size()
            && negotiated.buffer_size != 0
        {
            negotiated.buffer_size = negotiated.buffer_size.clamp(*min, *max);
        }

        tracing::debug!(
            sample_rate = negotiated.sample_rate,
            channels = negotiated.channels,
            buffer_size = negotiated.buffer_size,
            "output negotiated"
        );
        Ok(negotiated)
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: OutputCallback,
        mut error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let device = self.find_output_device(config.device_name.as_deref())?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: if config.buffer_size == 0 {
                cpal::BufferSize::Default
            } else {
                cpal::BufferSize::Fixed(config.buffer_size)
            },
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback(data);
                },
                move |err| {
                    error_callback(&err.to_string());
                },
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            device = %device_name(&device).unwrap_or_default(),
            channels = config.channels,
            sample_rate = config.sample_rate,
            "output stream started"
        );

        Ok(StreamHandle::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpal_backend_name() {
        let backend = CpalBackend::new();
        assert_eq!(backend.name(), "cpal");
    }

    #[test]
    fn test_cpal_backend_list_devices() {
        let backend = CpalBackend::new();
        // Should not panic; device availability depends on the system.
        assert!(backend.list_devices().is_ok());
    }

    #[test]
    fn test_unknown_device_name() {
        let backend = CpalBackend::new();
        let config = BackendStreamConfig {
            device_name: Some("no-such-device-0d1e".into()),
            ..BackendStreamConfig::default()
        };
        assert!(backend.negotiate_output(&config).is_err());
    }
}
