//! Pluggable audio output backend.
//!
//! [`AudioBackend`] decouples the sound system from any specific platform audio
//! API. Two implementations ship with the crate:
//!
//! - [`CpalBackend`](crate::CpalBackend) - real devices via cpal
//! - [`NullBackend`](crate::NullBackend) - a paced thread standing in for a
//!   device, for headless runs and deterministic tests
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │   SoundSystem / SoundEngine      │
//! └──────────────┬───────────────────┘
//!                │ uses AudioBackend trait
//!                ▼
//! ┌──────────────────────────────────┐
//! │        AudioBackend trait        │
//! │ negotiate_output / build_output  │
//! └──────────────┬───────────────────┘
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌─────────────┐
//! │ CpalBackend │  │ NullBackend │
//! └─────────────┘  └─────────────┘
//! ```
//!
//! Callbacks are boxed closures, so the trait is object-safe and the backend
//! can be picked at runtime (`Box<dyn AudioBackend>`). Streams come back as a
//! type-erased [`StreamHandle`] that stops playback when dropped.

use crate::{AudioDevice, Result};

/// Sample rate assumed when neither the request nor the device names one.
pub const FALLBACK_SAMPLE_RATE: u32 = 48_000;

/// Channel count assumed when neither the request nor the device names one.
pub const FALLBACK_CHANNELS: u16 = 2;

/// Configuration for building an output stream.
///
/// A zero `sample_rate`, `channels` or `buffer_size` means "device default";
/// [`AudioBackend::negotiate_output`] replaces the zeros with concrete values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStreamConfig {
    /// Requested sample rate in Hz.
    pub sample_rate: u32,
    /// Preferred buffer size in frames.
    pub buffer_size: u32,
    /// Number of audio channels.
    pub channels: u16,
    /// Optional device name filter (uses system default if `None`).
    pub device_name: Option<String>,
}

/// Type-erased audio stream handle.
///
/// The stream is active while this handle exists; dropping it stops playback.
pub struct StreamHandle {
    _inner: Box<dyn Send>,
}

impl StreamHandle {
    /// Wrap a backend-specific stream object, kept alive until the handle is
    /// dropped.
    pub fn new<T: Send + 'static>(stream: T) -> Self {
        Self {
            _inner: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

/// Audio output callback.
///
/// Runs on the real-time audio thread and fills a buffer of interleaved f32
/// samples, `[L0, R0, L1, R1, ...]` for stereo. It must not allocate, block or
/// perform I/O.
pub type OutputCallback = Box<dyn FnMut(&mut [f32]) + Send>;

/// Called with a human-readable message when the stream reports an error.
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Pluggable audio output backend.
pub trait AudioBackend: Send {
    /// Human-readable name of this backend (e.g., "cpal", "null").
    fn name(&self) -> &str;

    /// List all available audio devices.
    fn list_devices(&self) -> Result<Vec<AudioDevice>>;

    /// Get the default output device, if any.
    fn default_output_device(&self) -> Result<Option<AudioDevice>>;

    /// Replace "device default" zeros in `config` with the values the stream
    /// will actually use.
    ///
    /// The default implementation takes the sample rate and channel count of
    /// [`default_output_device`](Self::default_output_device) and leaves a zero
    /// buffer size for the backend to choose.
    fn negotiate_output(&self, config: &BackendStreamConfig) -> Result<BackendStreamConfig> {
        let device = self.default_output_device()?;
        let mut negotiated = config.clone();
        if negotiated.sample_rate == 0 {
            negotiated.sample_rate = device
                .as_ref()
                .map_or(FALLBACK_SAMPLE_RATE, |d| d.default_sample_rate);
        }
        if negotiated.channels == 0 {
            negotiated.channels = device
                .as_ref()
                .map_or(FALLBACK_CHANNELS, |d| d.default_channels.max(1));
        }
        Ok(negotiated)
    }

    /// Build and start an output stream.
    ///
    /// `config` should already be negotiated. The returned [`StreamHandle`]
    /// keeps the stream alive; dropping it stops playback.
    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        callback: OutputCallback,
        error_callback: ErrorCallback,
    ) -> Result<StreamHandle>;
}
