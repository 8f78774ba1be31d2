//! Device-less output backend.
//!
//! [`NullBackend`] runs the output callback on its own thread, paced to real
//! time by default, and throws the samples away or captures them. It lets the
//! engine run on machines without audio hardware and gives tests a stream
//! they can inspect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::backend::{
    AudioBackend, BackendStreamConfig, ErrorCallback, FALLBACK_CHANNELS, FALLBACK_SAMPLE_RATE,
    OutputCallback, StreamHandle,
};
use crate::{AudioDevice, Error, Result};

const DEVICE_NAME: &str = "null";
const DEFAULT_BUFFER_FRAMES: u32 = 512;

/// Samples written by a capturing [`NullBackend`], interleaved.
pub type Capture = Arc<Mutex<Vec<f32>>>;

/// Output backend without a device.
///
/// # Example
///
/// ```rust
/// use chirp_io::{AudioBackend, BackendStreamConfig, NullBackend};
///
/// let backend = NullBackend::new().unpaced().with_buffer_limit(4).with_capture();
/// let capture = backend.capture().expect("capturing");
/// let config = backend.negotiate_output(&BackendStreamConfig::default())?;
/// let stream = backend.build_output_stream(
///     &config,
///     Box::new(|buffer: &mut [f32]| buffer.fill(0.25)),
///     Box::new(|_| {}),
/// )?;
/// drop(stream);
///
/// let samples = capture.lock();
/// assert_eq!(samples.len(), 4 * 512 * 2);
/// # Ok::<(), chirp_io::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct NullBackend {
    sample_rate: u32,
    channels: u16,
    buffer_frames: u32,
    paced: bool,
    buffer_limit: Option<u64>,
    capture: Option<Capture>,
}

impl NullBackend {
    /// A real-time paced backend at 48 kHz stereo that discards its output.
    pub fn new() -> Self {
        Self {
            sample_rate: FALLBACK_SAMPLE_RATE,
            channels: FALLBACK_CHANNELS,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            paced: true,
            buffer_limit: None,
            capture: None,
        }
    }

    /// Device defaults reported to [`negotiate_output`](AudioBackend::negotiate_output).
    pub fn with_format(mut self, sample_rate: u32, channels: u16) -> Self {
        self.sample_rate = sample_rate.max(1);
        self.channels = channels.max(1);
        self
    }

    /// Buffer size used when the stream config asks for the device default.
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_frames = frames.max(1);
        self
    }

    /// Run buffers back to back instead of sleeping for their duration.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Call the callback exactly `buffers` times per stream.
    ///
    /// Dropping the stream waits for the remaining buffers instead of cutting
    /// them short.
    pub fn with_buffer_limit(mut self, buffers: u64) -> Self {
        self.buffer_limit = Some(buffers);
        self
    }

    /// Append every buffer written to a shared vector.
    pub fn with_capture(mut self) -> Self {
        self.capture = Some(Arc::new(Mutex::new(Vec::new())));
        self
    }

    /// Shared handle to the captured output, if capturing.
    pub fn capture(&self) -> Option<Capture> {
        self.capture.clone()
    }

    fn device(&self) -> AudioDevice {
        AudioDevice {
            name: DEVICE_NAME.to_string(),
            is_input: false,
            is_output: true,
            default_sample_rate: self.sample_rate,
            default_channels: self.channels,
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &str {
        DEVICE_NAME
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        Ok(vec![self.device()])
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        Ok(Some(self.device()))
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: OutputCallback,
        _error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        if let Some(name) = config.device_name.as_deref()
            && !DEVICE_NAME.contains(name.to_lowercase().as_str())
        {
            return Err(Error::DeviceNotFound(format!(
                "no output device matching '{}'",
                name
            )));
        }

        let channels = usize::from(config.channels.max(1));
        let sample_rate = if config.sample_rate == 0 {
            self.sample_rate
        } else {
            config.sample_rate
        };
        let buffer_frames = if config.buffer_size == 0 {
            self.buffer_frames
        } else {
            config.buffer_size
        };
        let frames = buffer_frames as usize;
        let period = Duration::from_secs_f64(frames as f64 / f64::from(sample_rate));

        let running = Arc::new(AtomicBool::new(true));
        let capture = self.capture.clone();
        let paced = self.paced;
        let limit = self.buffer_limit;

        let thread = thread::Builder::new()
            .name("chirp-null-output".into())
            .spawn({
                let running = Arc::clone(&running);
                move || {
                    let mut buffer = vec![0.0f32; frames * channels];
                    let mut next = Instant::now();
                    let mut count = 0u64;
                    let keep_going = |count: u64| match limit {
                        Some(max) => count < max,
                        None => running.load(Ordering::Acquire),
                    };
                    while keep_going(count) {
                        callback(&mut buffer);
                        count += 1;
                        if let Some(capture) = &capture {
                            capture.lock().extend_from_slice(&buffer);
                        }
                        if paced {
                            next += period;
                            if let Some(wait) = next.checked_duration_since(Instant::now()) {
                                thread::sleep(wait);
                            }
                        }
                    }
                }
            })
            .map_err(Error::Io)?;

        tracing::info!(
            channels,
            sample_rate,
            frames,
            paced,
            "null output stream started"
        );

        Ok(StreamHandle::new(NullStream {
            running,
            thread: Some(thread),
        }))
    }
}

/// Running null stream; dropping it stops and joins the output thread.
struct NullStream {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for NullStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("null output thread panicked");
        }
    }
}
