//! Output stream driver with stream time keeping.
//!
//! [`SoundSystem`] owns an [`AudioBackend`] and runs a [`SampleSource`] inside
//! its output callback. For every frame the source is asked for one sample per
//! channel at the frame's absolute stream time:
//!
//! ```text
//! time(frame) = epoch + frames_written / sample_rate
//! ```
//!
//! Time is derived from the frame counter rather than accumulated, so it does
//! not drift over long sessions. Output is clamped to `[-1, 1]`.
//!
//! The callback never logs, allocates or blocks. Buffers that took longer to
//! render than they last raise an underflow flag, and backend errors are
//! counted with the last message kept for [`SoundSystem::take_error`]; the
//! owning thread reads and logs both.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use crate::backend::{AudioBackend, BackendStreamConfig, StreamHandle};
use crate::Result;

/// Output device and stream settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    /// Device name filter, `None` for the system default.
    pub device: Option<String>,
    /// Name the stream is reported under.
    pub stream_name: String,
    /// Sample rate in Hz, 0 for the device default.
    pub sample_rate: u32,
    /// Channel count, 0 for the device default.
    pub channels: u16,
    /// Most frames rendered per [`SampleSource::begin_buffer`] call, 0 for no
    /// limit.
    pub max_frames: u32,
    /// Target output latency in seconds, 0 for the device default buffer size.
    pub latency: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            stream_name: "chirp".to_string(),
            sample_rate: 0,
            channels: 0,
            max_frames: 2048,
            latency: 0.1,
        }
    }
}

impl OutputConfig {
    /// Backend request for the device and format of this config. The buffer
    /// size is left to negotiation.
    pub fn stream_request(&self) -> BackendStreamConfig {
        BackendStreamConfig {
            sample_rate: self.sample_rate,
            buffer_size: 0,
            channels: self.channels,
            device_name: self.device.clone(),
        }
    }

    /// Frames holding `latency` seconds, capped at `max_frames`.
    fn buffer_frames(&self, sample_rate: u32) -> u32 {
        if self.latency <= 0.0 {
            return 0;
        }
        let frames = (self.latency * f64::from(sample_rate)) as u32;
        let frames = if self.max_frames > 0 {
            frames.min(self.max_frames)
        } else {
            frames
        };
        frames.max(1)
    }
}

/// Something that produces samples at absolute stream times.
///
/// Called on the audio thread; implementations must not block, allocate or
/// free memory.
pub trait SampleSource: Send + 'static {
    /// Called once before each run of at most `max_frames` frames, with the
    /// time of the first frame.
    fn begin_buffer(&mut self, _time: f64, _frames: usize) {}

    /// Sample for `channel` at `time` seconds.
    fn sample(&mut self, channel: usize, time: f64) -> f64;
}

impl<F> SampleSource for F
where
    F: FnMut(usize, f64) -> f64 + Send + 'static,
{
    fn sample(&mut self, channel: usize, time: f64) -> f64 {
        self(channel, time)
    }
}

/// Fill an interleaved buffer from `source`, starting at `start_time`.
///
/// Calls [`SampleSource::begin_buffer`] once, then asks for every channel of
/// every frame. Samples are clamped to `[-1, 1]`.
///
/// # Example
///
/// ```rust
/// use chirp_io::render_interleaved;
///
/// let mut out = [0.0f32; 6];
/// let mut ramp = |channel: usize, time: f64| time * 4.0 + channel as f64;
/// render_interleaved(&mut ramp, &mut out, 2, 0.0, 0.25);
/// assert_eq!(out, [0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
/// ```
pub fn render_interleaved<S: SampleSource + ?Sized>(
    source: &mut S,
    out: &mut [f32],
    channels: usize,
    start_time: f64,
    seconds_per_frame: f64,
) {
    let channels = channels.max(1);
    let frames = out.len() / channels;
    source.begin_buffer(start_time, frames);

    for (frame, chunk) in out.chunks_exact_mut(channels).enumerate() {
        let time = start_time + frame as f64 * seconds_per_frame;
        for (channel, sample) in chunk.iter_mut().enumerate() {
            *sample = source.sample(channel, time).clamp(-1.0, 1.0) as f32;
        }
    }
}

/// Counters published by the output callback.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SoundStatus {
    /// Buffers rendered since the stream started.
    pub buffers: u64,
    /// Buffers that took longer to render than they last.
    pub underflows: u64,
    /// Errors reported by the backend.
    pub errors: u64,
    /// Render time of the last buffer as a fraction of its duration.
    pub load: f32,
    /// Stream time of the next frame in seconds.
    pub time: f64,
}

#[derive(Default)]
struct StreamShared {
    frames: AtomicU64,
    epoch_bits: AtomicU64,
    buffers: AtomicU64,
    underflows: AtomicU64,
    errors: AtomicU64,
    load_bits: AtomicU32,
    underflow: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl StreamShared {
    fn reset(&self, epoch: f64) {
        self.frames.store(0, Ordering::Relaxed);
        self.epoch_bits.store(epoch.to_bits(), Ordering::Relaxed);
        self.buffers.store(0, Ordering::Relaxed);
        self.underflows.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.load_bits.store(0, Ordering::Relaxed);
        self.underflow.store(false, Ordering::Relaxed);
        *self.last_error.lock() = None;
    }

    fn record_buffer(&self, frames: u64, render_secs: f64, budget_secs: f64) {
        self.frames.store(frames, Ordering::Release);
        self.buffers.fetch_add(1, Ordering::Relaxed);
        let load = if budget_secs > 0.0 {
            render_secs / budget_secs
        } else {
            0.0
        };
        self.load_bits.store((load as f32).to_bits(), Ordering::Relaxed);
        if load > 1.0 {
            self.underflows.fetch_add(1, Ordering::Relaxed);
            self.underflow.store(true, Ordering::Release);
        }
    }

    fn record_error(&self, message: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if let Some(mut slot) = self.last_error.try_lock() {
            *slot = Some(message.to_string());
        }
    }
}

/// Output stream owner.
///
/// The output format is negotiated with the backend on construction, so the
/// sample rate and channel count are known before the stream starts.
///
/// # Example
///
/// ```rust
/// use chirp_io::{NullBackend, OutputConfig, SoundSystem};
///
/// let backend = NullBackend::new().with_format(8_000, 1).unpaced().with_buffer_limit(2);
/// let mut sound = SoundSystem::new(Box::new(backend), OutputConfig::default())?;
/// assert_eq!(sound.sample_rate(), 8_000);
///
/// sound.start(|_channel: usize, _time: f64| 0.0, 10.0)?;
/// sound.stop();
/// assert_eq!(sound.status().buffers, 2);
/// # Ok::<(), chirp_io::Error>(())
/// ```
pub struct SoundSystem {
    backend: Box<dyn AudioBackend>,
    config: OutputConfig,
    negotiated: BackendStreamConfig,
    device_name: String,
    stream: Option<StreamHandle>,
    shared: Arc<StreamShared>,
}

impl SoundSystem {
    /// Negotiate the output format for `config` with `backend`.
    pub fn new(backend: Box<dyn AudioBackend>, config: OutputConfig) -> Result<Self> {
        let mut negotiated = backend.negotiate_output(&config.stream_request())?;
        if negotiated.buffer_size == 0 {
            negotiated.buffer_size = config.buffer_frames(negotiated.sample_rate);
            if negotiated.buffer_size != 0 {
                negotiated = backend.negotiate_output(&negotiated)?;
            }
        }

        let device_name = match &config.device {
            Some(name) => name.clone(),
            None => backend
                .default_output_device()?
                .map(|d| d.name)
                .unwrap_or_else(|| backend.name().to_string()),
        };

        Ok(Self {
            backend,
            config,
            negotiated,
            device_name,
            stream: None,
            shared: Arc::new(StreamShared::default()),
        })
    }

    /// Start the stream with `source`, the first frame at `epoch` seconds.
    ///
    /// A running stream is stopped first.
    pub fn start<S: SampleSource>(&mut self, mut source: S, epoch: f64) -> Result<()> {
        self.stop();
        self.shared.reset(epoch);

        let shared = Arc::clone(&self.shared);
        let error_shared = Arc::clone(&self.shared);
        let channels = usize::from(self.negotiated.channels.max(1));
        let sample_rate = f64::from(self.negotiated.sample_rate.max(1));
        let seconds_per_frame = 1.0 / sample_rate;
        let chunk_frames = match self.config.max_frames {
            0 => usize::MAX / channels,
            max => max as usize,
        };

        let mut frames_written: u64 = 0;
        let callback = Box::new(move |data: &mut [f32]| {
            let started = Instant::now();
            for chunk in data.chunks_mut(chunk_frames * channels) {
                let time = epoch + frames_written as f64 * seconds_per_frame;
                render_interleaved(&mut source, chunk, channels, time, seconds_per_frame);
                frames_written += (chunk.len() / channels) as u64;
            }
            let budget = (data.len() / channels) as f64 * seconds_per_frame;
            shared.record_buffer(frames_written, started.elapsed().as_secs_f64(), budget);
        });
        let error_callback = Box::new(move |message: &str| error_shared.record_error(message));

        let stream = self
            .backend
            .build_output_stream(&self.negotiated, callback, error_callback)?;
        self.stream = Some(stream);

        tracing::info!(
            stream = %self.config.stream_name,
            backend = self.backend.name(),
            device = %self.device_name,
            sample_rate = self.negotiated.sample_rate,
            channels = self.negotiated.channels,
            buffer_size = self.negotiated.buffer_size,
            "sound system started"
        );
        Ok(())
    }

    /// Stop the stream. Does nothing if it is not running.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!(stream = %self.config.stream_name, "sound system stopped");
        }
    }

    /// Whether a stream is running.
    pub fn is_started(&self) -> bool {
        self.stream.is_some()
    }

    /// Negotiated sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.negotiated.sample_rate
    }

    /// Negotiated channel count.
    pub fn channels(&self) -> u16 {
        self.negotiated.channels
    }

    /// Negotiated buffer size in frames, 0 when the backend picks.
    pub fn buffer_size(&self) -> u32 {
        self.negotiated.buffer_size
    }

    /// Name of the output device.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Output settings.
    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Whether a late buffer occurred since the last call. Clears the flag.
    pub fn take_underflow(&self) -> bool {
        self.shared.underflow.swap(false, Ordering::AcqRel)
    }

    /// Last backend error message since the last call, if any.
    pub fn take_error(&self) -> Option<String> {
        self.shared.last_error.lock().take()
    }

    /// Stream time of the next frame to be rendered.
    pub fn stream_time(&self) -> f64 {
        let epoch = f64::from_bits(self.shared.epoch_bits.load(Ordering::Relaxed));
        let frames = self.shared.frames.load(Ordering::Acquire);
        epoch + frames as f64 / f64::from(self.negotiated.sample_rate.max(1))
    }

    /// Counters of the current stream.
    pub fn status(&self) -> SoundStatus {
        SoundStatus {
            buffers: self.shared.buffers.load(Ordering::Relaxed),
            underflows: self.shared.underflows.load(Ordering::Relaxed),
            errors: self.shared.errors.load(Ordering::Relaxed),
            load: f32::from_bits(self.shared.load_bits.load(Ordering::Relaxed)),
            time: self.stream_time(),
        }
    }
}

impl Drop for SoundSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SoundSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundSystem")
            .field("backend", &self.backend.name())
            .field("device", &self.device_name)
            .field("negotiated", &self.negotiated)
            .field("started", &self.is_started())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullBackend;

    fn capture_system(
        sample_rate: u32,
        channels: u16,
        buffers: u64,
        config: OutputConfig,
    ) -> (SoundSystem, crate::null_backend::Capture) {
        let backend = NullBackend::new()
            .with_format(sample_rate, channels)
            .with_buffer_frames(100)
            .unpaced()
            .with_buffer_limit(buffers)
            .with_capture();
        let capture = backend.capture().unwrap();
        let config = OutputConfig {
            latency: 0.0,
            ..config
        };
        (SoundSystem::new(Box::new(backend), config).unwrap(), capture)
    }

    #[test]
    fn test_time_keeping_across_buffers() {
        let (mut sound, capture) = capture_system(1_000, 1, 3, OutputConfig::default());
        let times = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&times);
        sound
            .start(
                move |_channel: usize, time: f64| {
                    seen.lock().push(time);
                    0.0
                },
                5.0,
            )
            .unwrap();
        sound.stop();

        let times = times.lock();
        assert_eq!(times.len(), 300);
        assert_eq!(times[0], 5.0);
        assert!((times[150] - 5.15).abs() < 1e-9);
        assert!((times[299] - 5.299).abs() < 1e-9);
        assert_eq!(capture.lock().len(), 300);
        assert!((sound.stream_time() - 5.3).abs() < 1e-9);
    }

    #[test]
    fn test_output_is_clamped() {
        let (mut sound, capture) = capture_system(1_000, 2, 1, OutputConfig::default());
        sound
            .start(
                |channel: usize, _time: f64| if channel == 0 { 3.0 } else { -3.0 },
                0.0,
            )
            .unwrap();
        sound.stop();

        let samples = capture.lock();
        assert_eq!(samples.len(), 200);
        assert!(samples.chunks(2).all(|frame| frame == [1.0, -1.0]));
    }

    struct CountingSource {
        starts: Arc<Mutex<Vec<(f64, usize)>>>,
    }

    impl SampleSource for CountingSource {
        fn begin_buffer(&mut self, time: f64, frames: usize) {
            self.starts.lock().push((time, frames));
        }

        fn sample(&mut self, _channel: usize, _time: f64) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_begin_buffer_respects_max_frames() {
        let config = OutputConfig {
            max_frames: 40,
            ..OutputConfig::default()
        };
        let (mut sound, _capture) = capture_system(1_000, 1, 1, config);
        let starts = Arc::new(Mutex::new(Vec::new()));
        sound
            .start(
                CountingSource {
                    starts: Arc::clone(&starts),
                },
                0.0,
            )
            .unwrap();
        sound.stop();

        let starts = starts.lock();
        let frames: Vec<usize> = starts.iter().map(|&(_, n)| n).collect();
        assert_eq!(frames, [40, 40, 20]);
        assert!((starts[2].0 - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_latency_sets_buffer_size() {
        let backend = NullBackend::new().with_format(48_000, 2);
        let config = OutputConfig {
            latency: 0.01,
            ..OutputConfig::default()
        };
        let sound = SoundSystem::new(Box::new(backend), config).unwrap();
        assert_eq!(sound.buffer_size(), 480);
        assert_eq!(sound.channels(), 2);
        assert_eq!(sound.device_name(), "null");
        assert!(!sound.is_started());
    }

    struct SlowSource;

    impl SampleSource for SlowSource {
        fn begin_buffer(&mut self, _time: f64, _frames: usize) {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }

        fn sample(&mut self, _channel: usize, _time: f64) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_late_buffers_raise_underflow() {
        // 10 frames at 1 kHz last 10 ms, rendering takes 20 ms
        let backend = NullBackend::new()
            .with_format(1_000, 1)
            .with_buffer_frames(10)
            .unpaced()
            .with_buffer_limit(2);
        let config = OutputConfig {
            latency: 0.0,
            ..OutputConfig::default()
        };
        let mut sound = SoundSystem::new(Box::new(backend), config).unwrap();
        sound.start(SlowSource, 0.0).unwrap();
        sound.stop();

        let status = sound.status();
        assert_eq!(status.buffers, 2);
        assert_eq!(status.underflows, 2);
        assert!(status.load > 1.0);
        assert!(sound.take_underflow());
        assert!(!sound.take_underflow());
    }

    /// Backend whose stream reports one error and renders one buffer.
    struct FaultyBackend;

    impl AudioBackend for FaultyBackend {
        fn name(&self) -> &str {
            "faulty"
        }

        fn list_devices(&self) -> Result<Vec<crate::AudioDevice>> {
            Ok(Vec::new())
        }

        fn default_output_device(&self) -> Result<Option<crate::AudioDevice>> {
            Ok(None)
        }

        fn build_output_stream(
            &self,
            config: &BackendStreamConfig,
            mut callback: crate::backend::OutputCallback,
            mut error_callback: crate::backend::ErrorCallback,
        ) -> Result<StreamHandle> {
            error_callback("device unplugged");
            let mut buffer = vec![0.0f32; 8 * usize::from(config.channels.max(1))];
            callback(&mut buffer);
            Ok(StreamHandle::new(()))
        }
    }

    #[test]
    fn test_stream_errors_counted_not_thrown() {
        let mut sound = SoundSystem::new(Box::new(FaultyBackend), OutputConfig::default()).unwrap();
        assert_eq!(sound.device_name(), "faulty");
        sound.start(|_channel: usize, _time: f64| 0.0, 0.0).unwrap();

        let status = sound.status();
        assert_eq!(status.errors, 1);
        assert_eq!(status.buffers, 1);
        assert_eq!(sound.take_error().as_deref(), Some("device unplugged"));
        assert!(sound.take_error().is_none());
        assert_eq!(sound.status().errors, 1);
    }

    #[test]
    fn test_take_flags_start_clear() {
        let (sound, _capture) = capture_system(1_000, 1, 1, OutputConfig::default());
        assert!(!sound.take_underflow());
        assert!(sound.take_error().is_none());
        assert_eq!(sound.status().buffers, 0);
    }
}
