//! Audio output and threading for the chirp synthesizer.
//!
//! This crate provides:
//!
//! - **Output backends**: [`AudioBackend`] with [`CpalBackend`] for real devices
//!   and [`NullBackend`] for headless runs and tests
//! - **Sound system**: [`SoundSystem`] drives a [`SampleSource`] from the output
//!   callback, keeps stream time and counts late buffers and errors
//! - **Engine**: [`SoundEngine`] turns [`Command`]s into voices on the audio
//!   thread and on a lock-protected render table for visualization
//! - **WAV file I/O**: [`read_wav`], [`write_wav`] and the streaming [`WavSink`] for
//!   offline rendering
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chirp_io::{Command, CpalBackend, EngineSettings, OutputConfig, SoundEngine};
//! use chirp_synth::WaveType;
//!
//! let mut engine = SoundEngine::new(
//!     Box::new(CpalBackend::new()),
//!     OutputConfig::default(),
//!     EngineSettings::default(),
//! )?;
//!
//! engine.send(Command::Add(WaveType::Sine))?;
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! engine.stop();
//! # Ok::<(), chirp_io::Error>(())
//! ```

pub mod backend;
pub mod cpal_backend;
pub mod engine;
pub mod null_backend;
pub mod sound;
mod stream;
mod wav;

pub use backend::{AudioBackend, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle};
pub use cpal_backend::CpalBackend;
pub use engine::{Command, EngineSettings, EngineStatus, Relay, SoundEngine};
pub use null_backend::NullBackend;
pub use sound::{OutputConfig, SampleSource, SoundStatus, SoundSystem, render_interleaved};
pub use stream::{AudioDevice, default_output_device, list_devices};
pub use wav::{WavFormat, WavInfo, WavSink, WavSpec, read_wav, read_wav_info, write_wav};

/// Error types for audio output and engine operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid voice, mixer or generator settings.
    #[error("Synth configuration error: {0}")]
    Synth(#[from] chirp_synth::SynthError),

    /// Invalid queue settings.
    #[error("Queue configuration error: {0}")]
    Core(#[from] chirp_core::CoreError),

    /// The command queue has no room; the command was not sent.
    #[error("Command queue is full")]
    QueueFull,

    /// The engine has been stopped.
    #[error("Sound engine is not running")]
    NotRunning,
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
