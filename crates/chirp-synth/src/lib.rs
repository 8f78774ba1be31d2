//! Chirp Synth - additive synthesis engine for the chirp framework
//!
//! This crate turns "play a wave now" requests into samples. Every voice is a
//! pure function of absolute time: the oscillator phase is derived from
//! `time * angular_velocity`, and the envelope from the recorded on/off times.
//! That makes it possible to evaluate the same logical voice independently on
//! the audio thread and on a visualization thread.
//!
//! # Core Components
//!
//! ## Envelopes
//!
//! - [`Envelope`] - Linear attack/decay/sustain/release amplitude over time
//! - [`AdrTimes`] - Attack, decay and release durations in seconds
//!
//! ```rust
//! use chirp_synth::{AdrTimes, Envelope};
//!
//! let mut env = Envelope::new(AdrTimes::new(0.1, 0.01, 0.2), 1.0, 0.8);
//! env.on(0.0);
//! assert!((env.get(0.05) - 0.5).abs() < 1e-9);
//! env.off(0.2);
//! assert!(env.done(0.45));
//! ```
//!
//! ## Waveforms
//!
//! - [`WaveType`] - Sine, square, triangle, additive and closed-form sawtooth, noise
//! - [`waveform::sample`] - Exhaustive match producing one raw sample in `[-1, 1]`
//!
//! ## Voices and Mixing
//!
//! - [`SoundWave`] - Waveform + envelope + per-voice gain, start time and length
//! - [`VoiceTable`] - Fixed-capacity slot arena with a round-robin write cursor
//! - [`Mixer`] - Master volume and hard clipping over a set of voices
//! - [`VoiceFactory`] - Picks pitch and length for new voices, precalculates noise
//!
//! ```rust
//! use chirp_synth::{Envelope, Lehmer32, Mixer, SoundWave, WaveProperties, WaveType};
//!
//! let props = WaveProperties::new(WaveType::Sine, 440.0, 1.0, 0.0);
//! let mut wave = SoundWave::new(props, Envelope::with_length(1.0)).unwrap();
//! wave.start(0.0);
//!
//! let mut rng = Lehmer32::new(7);
//! let mixer = Mixer::default();
//! let sample = mixer.mix(0.25, core::slice::from_mut(&mut wave), &mut rng);
//! assert!(sample.abs() <= mixer.max_volume());
//! ```
//!
//! ## Randomness
//!
//! - [`RandomSource`] - The "byte/real in range" capability voices consume
//! - [`Rand`] - Owned generator with configurable limits and algorithm
//! - [`Lehmer32`] - Small deterministic generator usable without `std`
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (it needs `alloc`). Disable the default
//! `std` feature to drop the `rand` backed algorithm:
//!
//! ```toml
//! [dependencies]
//! chirp-synth = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod envelope;
pub mod error;
pub mod factory;
pub mod mixer;
pub mod random;
pub mod sound_wave;
pub mod voice_table;
pub mod waveform;

// Re-export main types at crate root
pub use envelope::{AdrTimes, Envelope};
pub use error::SynthError;
pub use factory::{NoiseLayout, VoiceFactory, VoiceSettings, precalculate_noise};
pub use mixer::{DEFAULT_MASTER_VOLUME, DEFAULT_MAX_VOLUME, MAX_VOLUME_CEILING, Mixer};
pub use random::{Lehmer32, Rand, RandAlgorithm, RandomSource};
pub use sound_wave::{DEFAULT_SAWTOOTH_HARMONICS, SoundWave, WaveProperties};
pub use voice_table::VoiceTable;
pub use waveform::{WaveParams, WaveType};

pub use chirp_core::EPSILON;
