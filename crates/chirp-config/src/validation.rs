//! Range checks for [`ChirpConfig`] values.
//!
//! Parsing only checks types and names; every numeric limit lives here, so a
//! config built in code gets the same checks as one read from disk.
//!
//! ```rust
//! use chirp_config::{ChirpConfig, validate_config};
//!
//! let mut config = ChirpConfig::default();
//! assert!(validate_config(&config).is_ok());
//!
//! config.voices.capacity = 0;
//! assert!(validate_config(&config).is_err());
//! ```

use thiserror::Error;

use crate::config::ChirpConfig;

/// Largest voice table accepted.
pub const MAX_VOICES: usize = 4096;
/// Largest harmonic count for the additive sawtooth.
pub const MAX_HARMONICS: u32 = 256;
/// Highest sample rate accepted, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 384_000;
/// Lowest non-default sample rate accepted, in Hz.
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Numeric value out of range.
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Dotted path of the field, e.g. `voices.capacity`.
        field: String,
        /// The rejected value.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// Value that fails a non-range rule.
    #[error("{field}: {reason}")]
    Invalid {
        /// Dotted path of the field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Collects every failed check instead of stopping at the first.
#[derive(Default)]
struct Checker {
    errors: Vec<ValidationError>,
}

impl Checker {
    fn range(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if !(value.is_finite() && value >= min && value <= max) {
            self.errors.push(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                min,
                max,
            });
        }
    }

    fn rule(&mut self, field: &str, ok: bool, reason: &str) {
        if !ok {
            self.errors.push(ValidationError::Invalid {
                field: field.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    fn finish(mut self) -> ValidationResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ValidationError::Multiple(self.errors)),
        }
    }
}

/// Check every section of `config`.
///
/// Volumes above their ceiling are clamped when applied and pass; negative or
/// non-finite volumes fail.
pub fn validate_config(config: &ChirpConfig) -> ValidationResult<()> {
    let mut check = Checker::default();

    let output = &config.output;
    check.rule(
        "output.sample_rate",
        output.sample_rate == 0
            || (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&output.sample_rate),
        "must be 0 (device default) or between 8000 and 384000 Hz",
    );
    check.range("output.channels", f64::from(output.channels), 0.0, 32.0);
    check.range("output.latency", output.latency, 0.0, 10.0);
    check.rule(
        "output.stream_name",
        !output.stream_name.trim().is_empty(),
        "must not be empty",
    );

    let mix = &config.mix;
    check.rule(
        "mix.master_volume",
        mix.master_volume.is_finite() && mix.master_volume >= 0.0,
        "must be a non-negative number",
    );
    check.rule(
        "mix.max_volume",
        mix.max_volume.is_finite() && mix.max_volume >= 0.0,
        "must be a non-negative number",
    );

    let voices = &config.voices;
    check.range("voices.capacity", voices.capacity as f64, 1.0, MAX_VOICES as f64);
    check.range(
        "voices.sawtooth_harmonics",
        f64::from(voices.sawtooth_harmonics),
        1.0,
        f64::from(MAX_HARMONICS),
    );
    check.range("voices.noise_resolution", voices.noise_resolution, 0.01, 16.0);

    let envelope = &config.envelope;
    check.range("envelope.attack", envelope.attack, 0.0, 60.0);
    check.range("envelope.decay", envelope.decay, 0.0, 60.0);
    check.range("envelope.release", envelope.release, 0.0, 60.0);
    check.range("envelope.amplitude_start", envelope.amplitude_start, 0.0, 1.0);
    check.range("envelope.amplitude_sustain", envelope.amplitude_sustain, 0.0, 1.0);

    let random = &config.random;
    check.range("random.tones", f64::from(random.tones), 1.0, 255.0);
    check.range("random.octave_base", random.octave_base, 1.0, 20_000.0);
    check.range("random.length_min", random.length_min, 0.0, 3600.0);
    check.range("random.length_max", random.length_max, 0.0, 3600.0);
    check.rule(
        "random.length_max",
        random.length_max >= random.length_min,
        "must not be less than random.length_min",
    );

    let engine = &config.engine;
    check.range("engine.sweep_interval", engine.sweep_interval, 0.001, 60.0);
    check.range(
        "engine.queue_capacity",
        engine.queue_capacity as f64,
        2.0,
        65_536.0,
    );

    check.finish()
}
