//! A single voice: waveform, envelope and gain over a bounded lifetime.

use alloc::sync::Arc;

use chirp_core::EPSILON;
use libm::floor;

use crate::waveform::{self, WaveParams, WaveType};
use crate::{Envelope, RandomSource, SynthError};

/// Harmonic count of the additive sawtooth unless configured otherwise.
pub const DEFAULT_SAWTOOTH_HARMONICS: u32 = 12;

/// What to play, when and for how long.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaveProperties {
    /// Kind of wave.
    pub wave_type: WaveType,
    /// Frequency in Hz. Ignored by noise types.
    pub frequency: f64,
    /// Seconds from `start_time` until the envelope is released.
    pub length: f64,
    /// Absolute start time in seconds.
    pub start_time: f64,
}

impl WaveProperties {
    /// Bundle the four properties.
    pub fn new(wave_type: WaveType, frequency: f64, length: f64, start_time: f64) -> Self {
        Self {
            wave_type,
            frequency,
            length,
            start_time,
        }
    }
}

/// One voice, evaluated as a pure function of absolute time.
///
/// The default value is an empty slot (`WaveType::None`): it never sounds and
/// does not [`exist`](Self::exists).
///
/// The envelope is released automatically at exactly `start_time + length`,
/// independent of when the voice happens to be sampled. Two clones that were
/// started the same way therefore produce the same samples whatever thread
/// evaluates them.
#[derive(Debug, Clone, Default)]
pub struct SoundWave {
    properties: WaveProperties,
    params: WaveParams,
    envelope: Envelope,
    wave_volume: f64,
    noise: Option<Arc<[f64]>>,
    samples_per_second: f64,
}

impl SoundWave {
    /// Create a voice. The envelope is not started; call [`start`](Self::start).
    ///
    /// Periodic types need a positive finite frequency and every type needs a
    /// non-negative finite length.
    pub fn new(properties: WaveProperties, envelope: Envelope) -> Result<Self, SynthError> {
        let WaveProperties {
            wave_type,
            frequency,
            length,
            ..
        } = properties;

        if wave_type.is_periodic() && !(frequency.is_finite() && frequency > 0.0) {
            return Err(SynthError::InvalidFrequency(frequency));
        }
        if !(length.is_finite() && length >= 0.0) {
            return Err(SynthError::InvalidLength(length));
        }

        Ok(Self {
            properties,
            params: WaveParams::new(frequency, DEFAULT_SAWTOOTH_HARMONICS),
            envelope,
            wave_volume: wave_type.default_volume(),
            noise: None,
            samples_per_second: 0.0,
        })
    }

    /// Attach a precalculated noise buffer read at `samples_per_second`.
    ///
    /// The buffer is shared, so clones of this voice do not copy it.
    pub fn with_noise(mut self, noise: Arc<[f64]>, samples_per_second: f64) -> Self {
        self.noise = Some(noise);
        self.samples_per_second = samples_per_second.max(0.0);
        self
    }

    /// Set the per-voice gain, clamped to `[0, 1]`. NaN is ignored.
    pub fn set_wave_volume(&mut self, volume: f64) {
        if !volume.is_nan() {
            self.wave_volume = volume.clamp(0.0, 1.0);
        }
    }

    /// Set the harmonic count of the additive sawtooth.
    pub fn set_sawtooth_harmonics(&mut self, harmonics: u32) {
        self.params.harmonics = harmonics;
    }

    /// Turn the envelope on at `time`.
    pub fn start(&mut self, time: f64) {
        self.envelope.on(time);
    }

    /// Release the envelope at `time`.
    pub fn stop(&mut self, time: f64) {
        self.envelope.off(time);
    }

    /// Apply the automatic release if `time` has reached the end of the voice.
    pub fn advance(&mut self, time: f64) {
        let end = self.properties.start_time + self.properties.length;
        if self.envelope.is_on() && time >= end {
            self.envelope.off(end);
        }
    }

    /// Sample at `time`.
    ///
    /// Empty slots and times before the start yield 0. Live noise draws one
    /// real from `rng`; every other type leaves `rng` untouched.
    pub fn get<R: RandomSource + ?Sized>(&mut self, time: f64, rng: &mut R) -> f64 {
        if !self.exists() || time < self.properties.start_time {
            return 0.0;
        }
        self.advance(time);

        let gain = self.envelope.get(time) * self.wave_volume;
        if gain < EPSILON {
            return 0.0;
        }

        let raw = match self.properties.wave_type {
            WaveType::Noise => rng.generate_real(),
            WaveType::NoisePrecalculated => self.noise_at(time),
            wave_type => waveform::sample(wave_type, &self.params, time),
        };
        gain * raw
    }

    fn noise_at(&self, time: f64) -> f64 {
        match &self.noise {
            Some(noise) if !noise.is_empty() => {
                let offset = floor((time - self.properties.start_time) * self.samples_per_second);
                noise[(offset as usize) % noise.len()]
            }
            _ => 0.0,
        }
    }

    /// Whether the voice has been released and its release has elapsed.
    pub fn done(&self, time: f64) -> bool {
        self.envelope.done(time)
    }

    /// Whether the slot holds a voice.
    pub fn exists(&self) -> bool {
        self.properties.wave_type != WaveType::None
    }

    /// Empty the slot, keeping the noise buffer allocation alive.
    ///
    /// Dropping the last reference to a noise buffer frees memory, which the
    /// audio thread must never do; the buffer is released when the slot is
    /// next overwritten on the thread that owns it.
    pub fn clear(&mut self) {
        self.properties = WaveProperties::default();
        self.params = WaveParams::default();
        self.envelope = Envelope::default();
        self.wave_volume = 0.0;
    }

    /// Drop the attached noise buffer.
    pub fn release_noise(&mut self) {
        self.noise = None;
    }

    /// Play properties.
    pub fn properties(&self) -> &WaveProperties {
        &self.properties
    }

    /// Frequency-derived constants.
    pub fn params(&self) -> &WaveParams {
        &self.params
    }

    /// Envelope state.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Per-voice gain.
    pub fn wave_volume(&self) -> f64 {
        self.wave_volume
    }

    /// Attached noise buffer, if any.
    pub fn noise(&self) -> Option<&Arc<[f64]>> {
        self.noise.as_ref()
    }

    /// Read rate of the noise buffer.
    pub fn samples_per_second(&self) -> f64 {
        self.samples_per_second
    }
}
