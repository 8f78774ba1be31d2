//! Construction of new voices with random pitch and length.
//!
//! A new voice gets a pitch `octave_base * 2^(k/12)` where `k` is a random
//! semitone in `[0, tones)`, a random length in `[length_min, length_max]`
//! seconds and a copy of the configured envelope. Precalculated noise voices
//! also get their noise buffer here, so the audio thread never generates it.

use alloc::sync::Arc;
use alloc::vec::Vec;

use libm::exp2;

use crate::{
    AdrTimes, DEFAULT_SAWTOOTH_HARMONICS, Envelope, Rand, RandomSource, SoundWave, SynthError,
    WaveProperties, WaveType,
};

/// Parameters shared by every voice a [`VoiceFactory`] creates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    /// Envelope template, copied into each voice before it is started.
    pub envelope: Envelope,
    /// Harmonic count of the additive sawtooth.
    pub sawtooth_harmonics: u32,
    /// Fraction of the nominal noise length actually precalculated. Lower
    /// values make the noise buffer repeat sooner.
    pub noise_resolution: f64,
    /// Number of semitones above `octave_base` to pick from.
    pub tones: u8,
    /// Lowest pitch in Hz.
    pub octave_base: f64,
    /// Shortest voice length in seconds.
    pub length_min: f64,
    /// Longest voice length in seconds.
    pub length_max: f64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            envelope: Envelope::new(AdrTimes::new(0.1, 0.01, 0.2), 1.0, 0.8),
            sawtooth_harmonics: DEFAULT_SAWTOOTH_HARMONICS,
            noise_resolution: 1.0,
            tones: 48,
            octave_base: 110.0,
            length_min: 0.1,
            length_max: 1.5,
        }
    }
}

/// Size and read rate of a precalculated noise buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseLayout {
    /// Buffer entries consumed per second of playback.
    pub samples_per_second: f64,
    /// Number of entries to generate.
    pub count: usize,
}

impl NoiseLayout {
    /// Layout for a voice of `length` seconds with the given envelope times.
    ///
    /// The buffer is read at `sample_rate / (length + decay)` entries per
    /// second and covers the voice plus its release, scaled by `resolution`.
    pub fn new(sample_rate: f64, length: f64, times: AdrTimes, resolution: f64) -> Self {
        let span = length + times.decay;
        let samples_per_second = if span > 0.0 { sample_rate / span } else { 0.0 };
        let count = ((length + times.release) * samples_per_second * resolution).max(0.0) as usize + 1;
        Self {
            samples_per_second,
            count,
        }
    }
}

/// Fill a new shared buffer with `count` reals from `rng`.
pub fn precalculate_noise<R: RandomSource + ?Sized>(rng: &mut R, count: usize) -> Arc<[f64]> {
    let mut noise = Vec::with_capacity(count);
    noise.extend((0..count).map(|_| rng.generate_real()));
    noise.into()
}

/// Creates started voices from a wave type and a start time.
///
/// Owns two generators: one for pitch and length, one for noise samples in
/// `[-1, 1]`. Both derive from the generator passed to [`new`](Self::new), so a
/// seeded factory produces the same voices every run.
///
/// # Example
///
/// ```rust
/// use chirp_synth::{Rand, RandAlgorithm, VoiceFactory, VoiceSettings, WaveType};
///
/// let rng = Rand::new(RandAlgorithm::Lehmer32, 1);
/// let mut factory = VoiceFactory::new(VoiceSettings::default(), 48_000.0, rng).unwrap();
///
/// let wave = factory.create(WaveType::Sine, 2.0).unwrap();
/// assert!(wave.envelope().is_on());
/// assert!(wave.properties().frequency >= 110.0);
/// assert!((0.1..=1.5).contains(&wave.properties().length));
/// ```
#[derive(Debug, Clone)]
pub struct VoiceFactory {
    rng: Rand,
    noise_rng: Rand,
    settings: VoiceSettings,
    sample_rate: f64,
}

impl VoiceFactory {
    /// Create a factory drawing from `rng`.
    pub fn new(settings: VoiceSettings, sample_rate: f64, mut rng: Rand) -> Result<Self, SynthError> {
        if !(settings.octave_base.is_finite() && settings.octave_base > 0.0) {
            return Err(SynthError::InvalidFrequency(settings.octave_base));
        }
        if settings.length_min < 0.0 {
            return Err(SynthError::InvalidLength(settings.length_min));
        }

        let mut noise_rng = rng.split();
        noise_rng.set_real_limits(-1.0, 1.0)?;

        rng.set_byte_limits(0, settings.tones.max(1) - 1);
        rng.set_real_limits(settings.length_min, settings.length_max)?;

        Ok(Self {
            rng,
            noise_rng,
            settings,
            sample_rate,
        })
    }

    /// Create a voice of `wave_type` starting at `start_time`, envelope on.
    pub fn create(&mut self, wave_type: WaveType, start_time: f64) -> Result<SoundWave, SynthError> {
        let semitone = f64::from(self.rng.generate_byte());
        let frequency = self.settings.octave_base * exp2(semitone / 12.0);
        let length = self.rng.generate_real();

        let envelope = self.settings.envelope;
        let props = WaveProperties::new(wave_type, frequency, length, start_time);
        let mut wave = SoundWave::new(props, envelope)?;
        wave.set_sawtooth_harmonics(self.settings.sawtooth_harmonics);

        if wave_type == WaveType::NoisePrecalculated {
            let layout = NoiseLayout::new(
                self.sample_rate,
                length,
                envelope.times(),
                self.settings.noise_resolution,
            );
            let noise = precalculate_noise(&mut self.noise_rng, layout.count);
            wave = wave.with_noise(noise, layout.samples_per_second);
        }

        wave.start(start_time);
        Ok(wave)
    }

    /// Derive an independent generator for a thread that needs its own
    /// randomness, such as the audio thread's live noise.
    pub fn split_rng(&mut self) -> Rand {
        self.noise_rng.split()
    }

    /// Voice parameters.
    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    /// Output rate noise buffers are laid out for.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
