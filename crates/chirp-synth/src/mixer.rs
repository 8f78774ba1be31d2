//! Master volume and hard clipping over a set of voices.

use crate::{RandomSource, SoundWave, SynthError};

/// Master volume a new [`Mixer`] starts with.
pub const DEFAULT_MASTER_VOLUME: f64 = 0.7;

/// Output ceiling a new [`Mixer`] starts with.
pub const DEFAULT_MAX_VOLUME: f64 = 0.8;

/// Highest accepted output ceiling, just short of full scale.
pub const MAX_VOLUME_CEILING: f64 = 0.995;

/// Sums voices, applies the master volume and clips to `±max_volume`.
///
/// # Example
///
/// ```rust
/// use chirp_synth::Mixer;
///
/// let mut mixer = Mixer::default();
/// mixer.set_max_volume(2.0).unwrap();
/// assert_eq!(mixer.max_volume(), 0.995);
/// assert_eq!(mixer.clip(1.5), 0.995);
/// assert!(mixer.set_master_volume(-1.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mixer {
    master_volume: f64,
    max_volume: f64,
}

impl Default for Mixer {
    fn default() -> Self {
        Self {
            master_volume: DEFAULT_MASTER_VOLUME,
            max_volume: DEFAULT_MAX_VOLUME,
        }
    }
}

impl Mixer {
    /// Create a mixer with both volumes validated as by the setters.
    pub fn with_volumes(master_volume: f64, max_volume: f64) -> Result<Self, SynthError> {
        let mut mixer = Self::default();
        mixer.set_master_volume(master_volume)?;
        mixer.set_max_volume(max_volume)?;
        Ok(mixer)
    }

    /// Set the gain applied to every voice. Values above 1 are clamped to 1.
    pub fn set_master_volume(&mut self, volume: f64) -> Result<(), SynthError> {
        self.master_volume = checked_volume("master", volume)?.min(1.0);
        Ok(())
    }

    /// Set the clipping ceiling, clamped to [`MAX_VOLUME_CEILING`].
    pub fn set_max_volume(&mut self, volume: f64) -> Result<(), SynthError> {
        self.max_volume = checked_volume("max", volume)?.min(MAX_VOLUME_CEILING);
        Ok(())
    }

    /// Gain applied to every voice.
    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    /// Clipping ceiling.
    pub fn max_volume(&self) -> f64 {
        self.max_volume
    }

    /// Clip `sample` to `[-max_volume, max_volume]`.
    #[inline]
    pub fn clip(&self, sample: f64) -> f64 {
        sample.clamp(-self.max_volume, self.max_volume)
    }

    /// Mix every existing voice at `time`.
    ///
    /// An empty set of voices (or a set of empty slots) mixes to exactly 0.
    pub fn mix<R: RandomSource + ?Sized>(
        &self,
        time: f64,
        voices: &mut [SoundWave],
        rng: &mut R,
    ) -> f64 {
        let sum: f64 = voices
            .iter_mut()
            .filter(|voice| voice.exists())
            .map(|voice| self.master_volume * voice.get(time, rng))
            .sum();
        self.clip(sum)
    }
}

fn checked_volume(name: &'static str, value: f64) -> Result<f64, SynthError> {
    if value.is_nan() || value < 0.0 {
        Err(SynthError::InvalidVolume { name, value })
    } else {
        Ok(value)
    }
}
