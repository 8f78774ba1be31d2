//! Oscillator waveforms as pure functions of time.

use core::f64::consts::{FRAC_2_PI, FRAC_PI_2, PI, TAU};
use core::fmt;
use core::str::FromStr;

use alloc::string::ToString;
use chirp_core::{approx_sin_taylor, rem_euclid};
use libm::{asin, sin};

use crate::SynthError;

/// Kind of wave a voice produces.
///
/// `None` marks an empty voice slot: it always evaluates to zero and does not
/// count as an existing voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WaveType {
    /// `sin(ωt)`.
    Sine,
    /// Sign of `sin(ωt)`.
    Square,
    /// `(2/π)·asin(sin(ωt))`.
    Triangle,
    /// Additive sawtooth from a configurable number of harmonics.
    Sawtooth,
    /// Closed-form sawtooth, constant cost per sample.
    SawtoothOptimized,
    /// One fresh random sample per evaluation.
    Noise,
    /// Circular lookup into a buffer of noise generated up front.
    NoisePrecalculated,
    /// Empty slot.
    #[default]
    None,
}

impl WaveType {
    /// Every audible wave type.
    pub const AUDIBLE: [WaveType; 7] = [
        WaveType::Sine,
        WaveType::Square,
        WaveType::Triangle,
        WaveType::Sawtooth,
        WaveType::SawtoothOptimized,
        WaveType::Noise,
        WaveType::NoisePrecalculated,
    ];

    /// Per-voice gain a new voice of this type starts with.
    ///
    /// Square and the closed-form sawtooth are attenuated since their hard
    /// edges are perceived as much louder than a sine of the same amplitude.
    pub fn default_volume(self) -> f64 {
        match self {
            WaveType::Square => 0.6,
            WaveType::SawtoothOptimized => 0.7,
            _ => 1.0,
        }
    }

    /// Whether the type is driven by a frequency.
    pub fn is_periodic(self) -> bool {
        matches!(
            self,
            WaveType::Sine
                | WaveType::Square
                | WaveType::Triangle
                | WaveType::Sawtooth
                | WaveType::SawtoothOptimized
        )
    }

    /// Whether the type draws from a random source or noise buffer.
    pub fn is_noise(self) -> bool {
        matches!(self, WaveType::Noise | WaveType::NoisePrecalculated)
    }

    /// Short lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            WaveType::Sine => "sine",
            WaveType::Square => "square",
            WaveType::Triangle => "triangle",
            WaveType::Sawtooth => "saw",
            WaveType::SawtoothOptimized => "saw-fast",
            WaveType::Noise => "live-noise",
            WaveType::NoisePrecalculated => "noise",
            WaveType::None => "none",
        }
    }
}

impl fmt::Display for WaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveType {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" | "sin" => Ok(WaveType::Sine),
            "square" | "sq" => Ok(WaveType::Square),
            "triangle" | "tri" => Ok(WaveType::Triangle),
            "saw" | "sawtooth" => Ok(WaveType::Sawtooth),
            "saw-fast" | "sawtooth-optimized" => Ok(WaveType::SawtoothOptimized),
            "live-noise" => Ok(WaveType::Noise),
            "noise" => Ok(WaveType::NoisePrecalculated),
            "none" => Ok(WaveType::None),
            _ => Err(SynthError::UnknownWaveType(s.to_string())),
        }
    }
}

/// Frequency-derived constants of a periodic voice.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WaveParams {
    /// `2π · frequency`.
    pub angular_velocity: f64,
    /// Frequency in Hz.
    pub frequency: f64,
    /// `1 / frequency`, or 0 for a non-positive frequency.
    pub period: f64,
    /// Harmonic count of the additive sawtooth.
    pub harmonics: u32,
}

impl WaveParams {
    /// Derive the constants for `frequency` Hz.
    pub fn new(frequency: f64, harmonics: u32) -> Self {
        if frequency > 0.0 {
            Self {
                angular_velocity: TAU * frequency,
                frequency,
                period: 1.0 / frequency,
                harmonics,
            }
        } else {
            Self {
                harmonics,
                ..Self::default()
            }
        }
    }
}

/// Raw oscillator output of `wave_type` at `time` seconds, in `[-1, 1]`.
///
/// Noise types and `None` yield 0 here: they need a random source or a noise
/// buffer, which [`SoundWave`](crate::SoundWave) supplies.
///
/// # Example
///
/// ```rust
/// use chirp_synth::{WaveParams, WaveType, waveform::sample};
///
/// let params = WaveParams::new(110.0, 12);
/// let mid_period = params.period / 2.0;
/// assert!(sample(WaveType::SawtoothOptimized, &params, mid_period).abs() < 1e-9);
/// ```
pub fn sample(wave_type: WaveType, params: &WaveParams, time: f64) -> f64 {
    let phase = params.angular_velocity * time;

    match wave_type {
        WaveType::Sine => sin(phase),
        WaveType::Square => {
            if sin(phase) > 0.0 {
                1.0
            } else {
                -1.0
            }
        }
        WaveType::Triangle => FRAC_2_PI * asin(sin(phase)),
        WaveType::Sawtooth => additive_sawtooth(phase, params.harmonics),
        WaveType::SawtoothOptimized => {
            if params.period > 0.0 {
                let ramp = PI * params.frequency * rem_euclid(time, params.period) - FRAC_PI_2;
                (FRAC_2_PI * ramp).clamp(-1.0, 1.0)
            } else {
                0.0
            }
        }
        WaveType::Noise | WaveType::NoisePrecalculated | WaveType::None => 0.0,
    }
}

/// `-(2/π) Σ sin(nφ)/n` for `n = 1..=harmonics`.
///
/// The partial sum overshoots by roughly 18% next to the edge (Gibbs), so the
/// result is clipped to `[-1, 1]`.
fn additive_sawtooth(phase: f64, harmonics: u32) -> f64 {
    let mut sum = 0.0;
    for n in 1..=harmonics {
        let n = f64::from(n);
        sum += approx_sin_taylor(n * phase) / n;
    }
    (-FRAC_2_PI * sum).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIODIC: [WaveType; 5] = [
        WaveType::Sine,
        WaveType::Square,
        WaveType::Triangle,
        WaveType::Sawtooth,
        WaveType::SawtoothOptimized,
    ];

    #[test]
    fn test_default_volumes() {
        assert_eq!(WaveType::Square.default_volume(), 0.6);
        assert_eq!(WaveType::SawtoothOptimized.default_volume(), 0.7);
        assert_eq!(WaveType::Sine.default_volume(), 1.0);
        assert_eq!(WaveType::Sawtooth.default_volume(), 1.0);
        assert_eq!(WaveType::NoisePrecalculated.default_volume(), 1.0);
    }

    #[test]
    fn test_optimized_sawtooth_zero_at_half_period() {
        let params = WaveParams::new(110.0, 12);
        let value = sample(WaveType::SawtoothOptimized, &params, params.period / 2.0);
        assert!(value.abs() < 1e-9, "got {value}");
    }

    #[test]
    fn test_optimized_sawtooth_ramp() {
        let params = WaveParams::new(100.0, 12);
        assert!((sample(WaveType::SawtoothOptimized, &params, 0.0) + 1.0).abs() < 1e-9);
        let quarter = sample(WaveType::SawtoothOptimized, &params, params.period * 0.25);
        assert!((quarter + 0.5).abs() < 1e-9);
        let three_quarters = sample(WaveType::SawtoothOptimized, &params, params.period * 0.75);
        assert!((three_quarters - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_additive_sawtooth_tracks_closed_form() {
        let params = WaveParams::new(50.0, 24);
        // away from the wrap edge the two sawtooth forms agree closely
        for i in 2..18 {
            let t = params.period * f64::from(i) / 20.0;
            let additive = sample(WaveType::Sawtooth, &params, t);
            let closed = sample(WaveType::SawtoothOptimized, &params, t);
            assert!((additive - closed).abs() < 0.1, "t={t}: {additive} vs {closed}");
        }
    }

    #[test]
    fn test_square_and_triangle_shape() {
        let params = WaveParams::new(1.0, 0);
        assert_eq!(sample(WaveType::Square, &params, 0.25), 1.0);
        assert_eq!(sample(WaveType::Square, &params, 0.75), -1.0);
        assert!((sample(WaveType::Triangle, &params, 0.25) - 1.0).abs() < 1e-9);
        assert!((sample(WaveType::Triangle, &params, 0.125) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_periodic_bounded() {
        let params = WaveParams::new(440.0, 15);
        for wave_type in PERIODIC {
            for i in 0..2000 {
                let t = f64::from(i) * 1.3e-4;
                let value = sample(wave_type, &params, t);
                assert!((-1.0..=1.0).contains(&value), "{wave_type} at {t}: {value}");
            }
        }
    }

    #[test]
    fn test_non_periodic_types_are_zero() {
        let params = WaveParams::new(440.0, 12);
        for wave_type in [WaveType::Noise, WaveType::NoisePrecalculated, WaveType::None] {
            assert_eq!(sample(wave_type, &params, 0.3), 0.0);
        }
    }

    #[test]
    fn test_zero_frequency_params() {
        let params = WaveParams::new(0.0, 12);
        assert_eq!(params.period, 0.0);
        assert_eq!(sample(WaveType::SawtoothOptimized, &params, 1.0), 0.0);
        assert_eq!(sample(WaveType::Sine, &params, 1.0), 0.0);
    }

    #[test]
    fn test_wave_type_names_round_trip() {
        for wave_type in WaveType::AUDIBLE {
            assert_eq!(wave_type.name().parse::<WaveType>(), Ok(wave_type));
        }
        assert!(matches!(
            "organ".parse::<WaveType>(),
            Err(SynthError::UnknownWaveType(name)) if name == "organ"
        ));
    }

    #[test]
    fn test_classification() {
        assert!(WaveType::Sine.is_periodic());
        assert!(!WaveType::Noise.is_periodic());
        assert!(WaveType::NoisePrecalculated.is_noise());
        assert!(!WaveType::None.is_periodic());
        assert!(!WaveType::None.is_noise());
    }
}
