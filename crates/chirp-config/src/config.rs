//! The `chirp` configuration file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use chirp_synth::{
    AdrTimes, DEFAULT_MASTER_VOLUME, DEFAULT_MAX_VOLUME, DEFAULT_SAWTOOTH_HARMONICS, Envelope,
    RandAlgorithm, VoiceSettings,
};

use crate::error::ConfigError;
use crate::validation::{ValidationResult, validate_config};

/// Complete synthesizer configuration.
///
/// Every section and every field is optional in the file; missing values take
/// their defaults.
///
/// # TOML Format
///
/// ```toml
/// [output]
/// device = "USB Audio"
/// sample_rate = 48000
/// latency = 0.05
///
/// [mix]
/// master_volume = 0.7
/// max_volume = 0.8
///
/// [voices]
/// capacity = 64
/// sawtooth_harmonics = 12
/// noise_resolution = 1.0
///
/// [envelope]
/// attack = 0.1
/// decay = 0.01
/// release = 0.2
/// amplitude_start = 1.0
/// amplitude_sustain = 0.8
///
/// [random]
/// algorithm = "lehmer32"
/// seed = 42
/// tones = 48
/// octave_base = 110.0
/// length_min = 0.1
/// length_max = 1.5
///
/// [engine]
/// intermediary = true
/// sweep_interval = 1.0
/// queue_capacity = 64
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChirpConfig {
    /// Output device and stream.
    pub output: OutputSection,
    /// Mix volumes.
    pub mix: MixSection,
    /// Voice table and waveform detail.
    pub voices: VoicesSection,
    /// Envelope applied to new voices.
    pub envelope: EnvelopeSection,
    /// Random voice selection.
    pub random: RandomSection,
    /// Thread layout.
    pub engine: EngineSection,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSection {
    /// Device name filter; the system default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Name the stream is reported under.
    pub stream_name: String,
    /// Sample rate in Hz, 0 for the device default.
    pub sample_rate: u32,
    /// Channel count, 0 for the device default.
    pub channels: u16,
    /// Most frames rendered per block.
    pub max_frames: u32,
    /// Target output latency in seconds, 0 for the device default.
    pub latency: f64,
}

impl Default for OutputSection {
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

/// `[mix]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MixSection {
    /// Gain applied to every voice; values above 1 are clamped.
    pub master_volume: f64,
    /// Hard clip level; values above 0.995 are clamped.
    pub max_volume: f64,
}

impl Default for MixSection {
    fn default() -> Self {
        Self {
            master_volume: DEFAULT_MASTER_VOLUME,
            max_volume: DEFAULT_MAX_VOLUME,
        }
    }
}

/// `[voices]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoicesSection {
    /// Slots in each voice table.
    pub capacity: usize,
    /// Harmonics summed by the additive sawtooth.
    pub sawtooth_harmonics: u32,
    /// Scale of the precalculated noise sample count.
    pub noise_resolution: f64,
}

impl Default for VoicesSection {
    fn default() -> Self {
        Self {
            capacity: 64,
            sawtooth_harmonics: DEFAULT_SAWTOOTH_HARMONICS,
            noise_resolution: 1.0,
        }
    }
}

/// `[envelope]` section, times in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvelopeSection {
    /// Rise from 0 to `amplitude_start`.
    pub attack: f64,
    /// Fall from `amplitude_start` to `amplitude_sustain`.
    pub decay: f64,
    /// Fall to 0 after the voice ends.
    pub release: f64,
    /// Peak level reached by the attack.
    pub amplitude_start: f64,
    /// Level held until release.
    pub amplitude_sustain: f64,
}

impl Default for EnvelopeSection {
    fn default() -> Self {
        Self {
            attack: 0.1,
            decay: 0.01,
            release: 0.2,
            amplitude_start: 1.0,
            amplitude_sustain: 0.8,
        }
    }
}

impl EnvelopeSection {
    /// The envelope these values describe.
    pub fn envelope(&self) -> Envelope {
        Envelope::new(
            AdrTimes::new(self.attack, self.decay, self.release),
            self.amplitude_start,
            self.amplitude_sustain,
        )
    }
}

/// `[random]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RandomSection {
    /// Generator algorithm: `lehmer32` or `std`.
    #[serde(with = "algorithm_name")]
    pub algorithm: RandAlgorithm,
    /// Root seed; seeded from the operating system when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Semitones above `octave_base` new voices are drawn from.
    pub tones: u8,
    /// Lowest voice frequency in Hz.
    pub octave_base: f64,
    /// Shortest voice length in seconds.
    pub length_min: f64,
    /// Longest voice length in seconds.
    pub length_max: f64,
}

impl Default for RandomSection {
    fn default() -> Self {
        Self {
            algorithm: RandAlgorithm::default(),
            seed: None,
            tones: 48,
            octave_base: 110.0,
            length_min: 0.1,
            length_max: 1.5,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSection {
    /// Relay commands through a dedicated thread instead of the caller.
    pub intermediary: bool,
    /// Seconds between sweeps of finished voices.
    pub sweep_interval: f64,
    /// Slots in the command and voice queues.
    pub queue_capacity: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            intermediary: true,
            sweep_interval: 1.0,
            queue_capacity: 64,
        }
    }
}

mod algorithm_name {
    use chirp_synth::RandAlgorithm;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        algorithm: &RandAlgorithm,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(algorithm.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<RandAlgorithm, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

impl ChirpConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse a config from a TOML string without range checks.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Convert the config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the config to a TOML file, creating its directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Check every value against its allowed range.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_config(self)
    }

    /// Parameters for new voices.
    pub fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings {
            envelope: self.envelope.envelope(),
            sawtooth_harmonics: self.voices.sawtooth_harmonics,
            noise_resolution: self.voices.noise_resolution,
            tones: self.random.tones,
            octave_base: self.random.octave_base,
            length_min: self.random.length_min,
            length_max: self.random.length_max,
        }
    }
}
