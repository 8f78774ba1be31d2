//! Error types for synthesis configuration.

use alloc::string::String;

/// Errors raised when a voice, mixer or generator is configured with values
/// it cannot use.
///
/// These are construction and setter errors. Nothing on the per-sample path
/// returns an error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthError {
    /// A periodic wave was given a frequency that is not positive and finite.
    #[error("frequency must be positive and finite, got {0}")]
    InvalidFrequency(f64),

    /// A voice length was negative or not finite.
    #[error("voice length must be non-negative and finite, got {0}")]
    InvalidLength(f64),

    /// A volume setter received a negative or NaN value.
    #[error("{name} volume must be a non-negative number, got {value}")]
    InvalidVolume {
        /// Which volume was being set.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A random range had a non-finite bound.
    #[error("random range bounds must be finite, got {from}..{to}")]
    InvalidRange {
        /// Lower bound as given.
        from: f64,
        /// Upper bound as given.
        to: f64,
    },

    /// A wave type name did not match any known type.
    #[error("unknown wave type: {0}")]
    UnknownWaveType(String),

    /// A random algorithm name did not match any known algorithm.
    #[error("unknown random algorithm: {0}")]
    UnknownAlgorithm(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn invalid_frequency_display() {
        let msg = SynthError::InvalidFrequency(-3.0).to_string();
        assert_eq!(msg, "frequency must be positive and finite, got -3");
    }

    #[test]
    fn invalid_volume_display() {
        let err = SynthError::InvalidVolume {
            name: "master",
            value: -0.5,
        };
        assert_eq!(
            err.to_string(),
            "master volume must be a non-negative number, got -0.5"
        );
    }

    #[test]
    fn unknown_names_display() {
        assert_eq!(
            SynthError::UnknownWaveType("kazoo".into()).to_string(),
            "unknown wave type: kazoo"
        );
        assert_eq!(
            SynthError::UnknownAlgorithm("mt".into()).to_string(),
            "unknown random algorithm: mt"
        );
    }
}
