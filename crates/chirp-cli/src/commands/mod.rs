//! CLI subcommands.

pub mod config;
pub mod devices;
pub mod play;
pub mod render;

use chirp_synth::WaveType;

/// Parse an audible wave type name for clap.
pub(crate) fn parse_wave(s: &str) -> Result<WaveType, String> {
    let wave_type: WaveType = s.parse().map_err(|e| format!("{e}"))?;
    if wave_type == WaveType::None {
        return Err("'none' is not an audible wave type".to_string());
    }
    Ok(wave_type)
}

/// Parse a strictly positive number of seconds for clap.
pub(crate) fn parse_seconds(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("invalid number: {s}"))?;
    if !(value.is_finite() && value > 0.0) {
        return Err(format!("must be a positive number of seconds, got {s}"));
    }
    Ok(value)
}

/// Comma-separated list of wave names accepted on the command line.
pub(crate) fn wave_names() -> String {
    WaveType::AUDIBLE
        .iter()
        .map(|w| w.name())
        .collect::<Vec<_>>()
        .join(", ")
}
