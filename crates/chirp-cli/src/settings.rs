//! Config file to engine settings.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chirp_config::{ChirpConfig, find_config};
use chirp_io::{EngineSettings, OutputConfig, Relay};

/// Config to use plus the file it came from, if any.
pub struct Loaded {
    pub config: ChirpConfig,
    pub path: Option<PathBuf>,
}

/// Load the config named by `explicit`, `CHIRP_CONFIG` or the platform paths.
///
/// With no file anywhere the defaults are used. An explicit or environment
/// path that does not exist is an error.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Loaded> {
    let Some(path) = find_config(explicit) else {
        tracing::debug!("no config file found, using defaults");
        return Ok(Loaded {
            config: ChirpConfig::default(),
            path: None,
        });
    };

    let config = ChirpConfig::load(&path)
        .with_context(|| format!("loading config {}", path.display()))?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(Loaded {
        config,
        path: Some(path),
    })
}

/// Output stream settings from the `[output]` section.
pub fn output_config(config: &ChirpConfig) -> OutputConfig {
    let output = &config.output;
    OutputConfig {
        device: output.device.clone(),
        stream_name: output.stream_name.clone(),
        sample_rate: output.sample_rate,
        channels: output.channels,
        max_frames: output.max_frames,
        latency: output.latency,
    }
}

/// Engine settings from the remaining sections.
pub fn engine_settings(config: &ChirpConfig) -> EngineSettings {
    EngineSettings {
        capacity: config.voices.capacity,
        queue_capacity: config.engine.queue_capacity,
        relay: if config.engine.intermediary {
            Relay::Intermediary
        } else {
            Relay::Direct
        },
        sweep_interval: config.engine.sweep_interval,
        voices: config.voice_settings(),
        algorithm: config.random.algorithm,
        seed: config.random.seed,
        master_volume: config.mix.master_volume,
        max_volume: config.mix.max_volume,
    }
}
