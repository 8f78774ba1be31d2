//! Configuration for the chirp synthesizer.
//!
//! One TOML file describes the output stream, mix volumes, voice parameters,
//! random voice selection and the thread layout of the engine.
//!
//! # Features
//!
//! - **Config file**: [`ChirpConfig`] with one serde section per concern
//! - **Validation**: [`validate_config`] reports every out-of-range value
//! - **Paths**: platform config locations and the `CHIRP_CONFIG` override
//!
//! # Example
//!
//! ```rust,no_run
//! use chirp_config::{ChirpConfig, paths};
//!
//! let path = paths::find_config(None).unwrap_or_else(paths::user_config_file);
//! let mut config = ChirpConfig::load_or_default(&path)?;
//!
//! config.mix.master_volume = 0.5;
//! config.random.seed = Some(42);
//! config.save(&path)?;
//! # Ok::<(), chirp_config::ConfigError>(())
//! ```

mod config;
mod error;

/// Platform-specific paths for the config file.
#[cfg(feature = "std")]
pub mod paths;

/// Range checks for config values.
pub mod validation;

pub use config::{
    ChirpConfig, EngineSection, EnvelopeSection, MixSection, OutputSection, RandomSection,
    VoicesSection,
};
pub use error::ConfigError;
#[cfg(feature = "std")]
pub use paths::{ensure_user_config_dir, find_config, user_config_dir, user_config_file};
pub use validation::{ValidationError, ValidationResult, validate_config};
