//! Chirp CLI - play, render and configure the chirp synthesizer.

mod commands;
mod scope;
mod settings;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chirp")]
#[command(author, version, about = "Chirp additive synthesizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play voices live, controlled from stdin
    Play(commands::play::PlayArgs),

    /// Render random voices to a WAV file
    Render(commands::render::RenderArgs),

    /// List audio output devices
    Devices(commands::devices::DevicesArgs),

    /// Show or create the configuration file
    Config(commands::config::ConfigArgs),
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    tracing_log::LogTracer::init().ok();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Play(args) => commands::play::run(args),
        Commands::Render(args) => commands::render::run(args),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_play_flags() {
        let cli = Cli::try_parse_from([
            "chirp", "play", "--null", "--auto", "0.5", "--direct", "--device", "usb",
        ])
        .unwrap();
        let Commands::Play(args) = cli.command else {
            panic!("expected play");
        };
        assert!(args.null);
        assert!(args.direct);
        assert_eq!(args.auto, Some(0.5));
        assert_eq!(args.device.as_deref(), Some("usb"));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_parse_render_waves() {
        let cli = Cli::try_parse_from([
            "chirp", "render", "out.wav", "--wave", "sine", "--wave", "saw-fast", "--seed", "7",
        ])
        .unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(
            args.wave,
            vec![
                chirp_synth::WaveType::Sine,
                chirp_synth::WaveType::SawtoothOptimized
            ]
        );
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.output.to_str(), Some("out.wav"));
    }

    #[test]
    fn test_render_rejects_unknown_wave() {
        assert!(Cli::try_parse_from(["chirp", "render", "out.wav", "--wave", "kazoo"]).is_err());
    }

    #[test]
    fn test_render_rejects_silent_wave() {
        assert!(Cli::try_parse_from(["chirp", "render", "out.wav", "--wave", "none"]).is_err());
    }

    #[test]
    fn test_play_rejects_non_positive_auto() {
        assert!(Cli::try_parse_from(["chirp", "play", "--auto", "0"]).is_err());
    }

    #[test]
    fn test_parse_config_subcommands() {
        assert!(Cli::try_parse_from(["chirp", "config", "path"]).is_ok());
        assert!(Cli::try_parse_from(["chirp", "config", "init", "--force"]).is_ok());
        assert!(Cli::try_parse_from(["chirp", "config", "show", "--config", "x.toml"]).is_ok());
    }
}
