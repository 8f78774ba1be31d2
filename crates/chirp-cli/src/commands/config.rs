//! Configuration file command.

use std::path::PathBuf;

use anyhow::{Context, bail};
use chirp_config::{ChirpConfig, paths};
use clap::{Args, Subcommand};

use crate::settings;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show {
        /// Config file (defaults to CHIRP_CONFIG or the platform config path)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    Init {
        /// Destination (defaults to the user config file)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show where configuration is looked up
    Path,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { config } => {
            let loaded = settings::load(config.as_deref())?;
            match &loaded.path {
                Some(path) => println!("# {}", path.display()),
                None => println!("# defaults (no config file found)"),
            }
            print!("{}", loaded.config.to_toml()?);
        }

        ConfigCommand::Init { path, force } => {
            let path = path.unwrap_or_else(paths::user_config_file);
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ChirpConfig::default()
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote default configuration to {}", path.display());
        }

        ConfigCommand::Path => {
            println!("Configuration Paths");
            println!("===================\n");
            match std::env::var_os(paths::CONFIG_ENV_VAR) {
                Some(value) => println!(
                    "  {}: {}",
                    paths::CONFIG_ENV_VAR,
                    PathBuf::from(value).display()
                ),
                None => println!("  {}: (not set)", paths::CONFIG_ENV_VAR),
            }
            println!("  User:   {}", paths::user_config_file().display());
            if let Some(system) = paths::system_config_file() {
                println!("  System: {}", system.display());
            }
            println!();
            match paths::find_config(None) {
                Some(active) => println!("Active: {}", active.display()),
                None => println!("Active: none (using defaults)"),
            }
        }
    }

    Ok(())
}
