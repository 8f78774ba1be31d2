//! Audio device listing command.

use chirp_io::{AudioBackend, AudioDevice, CpalBackend, NullBackend};
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    command: Option<DevicesCommand>,

    /// Query the silent test backend instead of the system host
    #[arg(long, global = true)]
    null: bool,
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List all output devices
    List,

    /// Show the default output device
    Info,
}

fn describe(device: &AudioDevice) -> String {
    let also_input = if device.is_input { " (also input)" } else { "" };
    format!(
        "{} ({} Hz, {} ch){}",
        device.name, device.default_sample_rate, device.default_channels, also_input
    )
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    let backend: Box<dyn AudioBackend> = if args.null {
        Box::new(NullBackend::new())
    } else {
        Box::new(CpalBackend::new())
    };

    match args.command.unwrap_or(DevicesCommand::List) {
        DevicesCommand::List => {
            let devices: Vec<_> = backend
                .list_devices()?
                .into_iter()
                .filter(|d| d.is_output)
                .collect();

            if devices.is_empty() {
                println!("No output devices found.");
                return Ok(());
            }

            println!("Output Devices ({})", backend.name());
            println!("==============\n");
            for (idx, device) in devices.iter().enumerate() {
                println!("  [{idx}] {}", describe(device));
            }
            println!();
            println!("Tip: pass a partial name to select a device:");
            println!("  chirp play --device \"{}\"", devices[0].name);
        }

        DevicesCommand::Info => match backend.default_output_device()? {
            Some(device) => {
                println!("Default Output Device");
                println!("=====================\n");
                println!("  Name:        {}", device.name);
                println!("  Sample rate: {} Hz", device.default_sample_rate);
                println!("  Channels:    {}", device.default_channels);
            }
            None => println!("No default output device."),
        },
    }

    Ok(())
}
