//! Interactive playback command.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chirp_io::{AudioBackend, Command, CpalBackend, NullBackend, Relay, SoundEngine};
use chirp_synth::{Rand, RandomSource, WaveType};
use clap::Args;
use crossbeam_channel::{Receiver, never, select, tick, unbounded};

use crate::commands::{parse_seconds, wave_names};
use crate::{scope, settings};

/// Housekeeping period of the main loop.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Width of the `scope` plot in columns.
const SCOPE_WIDTH: usize = 72;
/// Height of the `scope` plot in rows.
const SCOPE_ROWS: usize = 15;
/// Window shown by `scope` without an argument, in milliseconds.
const DEFAULT_SCOPE_MS: f64 = 20.0;

#[derive(Args)]
pub struct PlayArgs {
    /// Config file (defaults to CHIRP_CONFIG or the platform config path)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Render into a silent output instead of an audio device
    #[arg(long)]
    pub null: bool,

    /// Output device name (partial match)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Add a random voice every SECS seconds
    #[arg(long, value_name = "SECS", value_parser = parse_seconds)]
    pub auto: Option<f64>,

    /// Build voices on the calling thread instead of the intermediary
    #[arg(long)]
    pub direct: bool,
}

/// One line of user input.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Engine(Command),
    Scope(f64),
    Volume(f64),
    Clip(f64),
    Status,
    Help,
    Quit,
}

fn parse_action(line: &str) -> Result<Option<Action>, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let mut number = |name: &str| -> Result<Option<f64>, String> {
        words
            .next()
            .map(|w| {
                w.parse::<f64>()
                    .map_err(|_| format!("{name}: expected a number, got '{w}'"))
            })
            .transpose()
    };

    let action = match word.to_ascii_lowercase().as_str() {
        "clear" => Action::Engine(Command::Clear),
        "quit" | "exit" | "q" => Action::Quit,
        "status" => Action::Status,
        "help" | "?" => Action::Help,
        "scope" => {
            let millis = number("scope")?.unwrap_or(DEFAULT_SCOPE_MS);
            if !(millis.is_finite() && millis > 0.0) {
                return Err("scope: window must be positive".to_string());
            }
            Action::Scope(millis / 1000.0)
        }
        "volume" => Action::Volume(number("volume")?.ok_or("volume: missing level")?),
        "clip" => Action::Clip(number("clip")?.ok_or("clip: missing level")?),
        other => match other.parse::<WaveType>() {
            Ok(WaveType::None) | Err(_) => {
                return Err(format!("unknown command '{word}', type 'help'"));
            }
            Ok(wave_type) => Action::Engine(Command::Add(wave_type)),
        },
    };
    Ok(Some(action))
}

fn print_help() {
    println!("Commands:");
    println!("  {}   add a voice", wave_names());
    println!("  clear            remove every voice");
    println!("  scope [ms]       draw the last ms of the mix (default {DEFAULT_SCOPE_MS})");
    println!("  volume <level>   set the master volume");
    println!("  clip <level>     set the clip level");
    println!("  status           show voice counts and stream statistics");
    println!("  quit             stop and exit");
}

/// Events feeding the main loop.
enum Input {
    Line(String),
    Eof,
    Interrupt,
}

fn spawn_stdin_reader(tx: crossbeam_channel::Sender<Input>) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("chirp-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(Input::Line(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(Input::Eof);
        })
        .context("spawning stdin reader")?;
    Ok(())
}

fn print_status(engine: &mut SoundEngine) {
    let status = engine.poll();
    let mixer = engine.mixer();
    println!(
        "time {:.2}s | voices: render {} audio {} | volume {:.2} clip {:.2}",
        status.time,
        status.render_voices,
        status.audio_voices,
        mixer.master_volume(),
        mixer.max_volume()
    );
    println!(
        "buffers {} | load {:.0}% | late {} | errors {}",
        status.sound.buffers,
        status.sound.load * 100.0,
        status.sound.underflows,
        status.sound.errors
    );
}

fn print_scope(engine: &SoundEngine, window: f64) {
    let mut samples = vec![0.0; SCOPE_WIDTH];
    if engine.render_window(engine.now(), window, &mut samples) {
        print!("{}", scope::draw(&samples, SCOPE_ROWS, engine.mixer().max_volume()));
    } else {
        println!("scope: voice table busy, try again");
    }
}

/// Handle one action. Returns `false` when playback should end.
fn apply(engine: &mut SoundEngine, action: Action) -> bool {
    match action {
        Action::Engine(command) => {
            if let Err(e) = engine.send(command) {
                println!("{e}");
            }
        }
        Action::Scope(window) => print_scope(engine, window),
        Action::Volume(level) => match engine.set_master_volume(level) {
            Ok(()) => println!("volume {:.2}", engine.mixer().master_volume()),
            Err(e) => println!("{e}"),
        },
        Action::Clip(level) => match engine.set_max_volume(level) {
            Ok(()) => println!("clip {:.2}", engine.mixer().max_volume()),
            Err(e) => println!("{e}"),
        },
        Action::Status => print_status(engine),
        Action::Help => print_help(),
        Action::Quit => return false,
    }
    engine.is_running()
}

fn random_wave(rng: &mut Rand) -> WaveType {
    WaveType::AUDIBLE[usize::from(rng.generate_byte())]
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let loaded = settings::load(args.config.as_deref())?;
    let config = loaded.config;

    let mut output = settings::output_config(&config);
    if let Some(device) = args.device {
        output.device = Some(device);
    }
    let mut engine_settings = settings::engine_settings(&config);
    if args.direct {
        engine_settings.relay = Relay::Direct;
    }

    let backend: Box<dyn AudioBackend> = if args.null {
        Box::new(NullBackend::new())
    } else {
        Box::new(CpalBackend::new())
    };

    let mut picker = match engine_settings.seed {
        Some(seed) => Rand::new(engine_settings.algorithm, seed.wrapping_add(1)),
        None => Rand::from_entropy(engine_settings.algorithm),
    };
    picker.set_byte_limits(0, (WaveType::AUDIBLE.len() - 1) as u8);

    let mut engine = SoundEngine::new(backend, output, engine_settings)
        .context("starting sound engine")?;

    println!("chirp");
    println!("=====\n");
    println!("Device:      {}", engine.device_name());
    println!("Sample rate: {} Hz", engine.sample_rate());
    println!("Channels:    {}", engine.channels());
    println!("Relay:       {:?}", engine.relay());
    if let Some(secs) = args.auto {
        println!("Auto:        one voice every {secs}s");
    }
    println!("\nType 'help' for commands, Ctrl+C to stop.\n");

    let (tx, rx) = unbounded::<Input>();
    let interrupt = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.send(Input::Interrupt);
    })?;
    spawn_stdin_reader(tx)?;

    let ticker: Receiver<std::time::Instant> = match args.auto {
        Some(secs) => tick(Duration::from_secs_f64(secs)),
        None => never(),
    };

    loop {
        select! {
            recv(rx) -> input => match input {
                Ok(Input::Line(line)) => match parse_action(&line) {
                    Ok(Some(action)) => {
                        if !apply(&mut engine, action) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{message}"),
                },
                Ok(Input::Eof) => {
                    if args.auto.is_none() {
                        break;
                    }
                    tracing::debug!("stdin closed, continuing in auto mode");
                }
                Ok(Input::Interrupt) | Err(_) => break,
            },
            recv(ticker) -> _ => {
                let wave_type = random_wave(&mut picker);
                tracing::debug!(wave = %wave_type, "auto voice");
                if let Err(e) = engine.send(Command::Add(wave_type)) {
                    tracing::warn!(error = %e, "auto voice not added");
                }
            },
            default(POLL_INTERVAL) => {},
        }
        engine.poll();
        if !engine.is_running() {
            break;
        }
    }

    engine.stop();
    println!("\nStopped.");
    Ok(())
}
