//! Offline rendering to WAV.
//!
//! Runs the synthesis on the calling thread with no output device: voices are
//! scheduled at a fixed rate, mixed block by block and streamed to a
//! [`WavSink`].

use std::path::PathBuf;

use anyhow::Context;
use chirp_config::ChirpConfig;
use chirp_io::{SampleSource, WavSink, WavSpec, render_interleaved};
use chirp_synth::{Mixer, Rand, RandomSource, SynthError, VoiceFactory, VoiceTable, WaveType};
use clap::Args;

use crate::commands::{parse_seconds, parse_wave};
use crate::settings;

/// Frames mixed per block.
const BLOCK_FRAMES: usize = 1024;
/// Seconds of output between sweeps of finished voices.
const SWEEP_INTERVAL: f64 = 1.0;

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Duration in seconds
    #[arg(long, default_value = "5.0", value_parser = parse_seconds)]
    pub duration: f64,

    /// New voices per second
    #[arg(long, default_value = "4.0", value_parser = parse_seconds)]
    pub rate: f64,

    /// Sample rate
    #[arg(long, default_value = "48000", value_parser = clap::value_parser!(u32).range(8000..=384_000))]
    pub sample_rate: u32,

    /// Output channels
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..=8))]
    pub channels: u16,

    /// Bit depth (16, 24 or 32 for float)
    #[arg(long, default_value = "16", value_parser = ["16", "24", "32"])]
    pub bits: String,

    /// Seed for voice selection (overrides the config file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Wave types to cycle through (repeatable); random when omitted
    #[arg(long, value_parser = parse_wave)]
    pub wave: Vec<WaveType>,

    /// Config file (defaults to CHIRP_CONFIG or the platform config path)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Voice table and mixer evaluated frame by frame.
struct OfflineVoices {
    table: VoiceTable,
    mixer: Mixer,
    rng: Rand,
    frame_time: f64,
    frame_value: f64,
}

impl SampleSource for OfflineVoices {
    fn sample(&mut self, _channel: usize, time: f64) -> f64 {
        // Every channel of a frame gets the same value, live noise included
        if time != self.frame_time {
            self.frame_time = time;
            self.frame_value = self.mixer.mix(time, self.table.slots_mut(), &mut self.rng);
        }
        self.frame_value
    }
}

/// Which wave the next scheduled voice uses.
enum WavePicker {
    Cycle { waves: Vec<WaveType>, next: usize },
    Random(Rand),
}

impl WavePicker {
    fn next(&mut self) -> WaveType {
        match self {
            WavePicker::Cycle { waves, next } => {
                let wave_type = waves[*next % waves.len()];
                *next += 1;
                wave_type
            }
            WavePicker::Random(rng) => WaveType::AUDIBLE[usize::from(rng.generate_byte())],
        }
    }
}

/// Single-threaded renderer producing interleaved blocks.
struct OfflineRender {
    voices: OfflineVoices,
    factory: VoiceFactory,
    picker: WavePicker,
    interval: f64,
    next_voice: f64,
    next_sweep: f64,
    channels: usize,
    seconds_per_frame: f64,
    frame: u64,
    scheduled: usize,
}

impl OfflineRender {
    fn new(
        config: &ChirpConfig,
        mut root: Rand,
        sample_rate: u32,
        channels: u16,
        rate: f64,
        waves: Vec<WaveType>,
    ) -> Result<Self, SynthError> {
        let mut factory =
            VoiceFactory::new(config.voice_settings(), f64::from(sample_rate), root.split())?;
        let rng = factory.split_rng();
        let mixer = Mixer::with_volumes(config.mix.master_volume, config.mix.max_volume)?;

        let picker = if waves.is_empty() {
            let mut rng = root.split();
            rng.set_byte_limits(0, (WaveType::AUDIBLE.len() - 1) as u8);
            WavePicker::Random(rng)
        } else {
            WavePicker::Cycle { waves, next: 0 }
        };

        Ok(Self {
            voices: OfflineVoices {
                table: VoiceTable::new(config.voices.capacity.max(1)),
                mixer,
                rng,
                frame_time: f64::NAN,
                frame_value: 0.0,
            },
            factory,
            picker,
            interval: 1.0 / rate,
            next_voice: 0.0,
            next_sweep: SWEEP_INTERVAL,
            channels: usize::from(channels.max(1)),
            seconds_per_frame: 1.0 / f64::from(sample_rate.max(1)),
            frame: 0,
            scheduled: 0,
        })
    }

    /// Fill `out` with the next `out.len() / channels` frames.
    fn next_block(&mut self, out: &mut [f32]) -> Result<(), SynthError> {
        let start = self.frame as f64 * self.seconds_per_frame;
        let frames = out.len() / self.channels;
        let end = start + frames as f64 * self.seconds_per_frame;

        // Voices stay silent until their start time
        while self.next_voice < end {
            let wave_type = self.picker.next();
            let wave = self.factory.create(wave_type, self.next_voice)?;
            self.voices.table.insert(wave);
            self.scheduled += 1;
            self.next_voice = self.scheduled as f64 * self.interval;
        }

        if start >= self.next_sweep {
            let removed = self.voices.table.sweep(start);
            tracing::debug!(removed, time = start, "swept finished voices");
            self.next_sweep = start + SWEEP_INTERVAL;
        }

        render_interleaved(
            &mut self.voices,
            out,
            self.channels,
            start,
            self.seconds_per_frame,
        );
        self.frame += frames as u64;
        Ok(())
    }
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let config = settings::load(args.config.as_deref())?.config;
    let seed = args.seed.or(config.random.seed);
    let root = match seed {
        Some(seed) => Rand::new(config.random.algorithm, seed),
        None => Rand::from_entropy(config.random.algorithm),
    };

    let spec = WavSpec {
        channels: args.channels,
        sample_rate: args.sample_rate,
        bits_per_sample: args.bits.parse().context("bit depth")?,
    };
    let total_frames = (args.duration * f64::from(args.sample_rate)).round() as u64;

    let mut render = OfflineRender::new(
        &config,
        root,
        args.sample_rate,
        args.channels,
        args.rate,
        args.wave,
    )?;
    let mut sink = WavSink::create(&args.output, spec)
        .with_context(|| format!("creating {}", args.output.display()))?;

    println!("Rendering {:.2}s to {}", args.duration, args.output.display());
    tracing::info!(
        seed = ?seed,
        rate = args.rate,
        sample_rate = args.sample_rate,
        "offline render"
    );

    let channels = usize::from(args.channels);
    let mut block = vec![0.0f32; BLOCK_FRAMES * channels];
    let mut written = 0u64;
    while written < total_frames {
        let frames = (total_frames - written).min(BLOCK_FRAMES as u64) as usize;
        let out = &mut block[..frames * channels];
        render.next_block(out)?;
        sink.write(out)?;
        written += frames as u64;
    }
    sink.finalize()?;

    println!("Wrote {} frames ({} voices)", written, render.scheduled);
    Ok(())
}
