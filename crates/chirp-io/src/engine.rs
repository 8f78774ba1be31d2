//! Threaded sound engine.
//!
//! [`SoundEngine`] ties the synthesis pieces to a running output stream and
//! keeps two copies of every voice:
//!
//! ```text
//!  caller ──Command──▶ [command ring] ──▶ intermediary ──┬──▶ render table (Mutex)
//!     │                                      (optional)  │
//!     └─────────────── direct relay ─────────────────────┤
//!                                                        └──▶ [delivery ring] ──▶ audio table
//! ```
//!
//! The audio table lives inside the output callback and is reached only
//! through the lock-free delivery ring, so the callback never locks, allocates
//! or frees. Voices displaced from the audio table travel back through the
//! ring and are dropped by the producer side. The render table sits behind a
//! short-lived mutex and feeds [`SoundEngine::render`], which draws the same
//! signal for display without touching audio data.
//!
//! Clearing is ordered with additions through a clear epoch: the render table
//! is emptied at once, the epoch counter is bumped, and every delivery carries
//! the epoch it was created under. The callback empties its table when the
//! epoch moves and discards deliveries older than the epoch it has seen.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chirp_core::{CircularBuffer, Consumer, Producer};
use chirp_synth::{
    DEFAULT_MASTER_VOLUME, DEFAULT_MAX_VOLUME, Mixer, Rand, RandAlgorithm, SoundWave, VoiceFactory,
    VoiceSettings, VoiceTable, WaveType,
};
use parking_lot::Mutex;

use crate::backend::AudioBackend;
use crate::sound::{OutputConfig, SampleSource, SoundStatus, SoundSystem};
use crate::{Error, Result};

/// Yields before a waiting intermediary starts sleeping.
const IDLE_SPINS: u32 = 64;
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Yield a few times, then sleep between polls.
#[derive(Debug, Default)]
struct Backoff {
    spins: u32,
}

impl Backoff {
    fn reset(&mut self) {
        self.spins = 0;
    }

    fn snooze(&mut self) {
        if self.spins < IDLE_SPINS {
            self.spins += 1;
            thread::yield_now();
        } else {
            thread::sleep(IDLE_SLEEP);
        }
    }

    #[cfg(test)]
    fn is_sleeping(&self) -> bool {
        self.spins >= IDLE_SPINS
    }
}

/// Request sent to a running [`SoundEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Command {
    /// Does nothing. Fills empty command slots.
    #[default]
    Noop,
    /// Add a voice of the given wave type starting now.
    Add(WaveType),
    /// Remove every voice.
    Clear,
    /// Stop the engine.
    Quit,
}

/// How commands reach the voice tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Relay {
    /// A dedicated thread drains a command queue, builds voices and waits
    /// for room in the audio queue.
    #[default]
    Intermediary,
    /// The calling thread builds voices itself. A voice that does not fit in
    /// the audio queue is dropped.
    Direct,
}

/// Engine construction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Slots in each voice table.
    pub capacity: usize,
    /// Slots in the command and delivery queues.
    pub queue_capacity: usize,
    /// Command relay mode.
    pub relay: Relay,
    /// Seconds of stream time between sweeps of finished voices.
    pub sweep_interval: f64,
    /// Parameters for new voices.
    pub voices: VoiceSettings,
    /// Generator algorithm for every thread.
    pub algorithm: RandAlgorithm,
    /// Root seed, `None` to seed from the operating system.
    pub seed: Option<u64>,
    /// Gain applied to every voice.
    pub master_volume: f64,
    /// Hard clip level of the mix.
    pub max_volume: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            capacity: 64,
            queue_capacity: 64,
            relay: Relay::default(),
            sweep_interval: 1.0,
            voices: VoiceSettings::default(),
            algorithm: RandAlgorithm::default(),
            seed: None,
            master_volume: DEFAULT_MASTER_VOLUME,
            max_volume: DEFAULT_MAX_VOLUME,
        }
    }
}

/// Snapshot returned by [`SoundEngine::poll`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStatus {
    /// Engine time in seconds.
    pub time: f64,
    /// Live voices in the render table.
    pub render_voices: usize,
    /// Live voices in the audio table as of the last buffer.
    pub audio_voices: usize,
    /// Voices removed from the render table by this poll.
    pub swept: usize,
    /// Whether a late buffer occurred since the last poll.
    pub underflow: bool,
    /// Last stream error since the last poll.
    pub error: Option<String>,
    /// Output stream counters.
    pub sound: SoundStatus,
}

/// Seconds since engine construction; the time base of voices and stream.
#[derive(Debug, Clone, Copy)]
struct Clock {
    origin: Instant,
}

impl Clock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

struct RenderSide {
    table: VoiceTable,
    mixer: Mixer,
    rng: Rand,
}

struct Shared {
    running: AtomicBool,
    clear_epoch: AtomicU64,
    audio_voices: AtomicUsize,
    render_voices: AtomicUsize,
    master_volume: AtomicU64,
    max_volume: AtomicU64,
    render: Mutex<RenderSide>,
}

impl Shared {
    fn new(capacity: usize, mixer: Mixer, rng: Rand) -> Self {
        Self {
            running: AtomicBool::new(false),
            clear_epoch: AtomicU64::new(0),
            audio_voices: AtomicUsize::new(0),
            render_voices: AtomicUsize::new(0),
            master_volume: AtomicU64::new(mixer.master_volume().to_bits()),
            max_volume: AtomicU64::new(mixer.max_volume().to_bits()),
            render: Mutex::new(RenderSide {
                table: VoiceTable::new(capacity),
                mixer,
                rng,
            }),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn publish_mixer(&self, mixer: &Mixer) {
        self.master_volume
            .store(mixer.master_volume().to_bits(), Ordering::Relaxed);
        self.max_volume
            .store(mixer.max_volume().to_bits(), Ordering::Relaxed);
    }

    fn load_mixer(&self) -> Option<Mixer> {
        let master = f64::from_bits(self.master_volume.load(Ordering::Relaxed));
        let max = f64::from_bits(self.max_volume.load(Ordering::Relaxed));
        Mixer::with_volumes(master, max).ok()
    }
}

/// A voice on its way to the audio table, tagged with the clear epoch it was
/// created under.
#[derive(Debug, Clone, Default)]
struct Delivery {
    epoch: u64,
    wave: SoundWave,
}

/// Builds voices and hands them to both tables.
struct Applier {
    factory: VoiceFactory,
    deliveries: Producer<Delivery>,
    shared: Arc<Shared>,
    wait_when_full: bool,
    clock: Clock,
}

impl Applier {
    fn apply(&mut self, command: Command) {
        match command {
            Command::Add(wave_type) => self.add(wave_type),
            Command::Clear => self.clear(),
            Command::Noop | Command::Quit => {}
        }
    }

    fn add(&mut self, wave_type: WaveType) {
        let start = self.clock.now();
        let wave = match self.factory.create(wave_type, start) {
            Ok(wave) => wave,
            Err(e) => {
                tracing::warn!(wave = %wave_type, error = %e, "voice not created");
                return;
            }
        };

        let mut delivery = Delivery {
            epoch: self.shared.clear_epoch.load(Ordering::Acquire),
            wave: wave.clone(),
        };
        let mut backoff = Backoff::default();
        while let Err(back) = self.deliveries.try_push(delivery) {
            if !self.wait_when_full || !self.shared.is_running() || self.deliveries.is_abandoned()
            {
                tracing::warn!(wave = %wave_type, "audio queue full, voice dropped");
                return;
            }
            delivery = back;
            backoff.snooze();
        }

        let frequency = wave.properties().frequency;
        let length = wave.properties().length;
        let mut render = self.shared.render.lock();
        render.table.insert(wave);
        self.shared
            .render_voices
            .store(render.table.live_count(), Ordering::Release);
        drop(render);

        tracing::debug!(wave = %wave_type, frequency, length, start, "voice added");
    }

    fn clear(&mut self) {
        let mut render = self.shared.render.lock();
        render.table.clear_all();
        self.shared.render_voices.store(0, Ordering::Release);
        drop(render);

        let epoch = self.shared.clear_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(epoch, "voices cleared");
    }
}

fn run_intermediary(mut commands: Consumer<Command>, mut applier: Applier) {
    let mut command = Command::Noop;
    let mut backoff = Backoff::default();

    while applier.shared.is_running() && !commands.is_abandoned() {
        if commands.try_pop(&mut command) {
            backoff.reset();
            if command == Command::Quit {
                break;
            }
            applier.apply(command);
        } else {
            backoff.snooze();
        }
    }

    let pending = commands.len();
    tracing::debug!(pending, "intermediary stopped");
}

/// The audio-side voice table, run inside the output callback.
struct AudioRenderer {
    table: VoiceTable,
    deliveries: Consumer<Delivery>,
    scratch: Delivery,
    shared: Arc<Shared>,
    mixer: Mixer,
    rng: Rand,
    epoch: u64,
    sweep_interval: f64,
    next_sweep: f64,
    frame_time: f64,
    frame_value: f64,
}

impl AudioRenderer {
    fn new(
        capacity: usize,
        deliveries: Consumer<Delivery>,
        shared: Arc<Shared>,
        mixer: Mixer,
        rng: Rand,
        sweep_interval: f64,
    ) -> Self {
        Self {
            table: VoiceTable::new(capacity),
            deliveries,
            scratch: Delivery::default(),
            shared,
            mixer,
            rng,
            epoch: 0,
            sweep_interval,
            next_sweep: 0.0,
            frame_time: f64::NAN,
            frame_value: 0.0,
        }
    }

    fn sync_epoch(&mut self, epoch: u64) {
        if epoch > self.epoch {
            self.table.clear_all();
            self.epoch = epoch;
        }
    }

    /// Move queued voices into the table.
    ///
    /// Each pop parks the previous scratch content in the ring, so displaced
    /// and stale voices are freed by the producer.
    fn drain(&mut self) {
        while self.deliveries.try_pop(&mut self.scratch) {
            if self.scratch.epoch < self.epoch {
                continue;
            }
            self.sync_epoch(self.scratch.epoch);
            self.table.swap_in(&mut self.scratch.wave);
        }
    }
}

impl SampleSource for AudioRenderer {
    fn begin_buffer(&mut self, time: f64, _frames: usize) {
        self.sync_epoch(self.shared.clear_epoch.load(Ordering::Acquire));
        self.drain();

        if time >= self.next_sweep {
            self.table.sweep(time);
            self.next_sweep = time + self.sweep_interval;
        }
        if let Some(mixer) = self.shared.load_mixer() {
            self.mixer = mixer;
        }
        self.shared
            .audio_voices
            .store(self.table.live_count(), Ordering::Release);
    }

    fn sample(&mut self, _channel: usize, time: f64) -> f64 {
        // Every channel of a frame carries the same mix
        if time != self.frame_time {
            self.frame_time = time;
            self.frame_value = self.mixer.mix(time, self.table.slots_mut(), &mut self.rng);
        }
        self.frame_value
    }
}

enum RelayEnd {
    Queue(Producer<Command>),
    Direct(Box<Applier>),
}

/// A running synthesizer: output stream, voice tables and command relay.
///
/// # Example
///
/// ```rust
/// use chirp_io::{Command, EngineSettings, NullBackend, OutputConfig, SoundEngine};
/// use chirp_synth::WaveType;
///
/// let settings = EngineSettings {
///     seed: Some(7),
///     ..EngineSettings::default()
/// };
/// let mut engine = SoundEngine::new(
///     Box::new(NullBackend::new()),
///     OutputConfig::default(),
///     settings,
/// )?;
///
/// engine.send(Command::Add(WaveType::Sine))?;
/// let status = engine.poll();
/// assert!(status.time >= 0.0);
/// engine.stop();
/// # Ok::<(), chirp_io::Error>(())
/// ```
pub struct SoundEngine {
    sound: SoundSystem,
    shared: Arc<Shared>,
    relay: RelayEnd,
    intermediary: Option<JoinHandle<()>>,
    clock: Clock,
    sweep_interval: f64,
    next_sweep: f64,
}

impl SoundEngine {
    /// Open the output and start the engine.
    ///
    /// # Errors
    ///
    /// Fails when the volumes or voice settings are invalid, when the output
    /// cannot be opened, or when the intermediary thread cannot be spawned.
    pub fn new(
        backend: Box<dyn AudioBackend>,
        output: OutputConfig,
        settings: EngineSettings,
    ) -> Result<Self> {
        let mixer = Mixer::with_volumes(settings.master_volume, settings.max_volume)?;
        let mut sound = SoundSystem::new(backend, output)?;
        let sample_rate = f64::from(sound.sample_rate().max(1));

        let mut root = match settings.seed {
            Some(seed) => Rand::new(settings.algorithm, seed),
            None => Rand::from_entropy(settings.algorithm),
        };
        let mut factory = VoiceFactory::new(settings.voices, sample_rate, root.split())?;
        let audio_rng = factory.split_rng();
        let render_rng = factory.split_rng();

        let capacity = settings.capacity.max(1);
        let queue_capacity = settings.queue_capacity.max(2);
        let sweep_interval = settings.sweep_interval.max(0.0);
        let shared = Arc::new(Shared::new(capacity, mixer, render_rng));
        let (deliveries_tx, deliveries_rx) =
            CircularBuffer::<Delivery>::new(queue_capacity)?.split();

        let clock = Clock::new();
        let renderer = AudioRenderer::new(
            capacity,
            deliveries_rx,
            Arc::clone(&shared),
            mixer,
            audio_rng,
            sweep_interval,
        );
        shared.running.store(true, Ordering::Release);
        if let Err(e) = sound.start(renderer, clock.now()) {
            shared.running.store(false, Ordering::Release);
            return Err(e);
        }

        let applier = Applier {
            factory,
            deliveries: deliveries_tx,
            shared: Arc::clone(&shared),
            wait_when_full: settings.relay == Relay::Intermediary,
            clock,
        };

        let (relay, intermediary) = match settings.relay {
            Relay::Direct => (RelayEnd::Direct(Box::new(applier)), None),
            Relay::Intermediary => {
                let (commands_tx, commands_rx) =
                    CircularBuffer::<Command>::new(queue_capacity)?.split();
                let spawned = thread::Builder::new()
                    .name("chirp-intermediary".into())
                    .spawn(move || run_intermediary(commands_rx, applier));
                match spawned {
                    Ok(handle) => (RelayEnd::Queue(commands_tx), Some(handle)),
                    Err(e) => {
                        shared.running.store(false, Ordering::Release);
                        return Err(Error::Io(e));
                    }
                }
            }
        };

        tracing::info!(
            relay = ?settings.relay,
            capacity,
            queue_capacity,
            algorithm = %settings.algorithm,
            device = %sound.device_name(),
            "sound engine started"
        );

        Ok(Self {
            sound,
            shared,
            relay,
            intermediary,
            clock,
            sweep_interval,
            next_sweep: 0.0,
        })
    }

    /// Submit a command.
    ///
    /// With the intermediary relay the command is queued; with the direct
    /// relay it is applied before returning. [`Command::Quit`] stops the
    /// engine.
    ///
    /// # Errors
    ///
    /// [`Error::NotRunning`] after [`stop`](Self::stop), [`Error::QueueFull`]
    /// when the command queue has no room.
    pub fn send(&mut self, command: Command) -> Result<()> {
        if !self.shared.is_running() {
            return Err(Error::NotRunning);
        }
        if command == Command::Quit {
            self.stop();
            return Ok(());
        }
        match &mut self.relay {
            RelayEnd::Queue(commands) => commands.try_push(command).map_err(|_| Error::QueueFull),
            RelayEnd::Direct(applier) => {
                applier.apply(command);
                Ok(())
            }
        }
    }

    /// Mix of the render table at `time`, or 0 if the table is busy.
    pub fn render(&self, time: f64) -> f64 {
        match self.shared.render.try_lock() {
            Some(mut side) => {
                let RenderSide { table, mixer, rng } = &mut *side;
                mixer.mix(time, table.slots_mut(), rng)
            }
            None => 0.0,
        }
    }

    /// Fill `out` with the render mix over the `duration` seconds ending at
    /// `end`. Returns `false`, leaving `out` untouched, if the table is busy.
    ///
    /// The window is drawn from a copy of the render table, so voices released
    /// by one window still show their attack in an earlier one.
    pub fn render_window(&self, end: f64, duration: f64, out: &mut [f64]) -> bool {
        let Some(mut side) = self.shared.render.try_lock() else {
            return false;
        };
        let RenderSide { table, mixer, rng } = &mut *side;
        let mut table = table.clone();
        let step = duration / out.len().max(1) as f64;
        let start = end - duration;
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = mixer.mix(start + i as f64 * step, table.slots_mut(), rng);
        }
        true
    }

    /// Remove finished voices from the render table. Returns the number
    /// removed, 0 if the table is busy.
    pub fn sweep(&self, time: f64) -> usize {
        let Some(mut side) = self.shared.render.try_lock() else {
            return 0;
        };
        let removed = side.table.sweep(time);
        self.shared
            .render_voices
            .store(side.table.live_count(), Ordering::Release);
        removed
    }

    /// Periodic housekeeping for the owning thread: sweeps the render table
    /// once per sweep interval and logs stream problems.
    pub fn poll(&mut self) -> EngineStatus {
        let time = self.now();
        let mut swept = 0;
        if time >= self.next_sweep {
            swept = self.sweep(time);
            self.next_sweep = time + self.sweep_interval;
            if swept > 0 {
                tracing::debug!(swept, "render table swept");
            }
        }

        let underflow = self.sound.take_underflow();
        if underflow {
            tracing::warn!("audio buffer took longer to render than it lasts");
        }
        let error = self.sound.take_error();
        if let Some(message) = &error {
            tracing::warn!(error = %message, "audio stream error");
        }

        EngineStatus {
            time,
            render_voices: self.voice_count(),
            audio_voices: self.audio_voice_count(),
            swept,
            underflow,
            error,
            sound: self.sound.status(),
        }
    }

    /// Live voices in the render table.
    pub fn voice_count(&self) -> usize {
        self.shared.render_voices.load(Ordering::Acquire)
    }

    /// Live voices in the audio table as of the last buffer.
    pub fn audio_voice_count(&self) -> usize {
        self.shared.audio_voices.load(Ordering::Acquire)
    }

    /// Set the gain applied to every voice.
    ///
    /// # Errors
    ///
    /// Rejects negative or NaN volumes. Values above 1 are clamped.
    pub fn set_master_volume(&mut self, volume: f64) -> Result<()> {
        let mut side = self.shared.render.lock();
        side.mixer.set_master_volume(volume)?;
        self.shared.publish_mixer(&side.mixer);
        Ok(())
    }

    /// Set the clip level of the mix.
    ///
    /// # Errors
    ///
    /// Rejects negative or NaN volumes. Values above the ceiling are clamped.
    pub fn set_max_volume(&mut self, volume: f64) -> Result<()> {
        let mut side = self.shared.render.lock();
        side.mixer.set_max_volume(volume)?;
        self.shared.publish_mixer(&side.mixer);
        Ok(())
    }

    /// Current volumes.
    pub fn mixer(&self) -> Mixer {
        self.shared.render.lock().mixer
    }

    /// Engine time in seconds.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sound.sample_rate()
    }

    /// Output channel count.
    pub fn channels(&self) -> u16 {
        self.sound.channels()
    }

    /// Output device name.
    pub fn device_name(&self) -> &str {
        self.sound.device_name()
    }

    /// Command relay mode.
    pub fn relay(&self) -> Relay {
        match self.relay {
            RelayEnd::Queue(_) => Relay::Intermediary,
            RelayEnd::Direct(_) => Relay::Direct,
        }
    }

    /// Whether the engine accepts commands.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Stop the output stream and the intermediary. Commands still queued
    /// are discarded. Does nothing if already stopped.
    pub fn stop(&mut self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.sound.stop();

        if let RelayEnd::Queue(commands) = &mut self.relay
            && commands.try_push(Command::Quit).is_err()
        {
            tracing::debug!("command queue full at shutdown");
        }
        if let Some(handle) = self.intermediary.take()
            && handle.join().is_err()
        {
            tracing::error!("intermediary thread panicked");
        }
        tracing::info!("sound engine stopped");
    }
}

impl Drop for SoundEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SoundEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundEngine")
            .field("sound", &self.sound)
            .field("relay", &self.relay())
            .field("running", &self.is_running())
            .field("voices", &self.voice_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullBackend;
    use chirp_synth::AdrTimes;

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    fn long_voices() -> VoiceSettings {
        VoiceSettings {
            length_min: 30.0,
            length_max: 30.0,
            ..VoiceSettings::default()
        }
    }

    fn engine(relay: Relay) -> SoundEngine {
        let backend = NullBackend::new().with_format(8_000, 1).with_buffer_frames(64);
        let output = OutputConfig {
            latency: 0.0,
            ..OutputConfig::default()
        };
        let settings = EngineSettings {
            relay,
            seed: Some(3),
            voices: long_voices(),
            ..EngineSettings::default()
        };
        SoundEngine::new(Box::new(backend), output, settings).unwrap()
    }

    #[test]
    fn test_direct_add_reaches_both_tables() {
        let mut engine = engine(Relay::Direct);
        assert_eq!(engine.relay(), Relay::Direct);

        engine.send(Command::Add(WaveType::Sine)).unwrap();
        assert_eq!(engine.voice_count(), 1);
        assert!(wait_until(|| engine.audio_voice_count() == 1));
        engine.stop();
    }

    #[test]
    fn test_intermediary_add_and_clear() {
        let mut engine = engine(Relay::Intermediary);
        for wave in [WaveType::Sine, WaveType::Square, WaveType::NoisePrecalculated] {
            engine.send(Command::Add(wave)).unwrap();
        }
        assert!(wait_until(|| engine.voice_count() == 3));
        assert!(wait_until(|| engine.audio_voice_count() == 3));

        engine.send(Command::Clear).unwrap();
        assert!(wait_until(|| engine.voice_count() == 0));
        assert!(wait_until(|| engine.audio_voice_count() == 0));
        engine.stop();
    }

    #[test]
    fn test_render_path_hears_new_voice() {
        let mut engine = engine(Relay::Direct);
        engine.send(Command::Add(WaveType::Square)).unwrap();
        // Mid-attack of a square wave is never silent
        let value = engine.render(engine.now() + 0.05);
        assert!(value.abs() > 0.01, "render value {}", value);

        let mut window = [0.0; 32];
        assert!(engine.render_window(engine.now() + 0.05, 0.01, &mut window));
        assert!(window.iter().any(|v| v.abs() > 0.01));
    }

    #[test]
    fn test_send_after_stop() {
        let mut engine = engine(Relay::Intermediary);
        engine.stop();
        assert!(!engine.is_running());
        assert!(matches!(
            engine.send(Command::Add(WaveType::Sine)),
            Err(Error::NotRunning)
        ));
        // Second stop is a no-op
        engine.stop();
    }

    #[test]
    fn test_quit_stops_engine() {
        let mut engine = engine(Relay::Intermediary);
        engine.send(Command::Quit).unwrap();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_volume_setters() {
        let mut engine = engine(Relay::Direct);
        engine.set_master_volume(2.0).unwrap();
        assert_eq!(engine.mixer().master_volume(), 1.0);
        assert!(engine.set_max_volume(-0.5).is_err());
        assert_eq!(engine.mixer().max_volume(), DEFAULT_MAX_VOLUME);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = EngineSettings {
            master_volume: f64::NAN,
            ..EngineSettings::default()
        };
        let result = SoundEngine::new(
            Box::new(NullBackend::new()),
            OutputConfig::default(),
            settings,
        );
        assert!(matches!(result, Err(Error::Synth(_))));
    }

    #[test]
    fn test_poll_sweeps_finished_voices() {
        let backend = NullBackend::new().with_format(8_000, 1).with_buffer_frames(64);
        let settings = EngineSettings {
            relay: Relay::Direct,
            seed: Some(11),
            sweep_interval: 0.0,
            voices: VoiceSettings {
                envelope: chirp_synth::Envelope::new(AdrTimes::new(0.001, 0.001, 0.001), 1.0, 0.5),
                length_min: 0.01,
                length_max: 0.01,
                ..VoiceSettings::default()
            },
            ..EngineSettings::default()
        };
        let mut engine =
            SoundEngine::new(Box::new(backend), OutputConfig::default(), settings).unwrap();

        engine.send(Command::Add(WaveType::Triangle)).unwrap();
        assert_eq!(engine.voice_count(), 1);
        thread::sleep(Duration::from_millis(50));
        assert!(wait_until(|| engine.poll().render_voices == 0));
        assert!(wait_until(|| engine.audio_voice_count() == 0));
    }

    #[test]
    fn test_backoff_sleeps_after_spinning() {
        let mut backoff = Backoff::default();
        for _ in 0..IDLE_SPINS {
            assert!(!backoff.is_sleeping());
            backoff.snooze();
        }
        assert!(backoff.is_sleeping());

        let started = Instant::now();
        for _ in 0..5 {
            backoff.snooze();
        }
        assert!(started.elapsed() >= IDLE_SLEEP * 5);

        backoff.reset();
        assert!(!backoff.is_sleeping());
    }

    #[test]
    fn test_full_audio_queue_waits_until_stop() {
        // One callback at start, then the output stalls for two seconds
        let backend = NullBackend::new().with_format(8_000, 1).with_buffer_frames(16_000);
        let output = OutputConfig {
            latency: 0.0,
            ..OutputConfig::default()
        };
        let settings = EngineSettings {
            queue_capacity: 2,
            seed: Some(13),
            voices: long_voices(),
            ..EngineSettings::default()
        };
        let mut engine = SoundEngine::new(Box::new(backend), output, settings).unwrap();
        assert!(wait_until(|| engine.poll().sound.buffers >= 1));

        for queued in 1..=2 {
            engine.send(Command::Add(WaveType::Sine)).unwrap();
            assert!(wait_until(|| engine.voice_count() == queued));
        }
        engine.send(Command::Add(WaveType::Sine)).unwrap();
        thread::sleep(Duration::from_millis(50));
        // Third voice is held back, not dropped or delivered
        assert_eq!(engine.voice_count(), 2);
        assert_eq!(engine.audio_voice_count(), 0);

        engine.stop();
        assert!(!engine.is_running());
        assert_eq!(engine.voice_count(), 2);
    }

    #[test]
    fn test_render_window_does_not_release_voices() {
        let backend = NullBackend::new().with_format(8_000, 1).with_buffer_frames(64);
        let settings = EngineSettings {
            relay: Relay::Direct,
            seed: Some(17),
            voices: VoiceSettings {
                envelope: chirp_synth::Envelope::new(AdrTimes::new(0.05, 0.02, 0.02), 1.0, 0.5),
                length_min: 0.1,
                length_max: 0.1,
                ..VoiceSettings::default()
            },
            ..EngineSettings::default()
        };
        let mut engine =
            SoundEngine::new(Box::new(backend), OutputConfig::default(), settings).unwrap();
        engine.send(Command::Add(WaveType::Square)).unwrap();
        let added = engine.now();

        // A window past the end of the voice first, then one inside its attack
        let mut late = [0.0; 16];
        assert!(engine.render_window(added + 0.3, 0.05, &mut late));
        assert!(late.iter().all(|v| *v == 0.0));

        let mut attack = [0.0; 40];
        assert!(engine.render_window(added + 0.041, 0.04, &mut attack));
        let peak = |values: &[f64]| values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak(&attack[30..]) > 2.0 * peak(&attack[..10]));
    }

    fn delivery(epoch: u64) -> Delivery {
        let props = chirp_synth::WaveProperties::new(WaveType::Sine, 220.0, 10.0, 0.0);
        let mut wave = SoundWave::new(props, chirp_synth::Envelope::with_length(10.0)).unwrap();
        wave.start(0.0);
        Delivery { epoch, wave }
    }

    #[test]
    fn test_stale_deliveries_discarded() {
        let rng = Rand::new(RandAlgorithm::Lehmer32, 1);
        let shared = Arc::new(Shared::new(4, Mixer::default(), rng.clone()));
        let (mut tx, rx) = CircularBuffer::<Delivery>::new(8).unwrap().split();
        let mut audio = AudioRenderer::new(4, rx, Arc::clone(&shared), Mixer::default(), rng, 1.0);

        tx.try_push(delivery(0)).unwrap();
        shared.clear_epoch.fetch_add(1, Ordering::AcqRel);
        audio.begin_buffer(0.0, 16);
        assert_eq!(audio.table.live_count(), 0);

        tx.try_push(delivery(1)).unwrap();
        tx.try_push(delivery(1)).unwrap();
        audio.begin_buffer(0.01, 16);
        assert_eq!(audio.table.live_count(), 2);
        assert_eq!(shared.audio_voices.load(Ordering::Acquire), 2);
    }

    #[test]
    fn test_newer_delivery_clears_first() {
        let rng = Rand::new(RandAlgorithm::Lehmer32, 2);
        let shared = Arc::new(Shared::new(4, Mixer::default(), rng.clone()));
        let (mut tx, rx) = CircularBuffer::<Delivery>::new(8).unwrap().split();
        let mut audio = AudioRenderer::new(4, rx, Arc::clone(&shared), Mixer::default(), rng, 1.0);

        tx.try_push(delivery(0)).unwrap();
        audio.begin_buffer(0.0, 16);
        assert_eq!(audio.table.live_count(), 1);

        // Clear and add land between two buffers; the add must survive.
        tx.try_push(delivery(1)).unwrap();
        audio.drain();
        assert_eq!(audio.table.live_count(), 1);
        assert_eq!(audio.epoch, 1);
    }

    #[test]
    fn test_frame_value_shared_across_channels() {
        let rng = Rand::new(RandAlgorithm::Lehmer32, 5);
        let shared = Arc::new(Shared::new(2, Mixer::default(), rng.clone()));
        let (mut tx, rx) = CircularBuffer::<Delivery>::new(4).unwrap().split();
        let mut audio = AudioRenderer::new(2, rx, shared, Mixer::default(), rng, 1.0);

        tx.try_push(delivery(0)).unwrap();
        audio.begin_buffer(0.0, 1);
        let left = audio.sample(0, 0.0011);
        let right = audio.sample(1, 0.0011);
        assert_eq!(left, right);
        assert!(left.abs() > 0.0);
    }
}
