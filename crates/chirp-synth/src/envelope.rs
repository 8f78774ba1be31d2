//! Time-based attack/decay/sustain/release envelope.
//!
//! Unlike a per-sample envelope that advances internal state, [`Envelope`] is
//! evaluated at an absolute time. Only [`Envelope::on`] and [`Envelope::off`]
//! mutate it, so two copies that saw the same on/off calls produce identical
//! output no matter how often or in which order they are sampled.
//!
//! # Shape
//!
//! ```text
//!  start ─      /\
//!              /  \______________  sustain
//!             /                  \
//!            /                    \
//!   0 ──────/                      \──────
//!           on   +attack +decay    off  +release
//! ```
//!
//! All segments are linear. Any amplitude below [`EPSILON`] is snapped to
//! exactly zero.

use chirp_core::EPSILON;

/// Attack, decay and release durations in seconds.
///
/// Negative durations are treated as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdrTimes {
    /// Time to ramp from 0 to the start amplitude.
    pub attack: f64,
    /// Time to ramp from the start amplitude to the sustain amplitude.
    pub decay: f64,
    /// Time to ramp from the released level to 0 after [`Envelope::off`].
    pub release: f64,
}

impl AdrTimes {
    /// Create a new set of durations, clamping negatives to zero.
    pub fn new(attack: f64, decay: f64, release: f64) -> Self {
        Self {
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            release: release.max(0.0),
        }
    }
}

/// Linear ADSR envelope evaluated at absolute times.
///
/// # Retriggering
///
/// Calling [`on`](Self::on) while the envelope is already on is ignored: the
/// note keeps its original attack (legato). Calling [`off`](Self::off) while
/// it is already off is also ignored.
///
/// # Release
///
/// The release ramp starts from the level the envelope had at the moment
/// [`off`](Self::off) was called, so releasing during the attack does not jump
/// up to the sustain level first.
///
/// # Example
///
/// ```rust
/// use chirp_synth::{AdrTimes, Envelope};
///
/// let mut env = Envelope::new(AdrTimes::new(0.1, 0.01, 0.2), 1.0, 0.8);
///
/// env.on(0.0);
/// assert!((env.get(0.05) - 0.5).abs() < 1e-9);   // mid attack
/// assert!((env.get(0.2) - 0.8).abs() < 1e-9);    // sustain
///
/// env.off(0.2);
/// assert!((env.get(0.3) - 0.4).abs() < 1e-9);    // mid release
/// assert_eq!(env.get(0.45), 0.0);
/// assert!(env.done(0.45));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Envelope {
    times: AdrTimes,
    amplitude_start: f64,
    amplitude_sustain: f64,
    time_started: f64,
    time_released: f64,
    /// Level captured by `off`, where the release ramp begins.
    amplitude_released: f64,
    is_on: bool,
}

impl Envelope {
    /// Create an envelope with the given durations and amplitude targets.
    pub fn new(times: AdrTimes, amplitude_start: f64, amplitude_sustain: f64) -> Self {
        Self {
            times,
            amplitude_start,
            amplitude_sustain,
            ..Self::default()
        }
    }

    /// Create a decay-only envelope falling linearly from 1 to 0 over `length`
    /// seconds.
    pub fn with_length(length: f64) -> Self {
        Self::new(AdrTimes::new(0.0, length, 0.0), 1.0, 0.0)
    }

    /// Start the note at `time`. Ignored while already on.
    pub fn on(&mut self, time: f64) {
        if self.is_on {
            return;
        }
        self.time_started = time;
        self.is_on = true;
    }

    /// Release the note at `time`. Ignored while already off.
    pub fn off(&mut self, time: f64) {
        if !self.is_on {
            return;
        }
        self.amplitude_released = self.get(time);
        self.time_released = time;
        self.is_on = false;
    }

    /// Amplitude at `time`.
    pub fn get(&self, time: f64) -> f64 {
        let amplitude = if self.is_on {
            self.held_level(time)
        } else {
            self.release_level(time)
        };

        if amplitude < EPSILON { 0.0 } else { amplitude }
    }

    /// Whether the envelope is off and its release has fully elapsed.
    pub fn done(&self, time: f64) -> bool {
        !self.is_on && time > self.time_released + self.times.release
    }

    fn held_level(&self, time: f64) -> f64 {
        let rel = time - self.time_started;
        if rel < EPSILON {
            return 0.0;
        }

        let AdrTimes { attack, decay, .. } = self.times;
        if rel < attack {
            rel / attack * self.amplitude_start
        } else if rel < attack + decay {
            let progress = (rel - attack) / decay;
            self.amplitude_start + progress * (self.amplitude_sustain - self.amplitude_start)
        } else {
            self.amplitude_sustain
        }
    }

    fn release_level(&self, time: f64) -> f64 {
        let release = self.times.release;
        if release > 0.0 && time < self.time_released + release {
            let progress = ((time - self.time_released) / release).max(0.0);
            self.amplitude_released * (1.0 - progress)
        } else {
            0.0
        }
    }

    /// Whether the note is currently held.
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Attack, decay and release durations.
    pub fn times(&self) -> AdrTimes {
        self.times
    }

    /// Peak amplitude reached at the end of the attack.
    pub fn amplitude_start(&self) -> f64 {
        self.amplitude_start
    }

    /// Amplitude held after the decay.
    pub fn amplitude_sustain(&self) -> f64 {
        self.amplitude_sustain
    }

    /// Time of the last accepted [`on`](Self::on).
    pub fn time_started(&self) -> f64 {
        self.time_started
    }

    /// Time of the last accepted [`off`](Self::off).
    pub fn time_released(&self) -> f64 {
        self.time_released
    }
}
