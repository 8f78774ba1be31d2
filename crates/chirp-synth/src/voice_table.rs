//! Fixed-capacity voice storage with a round-robin write cursor.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::mem;

use crate::SoundWave;

/// Fixed set of voice slots.
///
/// New voices go into the slot under the cursor, which then advances and
/// wraps. When every slot is busy the oldest insertion is overwritten, so the
/// table never grows and never refuses a voice.
///
/// # Example
///
/// ```rust
/// use chirp_synth::{Envelope, SoundWave, VoiceTable, WaveProperties, WaveType};
///
/// let mut table = VoiceTable::new(2);
/// for _ in 0..3 {
///     let props = WaveProperties::new(WaveType::Sine, 220.0, 1.0, 0.0);
///     table.insert(SoundWave::new(props, Envelope::with_length(1.0)).unwrap());
/// }
/// assert_eq!(table.cursor(), 1);
/// assert_eq!(table.live_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct VoiceTable {
    slots: Box<[SoundWave]>,
    cursor: usize,
}

impl VoiceTable {
    /// Create a table with `capacity` empty slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "voice table capacity must be at least 1");
        let slots: Vec<SoundWave> = (0..capacity).map(|_| SoundWave::default()).collect();
        Self {
            slots: slots.into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Store `wave` at the cursor and advance it, dropping whatever was there.
    pub fn insert(&mut self, mut wave: SoundWave) {
        self.swap_in(&mut wave);
    }

    /// Store `wave` at the cursor and advance it.
    ///
    /// The displaced slot content is left in `wave` instead of being dropped,
    /// so a caller that must not free memory can hand it elsewhere.
    pub fn swap_in(&mut self, wave: &mut SoundWave) {
        mem::swap(&mut self.slots[self.cursor], wave);
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Empty every slot and reset the cursor.
    pub fn clear_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.clear();
        }
        self.cursor = 0;
    }

    /// Apply automatic releases at `time` and empty every finished voice.
    ///
    /// Returns the number of voices removed.
    pub fn sweep(&mut self, time: f64) -> usize {
        let mut removed = 0;
        for slot in self.slots.iter_mut().filter(|slot| slot.exists()) {
            slot.advance(time);
            if slot.done(time) {
                slot.clear();
                removed += 1;
            }
        }
        removed
    }

    /// Number of occupied slots.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.exists()).count()
    }

    /// All slots, including empty ones.
    pub fn slots(&self) -> &[SoundWave] {
        &self.slots
    }

    /// All slots, mutably, for mixing.
    pub fn slots_mut(&mut self) -> &mut [SoundWave] {
        &mut self.slots
    }

    /// Slot at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    pub fn get(&self, index: usize) -> &SoundWave {
        &self.slots[index]
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index the next insertion will write.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}
