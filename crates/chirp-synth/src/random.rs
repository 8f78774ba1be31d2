//! Random number generation for pitch, length and noise.
//!
//! Voices only need two things from a generator: a byte and a real number,
//! each inside some configured range. [`RandomSource`] is that capability;
//! [`Rand`] is the owned, configurable implementation the engine uses.
//!
//! Generators are not shared. Each thread that needs randomness owns its own
//! [`Rand`], derived with [`Rand::split`] when it has to be reproducible from a
//! single seed.

use core::fmt;
use core::str::FromStr;

use alloc::string::ToString;

use crate::SynthError;

/// A source of bytes and reals inside configured ranges.
pub trait RandomSource {
    /// Next byte inside the source's byte range.
    fn generate_byte(&mut self) -> u8;

    /// Next real number inside the source's real range.
    fn generate_real(&mut self) -> f64;
}

/// Small 32-bit hash-mix generator with a 32-bit state.
///
/// Fast and fully deterministic for a given seed, and available without `std`.
/// Not suitable for anything security related.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lehmer32 {
    state: u32,
}

impl Lehmer32 {
    /// Create a generator from a seed. Any seed is valid, including 0.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next 32 random bits.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0xe120_fc15);
        let mut tmp = u64::from(self.state).wrapping_mul(0x4a39_b70d);
        let m1 = ((tmp >> 32) ^ tmp) as u32;
        tmp = u64::from(m1).wrapping_mul(0x12fa_d5c9);
        ((tmp >> 32) ^ tmp) as u32
    }
}

impl RandomSource for Lehmer32 {
    /// Any byte.
    fn generate_byte(&mut self) -> u8 {
        self.next_u32() as u8
    }

    /// A real in `[-1, 1]`, the range noise voices expect.
    fn generate_real(&mut self) -> f64 {
        unit(self.next_u32()) * 2.0 - 1.0
    }
}

/// Which generator backs a [`Rand`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RandAlgorithm {
    /// [`Lehmer32`].
    #[default]
    Lehmer32,
    /// `rand`'s `StdRng`.
    #[cfg(feature = "std")]
    Std,
}

impl RandAlgorithm {
    /// Lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            RandAlgorithm::Lehmer32 => "lehmer32",
            #[cfg(feature = "std")]
            RandAlgorithm::Std => "std",
        }
    }
}

impl fmt::Display for RandAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RandAlgorithm {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lehmer32" | "lehmer" => Ok(RandAlgorithm::Lehmer32),
            #[cfg(feature = "std")]
            "std" | "stdrng" => Ok(RandAlgorithm::Std),
            _ => Err(SynthError::UnknownAlgorithm(s.to_string())),
        }
    }
}

#[derive(Clone)]
enum Engine {
    Lehmer(Lehmer32),
    #[cfg(feature = "std")]
    Std(rand::rngs::StdRng),
}

impl Engine {
    fn new(algorithm: RandAlgorithm, seed: u64) -> Self {
        match algorithm {
            RandAlgorithm::Lehmer32 => Engine::Lehmer(Lehmer32::new((seed ^ (seed >> 32)) as u32)),
            #[cfg(feature = "std")]
            RandAlgorithm::Std => {
                use rand::SeedableRng;
                Engine::Std(rand::rngs::StdRng::seed_from_u64(seed))
            }
        }
    }

    fn next_u32(&mut self) -> u32 {
        match self {
            Engine::Lehmer(rng) => rng.next_u32(),
            #[cfg(feature = "std")]
            Engine::Std(rng) => rand::RngCore::next_u32(rng),
        }
    }

    fn algorithm(&self) -> RandAlgorithm {
        match self {
            Engine::Lehmer(_) => RandAlgorithm::Lehmer32,
            #[cfg(feature = "std")]
            Engine::Std(_) => RandAlgorithm::Std,
        }
    }
}

/// Owned generator with configurable byte and real ranges.
///
/// Defaults to bytes in `0..=255` and reals in `[0, 1]`.
///
/// # Example
///
/// ```rust
/// use chirp_synth::{Rand, RandAlgorithm, RandomSource};
///
/// let mut rng = Rand::new(RandAlgorithm::Lehmer32, 42);
/// rng.set_byte_limits(0, 47);
/// rng.set_real_limits(0.1, 1.5).unwrap();
///
/// assert!(rng.generate_byte() <= 47);
/// let length = rng.generate_real();
/// assert!((0.1..=1.5).contains(&length));
/// ```
#[derive(Clone)]
pub struct Rand {
    engine: Engine,
    byte_min: u8,
    byte_max: u8,
    real_min: f64,
    real_max: f64,
}

impl Rand {
    /// Create a generator seeded with `seed`.
    pub fn new(algorithm: RandAlgorithm, seed: u64) -> Self {
        Self {
            engine: Engine::new(algorithm, seed),
            byte_min: 0,
            byte_max: u8::MAX,
            real_min: 0.0,
            real_max: 1.0,
        }
    }

    /// Create a generator seeded from the operating system.
    #[cfg(feature = "std")]
    pub fn from_entropy(algorithm: RandAlgorithm) -> Self {
        Self::new(algorithm, rand::random())
    }

    /// Restrict bytes to `min..=max`. A reversed pair is swapped.
    pub fn set_byte_limits(&mut self, min: u8, max: u8) {
        self.byte_min = min.min(max);
        self.byte_max = min.max(max);
    }

    /// Restrict reals to `[min, max]`. A reversed pair is swapped.
    pub fn set_real_limits(&mut self, min: f64, max: f64) -> Result<(), SynthError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(SynthError::InvalidRange { from: min, to: max });
        }
        self.real_min = min.min(max);
        self.real_max = min.max(max);
        Ok(())
    }

    /// Current byte range.
    pub fn byte_limits(&self) -> (u8, u8) {
        (self.byte_min, self.byte_max)
    }

    /// Current real range.
    pub fn real_limits(&self) -> (f64, f64) {
        (self.real_min, self.real_max)
    }

    /// Backing algorithm.
    pub fn algorithm(&self) -> RandAlgorithm {
        self.engine.algorithm()
    }

    /// Derive an independent generator of the same algorithm and ranges.
    ///
    /// The child's seed is drawn from `self`, so a tree of generators split
    /// from one seeded root is reproducible.
    pub fn split(&mut self) -> Self {
        let hi = u64::from(self.engine.next_u32());
        let lo = u64::from(self.engine.next_u32());
        Self {
            engine: Engine::new(self.algorithm(), (hi << 32) | lo),
            ..*self
        }
    }
}

impl RandomSource for Rand {
    fn generate_byte(&mut self) -> u8 {
        let span = u32::from(self.byte_max) - u32::from(self.byte_min) + 1;
        (u32::from(self.byte_min) + self.engine.next_u32() % span) as u8
    }

    fn generate_real(&mut self) -> f64 {
        self.real_min + unit(self.engine.next_u32()) * (self.real_max - self.real_min)
    }
}

impl fmt::Debug for Rand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rand")
            .field("algorithm", &self.algorithm())
            .field("byte_limits", &self.byte_limits())
            .field("real_limits", &self.real_limits())
            .finish_non_exhaustive()
    }
}

/// Map 32 random bits onto `[0, 1]`.
#[inline]
fn unit(bits: u32) -> f64 {
    f64::from(bits) / f64::from(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lehmer_deterministic() {
        let mut a = Lehmer32::new(1234);
        let mut b = Lehmer32::new(1234);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
        let mut c = Lehmer32::new(1235);
        assert_ne!(Lehmer32::new(1234).next_u32(), c.next_u32());
    }

    #[test]
    fn test_lehmer_real_range() {
        let mut rng = Lehmer32::new(0);
        let mut saw_negative = false;
        for _ in 0..1000 {
            let r = rng.generate_real();
            assert!((-1.0..=1.0).contains(&r));
            saw_negative |= r < 0.0;
        }
        assert!(saw_negative);
    }

    #[test]
    fn test_rand_byte_limits() {
        let mut rng = Rand::new(RandAlgorithm::Lehmer32, 9);
        rng.set_byte_limits(10, 12);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let b = rng.generate_byte();
            assert!((10..=12).contains(&b));
            seen[(b - 10) as usize] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn test_rand_full_byte_range_and_swap() {
        let mut rng = Rand::new(RandAlgorithm::Lehmer32, 9);
        assert_eq!(rng.byte_limits(), (0, 255));
        rng.set_byte_limits(47, 0);
        assert_eq!(rng.byte_limits(), (0, 47));
        rng.set_byte_limits(5, 5);
        assert_eq!(rng.generate_byte(), 5);
    }

    #[test]
    fn test_rand_real_limits() {
        let mut rng = Rand::new(RandAlgorithm::Lehmer32, 3);
        assert_eq!(rng.real_limits(), (0.0, 1.0));
        rng.set_real_limits(1.5, 0.1).unwrap();
        assert_eq!(rng.real_limits(), (0.1, 1.5));
        for _ in 0..500 {
            let r = rng.generate_real();
            assert!((0.1..=1.5).contains(&r));
        }
    }

    #[test]
    fn test_rand_rejects_non_finite_range() {
        let mut rng = Rand::new(RandAlgorithm::Lehmer32, 3);
        assert!(matches!(
            rng.set_real_limits(0.0, f64::INFINITY),
            Err(SynthError::InvalidRange { .. })
        ));
        assert_eq!(rng.real_limits(), (0.0, 1.0));
    }

    #[test]
    fn test_rand_split_is_reproducible() {
        let mut root_a = Rand::new(RandAlgorithm::Lehmer32, 77);
        let mut root_b = Rand::new(RandAlgorithm::Lehmer32, 77);
        let mut child_a = root_a.split();
        let mut child_b = root_b.split();
        for _ in 0..50 {
            assert_eq!(child_a.generate_byte(), child_b.generate_byte());
        }
        // the child does not replay the parent
        let mut parent = Rand::new(RandAlgorithm::Lehmer32, 77);
        let mut child = parent.split();
        let parent_seq: [u8; 8] = core::array::from_fn(|_| parent.generate_byte());
        let child_seq: [u8; 8] = core::array::from_fn(|_| child.generate_byte());
        assert_ne!(parent_seq, child_seq);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_std_algorithm() {
        let mut a = Rand::new(RandAlgorithm::Std, 5);
        let mut b = Rand::new(RandAlgorithm::Std, 5);
        assert_eq!(a.algorithm(), RandAlgorithm::Std);
        for _ in 0..20 {
            assert_eq!(a.generate_real(), b.generate_real());
        }
        assert_eq!("std".parse::<RandAlgorithm>(), Ok(RandAlgorithm::Std));
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!("Lehmer32".parse::<RandAlgorithm>(), Ok(RandAlgorithm::Lehmer32));
        assert!(matches!(
            "mersenne".parse::<RandAlgorithm>(),
            Err(SynthError::UnknownAlgorithm(_))
        ));
    }
}
