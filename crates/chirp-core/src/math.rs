//! Allocation-free math helpers for the synthesis path.
//!
//! Everything here works on `f64`: voice evaluation is a pure function of
//! absolute stream time in seconds, and `f32` runs out of phase precision
//! after a few minutes of playback.
//!
//! # Sine Approximations
//!
//! | Function | Max abs. error | Cost |
//! |----------|----------------|------|
//! | [`approx_sin_taylor`] | < 1e-6 | 6 multiply-adds after folding |
//! | [`approx_sin_quad`] | < 0.06 | 2 multiply-adds |
//! | [`approx_sin_cubic`] | < 0.17 | 3 multiply-adds |
//!
//! The Taylor form is the one used inside the additive sawtooth, where it is
//! evaluated once per harmonic per sample.

use core::f64::consts::{FRAC_PI_2, PI, TAU};

use libm::floor;

/// Amplitude floor below which envelopes and voices output exactly zero.
///
/// Snapping tiny gains to zero keeps denormals out of the mix and lets a voice
/// skip waveform evaluation entirely.
pub const EPSILON: f64 = 1e-4;

/// Euclidean remainder of `x` by a positive `modulus`, in `[0, modulus)`.
///
/// # Example
///
/// ```rust
/// use chirp_core::rem_euclid;
///
/// assert!((rem_euclid(7.5, 2.0) - 1.5).abs() < 1e-12);
/// assert!((rem_euclid(-0.5, 2.0) - 1.5).abs() < 1e-12);
/// ```
#[inline]
pub fn rem_euclid(x: f64, modulus: f64) -> f64 {
    let r = x - modulus * floor(x / modulus);
    if r >= modulus || r < 0.0 { 0.0 } else { r }
}

/// Sine via a Taylor polynomial up to `x^11` on `[0, π/2]`, folded to the
/// other quadrants.
///
/// Accepts any finite `x`; the argument is reduced to `[0, 2π)` first.
///
/// # Example
///
/// ```rust
/// use chirp_core::approx_sin_taylor;
///
/// assert!((approx_sin_taylor(1.0) - 1.0f64.sin()).abs() < 1e-6);
/// assert!((approx_sin_taylor(-4.0) - (-4.0f64).sin()).abs() < 1e-6);
/// ```
#[inline]
pub fn approx_sin_taylor(x: f64) -> f64 {
    let x = rem_euclid(x, TAU);

    if x <= FRAC_PI_2 {
        taylor_quadrant(x)
    } else if x <= PI {
        taylor_quadrant(PI - x)
    } else if x <= PI + FRAC_PI_2 {
        -taylor_quadrant(x - PI)
    } else {
        -taylor_quadrant(TAU - x)
    }
}

#[inline]
fn taylor_quadrant(x: f64) -> f64 {
    const F3: f64 = 1.0 / 6.0;
    const F5: f64 = 1.0 / 120.0;
    const F7: f64 = 1.0 / 5_040.0;
    const F9: f64 = 1.0 / 362_880.0;
    const F11: f64 = 1.0 / 39_916_800.0;

    let x2 = x * x;
    // Horner form of x - x^3/3! + x^5/5! - x^7/7! + x^9/9! - x^11/11!
    x * (1.0 - x2 * (F3 - x2 * (F5 - x2 * (F7 - x2 * (F9 - x2 * F11)))))
}

/// Sine shaped as two parabolas per period.
///
/// Exact at multiples of `π/2`, off by up to about 0.056 in between.
#[inline]
pub fn approx_sin_quad(x: f64) -> f64 {
    let t = rem_euclid(x, TAU) / TAU;

    if t < 0.5 {
        -16.0 * t * t + 8.0 * t
    } else {
        16.0 * t * t - 24.0 * t + 8.0
    }
}

/// Sine shaped as a single cubic per period.
///
/// Zero at `0` and close to zero at `π`; strays up to about 0.17 from the true
/// sine near the end of the period.
#[inline]
pub fn approx_sin_cubic(x: f64) -> f64 {
    let t = rem_euclid(x, TAU) / TAU;
    let t2 = t * t;

    20.785 * t * t2 - 31.1775 * t2 + 10.3925 * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use libm::sin;

    fn max_error(f: fn(f64) -> f64) -> f64 {
        let mut worst: f64 = 0.0;
        for i in -4000..4000 {
            let x = i as f64 * 0.005;
            worst = worst.max((f(x) - sin(x)).abs());
        }
        worst
    }

    #[test]
    fn test_taylor_error_bound() {
        let err = max_error(approx_sin_taylor);
        assert!(err < 1e-6, "taylor max error {err}");
    }

    #[test]
    fn test_quad_error_bound() {
        let err = max_error(approx_sin_quad);
        assert!(err < 0.06, "quad max error {err}");
    }

    #[test]
    fn test_cubic_error_bound() {
        let err = max_error(approx_sin_cubic);
        assert!(err < 0.17, "cubic max error {err}");
    }

    #[test]
    fn test_quad_exact_at_quarters() {
        assert!(approx_sin_quad(0.0).abs() < 1e-12);
        assert!((approx_sin_quad(FRAC_PI_2) - 1.0).abs() < 1e-12);
        assert!(approx_sin_quad(PI).abs() < 1e-12);
        assert!((approx_sin_quad(PI + FRAC_PI_2) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rem_euclid_range() {
        for i in -50..50 {
            let x = i as f64 * 0.37;
            let r = rem_euclid(x, 1.5);
            assert!((0.0..1.5).contains(&r), "rem_euclid({x}, 1.5) = {r}");
        }
        assert_eq!(rem_euclid(3.0, 1.5), 0.0);
    }
}
