//! Caller-owned pseudo-random helpers
//!
//! There is no process-wide generator here: every draw takes the caller's
//! `Rng`, so a run is reproduced by re-seeding with the same value.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used when a reproducible run is wanted and none is configured
pub const FIXED_SEED: u64 = 12134;

/// Deterministic generator from `seed`
#[must_use]
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Uniform integer in `[min, max]` (both inclusive).
///
/// Bounds given in reverse order are swapped.
pub fn uniform_int<R: Rng>(rng: &mut R, min: i32, max: i32) -> i32 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    rng.gen_range(lo..=hi)
}

/// Uniform float in `[min, max]` (both inclusive).
///
/// Bounds given in reverse order are swapped; equal bounds return that bound.
/// Bounds must be finite.
pub fn uniform_f32<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    rng.gen_range(lo..=hi)
}
