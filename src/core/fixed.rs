//! Q16.16 Fixed-Point Arithmetic
//!
//! This module provides deterministic fixed-point math for the simulation.
//! All operations use integer arithmetic only - no floats in gameplay logic.
//!
//! ## Format: Q16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q16.16 (32-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ────┘└──── 16 bits ────┘                 │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 (approx)                   │
//! │  Precision: 1/65536 ≈ 0.000015 units                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A predicting participant re-runs the same ticks many times and must land on
//! the exact bits the authority produced, so gameplay never touches `f32`.

/// Q16.16 fixed-point number stored as i32.
/// 16 bits integer, 16 bits fractional.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE; // 65536

/// 0.5 in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1; // 32768

// =============================================================================
// SIMULATION CONSTANTS (All as integer literals - NO float conversion!)
// =============================================================================

/// Default simulation rate (Hz)
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Tick duration: 1/60 second = round(65536/60) = 1092
pub const TICK_DURATION: Fixed = 1092;

/// Walk speed: 2.0 units/sec
pub const WALK_SPEED: Fixed = 131072;

/// Sprint speed: 5.0 units/sec
pub const SPRINT_SPEED: Fixed = 327680;

/// Jump impulse: 10.0 units/sec upward
pub const JUMP_IMPULSE: Fixed = 655360;

/// Gravity while rising: 25.0
pub const UP_GRAVITY: Fixed = 1638400;

/// Gravity while falling: 40.0 (falling faster feels better)
pub const DOWN_GRAVITY: Fixed = 2621440;

/// Facing blend rate: 8.0 per second
pub const ROTATION_SPEED: Fixed = 524288;

/// Acceleration buckets: grounded/airborne x accelerating/decelerating
pub const GROUND_ACCELERATION: Fixed = 3604480; // 55.0
/// Grounded, no intent.
pub const GROUND_DECELERATION: Fixed = 1638400; // 25.0
/// Airborne, with intent.
pub const AIR_ACCELERATION: Fixed = 1638400; // 25.0
/// Airborne, no intent.
pub const AIR_DECELERATION: Fixed = 85196; // 1.3 (floor)

/// Anything below this height is out of bounds: -15.0
pub const KILL_HEIGHT: Fixed = -983040;

/// Hit-scan range: 200.0
pub const FIRE_RANGE: Fixed = 13107200;

// =============================================================================
// CORE OPERATIONS (All deterministic, wrapping semantics)
// =============================================================================

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use at compile-time or initialization. NEVER in tick loop.
///
/// # Example
/// ```
/// use tickbound::core::fixed::{to_fixed, FIXED_ONE};
/// const MY_VALUE: i32 = to_fixed(2.5);
/// assert_eq!(MY_VALUE, FIXED_ONE * 2 + FIXED_ONE / 2);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Convert fixed-point to float for display/rendering.
///
/// # Warning
/// Only use for visual output. NEVER use result in game logic.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FIXED_ONE as f32
}

/// Integer to fixed-point.
#[inline]
pub const fn from_int(i: i32) -> Fixed {
    i << FIXED_SCALE
}

/// Multiply two fixed-point numbers.
///
/// Uses i64 intermediate to prevent overflow, then truncates.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Divide two fixed-point numbers.
///
/// Pre-shifts numerator to maintain precision.
/// Returns 0 on divide-by-zero.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0; // Deterministic: don't panic
    }
    let wide = (a as i64) << FIXED_SCALE;
    (wide / b as i64) as Fixed
}

/// Square root using Newton-Raphson iteration.
///
/// Returns 0 for non-positive inputs.
/// Uses exactly 6 iterations for determinism.
#[inline]
pub fn fixed_sqrt(x: Fixed) -> Fixed {
    if x <= 0 {
        return 0;
    }

    // Initial guess: x/2, but never zero
    let mut guess = (x >> 1).max(1);

    // Small inputs converge slowly from x/2, start from 1.0 instead
    if x < FIXED_ONE {
        guess = FIXED_ONE;
    }

    for _ in 0..6 {
        let div = fixed_div(x, guess);
        guess = (guess.wrapping_add(div)) >> 1;

        if guess == 0 {
            guess = 1;
        }
    }

    guess
}

/// Integer square root of a u64 (floor), bit-by-bit.
///
/// Used for lengths computed from i64 squared sums: the square root of a
/// Q32.32 value is directly a Q16.16 value, so long vectors never overflow.
#[inline]
pub fn isqrt_u64(value: u64) -> u64 {
    let mut op = value;
    let mut res = 0u64;
    let mut one = 1u64 << 62;

    while one > op {
        one >>= 2;
    }

    while one != 0 {
        if op >= res + one {
            op -= res + one;
            res = (res >> 1) + one;
        } else {
            res >>= 1;
        }
        one >>= 2;
    }

    res
}

/// Absolute value of a fixed-point number.
#[inline]
pub fn fixed_abs(x: Fixed) -> Fixed {
    if x < 0 { x.wrapping_neg() } else { x }
}

/// Minimum of two fixed-point numbers.
#[inline]
pub fn fixed_min(a: Fixed, b: Fixed) -> Fixed {
    if a < b { a } else { b }
}

/// Maximum of two fixed-point numbers.
#[inline]
pub fn fixed_max(a: Fixed, b: Fixed) -> Fixed {
    if a > b { a } else { b }
}

/// Clamp a fixed-point number to a range.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    fixed_max(min, fixed_min(max, value))
}

/// Blend factor for a per-second rate over one step, saturated at 1.0.
///
/// `rate * dt` above one would overshoot the target, so it is clamped.
#[inline]
pub fn blend_factor(rate: Fixed, dt: Fixed) -> Fixed {
    fixed_clamp(fixed_mul(rate, dt), 0, FIXED_ONE)
}

/// Number of whole ticks covering `seconds` at `tick_rate`, rounded up.
///
/// Rounding up keeps "wait at least N seconds" semantics on the tick grid.
#[inline]
pub fn ticks_from_seconds(seconds: Fixed, tick_rate: u32) -> u32 {
    if seconds <= 0 || tick_rate == 0 {
        return 0;
    }
    let wide = seconds as i64 * tick_rate as i64;
    let whole = wide >> FIXED_SCALE;
    let has_fraction = wide & ((FIXED_ONE as i64) - 1) != 0;
    (whole + has_fraction as i64) as u32
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_constants() {
        assert_eq!(FIXED_ONE, 65536);
        assert_eq!(FIXED_HALF, 32768);
        assert_eq!(FIXED_SCALE, 16);
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(1.0), FIXED_ONE);
        assert_eq!(to_fixed(0.5), FIXED_HALF);
        assert_eq!(to_fixed(2.0), FIXED_ONE * 2);
        assert_eq!(to_fixed(-1.0), -FIXED_ONE);
    }

    #[test]
    fn test_fixed_mul() {
        assert_eq!(fixed_mul(to_fixed(2.0), to_fixed(3.0)), to_fixed(6.0));
        assert_eq!(fixed_mul(FIXED_HALF, FIXED_HALF), to_fixed(0.25));
        assert_eq!(fixed_mul(to_fixed(-2.0), to_fixed(3.0)), to_fixed(-6.0));
    }

    #[test]
    fn test_fixed_div() {
        assert_eq!(fixed_div(to_fixed(6.0), to_fixed(2.0)), to_fixed(3.0));
        assert_eq!(fixed_div(FIXED_ONE, to_fixed(4.0)), to_fixed(0.25));
        assert_eq!(fixed_div(FIXED_ONE, 0), 0);
    }

    #[test]
    fn test_fixed_sqrt() {
        let result = fixed_sqrt(to_fixed(4.0));
        assert!((result - to_fixed(2.0)).abs() < 100, "sqrt(4) should be ~2.0");

        let result2 = fixed_sqrt(FIXED_ONE);
        assert!((result2 - FIXED_ONE).abs() < 100, "sqrt(1) should be ~1.0");

        let result3 = fixed_sqrt(to_fixed(0.25));
        assert!((result3 - FIXED_HALF).abs() < 100, "sqrt(0.25) should be ~0.5");

        assert_eq!(fixed_sqrt(0), 0);
        assert_eq!(fixed_sqrt(-FIXED_ONE), 0);
        assert!(fixed_sqrt(1) >= 0);
    }

    #[test]
    fn test_isqrt_u64() {
        assert_eq!(isqrt_u64(0), 0);
        assert_eq!(isqrt_u64(1), 1);
        assert_eq!(isqrt_u64(15), 3);
        assert_eq!(isqrt_u64(16), 4);
        assert_eq!(isqrt_u64(u64::MAX), 4294967295);
        // Q32.32 in, Q16.16 out: sqrt(400.0) = 20.0
        let q32 = (400u64) << 32;
        assert_eq!(isqrt_u64(q32), 20 << 16);
    }

    #[test]
    fn test_tuning_constants() {
        assert_eq!(TICK_DURATION, 1092); // round(65536/60)
        assert_eq!(WALK_SPEED, 2 * FIXED_ONE);
        assert_eq!(SPRINT_SPEED, 5 * FIXED_ONE);
        assert_eq!(JUMP_IMPULSE, 10 * FIXED_ONE);
        assert_eq!(UP_GRAVITY, 25 * FIXED_ONE);
        assert_eq!(DOWN_GRAVITY, 40 * FIXED_ONE);
        assert_eq!(GROUND_ACCELERATION, 55 * FIXED_ONE);
        assert_eq!(AIR_DECELERATION, to_fixed(1.3));
        assert_eq!(KILL_HEIGHT, -15 * FIXED_ONE);
        // Falling must pull harder than rising.
        assert!(DOWN_GRAVITY > UP_GRAVITY);
    }

    #[test]
    fn test_blend_factor_saturates() {
        assert_eq!(blend_factor(to_fixed(1000.0), TICK_DURATION), FIXED_ONE);
        assert_eq!(blend_factor(0, TICK_DURATION), 0);
        let ground = blend_factor(GROUND_ACCELERATION, TICK_DURATION);
        assert!(ground > 0 && ground < FIXED_ONE);
    }

    #[test]
    fn test_ticks_from_seconds() {
        assert_eq!(ticks_from_seconds(to_fixed(4.0), 60), 240);
        assert_eq!(ticks_from_seconds(to_fixed(0.2), 60), 12);
        assert_eq!(ticks_from_seconds(0, 60), 0);
        assert_eq!(ticks_from_seconds(FIXED_ONE, 0), 0);
        // A fraction of a tick still waits one full tick.
        assert_eq!(ticks_from_seconds(1, 60), 1);
    }

    #[test]
    fn test_fixed_determinism() {
        for _ in 0..1000 {
            let a = 12345678;
            let b = 87654321;
            assert_eq!(fixed_mul(a, b), fixed_mul(a, b));
            assert_eq!(fixed_div(a, b), fixed_div(a, b));
            assert_eq!(fixed_sqrt(a), fixed_sqrt(a));
        }
    }
}
