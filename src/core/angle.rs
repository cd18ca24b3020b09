//! Deterministic Angle Math (fixed-point degrees)
//!
//! Hardware trig differs between platforms, and a resimulating client has to
//! land on the authority's exact bits. Angles here are Q16.16 degrees and
//! every function is pure integer arithmetic.
//!
//! ## Conventions
//!
//! ```text
//!            +Z (yaw 0)
//!             ▲
//!             │
//!  yaw -90 ───┼───► +X (yaw 90)
//!             │
//!
//!  pitch > 0 looks down, pitch < 0 looks up
//! ```

use super::fixed::{Fixed, FIXED_ONE, FIXED_SCALE, fixed_abs, fixed_div, fixed_mul, to_fixed};
use super::vec2::FixedVec2;
use super::vec3::FixedVec3;

/// 90 degrees.
pub const DEG_90: Fixed = 90 << FIXED_SCALE;

/// 180 degrees.
pub const DEG_180: Fixed = 180 << FIXED_SCALE;

/// 360 degrees.
pub const DEG_360: Fixed = 360 << FIXED_SCALE;

/// Correction term of the linear arctangent fit (degrees).
const ATAN_CURVE: Fixed = to_fixed(15.642);

/// Wrap an angle into (-180, 180].
#[inline]
pub fn normalize_deg(angle: Fixed) -> Fixed {
    let wrapped = angle.rem_euclid(DEG_360);
    if wrapped > DEG_180 {
        wrapped - DEG_360
    } else {
        wrapped
    }
}

/// Sine of an angle in degrees.
///
/// Bhaskara I's approximation, `4x(180-x) / (40500 - x(180-x))`, mirrored
/// for the lower half-turn. Exact at 0, 30, 90, 150 and 180.
#[inline]
pub fn sin_deg(angle: Fixed) -> Fixed {
    let mut x = angle.rem_euclid(DEG_360);
    let negative = x >= DEG_180;
    if negative {
        x -= DEG_180;
    }

    let p = (x as i64 * (DEG_180 - x) as i64) >> FIXED_SCALE;
    let numerator = 4 * p;
    let denominator = (40500i64 << FIXED_SCALE) - p;
    let value = ((numerator << FIXED_SCALE) / denominator) as Fixed;

    if negative { -value } else { value }
}

/// Cosine of an angle in degrees.
#[inline]
pub fn cos_deg(angle: Fixed) -> Fixed {
    sin_deg(angle.wrapping_add(DEG_90))
}

/// Arctangent of `z` in [0, 1], in degrees.
#[inline]
fn atan_unit(z: Fixed) -> Fixed {
    let linear = 45 * z;
    let curve = fixed_mul(ATAN_CURVE, fixed_mul(z, FIXED_ONE - z));
    linear + curve
}

/// Angle of the vector `(x, y)` in degrees, in (-180, 180].
///
/// Accurate to about 0.2 degrees; returns 0 for the zero vector.
#[inline]
pub fn atan2_deg(y: Fixed, x: Fixed) -> Fixed {
    if x == 0 && y == 0 {
        return 0;
    }
    let ax = fixed_abs(x);
    let ay = fixed_abs(y);

    let first_quadrant = if ax >= ay {
        atan_unit(fixed_div(ay, ax))
    } else {
        DEG_90 - atan_unit(fixed_div(ax, ay))
    };

    let half_plane = if x < 0 { DEG_180 - first_quadrant } else { first_quadrant };
    if y < 0 { -half_plane } else { half_plane }
}

/// Yaw (degrees) of a horizontal direction.
#[inline]
pub fn heading_deg(direction: FixedVec3) -> Fixed {
    atan2_deg(direction.x, direction.z)
}

/// Interpolate between two angles along the shorter arc.
#[inline]
pub fn lerp_angle(from: Fixed, to: Fixed, t: Fixed) -> Fixed {
    let delta = normalize_deg(to.wrapping_sub(from));
    normalize_deg(from.wrapping_add(fixed_mul(delta, t)))
}

/// Rotate a planar intent (x = strafe, y = forward) around the up axis.
#[inline]
pub fn rotate_by_yaw(intent: FixedVec2, yaw: Fixed) -> FixedVec3 {
    let sin = sin_deg(yaw);
    let cos = cos_deg(yaw);
    FixedVec3::new(
        fixed_mul(intent.x, cos).wrapping_add(fixed_mul(intent.y, sin)),
        0,
        fixed_mul(intent.y, cos).wrapping_sub(fixed_mul(intent.x, sin)),
    )
}

/// Forward direction for a (pitch, yaw) look rotation.
#[inline]
pub fn look_direction(look: FixedVec2) -> FixedVec3 {
    let pitch_cos = cos_deg(look.x);
    FixedVec3::new(
        fixed_mul(pitch_cos, sin_deg(look.y)),
        -sin_deg(look.x),
        fixed_mul(pitch_cos, cos_deg(look.y)),
    )
}

// =============================================================================
// TESTS
// =============================================================================
