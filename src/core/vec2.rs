//! Planar Intent and Look Angles
//!
//! `FixedVec2` carries the two 2D quantities an input record needs: the
//! planar move intent (x = strafe, y = forward) and the look rotation
//! (x = pitch, y = yaw, in fixed-point degrees). Everything spatial is a
//! `FixedVec3`.

use std::fmt;
use std::ops::Add;
use serde::{Serialize, Deserialize};

use super::fixed::{Fixed, FIXED_ONE, FIXED_SCALE, fixed_clamp, isqrt_u64, to_float};

/// 2D vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixedVec2 {
    /// Strafe intent, or pitch (Q16.16)
    pub x: Fixed,
    /// Forward intent, or yaw (Q16.16)
    pub y: Fixed,
}

impl FixedVec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new vector from fixed-point components.
    #[inline]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer components.
    #[inline]
    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self {
            x: x << FIXED_SCALE,
            y: y << FIXED_SCALE,
        }
    }

    /// Pitch of a look rotation.
    #[inline]
    pub fn pitch(self) -> Fixed {
        self.x
    }

    /// Yaw of a look rotation.
    #[inline]
    pub fn yaw(self) -> Fixed {
        self.y
    }

    /// Squared length, computed in 64 bits.
    #[inline]
    pub fn length_squared(self) -> Fixed {
        let wide = self.x as i64 * self.x as i64 + self.y as i64 * self.y as i64;
        (wide >> FIXED_SCALE).clamp(0, Fixed::MAX as i64) as Fixed
    }

    /// Length (magnitude).
    #[inline]
    pub fn length(self) -> Fixed {
        let wide = self.x as i64 * self.x as i64 + self.y as i64 * self.y as i64;
        isqrt_u64(wide as u64) as Fixed
    }

    /// Unit length, or ZERO for the zero vector.
    pub fn normalize(self) -> Self {
        let len = self.length() as i64;
        if len == 0 {
            return Self::ZERO;
        }
        Self {
            x: ((self.x as i64 * FIXED_ONE as i64) / len) as Fixed,
            y: ((self.y as i64 * FIXED_ONE as i64) / len) as Fixed,
        }
    }

    /// True when both components are exactly zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Clamp the pitch, leaving yaw untouched.
    #[inline]
    pub fn clamp_pitch(self, min: Fixed, max: Fixed) -> Self {
        Self {
            x: fixed_clamp(self.x, min, max),
            y: self.y,
        }
    }

    /// Components as floats, for logs and the presentation side.
    #[inline]
    pub fn to_floats(self) -> (f32, f32) {
        (to_float(self.x), to_float(self.y))
    }
}

/// Look deltas accumulate component-wise.
impl Add for FixedVec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x.wrapping_add(rhs.x),
            y: self.y.wrapping_add(rhs.y),
        }
    }
}

impl fmt::Debug for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy) = self.to_floats();
        write!(f, "Vec2({:.3}, {:.3})", fx, fy)
    }
}

impl fmt::Display for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy) = self.to_floats();
        write!(f, "({:.3}, {:.3})", fx, fy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;

    #[test]
    fn test_length_of_intent() {
        let v = FixedVec2::new(to_fixed(0.6), to_fixed(0.8));
        assert!((v.length() - FIXED_ONE).abs() < 4);
        assert_eq!(FixedVec2::new(FIXED_ONE, 0).length_squared(), FIXED_ONE);
    }

    #[test]
    fn test_normalize_diagonal() {
        let diagonal = FixedVec2::from_ints(1, 1).normalize();
        assert!((diagonal.length() - FIXED_ONE).abs() < 4);
        assert_eq!(diagonal.x, diagonal.y);
        assert_eq!(FixedVec2::ZERO.normalize(), FixedVec2::ZERO);
    }

    #[test]
    fn test_clamp_pitch_keeps_yaw() {
        let look = FixedVec2::from_ints(120, 45).clamp_pitch(to_fixed(-30.0), to_fixed(70.0));
        assert_eq!(look.pitch(), to_fixed(70.0));
        assert_eq!(look.yaw(), to_fixed(45.0));
    }

    #[test]
    fn test_look_deltas_add() {
        let look = FixedVec2::from_ints(10, 350) + FixedVec2::from_ints(-5, 20);
        assert_eq!(look, FixedVec2::from_ints(5, 370));
    }
}
