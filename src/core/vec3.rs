//! Fixed-Point 3D Vector
//!
//! World-space positions, velocities and ray directions. Y is up.
//!
//! Products are widened to i64 before they are summed, so lengths and dot
//! products stay exact across the whole playable volume (hit-scan rays reach
//! 200 units, well past the point where a Q16.16 square would overflow).

use std::fmt;
use std::ops::{Add, Sub, Neg};
use serde::{Serialize, Deserialize};

use super::fixed::{
    Fixed, FIXED_ONE, FIXED_SCALE,
    fixed_mul, fixed_div, isqrt_u64,
};

/// 3D vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixedVec3 {
    /// X component (right)
    pub x: Fixed,
    /// Y component (up)
    pub y: Fixed,
    /// Z component (forward)
    pub z: Fixed,
}

impl FixedVec3 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// World up (+Y)
    pub const UP: Self = Self { x: 0, y: FIXED_ONE, z: 0 };

    /// World forward (+Z)
    pub const FORWARD: Self = Self { x: 0, y: 0, z: FIXED_ONE };

    /// Create a new vector from fixed-point components.
    #[inline]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }

    /// Create a vector from integer components.
    #[inline]
    pub const fn from_ints(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: x << FIXED_SCALE,
            y: y << FIXED_SCALE,
            z: z << FIXED_SCALE,
        }
    }

    /// Add another vector.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_add(other.x),
            y: self.y.wrapping_add(other.y),
            z: self.z.wrapping_add(other.z),
        }
    }

    /// Subtract another vector.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_sub(other.x),
            y: self.y.wrapping_sub(other.y),
            z: self.z.wrapping_sub(other.z),
        }
    }

    /// Scale by a fixed-point scalar.
    #[inline]
    pub fn scale(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_mul(self.x, scalar),
            y: fixed_mul(self.y, scalar),
            z: fixed_mul(self.z, scalar),
        }
    }

    /// Dot product as a widened Q32.32 value.
    #[inline]
    pub fn dot_wide(self, other: Self) -> i64 {
        self.x as i64 * other.x as i64
            + self.y as i64 * other.y as i64
            + self.z as i64 * other.z as i64
    }

    /// Dot product in Q16.16.
    #[inline]
    pub fn dot(self, other: Self) -> Fixed {
        (self.dot_wide(other) >> FIXED_SCALE) as Fixed
    }

    /// Cross product.
    #[inline]
    pub fn cross(self, other: Self) -> Self {
        Self {
            x: fixed_mul(self.y, other.z).wrapping_sub(fixed_mul(self.z, other.y)),
            y: fixed_mul(self.z, other.x).wrapping_sub(fixed_mul(self.x, other.z)),
            z: fixed_mul(self.x, other.y).wrapping_sub(fixed_mul(self.y, other.x)),
        }
    }

    /// Squared length as a widened Q32.32 value.
    #[inline]
    pub fn length_squared_wide(self) -> i64 {
        self.dot_wide(self)
    }

    /// Length (magnitude).
    #[inline]
    pub fn length(self) -> Fixed {
        isqrt_u64(self.length_squared_wide() as u64) as Fixed
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> Fixed {
        self.sub(other).length()
    }

    /// Normalize to unit length. Returns ZERO if length is zero.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0 {
            return Self::ZERO;
        }
        Self {
            x: fixed_div(self.x, len),
            y: fixed_div(self.y, len),
            z: fixed_div(self.z, len),
        }
    }

    /// Same vector with the vertical component removed.
    #[inline]
    pub fn horizontal(self) -> Self {
        Self { x: self.x, y: 0, z: self.z }
    }

    /// Projection onto the plane with the given unit normal.
    #[inline]
    pub fn project_on_plane(self, normal: Self) -> Self {
        self.sub(normal.scale(self.dot(normal)))
    }

    /// Rescale to the given length, keeping direction.
    #[inline]
    pub fn with_length(self, length: Fixed) -> Self {
        self.normalize().scale(length)
    }

    /// Linear interpolation between two vectors.
    #[inline]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x.wrapping_add(fixed_mul(other.x.wrapping_sub(self.x), t)),
            y: self.y.wrapping_add(fixed_mul(other.y.wrapping_sub(self.y), t)),
            z: self.z.wrapping_add(fixed_mul(other.z.wrapping_sub(self.z), t)),
        }
    }

    /// True when all components are exactly zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0 && self.z == 0
    }

    /// Negate all components.
    #[inline]
    pub fn negate(self) -> Self {
        Self {
            x: self.x.wrapping_neg(),
            y: self.y.wrapping_neg(),
            z: self.z.wrapping_neg(),
        }
    }

    /// Convert to a float triple for rendering.
    #[inline]
    pub fn to_floats(self) -> [f32; 3] {
        [
            self.x as f32 / FIXED_ONE as f32,
            self.y as f32 / FIXED_ONE as f32,
            self.z as f32 / FIXED_ONE as f32,
        ]
    }
}

impl Add for FixedVec3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        FixedVec3::add(self, rhs)
    }
}

impl Sub for FixedVec3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        FixedVec3::sub(self, rhs)
    }
}

impl Neg for FixedVec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.negate()
    }
}

impl fmt::Debug for FixedVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.to_floats();
        write!(f, "Vec3({:.3}, {:.3}, {:.3})", x, y, z)
    }
}

impl fmt::Display for FixedVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.to_floats();
        write!(f, "({:.3}, {:.3}, {:.3})", x, y, z)
    }
}

// =============================================================================
// TESTS
// =============================================================================
