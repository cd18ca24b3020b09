//! Collision Detection
//!
//! Deterministic overlap and ray tests for hitboxes, pickups and surfaces.
//! Every product of two Q16.16 values is widened to i64 so that long rays
//! across the level cannot overflow.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, FIXED_SCALE, isqrt_u64};
use crate::core::vec3::FixedVec3;
use crate::game::controller::Surface;
use crate::game::entity::EntityId;

/// A hit-scan ray with a unit direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ray {
    /// Start point
    pub origin: FixedVec3,
    /// Unit direction
    pub direction: FixedVec3,
    /// Maximum travel distance
    pub max_distance: Fixed,
}

impl Ray {
    /// Ray from `origin` along `direction` (normalized here).
    pub fn new(origin: FixedVec3, direction: FixedVec3, max_distance: Fixed) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            max_distance,
        }
    }

    /// Point at distance `t` along the ray.
    #[inline]
    pub fn at(&self, t: Fixed) -> FixedVec3 {
        self.origin.add(self.direction.scale(t))
    }
}

/// Result of a ray test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaycastHit {
    /// Distance from the ray origin
    pub distance: Fixed,
    /// Impact point
    pub point: FixedVec3,
    /// Surface normal at the impact point
    pub normal: FixedVec3,
    /// Entity whose hitbox was hit; `None` for static geometry
    pub entity: Option<EntityId>,
}

/// Check if two spheres overlap (touching counts).
#[inline]
pub fn spheres_overlap(
    pos_a: FixedVec3,
    radius_a: Fixed,
    pos_b: FixedVec3,
    radius_b: Fixed,
) -> bool {
    let combined = radius_a as i64 + radius_b as i64;
    pos_a.sub(pos_b).length_squared_wide() <= combined * combined
}

/// Is `point` inside the sphere at `center`?
#[inline]
pub fn within_radius(point: FixedVec3, center: FixedVec3, radius: Fixed) -> bool {
    spheres_overlap(point, 0, center, radius)
}

/// Intersect a ray with a sphere.
///
/// A ray starting inside the sphere hits at distance zero.
pub fn ray_sphere(ray: &Ray, center: FixedVec3, radius: Fixed) -> Option<RaycastHit> {
    let to_center = center.sub(ray.origin);
    let radius_sq = radius as i64 * radius as i64;
    let dist_sq = to_center.length_squared_wide();

    // Closest approach along the ray (Q16.16, widened)
    let t_closest = to_center.dot_wide(ray.direction) >> FIXED_SCALE;
    if t_closest < 0 && dist_sq > radius_sq {
        return None;
    }

    let miss_sq = dist_sq - t_closest * t_closest;
    if miss_sq > radius_sq {
        return None;
    }

    let half_chord = isqrt_u64((radius_sq - miss_sq) as u64) as i64;
    let t = (t_closest - half_chord).max(0);
    if t > ray.max_distance as i64 {
        return None;
    }

    let point = ray.at(t as Fixed);
    let normal = point.sub(center).normalize();
    Some(RaycastHit {
        distance: t as Fixed,
        point,
        normal,
        entity: None,
    })
}

/// Intersect a ray with the top face of a surface, from above only.
pub fn ray_surface(ray: &Ray, surface: &Surface) -> Option<RaycastHit> {
    let drop = ray.origin.y as i64 - surface.top() as i64;
    if ray.direction.y >= 0 || drop < 0 {
        return None;
    }

    let t = (drop << FIXED_SCALE) / -(ray.direction.y as i64);
    if t > ray.max_distance as i64 {
        return None;
    }

    let mut point = ray.at(t as Fixed);
    if !surface.covers(point.x, point.z) {
        return None;
    }
    point.y = surface.top();

    Some(RaycastHit {
        distance: t as Fixed,
        point,
        normal: surface.normal,
        entity: None,
    })
}

/// Keep the nearer of two optional hits; ties keep `a`.
#[inline]
pub fn closest_hit(a: Option<RaycastHit>, b: Option<RaycastHit>) -> Option<RaycastHit> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.distance < a.distance { b } else { a }),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Nearest hit against a set of surfaces.
pub fn raycast_surfaces<'a>(ray: &Ray, surfaces: impl IntoIterator<Item = &'a Surface>) -> Option<RaycastHit> {
    surfaces
        .into_iter()
        .fold(None, |best, surface| closest_hit(best, ray_surface(ray, surface)))
}

// =============================================================================
// TESTS
// =============================================================================
