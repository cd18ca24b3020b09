//! Character Controller
//!
//! The movement resolver decides *what* velocity a character wants; a
//! [`CharacterController`] decides where the body actually ends up. Engines
//! plug their own kinematic controller in behind the trait. The crate ships a
//! deterministic [`SurfaceController`] over axis-aligned walkable tops, which
//! is enough for the demo host, the tests and resimulation.
//!
//! ```text
//!        body ●  vy -= gravity * dt
//!             │  pos += (move_velocity + up * vy) * dt
//!   ══════════╧═══════  surface top: snap, grounded = true, vy = 0
//! ```

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, fixed_abs, fixed_mul, to_fixed};
use crate::core::vec3::FixedVec3;

/// How far above a surface a body may start a step and still land on it.
pub const LANDING_TOLERANCE: Fixed = to_fixed(0.0625);

/// Kinematic body of a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyState {
    /// Feet position
    pub position: FixedVec3,
    /// Vertical speed (positive = up)
    pub vertical_velocity: Fixed,
    /// Standing on a surface after the last move
    pub grounded: bool,
    /// Inactive bodies neither move nor collide
    pub active: bool,
}

impl BodyState {
    /// Active, airborne body at rest.
    pub fn at(position: FixedVec3) -> Self {
        Self {
            position,
            vertical_velocity: 0,
            grounded: false,
            active: true,
        }
    }

    /// Place the body (respawn), clearing vertical motion.
    pub fn teleport(&mut self, position: FixedVec3) {
        self.position = position;
        self.vertical_velocity = 0;
        self.grounded = false;
    }
}

/// Walkable top face of an axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    /// Center of the top face
    pub center: FixedVec3,
    /// Half size along X
    pub half_x: Fixed,
    /// Half size along Z
    pub half_z: Fixed,
    /// Surface normal used for ground projection
    pub normal: FixedVec3,
    /// Falling platform that owns this surface, if any
    pub platform: Option<u32>,
}

impl Surface {
    /// Flat static ground.
    pub fn flat(center: FixedVec3, half_x: Fixed, half_z: Fixed) -> Self {
        Self {
            center,
            half_x,
            half_z,
            normal: FixedVec3::UP,
            platform: None,
        }
    }

    /// Height of the top face.
    #[inline]
    pub fn top(&self) -> Fixed {
        self.center.y
    }

    /// Is (x, z) over this face?
    #[inline]
    pub fn covers(&self, x: Fixed, z: Fixed) -> bool {
        fixed_abs(x.wrapping_sub(self.center.x)) <= self.half_x
            && fixed_abs(z.wrapping_sub(self.center.z)) <= self.half_z
    }
}

/// Kinematic controller the movement resolver drives.
pub trait CharacterController {
    /// Surface under the body, if it is standing on one.
    fn support(&self, body: &BodyState) -> Option<Surface>;

    /// Is the body standing on something?
    fn is_grounded(&self, body: &BodyState) -> bool {
        body.grounded && self.support(body).is_some()
    }

    /// Re-project a velocity onto the supporting ground plane, keeping its
    /// magnitude. `None` when the body has no support.
    fn project_on_ground(&self, body: &BodyState, velocity: FixedVec3) -> Option<FixedVec3> {
        if !body.grounded {
            return None;
        }
        let surface = self.support(body)?;
        let projected = velocity.project_on_plane(surface.normal);
        if projected == velocity {
            return Some(velocity);
        }
        Some(projected.with_length(velocity.length()))
    }

    /// Integrate one step. Returns the surface the body ends up on.
    fn move_body(
        &self,
        body: &mut BodyState,
        move_velocity: FixedVec3,
        jump_impulse: Fixed,
        gravity: Fixed,
        dt: Fixed,
    ) -> Option<Surface>;
}

/// Deterministic controller over a fixed list of surfaces.
#[derive(Clone, Debug, Default)]
pub struct SurfaceController {
    surfaces: Vec<Surface>,
}

impl SurfaceController {
    /// Controller over the given walkable surfaces.
    pub fn new(surfaces: Vec<Surface>) -> Self {
        Self { surfaces }
    }

    /// Surfaces this controller collides with.
    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    /// Highest surface under (x, z) whose top is at or below `max_top`.
    fn highest_below(&self, x: Fixed, z: Fixed, max_top: Fixed) -> Option<Surface> {
        self.surfaces
            .iter()
            .filter(|s| s.covers(x, z) && s.top() <= max_top)
            .max_by_key(|s| s.top())
            .copied()
    }
}

impl CharacterController for SurfaceController {
    fn support(&self, body: &BodyState) -> Option<Surface> {
        let p = body.position;
        self.surfaces
            .iter()
            .find(|s| s.top() == p.y && s.covers(p.x, p.z))
            .copied()
    }

    fn move_body(
        &self,
        body: &mut BodyState,
        move_velocity: FixedVec3,
        jump_impulse: Fixed,
        gravity: Fixed,
        dt: Fixed,
    ) -> Option<Surface> {
        if !body.active {
            return None;
        }

        let mut vy = body.vertical_velocity;
        if jump_impulse > 0 {
            vy = jump_impulse;
        }
        vy = vy.wrapping_sub(fixed_mul(gravity, dt));

        let start_y = body.position.y;
        let step = move_velocity.horizontal().scale(dt);
        let mut next = body.position.add(step);
        next.y = start_y.wrapping_add(fixed_mul(vy, dt));

        let landing = if vy <= 0 {
            self.highest_below(next.x, next.z, start_y.saturating_add(LANDING_TOLERANCE))
                .filter(|surface| next.y <= surface.top())
        } else {
            None
        };

        match landing {
            Some(surface) => {
                next.y = surface.top();
                body.vertical_velocity = 0;
                body.grounded = true;
            }
            None => {
                body.vertical_velocity = vy;
                body.grounded = false;
            }
        }
        body.position = next;
        landing
    }
}

// =============================================================================
// TESTS
// =============================================================================
