//! Movement Resolver
//!
//! Deterministic per-tick character motion, driven only by the current
//! tick's input and the entity's own previous-tick state.
//!
//! ## Per-tick order
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ 1. press edges   = input.buttons & !previous_buttons          │
//! │ 2. desired       = rotate(move_direction, yaw) * speed        │
//! │ 3. jump          = grounded && Jump pressed  → impulse        │
//! │ 4. gravity       = vy >= 0 ? up_gravity : down_gravity        │
//! │ 5. facing        = blend toward heading / snap to look yaw    │
//! │ 6. move_velocity = lerp(move_velocity, desired, rate * dt)    │
//! │ 7. project on ground, move body through the controller        │
//! │ 8. previous_buttons = input.buttons (only when input present) │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Missing input means zero intent: the body keeps falling and slows down,
//! and the previous buttons are left alone so the next real input still
//! produces correct edges.

use serde::{Serialize, Deserialize};

use crate::core::angle::{heading_deg, lerp_angle, rotate_by_yaw};
use crate::core::fixed::{
    Fixed, blend_factor, to_fixed,
    WALK_SPEED, SPRINT_SPEED, JUMP_IMPULSE, UP_GRAVITY, DOWN_GRAVITY, ROTATION_SPEED,
    GROUND_ACCELERATION, GROUND_DECELERATION, AIR_ACCELERATION, AIR_DECELERATION,
};
use crate::core::vec2::FixedVec2;
use crate::core::vec3::FixedVec3;
use crate::game::controller::{BodyState, CharacterController, Surface};
use crate::game::input::{Button, Buttons, InputRecord};

/// How the character's facing follows input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacingMode {
    /// Third person: turn toward the direction of travel over time.
    FollowMovement,
    /// First person: face wherever the camera looks.
    FollowLook,
}

/// Movement tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Speed without Sprint
    pub walk_speed: Fixed,
    /// Speed with Sprint held
    pub sprint_speed: Fixed,
    /// Upward speed set by a jump
    pub jump_impulse: Fixed,
    /// Gravity while rising
    pub up_gravity: Fixed,
    /// Gravity while falling
    pub down_gravity: Fixed,
    /// Facing blend rate (per second)
    pub rotation_speed: Fixed,
    /// Grounded, with intent
    pub ground_acceleration: Fixed,
    /// Grounded, no intent
    pub ground_deceleration: Fixed,
    /// Airborne, with intent
    pub air_acceleration: Fixed,
    /// Airborne, no intent
    pub air_deceleration: Fixed,
    /// Facing behaviour
    pub facing: FacingMode,
    /// Pitch limit applied to the look rotation in `FollowLook`
    pub max_pitch: Fixed,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: WALK_SPEED,
            sprint_speed: SPRINT_SPEED,
            jump_impulse: JUMP_IMPULSE,
            up_gravity: UP_GRAVITY,
            down_gravity: DOWN_GRAVITY,
            rotation_speed: ROTATION_SPEED,
            ground_acceleration: GROUND_ACCELERATION,
            ground_deceleration: GROUND_DECELERATION,
            air_acceleration: AIR_ACCELERATION,
            air_deceleration: AIR_DECELERATION,
            facing: FacingMode::FollowMovement,
            max_pitch: to_fixed(90.0),
        }
    }
}

impl MovementConfig {
    /// First-person shooter variant: face the look direction, no sprint.
    pub fn shooter() -> Self {
        Self {
            sprint_speed: WALK_SPEED,
            facing: FacingMode::FollowLook,
            ..Self::default()
        }
    }

    /// Blend rate for the given intent and support.
    #[inline]
    pub fn rate(&self, has_intent: bool, grounded: bool) -> Fixed {
        match (has_intent, grounded) {
            (true, true) => self.ground_acceleration,
            (true, false) => self.air_acceleration,
            (false, true) => self.ground_deceleration,
            (false, false) => self.air_deceleration,
        }
    }
}

/// Replicated movement state of one character.
///
/// Predicted by the driver, overwritten wholesale on reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementState {
    /// Kinematic body
    pub body: BodyState,
    /// Blended horizontal velocity
    pub move_velocity: FixedVec3,
    /// Set by a jump, cleared once grounded again
    pub is_jumping: bool,
    /// Look rotation (pitch, yaw) of the last processed input
    pub look_rotation: FixedVec2,
    /// Character facing (yaw degrees)
    pub facing_yaw: Fixed,
    /// Buttons of the last processed input, for edge detection
    pub previous_buttons: Buttons,
}

impl MovementState {
    /// Fresh state at a position.
    pub fn at(position: FixedVec3) -> Self {
        Self {
            body: BodyState::at(position),
            move_velocity: FixedVec3::ZERO,
            is_jumping: false,
            look_rotation: FixedVec2::ZERO,
            facing_yaw: 0,
            previous_buttons: Buttons::NONE,
        }
    }

    /// Teleport for a respawn: clears velocity and look.
    pub fn respawn(&mut self, position: FixedVec3) {
        self.body.teleport(position);
        self.body.active = true;
        self.move_velocity = FixedVec3::ZERO;
        self.is_jumping = false;
        self.look_rotation = FixedVec2::ZERO;
        self.facing_yaw = 0;
    }

    /// Horizontal plus vertical velocity.
    pub fn velocity(&self) -> FixedVec3 {
        FixedVec3::new(self.move_velocity.x, self.body.vertical_velocity, self.move_velocity.z)
    }
}

/// What happened during one resolver step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementOutcome {
    /// Buttons with a press edge this tick
    pub pressed: Buttons,
    /// A jump started this tick
    pub jumped: bool,
    /// Touched ground this tick after being airborne
    pub landed: bool,
    /// Surface the body stands on after the move
    pub support: Option<Surface>,
}

/// Advance one character by one tick.
pub fn resolve_movement<C: CharacterController + ?Sized>(
    state: &mut MovementState,
    input: Option<&InputRecord>,
    config: &MovementConfig,
    controller: &C,
    dt: Fixed,
) -> MovementOutcome {
    let mut outcome = MovementOutcome::default();
    let was_grounded = controller.is_grounded(&state.body);

    let mut desired = FixedVec3::ZERO;
    let mut jump_impulse = 0;

    if let Some(input) = input {
        outcome.pressed = Buttons(input.buttons.0 & !state.previous_buttons.0);

        state.look_rotation = match config.facing {
            FacingMode::FollowLook => input.look_rotation.clamp_pitch(-config.max_pitch, config.max_pitch),
            FacingMode::FollowMovement => input.look_rotation,
        };

        let speed = if input.buttons.is_set(Button::Sprint) {
            config.sprint_speed
        } else {
            config.walk_speed
        };
        desired = rotate_by_yaw(input.move_direction, state.look_rotation.y).scale(speed);

        if was_grounded && outcome.pressed.is_set(Button::Jump) {
            jump_impulse = config.jump_impulse;
            state.is_jumping = true;
            outcome.jumped = true;
        }
    }

    // Falling faster than rising feels better
    let gravity = if state.body.vertical_velocity >= 0 {
        config.up_gravity
    } else {
        config.down_gravity
    };

    let has_intent = !desired.is_zero();
    match config.facing {
        FacingMode::FollowMovement => {
            if has_intent {
                let t = blend_factor(config.rotation_speed, dt);
                state.facing_yaw = lerp_angle(state.facing_yaw, heading_deg(desired), t);
            }
        }
        FacingMode::FollowLook => state.facing_yaw = state.look_rotation.y,
    }

    let t = blend_factor(config.rate(has_intent, was_grounded), dt);
    state.move_velocity = state.move_velocity.lerp(desired, t);

    // Keep speed consistent on slopes
    if let Some(projected) = controller.project_on_ground(&state.body, state.move_velocity) {
        state.move_velocity = projected;
    }

    outcome.support = controller.move_body(&mut state.body, state.move_velocity, jump_impulse, gravity, dt);

    if let Some(input) = input {
        state.previous_buttons = input.buttons;
    }

    if state.body.grounded {
        state.is_jumping = false;
    }
    outcome.landed = !was_grounded && state.body.grounded;

    outcome
}

// =============================================================================
// TESTS
// =============================================================================
