//! Input Capture and Normalization
//!
//! Raw control samples arrive at render rate; the simulation consumes one
//! immutable [`InputRecord`] per tick. The accumulator in between keeps:
//!
//! - look deltas summed (pitch clamped to [`LookLimits`])
//! - move direction last-write, re-normalized
//! - held buttons last-write, with any press inside the window OR'd in so a
//!   tap between two ticks still reaches the simulation
//!
//! Edge detection (`was_pressed` / `was_released`) always diffs against the
//! previous tick's replicated buttons, never a local "was down" flag, so a
//! resimulated tick sees exactly the transition the authority saw.
//!
//! Uses lookup table (MOVE_LUT) for exact i8 to Fixed conversion.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::angle::normalize_deg;
use crate::core::fixed::{Fixed, FIXED_ONE, to_fixed};
use crate::core::hash::{StateHash, StateHasher};
use crate::core::vec2::FixedVec2;
use crate::game::timer::Tick;

// =============================================================================
// MOVE LOOKUP TABLE (Critical for Determinism)
// =============================================================================

/// Lookup table for converting i8 move input to Fixed.
///
/// Converting i8 [-127..+127] to Fixed [-1.0..+1.0] requires
/// `value * 65536 / 127`, which is not an integer, so every value is
/// precomputed with truncating division.
///
/// Index 128 (-128 as i8) = 0 (represents "no input" / stick released)
pub static MOVE_LUT: [Fixed; 256] = {
    let mut lut = [0i32; 256];
    let mut i = 0i32;
    while i < 256 {
        // Treat as signed: 0..127 = positive, 128..255 = negative (-128..-1)
        let signed = if i < 128 { i } else { i - 256 };

        if signed == -128 {
            lut[i as usize] = 0;
        } else {
            lut[i as usize] = (signed * 65536) / 127;
        }
        i += 1;
    }
    lut
};

/// Convert i8 move input to Fixed using lookup table.
#[inline]
pub fn move_to_fixed(input: i8) -> Fixed {
    MOVE_LUT[(input as u8) as usize]
}

/// Squared-length slack within which an intent already counts as unit
/// length. Wider than the rounding error `normalize` leaves on any stick
/// direction, so a normalized intent is a fixed point of `normalize_intent`.
pub const UNIT_INTENT_TOLERANCE: Fixed = FIXED_ONE / 128;

/// Unit-length move intent, or zero.
///
/// Idempotent: an intent that is already unit length (within
/// [`UNIT_INTENT_TOLERANCE`]) is returned untouched, so the host re-checking
/// a decoded record simulates exactly the vector the driver predicted with.
#[inline]
pub fn normalize_intent(direction: FixedVec2) -> FixedVec2 {
    let len_sq = direction.length_squared();
    if len_sq == 0 || (len_sq - FIXED_ONE).abs() <= UNIT_INTENT_TOLERANCE {
        direction
    } else {
        direction.normalize()
    }
}

// =============================================================================
// BUTTONS
// =============================================================================

/// Gameplay buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Button {
    /// Jump (edge-triggered)
    Jump = 0,
    /// Sprint (level-triggered)
    Sprint = 1,
    /// Fire (edge-triggered)
    Fire = 2,
}

impl Button {
    #[inline]
    const fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

/// Packed button bitset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Buttons(pub u8);

impl Buttons {
    /// Nothing held.
    pub const NONE: Self = Self(0);

    /// Is the button held?
    #[inline]
    pub fn is_set(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    /// Set or clear a button.
    #[inline]
    pub fn set(&mut self, button: Button, down: bool) {
        if down {
            self.0 |= button.mask();
        } else {
            self.0 &= !button.mask();
        }
    }

    /// Copy with a button held.
    #[inline]
    pub fn with(mut self, button: Button) -> Self {
        self.set(button, true);
        self
    }

    /// Union of two sets.
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Down now, up in `previous`.
    #[inline]
    pub fn was_pressed(self, previous: Buttons, button: Button) -> bool {
        self.is_set(button) && !previous.is_set(button)
    }

    /// Up now, down in `previous`.
    #[inline]
    pub fn was_released(self, previous: Buttons, button: Button) -> bool {
        !self.is_set(button) && previous.is_set(button)
    }
}

/// Press edge between two consecutive records.
#[inline]
pub fn was_pressed(current: Buttons, previous: Buttons, button: Button) -> bool {
    current.was_pressed(previous, button)
}

/// Release edge between two consecutive records.
#[inline]
pub fn was_released(current: Buttons, previous: Buttons, button: Button) -> bool {
    current.was_released(previous, button)
}

// =============================================================================
// INPUT TYPES
// =============================================================================

/// The consolidated input for one tick. Immutable once consumed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRecord {
    /// Planar intent (x = strafe, y = forward), unit length or zero.
    pub move_direction: FixedVec2,
    /// Look rotation (x = pitch, y = yaw) in fixed-point degrees.
    pub look_rotation: FixedVec2,
    /// Buttons held (or tapped) during the window.
    pub buttons: Buttons,
}

impl InputRecord {
    /// Zero intent, nothing pressed.
    pub const fn neutral() -> Self {
        Self {
            move_direction: FixedVec2::ZERO,
            look_rotation: FixedVec2::ZERO,
            buttons: Buttons::NONE,
        }
    }

    /// Record with a stick direction (normalized through the LUT).
    pub fn with_movement(move_x: i8, move_y: i8) -> Self {
        Self {
            move_direction: normalize_intent(FixedVec2::new(move_to_fixed(move_x), move_to_fixed(move_y))),
            ..Self::neutral()
        }
    }

    /// Copy with a button held.
    pub fn pressing(mut self, button: Button) -> Self {
        self.buttons = self.buttons.with(button);
        self
    }

    /// Copy with a look rotation.
    pub fn looking(mut self, look_rotation: FixedVec2) -> Self {
        self.look_rotation = look_rotation;
        self
    }

    /// Any move intent?
    #[inline]
    pub fn has_movement(&self) -> bool {
        !self.move_direction.is_zero()
    }
}

/// One raw control sample, as polled from the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    /// Stick X: -127 (left) to +127 (right), -128 = released
    pub move_x: i8,
    /// Stick Y: -127 (back) to +127 (forward), -128 = released
    pub move_y: i8,
    /// Look delta since the previous sample (pitch, yaw degrees)
    pub look_delta: FixedVec2,
    /// Buttons currently down
    pub buttons: Buttons,
    /// Cursor captured by the game window
    pub focused: bool,
}

impl RawSample {
    /// Focused sample with no stick, no look and no buttons.
    pub const fn idle() -> Self {
        Self {
            move_x: 0,
            move_y: 0,
            look_delta: FixedVec2::ZERO,
            buttons: Buttons::NONE,
            focused: true,
        }
    }

    /// Normalized move direction of this sample.
    #[inline]
    pub fn move_direction(&self) -> FixedVec2 {
        normalize_intent(FixedVec2::new(move_to_fixed(self.move_x), move_to_fixed(self.move_y)))
    }
}

/// Pitch limits applied while accumulating look input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookLimits {
    /// Lowest pitch (looking up)
    pub min_pitch: Fixed,
    /// Highest pitch (looking down)
    pub max_pitch: Fixed,
}

impl LookLimits {
    /// Orbit camera of the third-person controller.
    pub const THIRD_PERSON: Self = Self {
        min_pitch: to_fixed(-30.0),
        max_pitch: to_fixed(70.0),
    };

    /// First-person shooter view.
    pub const FIRST_PERSON: Self = Self {
        min_pitch: to_fixed(-90.0),
        max_pitch: to_fixed(90.0),
    };
}

impl Default for LookLimits {
    fn default() -> Self {
        Self::FIRST_PERSON
    }
}

// =============================================================================
// INPUT LOG
// =============================================================================

/// Consumed records of one driving participant, keyed by tick.
///
/// Bounded: the oldest ticks fall off once `capacity` is reached, and ticks
/// the authority has acknowledged can be pruned explicitly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputLog {
    records: BTreeMap<Tick, InputRecord>,
    capacity: usize,
}

impl Default for InputLog {
    fn default() -> Self {
        Self::with_capacity(256) // ~4 seconds at 60 Hz
    }
}

impl InputLog {
    /// Empty log holding at most `capacity` ticks.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record for a tick, if logged.
    #[inline]
    pub fn get(&self, tick: Tick) -> Option<&InputRecord> {
        self.records.get(&tick)
    }

    /// Log a record. An already-logged tick keeps its original record.
    pub fn insert(&mut self, tick: Tick, record: InputRecord) -> InputRecord {
        let stored = *self.records.entry(tick).or_insert(record);
        while self.records.len() > self.capacity {
            self.records.pop_first();
        }
        stored
    }

    /// Drop every record at or before `tick` (acknowledged by the authority).
    pub fn prune_through(&mut self, tick: Tick) {
        self.records = self.records.split_off(&tick.saturating_add(1));
    }

    /// Records in `[from, to]`, oldest first.
    pub fn range(&self, from: Tick, to: Tick) -> impl Iterator<Item = (Tick, InputRecord)> + '_ {
        self.records.range(from..=to).map(|(tick, record)| (*tick, *record))
    }

    /// Newest logged tick.
    pub fn latest_tick(&self) -> Option<Tick> {
        self.records.keys().next_back().copied()
    }

    /// Number of logged ticks.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is logged.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fingerprint of the logged stream (debugging desyncs).
    pub fn fingerprint(&self) -> StateHash {
        let mut hasher = StateHasher::for_input_log();
        for (tick, record) in &self.records {
            hasher.update_u32(*tick);
            hasher.update_vec2(record.move_direction);
            hasher.update_vec2(record.look_rotation);
            hasher.update_u8(record.buttons.0);
        }
        hasher.finalize()
    }
}

// =============================================================================
// ACCUMULATOR
// =============================================================================

/// Collects raw samples between ticks and hands out one record per tick.
#[derive(Clone, Debug)]
pub struct InputAccumulator {
    limits: LookLimits,
    look_rotation: FixedVec2,
    move_direction: FixedVec2,
    held: Buttons,
    pressed_in_window: Buttons,
    log: InputLog,
}

/// Pitch clamped to the limits, yaw wrapped into (-180, 180] so it never
/// runs into the Q16.16 range however long the player keeps turning.
#[inline]
fn wrap_look(look: FixedVec2, limits: &LookLimits) -> FixedVec2 {
    let clamped = look.clamp_pitch(limits.min_pitch, limits.max_pitch);
    FixedVec2::new(clamped.pitch(), normalize_deg(clamped.yaw()))
}

impl InputAccumulator {
    /// New accumulator with an initial look rotation.
    pub fn new(limits: LookLimits, initial_look: FixedVec2) -> Self {
        Self {
            limits,
            look_rotation: wrap_look(initial_look, &limits),
            move_direction: FixedVec2::ZERO,
            held: Buttons::NONE,
            pressed_in_window: Buttons::NONE,
            log: InputLog::default(),
        }
    }

    /// Fold one raw sample into the pending window.
    pub fn accumulate(&mut self, sample: &RawSample) {
        if !sample.focused {
            // Cursor released: stop moving, ignore everything else.
            self.move_direction = FixedVec2::ZERO;
            return;
        }

        self.look_rotation = wrap_look(self.look_rotation + sample.look_delta, &self.limits);
        self.move_direction = sample.move_direction();
        self.held = sample.buttons;
        self.pressed_in_window = self.pressed_in_window.union(sample.buttons);
    }

    /// Produce (and log) the record for `tick`.
    ///
    /// Polling the same tick twice returns the logged record unchanged.
    pub fn consume_for_tick(&mut self, tick: Tick) -> InputRecord {
        if let Some(logged) = self.log.get(tick) {
            return *logged;
        }

        let record = InputRecord {
            move_direction: self.move_direction,
            look_rotation: self.look_rotation,
            buttons: self.held.union(self.pressed_in_window),
        };
        self.pressed_in_window = Buttons::NONE;
        self.log.insert(tick, record)
    }

    /// Current accumulated look rotation (render-rate camera).
    pub fn look_rotation(&self) -> FixedVec2 {
        self.look_rotation
    }

    /// Logged records, for resimulation.
    pub fn log(&self) -> &InputLog {
        &self.log
    }

    /// Mutable log access (pruning acknowledged ticks).
    pub fn log_mut(&mut self) -> &mut InputLog {
        &mut self.log
    }
}

// =============================================================================
// TESTS
// =============================================================================
