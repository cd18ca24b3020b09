//! Presentation Bridge
//!
//! Read-only view of the simulation for rendering and UI. Runs at its own
//! rate: it captures [`Snapshot`]s of confirmed state, interpolates between
//! the two around the render time, and derives one-shot effects by diffing
//! replicated counters and flags.
//!
//! ```text
//!  World ──capture──► SnapshotBuffer ──interpolate──► VisualState (f32)
//!                          │
//!                          └──► EffectsBridge ──► Effect (jump, land, fire, hit)
//! ```
//!
//! Effects come from state diffs, never from simulation events, so a tick
//! that is resimulated during reconciliation cannot play them twice.
//!
//! Floats appear here and nowhere else.

use std::collections::{BTreeMap, VecDeque};
use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, to_float};
use crate::core::vec3::FixedVec3;
use crate::game::authority::ParticipantId;
use crate::game::entity::{Entity, EntityId, EntityKind, HasMovement, PlayerEntity};
use crate::game::health::HasHealth;
use crate::game::lifecycle::RoundPhase;
use crate::game::state::World;
use crate::game::timer::Tick;

/// Snapshots kept for interpolation.
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 32;

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// What presentation needs of one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    pub kind: EntityKind,
    pub position: FixedVec3,
    /// Facing (degrees)
    pub yaw: Fixed,
    /// Look pitch (degrees, positive looks down)
    pub pitch: Fixed,
    /// Horizontal speed
    pub speed: Fixed,
    pub alive: bool,
    pub health: i32,
    pub jumping: bool,
    pub grounded: bool,
    pub fire_count: u32,
    /// Impact point of the last shot, if it hit something
    pub hit_position: Option<FixedVec3>,
}

impl EntityView {
    /// Capture one entity.
    pub fn of(entity: &Entity) -> Self {
        match entity {
            Entity::Player(player) => {
                let movement = player.movement();
                Self {
                    kind: EntityKind::Player,
                    position: player.position(),
                    yaw: movement.facing_yaw,
                    pitch: movement.look_rotation.x,
                    speed: movement.move_velocity.horizontal().length(),
                    alive: player.is_alive(),
                    health: player.health.current(),
                    jumping: movement.is_jumping,
                    grounded: movement.body.grounded,
                    fire_count: player.weapon.fire_count,
                    hit_position: Some(player.weapon.hit_position).filter(|point| !point.is_zero()),
                }
            }
            Entity::Enemy(enemy) => Self {
                kind: EntityKind::Enemy,
                position: enemy.position,
                yaw: enemy.yaw,
                pitch: 0,
                speed: enemy.speed,
                alive: enemy.health.is_alive(),
                health: enemy.health.current(),
                jumping: false,
                grounded: false,
                fire_count: 0,
                hit_position: None,
            },
        }
    }
}

/// Round information for the UI.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundView {
    pub phase: RoundPhase,
    pub roster_size: usize,
    pub winner: Option<ParticipantId>,
    /// Seconds until the reset while the round is ending
    pub countdown: Option<f32>,
    pub best_hunter: Option<ParticipantId>,
}

impl RoundView {
    pub fn of(world: &World, tick_rate: u32) -> Self {
        let round = world.round.get();
        let countdown = round
            .round_over
            .remaining_ticks(world.tick)
            .map(|ticks| ticks as f32 / tick_rate.max(1) as f32);
        Self {
            phase: round.phase,
            roster_size: world.roster.get().len(),
            winner: round.winner,
            countdown,
            best_hunter: round.best_hunter,
        }
    }
}

/// Confirmed world state at one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: Tick,
    pub entities: BTreeMap<EntityId, EntityView>,
    pub round: RoundView,
}

impl Snapshot {
    /// Capture the current world.
    pub fn capture(world: &World, tick_rate: u32) -> Self {
        Self {
            tick: world.tick,
            entities: world
                .entities
                .iter()
                .map(|(id, entity)| (*id, EntityView::of(entity)))
                .collect(),
            round: RoundView::of(world, tick_rate),
        }
    }
}

/// Smoothed entity state for one rendered frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualState {
    pub position: [f32; 3],
    /// Degrees
    pub yaw: f32,
    /// Degrees
    pub pitch: f32,
    pub speed: f32,
    /// Alive in the older of the two confirmed snapshots
    pub alive: bool,
}

/// Recent snapshots in tick order.
#[derive(Clone, Debug)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<Snapshot>,
    capacity: usize,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            capacity: capacity.max(2),
        }
    }

    /// Add a snapshot. Stale or duplicate ticks are dropped.
    pub fn push(&mut self, snapshot: Snapshot) -> bool {
        if self.latest().is_some_and(|latest| snapshot.tick <= latest.tick) {
            return false;
        }
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        true
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Bracketing snapshots and blend factor for a (fractional) render tick.
    ///
    /// Clamps to the oldest/newest snapshot outside the buffered range; never
    /// extrapolates.
    pub fn sample(&self, render_tick: f32) -> Option<(&Snapshot, &Snapshot, f32)> {
        let first = self.snapshots.front()?;
        if render_tick <= first.tick as f32 {
            return Some((first, first, 0.0));
        }

        for (older, newer) in self.snapshots.iter().zip(self.snapshots.iter().skip(1)) {
            if render_tick < newer.tick as f32 {
                let span = (newer.tick - older.tick) as f32;
                let alpha = ((render_tick - older.tick as f32) / span).clamp(0.0, 1.0);
                return Some((older, newer, alpha));
            }
        }

        let last = self.snapshots.back()?;
        Some((last, last, 0.0))
    }

    /// Interpolated states of every entity present in the newer snapshot.
    pub fn interpolate(&self, render_tick: f32) -> BTreeMap<EntityId, VisualState> {
        let Some((older, newer, alpha)) = self.sample(render_tick) else {
            return BTreeMap::new();
        };

        newer
            .entities
            .iter()
            .map(|(id, to)| {
                // Spawned between the two: show it where it is now
                let from = older.entities.get(id).unwrap_or(to);
                (*id, blend(from, to, alpha))
            })
            .collect()
    }
}

fn blend(from: &EntityView, to: &EntityView, alpha: f32) -> VisualState {
    let a = from.position.to_floats();
    let b = to.position.to_floats();
    VisualState {
        position: [
            lerp(a[0], b[0], alpha),
            lerp(a[1], b[1], alpha),
            lerp(a[2], b[2], alpha),
        ],
        yaw: lerp_angle(to_float(from.yaw), to_float(to.yaw), alpha),
        pitch: lerp(to_float(from.pitch), to_float(to.pitch), alpha),
        speed: lerp(to_float(from.speed), to_float(to.speed), alpha),
        alive: from.alive,
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolate degrees along the shorter arc.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let mut delta = (to - from) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    from + delta * t
}

// =============================================================================
// ONE-SHOT EFFECTS
// =============================================================================

/// Plays fire effects by comparing the replicated fire count with the count
/// already shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FireEffectTracker {
    shown: Option<u32>,
}

impl FireEffectTracker {
    /// Observe the current count. Returns true when an effect batch should
    /// play. The first observation only initializes; decreases are adopted
    /// without an effect.
    pub fn observe(&mut self, fire_count: u32) -> bool {
        let play = self.shown.is_some_and(|shown| fire_count > shown);
        self.shown = Some(fire_count);
        play
    }

    pub fn shown(&self) -> Option<u32> {
        self.shown
    }
}

/// Jump and landing cues from movement flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementCues {
    last: Option<(bool, bool)>,
}

impl MovementCues {
    /// Returns (jump_started, landed).
    pub fn observe(&mut self, jumping: bool, grounded: bool) -> (bool, bool) {
        let cues = match self.last {
            Some((was_jumping, was_grounded)) => (jumping && !was_jumping, grounded && !was_grounded),
            None => (false, false),
        };
        self.last = Some((jumping, grounded));
        cues
    }
}

/// Change in health worth a reaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthCue {
    /// Lost health, still alive
    Hit,
    /// Lost the last point
    Died,
    /// Came back
    Revived,
}

/// Hit reactions from health changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HitReactionTracker {
    last: Option<i32>,
}

impl HitReactionTracker {
    pub fn observe(&mut self, health: i32) -> Option<HealthCue> {
        let cue = match self.last {
            Some(last) if health < last && health > 0 => Some(HealthCue::Hit),
            Some(last) if health < last => Some(HealthCue::Died),
            Some(last) if last <= 0 && health > 0 => Some(HealthCue::Revived),
            _ => None,
        };
        self.last = Some(health);
        cue
    }
}

/// One-shot effect for the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    JumpStarted(EntityId),
    Landed(EntityId),
    Fired {
        entity: EntityId,
        hit_position: Option<[f32; 3]>,
    },
    Health(EntityId, HealthCue),
}

#[derive(Clone, Copy, Debug, Default)]
struct EntityEffects {
    fire: FireEffectTracker,
    movement: MovementCues,
    health: HitReactionTracker,
}

/// Per-entity effect trackers driven by snapshots.
#[derive(Clone, Debug, Default)]
pub struct EffectsBridge {
    trackers: BTreeMap<EntityId, EntityEffects>,
}

impl EffectsBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff a snapshot against what was shown so far. Trackers of entities
    /// missing from the snapshot are dropped.
    pub fn update(&mut self, snapshot: &Snapshot) -> Vec<Effect> {
        self.trackers.retain(|id, _| snapshot.entities.contains_key(id));

        let mut effects = Vec::new();
        for (id, view) in &snapshot.entities {
            let trackers = self.trackers.entry(*id).or_default();

            let (jumped, landed) = trackers.movement.observe(view.jumping, view.grounded);
            if jumped {
                effects.push(Effect::JumpStarted(*id));
            }
            if landed {
                effects.push(Effect::Landed(*id));
            }
            if trackers.fire.observe(view.fire_count) {
                effects.push(Effect::Fired {
                    entity: *id,
                    hit_position: view.hit_position.map(FixedVec3::to_floats),
                });
            }
            if let Some(cue) = trackers.health.observe(view.health) {
                effects.push(Effect::Health(*id, cue));
            }
        }
        effects
    }

    pub fn tracked(&self) -> usize {
        self.trackers.len()
    }
}

// =============================================================================
// LOCAL PLAYER
// =============================================================================

/// Handle to the player a participant drives. Every lookup goes through the
/// roster, so a despawned player simply yields `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalPlayerHandle {
    pub participant: ParticipantId,
}

impl LocalPlayerHandle {
    pub fn new(participant: ParticipantId) -> Self {
        Self { participant }
    }

    pub fn entity(&self, world: &World) -> Option<EntityId> {
        world.player_of(self.participant)
    }

    pub fn player<'a>(&self, world: &'a World) -> Option<&'a PlayerEntity> {
        world.player(self.entity(world)?)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{from_int, to_fixed};
    use crate::game::authority::AuthorityContext;
    use crate::game::lifecycle::{self, Goal};
    use crate::game::state::Level;
    use crate::game::tick::SimConfig;

    const HOST: ParticipantId = ParticipantId::new([1; 16]);
    const ALICE: ParticipantId = ParticipantId::new([2; 16]);

    fn view(x: i32, yaw: f64, alive: bool) -> EntityView {
        EntityView {
            kind: EntityKind::Player,
            position: FixedVec3::from_ints(x, 0, 0),
            yaw: to_fixed(yaw),
            pitch: 0,
            speed: from_int(2),
            alive,
            health: if alive { 3 } else { 0 },
            jumping: false,
            grounded: true,
            fire_count: 0,
            hit_position: None,
        }
    }

    fn snapshot(tick: Tick, views: &[(u32, EntityView)]) -> Snapshot {
        Snapshot {
            tick,
            entities: views.iter().map(|(id, view)| (EntityId(*id), *view)).collect(),
            round: RoundView {
                phase: RoundPhase::InProgress,
                roster_size: 1,
                winner: None,
                countdown: None,
                best_hunter: None,
            },
        }
    }

    #[test]
    fn test_interpolates_between_snapshots() {
        let mut buffer = SnapshotBuffer::default();
        buffer.push(snapshot(10, &[(1, view(0, 350.0, true))]));
        buffer.push(snapshot(12, &[(1, view(2, 10.0, true))]));

        let states = buffer.interpolate(11.0);
        let state = states[&EntityId(1)];
        assert!((state.position[0] - 1.0).abs() < 1e-4);
        assert!((state.yaw - 360.0).abs() < 1e-2);
        assert!((state.speed - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_clamps_outside_range() {
        let mut buffer = SnapshotBuffer::default();
        assert!(buffer.interpolate(5.0).is_empty());

        buffer.push(snapshot(10, &[(1, view(0, 0.0, true))]));
        buffer.push(snapshot(12, &[(1, view(2, 0.0, true))]));
        assert_eq!(buffer.interpolate(3.0)[&EntityId(1)].position[0], 0.0);
        assert_eq!(buffer.interpolate(40.0)[&EntityId(1)].position[0], 2.0);
    }

    #[test]
    fn test_alive_from_older_snapshot() {
        let mut buffer = SnapshotBuffer::default();
        buffer.push(snapshot(10, &[(1, view(0, 0.0, true))]));
        buffer.push(snapshot(11, &[(1, view(0, 0.0, false))]));

        assert!(buffer.interpolate(10.9)[&EntityId(1)].alive);
        assert!(!buffer.interpolate(11.0)[&EntityId(1)].alive);
    }

    #[test]
    fn test_stale_snapshots_dropped() {
        let mut buffer = SnapshotBuffer::new(2);
        assert!(buffer.push(snapshot(10, &[])));
        assert!(!buffer.push(snapshot(10, &[])));
        assert!(!buffer.push(snapshot(9, &[])));
        assert!(buffer.push(snapshot(11, &[])));
        assert!(buffer.push(snapshot(12, &[])));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.latest().map(|s| s.tick), Some(12));
    }

    #[test]
    fn test_lerp_angle_short_arc() {
        assert!((lerp_angle(10.0, 350.0, 0.5) - 0.0).abs() < 1e-4);
        assert!((lerp_angle(90.0, 180.0, 0.5) - 135.0).abs() < 1e-4);
    }

    #[test]
    fn test_fire_count_jump_plays_one_batch() {
        let mut tracker = FireEffectTracker::default();
        assert!(!tracker.observe(3));
        assert!(tracker.observe(5));
        assert_eq!(tracker.shown(), Some(5));
        assert!(!tracker.observe(5));

        // Corrected down by the authority
        assert!(!tracker.observe(4));
        assert_eq!(tracker.shown(), Some(4));
    }

    #[test]
    fn test_hit_reactions() {
        let mut tracker = HitReactionTracker::default();
        assert_eq!(tracker.observe(3), None);
        assert_eq!(tracker.observe(2), Some(HealthCue::Hit));
        assert_eq!(tracker.observe(2), None);
        assert_eq!(tracker.observe(0), Some(HealthCue::Died));
        assert_eq!(tracker.observe(3), Some(HealthCue::Revived));
    }

    #[test]
    fn test_effects_bridge() {
        let mut bridge = EffectsBridge::new();
        let mut airborne = view(0, 0.0, true);
        airborne.grounded = false;
        assert!(bridge.update(&snapshot(1, &[(1, airborne)])).is_empty());

        let mut landed = view(0, 0.0, true);
        landed.fire_count = 2;
        landed.hit_position = Some(FixedVec3::from_ints(0, 0, 9));
        let effects = bridge.update(&snapshot(2, &[(1, landed)]));
        assert_eq!(
            effects,
            vec![
                Effect::Landed(EntityId(1)),
                Effect::Fired {
                    entity: EntityId(1),
                    hit_position: Some([0.0, 0.0, 9.0]),
                },
            ]
        );

        // Same state again: nothing new
        assert!(bridge.update(&snapshot(3, &[(1, landed)])).is_empty());

        let mut jumping = landed;
        jumping.jumping = true;
        jumping.grounded = false;
        assert_eq!(bridge.update(&snapshot(4, &[(1, jumping)])), vec![Effect::JumpStarted(EntityId(1))]);

        bridge.update(&snapshot(5, &[]));
        assert_eq!(bridge.tracked(), 0);
    }

    #[test]
    fn test_round_view_and_local_handle() {
        let mut config = SimConfig::default();
        config.lifecycle.goal = Some(Goal {
            position: FixedVec3::ZERO,
            radius: from_int(100),
        });
        let host = AuthorityContext::host(HOST);
        let mut world = World::new(1, &Level::flat(from_int(20)), &config);
        let entity = lifecycle::join(&mut world, &host, ALICE, &config).unwrap();
        world.player_mut(entity).unwrap().collected_coins.set(&host, "collected_coins", 10).unwrap();

        world.tick = 30;
        lifecycle::update(&mut world, &host, &config).unwrap();
        world.tick = 90;

        let round = RoundView::of(&world, config.tick_rate);
        assert_eq!(round.phase, RoundPhase::RoundEnding);
        assert_eq!(round.roster_size, 1);
        assert_eq!(round.winner, Some(ALICE));
        // 240 ticks from tick 30, 60 elapsed
        assert_eq!(round.countdown, Some(3.0));

        let handle = LocalPlayerHandle::new(ALICE);
        assert_eq!(handle.entity(&world), Some(entity));
        assert!(handle.player(&world).is_some());

        lifecycle::leave(&mut world, &host, ALICE, &config).unwrap();
        assert_eq!(handle.entity(&world), None);
        assert!(handle.player(&world).is_none());
    }

    #[test]
    fn test_capture_player() {
        let config = SimConfig::default();
        let host = AuthorityContext::host(HOST);
        let mut world = World::new(1, &Level::flat(from_int(20)), &config);
        let entity = lifecycle::join(&mut world, &host, ALICE, &config).unwrap();

        let snapshot = Snapshot::capture(&world, config.tick_rate);
        let view = snapshot.entities[&entity];
        assert_eq!(view.kind, EntityKind::Player);
        assert!(view.alive);
        assert_eq!(view.health, 3);
        assert_eq!(view.hit_position, None);
    }
}
