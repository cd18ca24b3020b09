//! Combat
//!
//! Hit-scan fire with latency compensation. The shooter saw targets where
//! they were `latency` ticks ago, so the ray is tested against hitboxes
//! recorded at that tick, not against where the targets are now.
//!
//! ```text
//!   tick T-L            tick T
//!     ○ target ...────►   ○ target (now)
//!     ▲
//!     └── ray tested here (observed tick = T - L, clamped to history)
//! ```
//!
//! Everyone who simulates the shooter runs `fire` (fire count and hit point
//! are predicted), but only the authority applies damage and score.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::angle::look_direction;
use crate::core::fixed::{Fixed, FIRE_RANGE};
use crate::core::vec3::FixedVec3;
use crate::game::authority::AuthorityContext;
use crate::game::collision::{Ray, RaycastHit, closest_hit, ray_sphere, raycast_surfaces};
use crate::game::entity::{EntityId, EntityKind, HasMovement, Hitbox, PlayerEntity};
use crate::game::events::GameEvent;
use crate::game::health::HasHealth;
use crate::game::state::World;
use crate::game::timer::Tick;

/// Default lag-compensation window (one second at 60 Hz).
pub const DEFAULT_HISTORY_TICKS: u32 = 60;

/// Combat tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Damage per hit
    pub damage: i32,
    /// Hit-scan range
    pub range: Fixed,
    /// Score for defeating an enemy
    pub npc_defeat_delta: i32,
    /// Score for defeating another player (a penalty)
    pub player_defeat_delta: i32,
    /// How many ticks of hitboxes are kept for lag compensation
    pub history_ticks: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            damage: 1,
            range: FIRE_RANGE,
            npc_defeat_delta: 1,
            player_defeat_delta: -10,
            history_ticks: DEFAULT_HISTORY_TICKS,
        }
    }
}

// =============================================================================
// HITBOX HISTORY
// =============================================================================

/// Spatial query against past hitbox positions.
pub trait LagCompensatedQuery {
    /// Nearest hitbox hit as of `observed_tick`, skipping `ignore`.
    fn raycast(&self, observed_tick: Tick, ray: &Ray, ignore: Option<EntityId>) -> Option<RaycastHit>;
}

/// Ring of per-tick hitbox frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HitboxHistory {
    window: u32,
    frames: BTreeMap<Tick, Vec<Hitbox>>,
}

impl Default for HitboxHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TICKS)
    }
}

impl HitboxHistory {
    /// Empty history keeping `window` ticks.
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            frames: BTreeMap::new(),
        }
    }

    /// Ticks kept.
    #[inline]
    pub fn window(&self) -> u32 {
        self.window
    }

    /// Store the hitboxes of `tick`, dropping frames older than the window.
    pub fn record(&mut self, tick: Tick, hitboxes: Vec<Hitbox>) {
        self.frames.insert(tick, hitboxes);
        let oldest = tick.saturating_sub(self.window);
        self.frames = self.frames.split_off(&oldest);
    }

    /// Frame at `tick`, or the newest one before it, or the oldest kept.
    pub fn frame_at(&self, tick: Tick) -> Option<(Tick, &[Hitbox])> {
        self.frames
            .range(..=tick)
            .next_back()
            .or_else(|| self.frames.iter().next())
            .map(|(tick, hitboxes)| (*tick, hitboxes.as_slice()))
    }

    /// Oldest recorded tick.
    pub fn oldest_tick(&self) -> Option<Tick> {
        self.frames.keys().next().copied()
    }

    /// Number of frames kept.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LagCompensatedQuery for HitboxHistory {
    fn raycast(&self, observed_tick: Tick, ray: &Ray, ignore: Option<EntityId>) -> Option<RaycastHit> {
        let (_, hitboxes) = self.frame_at(observed_tick)?;
        hitboxes
            .iter()
            .filter(|hitbox| Some(hitbox.entity) != ignore)
            .fold(None, |best, hitbox| {
                let hit = ray_sphere(ray, hitbox.center, hitbox.radius)
                    .map(|hit| RaycastHit { entity: Some(hitbox.entity), ..hit });
                closest_hit(best, hit)
            })
    }
}

// =============================================================================
// FIRE
// =============================================================================

/// Outcome of one shot that hit something.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitResult {
    /// Entity hit; `None` for static geometry
    pub target: Option<EntityId>,
    /// Impact point
    pub point: FixedVec3,
    /// Impact normal
    pub normal: FixedVec3,
    /// Distance travelled
    pub distance: Fixed,
    /// Tick the hitboxes were taken from
    pub observed_tick: Tick,
    /// Damage was applied (authority only)
    pub damage_applied: bool,
    /// The hit killed the target
    pub killed: bool,
    /// Score credited to the shooter
    pub score_delta: i32,
}

/// Ray from a player's eyes along its look rotation.
pub fn aim_ray(player: &PlayerEntity, range: Fixed) -> Ray {
    Ray::new(player.eye_position(), look_direction(player.movement().look_rotation), range)
}

/// Fire a hit-scan shot for `shooter`.
///
/// Clears the last hit position, bumps the fire count, then tests `ray`
/// against entity hitboxes as of `current - latency_ticks` and against
/// current level geometry. The shooter's own hitbox is ignored. Returns
/// `None` when nothing was hit (or the shooter does not exist).
pub fn fire(
    ctx: &AuthorityContext,
    world: &mut World,
    shooter: EntityId,
    ray: Ray,
    latency_ticks: u32,
    config: &CombatConfig,
) -> Option<HitResult> {
    let tick = world.tick;
    let player = world.player_mut(shooter)?;
    player.weapon.hit_position = FixedVec3::ZERO;
    player.weapon.fire_count = player.weapon.fire_count.wrapping_add(1);
    let fire_count = player.weapon.fire_count;
    world.push_event(GameEvent::fire_triggered(tick, shooter, fire_count));

    let observed_tick = tick.saturating_sub(latency_ticks.min(world.history.window()));
    let entity_hit = world.history.raycast(observed_tick, &ray, Some(shooter));
    let level_hit = raycast_surfaces(&ray, &world.colliders());
    let hit = closest_hit(entity_hit, level_hit)?;

    let mut result = HitResult {
        target: hit.entity,
        point: hit.point,
        normal: hit.normal,
        distance: hit.distance,
        observed_tick,
        damage_applied: false,
        killed: false,
        score_delta: 0,
    };

    if let Some(target) = hit.entity {
        if ctx.is_authoritative() {
            apply_damage(ctx, world, shooter, target, config, &mut result);
        }
    }

    if let Some(player) = world.player_mut(shooter) {
        player.weapon.hit_position = hit.point;
        player.weapon.hit_normal = hit.normal;
    }

    debug!(
        shooter = %shooter,
        target = ?hit.entity,
        observed_tick,
        killed = result.killed,
        "shot resolved"
    );
    Some(result)
}

/// Damage the target and credit the shooter on a kill.
fn apply_damage(
    ctx: &AuthorityContext,
    world: &mut World,
    shooter: EntityId,
    target: EntityId,
    config: &CombatConfig,
    result: &mut HitResult,
) {
    let tick = world.tick;
    let Some(entity) = world.entity_mut(target) else {
        return;
    };

    match entity.health_mut().take_hit(ctx, tick, config.damage) {
        Ok(true) => {}
        Ok(false) | Err(_) => return,
    }
    result.damage_applied = true;

    let remaining = entity.health().current();
    let killed = !entity.is_alive();
    let kind = entity.kind();
    world.push_event(GameEvent::hit(tick, Some(shooter), target, config.damage, remaining));

    if !killed {
        return;
    }
    result.killed = true;

    let delta = match kind {
        EntityKind::Enemy => config.npc_defeat_delta,
        EntityKind::Player => config.player_defeat_delta,
    };
    if let Some(player) = world.player_mut(shooter) {
        if player.score.modify(ctx, "score", |score| *score = score.saturating_add(delta)).is_ok() {
            result.score_delta = delta;
        }
    }
    world.push_event(GameEvent::defeated(tick, target, Some(shooter), delta));
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{from_int, to_fixed, FIXED_ONE};
    use crate::game::authority::ParticipantId;
    use crate::game::enemy::{EnemySpawnerConfig, EnemyState};
    use crate::game::entity::Entity;
    use crate::game::health::HealthState;
    use crate::game::state::Level;
    use crate::game::tick::SimConfig;

    const HOST: ParticipantId = ParticipantId::new([1; 16]);
    const CLIENT: ParticipantId = ParticipantId::new([2; 16]);

    fn world() -> World {
        World::new(7, &Level::flat(from_int(100)), &SimConfig::default())
    }

    fn spawn_player(world: &mut World, driver: ParticipantId, position: FixedVec3, health: i32) -> EntityId {
        world.spawn(Entity::Player(PlayerEntity::new(driver, position, HealthState::new(health, 60))))
    }

    fn spawn_enemy(world: &mut World, position: FixedVec3) -> EntityId {
        let mut enemy = EnemyState::new(&EnemySpawnerConfig::default(), 60);
        enemy.position = position;
        world.spawn(Entity::Enemy(enemy))
    }

    fn forward_from(origin: FixedVec3) -> Ray {
        Ray::new(origin, FixedVec3::FORWARD, FIRE_RANGE)
    }

    #[test]
    fn test_history_window_prunes() {
        let mut history = HitboxHistory::new(5);
        for tick in 1..=20 {
            history.record(tick, Vec::new());
        }
        assert_eq!(history.oldest_tick(), Some(15));
        assert_eq!(history.len(), 6);
        // Older than the window clamps to the oldest frame
        assert_eq!(history.frame_at(3).map(|(tick, _)| tick), Some(15));
        assert_eq!(history.frame_at(17).map(|(tick, _)| tick), Some(17));
    }

    #[test]
    fn test_rewound_target_is_hit() {
        let mut history = HitboxHistory::new(60);
        let target = EntityId(9);
        let then = Hitbox { entity: target, center: FixedVec3::from_ints(0, 0, 10), radius: FIXED_ONE };
        let now = Hitbox { entity: target, center: FixedVec3::from_ints(5, 0, 10), radius: FIXED_ONE };
        history.record(10, vec![then]);
        history.record(20, vec![now]);

        let ray = forward_from(FixedVec3::ZERO);
        let rewound = history.raycast(10, &ray, None).unwrap();
        assert_eq!(rewound.entity, Some(target));
        assert!(history.raycast(20, &ray, None).is_none());
    }

    #[test]
    fn test_shooter_hitbox_ignored() {
        let mut history = HitboxHistory::new(60);
        let me = Hitbox { entity: EntityId(1), center: FixedVec3::ZERO, radius: FIXED_ONE };
        let other = Hitbox { entity: EntityId(2), center: FixedVec3::from_ints(0, 0, 8), radius: FIXED_ONE };
        history.record(1, vec![me, other]);

        let hit = history.raycast(1, &forward_from(FixedVec3::ZERO), Some(EntityId(1))).unwrap();
        assert_eq!(hit.entity, Some(EntityId(2)));
    }

    #[test]
    fn test_enemy_kill_scores_plus_one() {
        let ctx = AuthorityContext::host(HOST);
        let mut world = world();
        let shooter = spawn_player(&mut world, HOST, FixedVec3::ZERO, 3);
        let enemy = spawn_enemy(&mut world, FixedVec3::new(0, to_fixed(1.6), from_int(10)));
        world.record_hitboxes();

        let ray = forward_from(FixedVec3::new(0, to_fixed(1.6), 0));
        let result = fire(&ctx, &mut world, shooter, ray, 0, &CombatConfig::default()).unwrap();
        assert_eq!(result.target, Some(enemy));
        assert!(result.killed);
        assert_eq!(result.score_delta, 1);

        let player = world.player(shooter).unwrap();
        assert_eq!(player.score.value(), 1);
        assert_eq!(player.weapon.fire_count, 1);
        assert_eq!(player.weapon.hit_position, result.point);
        assert!(!world.entity(enemy).unwrap().is_alive());
    }

    #[test]
    fn test_player_kill_scores_minus_ten() {
        let ctx = AuthorityContext::host(HOST);
        let mut world = world();
        let shooter = spawn_player(&mut world, HOST, FixedVec3::ZERO, 3);
        let victim = spawn_player(&mut world, CLIENT, FixedVec3::from_ints(0, 0, 10), 1);
        world.record_hitboxes();

        let ray = forward_from(FixedVec3::new(0, to_fixed(0.9), 0));
        let result = fire(&ctx, &mut world, shooter, ray, 0, &CombatConfig::default()).unwrap();
        assert_eq!(result.target, Some(victim));
        assert_eq!(result.score_delta, -10);
        assert_eq!(world.player(shooter).unwrap().score.value(), -10);
    }

    #[test]
    fn test_damage_only_on_authority() {
        let ctx = AuthorityContext::client(CLIENT, HOST);
        let mut world = world();
        let shooter = spawn_player(&mut world, CLIENT, FixedVec3::ZERO, 3);
        let enemy = spawn_enemy(&mut world, FixedVec3::new(0, to_fixed(1.6), from_int(10)));
        world.record_hitboxes();

        let ray = forward_from(FixedVec3::new(0, to_fixed(1.6), 0));
        let result = fire(&ctx, &mut world, shooter, ray, 0, &CombatConfig::default()).unwrap();
        assert_eq!(result.target, Some(enemy));
        assert!(!result.damage_applied);
        assert!(world.entity(enemy).unwrap().is_alive());
        // Fire count and hit point are still predicted
        assert_eq!(world.player(shooter).unwrap().weapon.fire_count, 1);
        assert_eq!(world.player(shooter).unwrap().weapon.hit_position, result.point);
    }

    #[test]
    fn test_miss_clears_hit_position() {
        let ctx = AuthorityContext::host(HOST);
        let mut world = world();
        let shooter = spawn_player(&mut world, HOST, FixedVec3::ZERO, 3);
        world.player_mut(shooter).unwrap().weapon.hit_position = FixedVec3::from_ints(1, 1, 1);
        world.record_hitboxes();

        // Level ground is below; a level ray misses everything
        let ray = forward_from(FixedVec3::new(0, to_fixed(1.6), 0));
        assert!(fire(&ctx, &mut world, shooter, ray, 0, &CombatConfig::default()).is_none());
        let player = world.player(shooter).unwrap();
        assert_eq!(player.weapon.hit_position, FixedVec3::ZERO);
        assert_eq!(player.weapon.fire_count, 1);
    }

    #[test]
    fn test_ground_hit_has_no_target() {
        let ctx = AuthorityContext::host(HOST);
        let mut world = world();
        let shooter = spawn_player(&mut world, HOST, FixedVec3::ZERO, 3);
        world.record_hitboxes();

        let ray = Ray::new(FixedVec3::from_ints(0, 2, 0), FixedVec3::new(0, -FIXED_ONE, FIXED_ONE), FIRE_RANGE);
        let result = fire(&ctx, &mut world, shooter, ray, 0, &CombatConfig::default()).unwrap();
        assert_eq!(result.target, None);
        assert_eq!(result.normal, FixedVec3::UP);
        assert_eq!(result.point.y, 0);
    }
}
