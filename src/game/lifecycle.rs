//! Entity Lifecycle
//!
//! Spawn, respawn and despawn policy plus the round state machine. All of it
//! runs on the authority only and reaches clients by value.
//!
//! ## Round state machine
//!
//! ```text
//!  WaitingForPlayers ──roster ≥ min──► InProgress ──goal reached──► RoundEnding
//!          ▲                              ▲                              │
//!          └──roster < min──              └──────round_over expired──────┘
//!                                                (respawn everyone)
//! ```
//!
//! ## Per tick
//!
//! 1. Expired round end → reset
//! 2. Players below the kill height take a lethal hit; finished players respawn
//! 3. Goal check (first qualifying arrival in roster order wins)
//! 4. Best hunter recomputed
//! 5. Finished enemies respawn

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::fixed::{Fixed, KILL_HEIGHT, from_int, ticks_from_seconds, to_fixed};
use crate::core::rng::DeterministicRng;
use crate::core::vec3::FixedVec3;
use crate::game::authority::{AuthorityContext, AuthorityError, ParticipantId};
use crate::game::collision::within_radius;
use crate::game::enemy::{EnemySpawnerConfig, EnemyState, respawn_enemy};
use crate::game::entity::{Entity, EntityId, HasMovement, PlayerEntity};
use crate::game::events::{EventPriority, GameEvent, GameEventData};
use crate::game::health::{HealthState, LETHAL_DAMAGE};
use crate::game::state::World;
use crate::game::tick::SimConfig;
use crate::game::timer::TickTimer;

// =============================================================================
// CONFIG
// =============================================================================

/// Named spawn area.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Label for logs and tools
    pub name: String,
    /// Center of the area
    pub position: FixedVec3,
    /// Random jitter radius
    pub radius: Fixed,
}

/// Round goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Center of the goal trigger
    pub position: FixedVec3,
    /// Trigger radius
    pub radius: Fixed,
}

/// Lifecycle tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Players needed before a round runs
    pub min_players: usize,
    /// Coins needed before the goal counts
    pub min_coins_to_win: u32,
    /// Time between a win and the reset (seconds)
    pub round_over_seconds: Fixed,
    /// Falling below this height is lethal
    pub kill_height: Fixed,
    /// Spawn areas; empty means spawn center + radius
    pub spawn_points: Vec<SpawnPoint>,
    /// Fallback spawn center
    pub spawn_center: FixedVec3,
    /// Fallback spawn radius
    pub spawn_radius: Fixed,
    /// Round goal; `None` disables winning
    pub goal: Option<Goal>,
    /// Player hit points
    pub player_health: i32,
    /// Player death time before respawn (seconds)
    pub player_death_seconds: Fixed,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_players: 1,
            min_coins_to_win: 10,
            round_over_seconds: to_fixed(4.0),
            kill_height: KILL_HEIGHT,
            spawn_points: Vec::new(),
            spawn_center: FixedVec3::ZERO,
            spawn_radius: from_int(3),
            goal: None,
            player_health: 3,
            player_death_seconds: to_fixed(2.0),
        }
    }
}

impl LifecycleConfig {
    /// Random spawn position: a uniformly chosen spawn point jittered
    /// within its radius, or the fallback center + radius.
    pub fn spawn_position(&self, rng: &mut DeterministicRng) -> FixedVec3 {
        let (center, radius) = match rng.choose(&self.spawn_points) {
            Some(point) => (point.position, point.radius),
            None => (self.spawn_center, self.spawn_radius),
        };
        let (dx, dz) = rng.offset_in_disc(radius);
        center.add(FixedVec3::new(dx, 0, dz))
    }

    /// Fresh player health.
    pub fn player_health(&self, tick_rate: u32) -> HealthState {
        HealthState::new(self.player_health, ticks_from_seconds(self.player_death_seconds, tick_rate))
    }
}

// =============================================================================
// ROSTER AND ROUND
// =============================================================================

/// One participant's place in the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Controlling participant
    pub participant: ParticipantId,
    /// Their player entity
    pub entity: EntityId,
}

/// Active participants in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter()
    }

    /// Player entity of a participant.
    pub fn entity_of(&self, participant: ParticipantId) -> Option<EntityId> {
        self.entries
            .iter()
            .find(|entry| entry.participant == participant)
            .map(|entry| entry.entity)
    }

    fn push(&mut self, entry: RosterEntry) {
        self.entries.push(entry);
    }

    fn remove(&mut self, participant: ParticipantId) -> Option<RosterEntry> {
        let index = self.entries.iter().position(|entry| entry.participant == participant)?;
        Some(self.entries.remove(index))
    }
}

/// Round phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoundPhase {
    #[default]
    WaitingForPlayers = 0,
    InProgress = 1,
    RoundEnding = 2,
}

/// Replicated round state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    /// Current phase
    pub phase: RoundPhase,
    /// Winner of the current round, if decided
    pub winner: Option<ParticipantId>,
    /// Reset countdown while the round is ending
    pub round_over: TickTimer,
    /// Alive participant with the highest positive score
    pub best_hunter: Option<ParticipantId>,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Add a participant: spawn their player and append them to the roster.
///
/// Joining twice returns the existing entity.
pub fn join(
    world: &mut World,
    ctx: &AuthorityContext,
    participant: ParticipantId,
    sim: &SimConfig,
) -> Result<EntityId, AuthorityError> {
    ctx.check_authoritative("roster")?;
    let config = &sim.lifecycle;
    if let Some(existing) = world.roster.get().entity_of(participant) {
        return Ok(existing);
    }

    let position = config.spawn_position(&mut world.rng);
    let mut player = PlayerEntity::new(participant, position, config.player_health(sim.tick_rate));
    if world.round.get().winner.is_some() {
        // Sits out the rest of the round
        player.round_finished.set(ctx, "round_finished", true)?;
    }

    let entity = world.spawn(Entity::Player(player));
    world.roster.modify(ctx, "roster", |roster| roster.push(RosterEntry { participant, entity }))?;

    let roster_len = world.roster.get().len();
    world.round.modify(ctx, "round", |round| {
        if round.phase == RoundPhase::WaitingForPlayers && roster_len >= config.min_players {
            round.phase = RoundPhase::InProgress;
        }
    })?;

    let tick = world.tick;
    world.push_event(GameEvent::player_joined(tick, participant, entity));
    world.push_event(GameEvent::player_spawned(tick, entity, position));
    info!(participant = %participant, entity = %entity, "player joined");
    Ok(entity)
}

/// Remove a participant and despawn their player. Unknown participants are a
/// no-op.
pub fn leave(
    world: &mut World,
    ctx: &AuthorityContext,
    participant: ParticipantId,
    sim: &SimConfig,
) -> Result<Option<EntityId>, AuthorityError> {
    ctx.check_authoritative("roster")?;
    let config = &sim.lifecycle;
    let Some(entry) = world.roster.modify(ctx, "roster", |roster| roster.remove(participant))? else {
        return Ok(None);
    };
    world.despawn(entry.entity);

    let roster_len = world.roster.get().len();
    world.round.modify(ctx, "round", |round| {
        if round.phase == RoundPhase::InProgress && roster_len < config.min_players {
            round.phase = RoundPhase::WaitingForPlayers;
        }
        if round.best_hunter == Some(participant) {
            round.best_hunter = None;
        }
    })?;

    let tick = world.tick;
    world.push_event(GameEvent::player_left(tick, participant, entry.entity));
    info!(participant = %participant, entity = %entry.entity, "player left");
    Ok(Some(entry.entity))
}

/// Create the spawner's enemies and send each on its first flight.
pub fn spawn_enemies(world: &mut World, ctx: &AuthorityContext, sim: &SimConfig) -> Result<(), AuthorityError> {
    ctx.check_authoritative("enemy spawner")?;
    let config = &sim.enemies;
    for _ in 0..config.count {
        let mut enemy = EnemyState::new(config, sim.tick_rate);
        respawn_enemy(&mut enemy, ctx, config, &mut world.rng)?;
        let id = world.spawn(Entity::Enemy(enemy));
        world.enemy_pool.push(id);
    }
    debug!(count = config.count, "enemies spawned");
    Ok(())
}

/// Per-tick lifecycle pass. A no-op on non-authorities.
pub fn update(world: &mut World, ctx: &AuthorityContext, sim: &SimConfig) -> Result<(), AuthorityError> {
    if !ctx.is_authoritative() {
        return Ok(());
    }
    let config = &sim.lifecycle;
    let tick = world.tick;

    if world.round.get().phase == RoundPhase::RoundEnding && world.round.get().round_over.is_expired(tick) {
        reset_round(world, ctx, config)?;
    }

    let entries: Vec<RosterEntry> = world.roster.get().iter().copied().collect();
    for entry in &entries {
        let Some(player) = world.player_mut(entry.entity) else {
            continue;
        };

        if player.position().y < config.kill_height {
            player.health.take_hit(ctx, tick, LETHAL_DAMAGE)?;
        }
        if !player.health.is_finished(tick) {
            continue;
        }

        let position = config.spawn_position(&mut world.rng);
        if let Some(player) = world.player_mut(entry.entity) {
            player.respawn(ctx, position, false)?;
        }
        world.push_event(GameEvent::player_spawned(tick, entry.entity, position));
    }

    check_goal(world, ctx, sim, &entries)?;

    let best_hunter = best_hunter(world, &entries);
    world.round.modify(ctx, "round", |round| round.best_hunter = best_hunter)?;

    respawn_finished_enemies(world, ctx, &sim.enemies)
}

/// End the round if a qualifying player reached the goal.
fn check_goal(
    world: &mut World,
    ctx: &AuthorityContext,
    sim: &SimConfig,
    entries: &[RosterEntry],
) -> Result<(), AuthorityError> {
    let config = &sim.lifecycle;
    let Some(goal) = config.goal else {
        return Ok(());
    };
    let round = *world.round.get();
    if round.phase != RoundPhase::InProgress || round.winner.is_some() {
        return Ok(());
    }

    let winner = entries.iter().find(|entry| {
        world.player(entry.entity).is_some_and(|player| {
            player.health.is_alive()
                && player.collected_coins.value() >= config.min_coins_to_win
                && within_radius(player.position(), goal.position, goal.radius)
        })
    });
    let Some(winner) = winner.map(|entry| entry.participant) else {
        return Ok(());
    };

    let tick = world.tick;
    for entry in entries {
        if let Some(player) = world.player_mut(entry.entity) {
            player.round_finished.set(ctx, "round_finished", true)?;
        }
    }
    let round_over = TickTimer::start(tick, ticks_from_seconds(config.round_over_seconds, sim.tick_rate));
    world.round.modify(ctx, "round", |round| {
        round.phase = RoundPhase::RoundEnding;
        round.winner = Some(winner);
        round.round_over = round_over;
    })?;

    world.push_event(GameEvent::round_won(tick, winner));
    info!(winner = %winner, tick, "round won");
    Ok(())
}

/// Respawn every roster player and start a new round.
fn reset_round(world: &mut World, ctx: &AuthorityContext, config: &LifecycleConfig) -> Result<(), AuthorityError> {
    let tick = world.tick;
    let entries: Vec<RosterEntry> = world.roster.get().iter().copied().collect();
    for entry in &entries {
        let position = config.spawn_position(&mut world.rng);
        if let Some(player) = world.player_mut(entry.entity) {
            player.respawn(ctx, position, true)?;
            world.push_event(GameEvent::player_spawned(tick, entry.entity, position));
        }
    }

    let roster_len = entries.len();
    world.round.modify(ctx, "round", |round| {
        round.winner = None;
        round.round_over.reset();
        round.phase = if roster_len >= config.min_players {
            RoundPhase::InProgress
        } else {
            RoundPhase::WaitingForPlayers
        };
    })?;

    world.push_event(GameEvent::new(tick, EventPriority::Round, GameEventData::RoundReset));
    info!(tick, "round reset");
    Ok(())
}

/// Alive player with the highest positive score; earlier arrival wins ties.
fn best_hunter(world: &World, entries: &[RosterEntry]) -> Option<ParticipantId> {
    let mut best = None;
    let mut best_score = 0;
    for entry in entries {
        let Some(player) = world.player(entry.entity) else {
            continue;
        };
        let score = player.score.value();
        if player.health.is_alive() && score > best_score {
            best_score = score;
            best = Some(entry.participant);
        }
    }
    best
}

fn respawn_finished_enemies(
    world: &mut World,
    ctx: &AuthorityContext,
    config: &EnemySpawnerConfig,
) -> Result<(), AuthorityError> {
    let tick = world.tick;
    let pool = world.enemy_pool.clone();
    for id in pool {
        let Some(Entity::Enemy(enemy)) = world.entities.get_mut(&id) else {
            continue;
        };
        if enemy.health.is_finished(tick) {
            respawn_enemy(enemy, ctx, config, &mut world.rng)?;
            world.push_event(GameEvent::new(tick, EventPriority::Other, GameEventData::EnemyRespawned { entity: id }));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Level;

    const HOST: ParticipantId = ParticipantId::new([1; 16]);
    const ALICE: ParticipantId = ParticipantId::new([2; 16]);
    const BOB: ParticipantId = ParticipantId::new([3; 16]);
    const CAROL: ParticipantId = ParticipantId::new([4; 16]);

    fn host() -> AuthorityContext {
        AuthorityContext::host(HOST)
    }

    fn setup() -> (World, SimConfig) {
        let mut config = SimConfig::default();
        config.lifecycle.goal = Some(Goal {
            position: FixedVec3::from_ints(20, 0, 0),
            radius: from_int(2),
        });
        let world = World::new(9, &Level::flat(from_int(50)), &config);
        (world, config)
    }

    fn ready_at_goal(world: &mut World, entity: EntityId) {
        let player = world.player_mut(entity).unwrap();
        player.collected_coins.set(&host(), "collected_coins", 10).unwrap();
        player.movement.body.teleport(FixedVec3::from_ints(20, 0, 0));
    }

    #[test]
    fn test_join_is_idempotent_and_starts_round() {
        let (mut world, config) = setup();
        assert_eq!(world.round.get().phase, RoundPhase::WaitingForPlayers);

        let first = join(&mut world, &host(), ALICE, &config).unwrap();
        let again = join(&mut world, &host(), ALICE, &config).unwrap();
        assert_eq!(first, again);
        assert_eq!(world.roster.get().len(), 1);
        assert_eq!(world.round.get().phase, RoundPhase::InProgress);

        let position = world.player(first).unwrap().position();
        assert!(within_radius(position, FixedVec3::ZERO, config.lifecycle.spawn_radius));
    }

    #[test]
    fn test_spawn_points_are_used() {
        let mut config = LifecycleConfig::default();
        config.spawn_points = vec![SpawnPoint {
            name: "north".to_string(),
            position: FixedVec3::from_ints(0, 3, 40),
            radius: from_int(1),
        }];
        let mut rng = DeterministicRng::new(5);
        for _ in 0..10 {
            let position = config.spawn_position(&mut rng);
            assert_eq!(position.y, from_int(3));
            assert!(within_radius(position, FixedVec3::from_ints(0, 3, 40), from_int(1)));
        }
    }

    #[test]
    fn test_leave() {
        let (mut world, config) = setup();
        let alice = join(&mut world, &host(), ALICE, &config).unwrap();

        assert_eq!(leave(&mut world, &host(), BOB, &config).unwrap(), None);
        assert_eq!(leave(&mut world, &host(), ALICE, &config).unwrap(), Some(alice));
        assert!(world.entity(alice).is_none());
        assert!(world.roster.get().is_empty());
        assert_eq!(world.round.get().phase, RoundPhase::WaitingForPlayers);
    }

    #[test]
    fn test_earlier_arrival_wins() {
        let (mut world, config) = setup();
        let alice = join(&mut world, &host(), ALICE, &config).unwrap();
        let bob = join(&mut world, &host(), BOB, &config).unwrap();
        ready_at_goal(&mut world, bob);
        ready_at_goal(&mut world, alice);

        world.tick = 100;
        update(&mut world, &host(), &config).unwrap();
        let round = *world.round.get();
        assert_eq!(round.phase, RoundPhase::RoundEnding);
        assert_eq!(round.winner, Some(ALICE));
        assert!(world.player(alice).unwrap().round_finished.value());
        assert!(world.player(bob).unwrap().round_finished.value());

        world.tick = 101;
        update(&mut world, &host(), &config).unwrap();
        assert_eq!(world.round.get().winner, Some(ALICE));
    }

    #[test]
    fn test_not_enough_coins_does_not_win() {
        let (mut world, config) = setup();
        let alice = join(&mut world, &host(), ALICE, &config).unwrap();
        ready_at_goal(&mut world, alice);
        world.player_mut(alice).unwrap().collected_coins.set(&host(), "collected_coins", 9).unwrap();

        update(&mut world, &host(), &config).unwrap();
        assert_eq!(world.round.get().winner, None);
    }

    #[test]
    fn test_join_during_round_end_then_reset() {
        let (mut world, config) = setup();
        let alice = join(&mut world, &host(), ALICE, &config).unwrap();
        ready_at_goal(&mut world, alice);
        world.tick = 100;
        update(&mut world, &host(), &config).unwrap();

        let carol = join(&mut world, &host(), CAROL, &config).unwrap();
        assert!(world.player(carol).unwrap().round_finished.value());

        // 4 seconds at 60 Hz
        world.tick = 339;
        update(&mut world, &host(), &config).unwrap();
        assert_eq!(world.round.get().phase, RoundPhase::RoundEnding);

        world.tick = 340;
        update(&mut world, &host(), &config).unwrap();
        let round = *world.round.get();
        assert_eq!(round.phase, RoundPhase::InProgress);
        assert_eq!(round.winner, None);
        assert_eq!(round.round_over, TickTimer::NONE);
        for id in [alice, carol] {
            let player = world.player(id).unwrap();
            assert!(!player.round_finished.value());
            assert_eq!(player.collected_coins.value(), 0);
        }
    }

    #[test]
    fn test_fall_kills_then_respawns() {
        let (mut world, config) = setup();
        let alice = join(&mut world, &host(), ALICE, &config).unwrap();
        world.player_mut(alice).unwrap().movement.body.teleport(FixedVec3::from_ints(0, -20, 0));
        world.player_mut(alice).unwrap().score.set(&host(), "score", 4).unwrap();

        world.tick = 10;
        update(&mut world, &host(), &config).unwrap();
        assert!(!world.player(alice).unwrap().health.is_alive());

        // 2 second death time
        world.tick = 129;
        update(&mut world, &host(), &config).unwrap();
        assert!(!world.player(alice).unwrap().health.is_alive());

        world.tick = 130;
        update(&mut world, &host(), &config).unwrap();
        let player = world.player(alice).unwrap();
        assert!(player.health.is_alive());
        assert_eq!(player.position().y, 0);
        assert_eq!(player.score.value(), 0);
    }

    #[test]
    fn test_best_hunter() {
        let (mut world, config) = setup();
        let alice = join(&mut world, &host(), ALICE, &config).unwrap();
        let bob = join(&mut world, &host(), BOB, &config).unwrap();

        update(&mut world, &host(), &config).unwrap();
        assert_eq!(world.round.get().best_hunter, None);

        world.player_mut(alice).unwrap().score.set(&host(), "score", 3).unwrap();
        world.player_mut(bob).unwrap().score.set(&host(), "score", 3).unwrap();
        update(&mut world, &host(), &config).unwrap();
        assert_eq!(world.round.get().best_hunter, Some(ALICE));

        world.player_mut(bob).unwrap().score.set(&host(), "score", 5).unwrap();
        update(&mut world, &host(), &config).unwrap();
        assert_eq!(world.round.get().best_hunter, Some(BOB));

        world.player_mut(bob).unwrap().health.take_hit(&host(), 1, LETHAL_DAMAGE).unwrap();
        update(&mut world, &host(), &config).unwrap();
        assert_eq!(world.round.get().best_hunter, Some(ALICE));
    }

    #[test]
    fn test_enemy_spawner_respawns_finished() {
        let (mut world, mut config) = setup();
        config.enemies = EnemySpawnerConfig { count: 3, ..EnemySpawnerConfig::default() };
        spawn_enemies(&mut world, &host(), &config).unwrap();
        assert_eq!(world.enemy_pool.len(), 3);

        let first = world.enemy_pool[0];
        world.tick = 50;
        world.entity_mut(first).unwrap().as_enemy_mut().unwrap().health.take_hit(&host(), 50, LETHAL_DAMAGE).unwrap();
        let dead_position = world.entity(first).unwrap().position();

        // 1 second death time
        world.tick = 110;
        update(&mut world, &host(), &config).unwrap();
        let enemy = world.entity(first).unwrap().as_enemy().unwrap();
        assert!(enemy.health.is_alive());
        assert_ne!(enemy.position, dead_position);
        assert_eq!(enemy.start_position, enemy.position);
    }

    #[test]
    fn test_client_update_is_noop() {
        let (mut world, config) = setup();
        let alice = join(&mut world, &host(), ALICE, &config).unwrap();
        world.player_mut(alice).unwrap().movement.body.teleport(FixedVec3::from_ints(0, -20, 0));

        let on_client = AuthorityContext::client(ALICE, HOST);
        update(&mut world, &on_client, &config).unwrap();
        assert!(world.player(alice).unwrap().health.is_alive());
    }
}
