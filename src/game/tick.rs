//! Simulation Tick
//!
//! The fixed-step game loop. Every participant runs the same function; the
//! [`AuthorityContext`] decides which parts take effect locally. Re-running
//! a tick with the same world and inputs gives a bit-identical result.
//!
//! ## Order within a tick
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 1. falling platforms   (all participants, before movement)   │
//! │ 2. coin triggers       (re-derived from their timers)        │
//! │ 3. players             (authority + driver: move, jump, fire)│
//! │ 4. enemies             (authority)                           │
//! │ 5. contacts            (authority: platforms, coins, enemies)│
//! │ 6. lifecycle           (authority: deaths, respawns, round)  │
//! │ 7. record hitboxes     (lag-compensation history)            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::core::fixed::{Fixed, FIXED_ONE, DEFAULT_TICK_RATE, to_fixed};
use crate::game::authority::{AuthorityContext, ParticipantId};
use crate::game::collision::spheres_overlap;
use crate::game::combat::{self, CombatConfig, aim_ray};
use crate::game::enemy::EnemySpawnerConfig;
use crate::game::entity::{Entity, EntityId, PLAYER_HITBOX_RADIUS};
use crate::game::events::{GameEvent, GameEventData, EventPriority};
use crate::game::health::{HasHealth, LETHAL_DAMAGE};
use crate::game::input::{Button, InputRecord};
use crate::game::interactable::InteractableConfig;
use crate::game::lifecycle::{self, LifecycleConfig};
use crate::game::movement::{MovementConfig, resolve_movement};
use crate::game::state::World;

// =============================================================================
// CONFIG
// =============================================================================

/// Everything the simulation needs besides the world itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Ticks per second
    pub tick_rate: u32,
    /// World RNG seed
    pub seed: u64,
    /// Character movement tuning
    pub movement: MovementConfig,
    /// Weapons and lag compensation
    pub combat: CombatConfig,
    /// Coins and platforms
    pub interactables: InteractableConfig,
    /// Spawning and round rules
    pub lifecycle: LifecycleConfig,
    /// Enemy spawner
    pub enemies: EnemySpawnerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            seed: 0,
            movement: MovementConfig::default(),
            combat: CombatConfig::default(),
            interactables: InteractableConfig::default(),
            lifecycle: LifecycleConfig::default(),
            enemies: EnemySpawnerConfig::disabled(),
        }
    }
}

impl SimConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// `TICKBOUND_TICK_RATE`, `TICKBOUND_SEED`, `TICKBOUND_MIN_COINS`,
    /// `TICKBOUND_ROUND_OVER_SECONDS`, `TICKBOUND_ENEMIES`.
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
        }

        let mut config = Self::default();
        if let Some(rate) = var::<u32>("TICKBOUND_TICK_RATE").filter(|rate| *rate > 0) {
            config.tick_rate = rate;
        }
        if let Some(seed) = var("TICKBOUND_SEED") {
            config.seed = seed;
        }
        if let Some(coins) = var("TICKBOUND_MIN_COINS") {
            config.lifecycle.min_coins_to_win = coins;
        }
        if let Some(seconds) = var::<f64>("TICKBOUND_ROUND_OVER_SECONDS") {
            config.lifecycle.round_over_seconds = to_fixed(seconds.max(0.0));
        }
        if let Some(count) = var::<u32>("TICKBOUND_ENEMIES") {
            config.enemies = EnemySpawnerConfig { count, ..EnemySpawnerConfig::default() };
        }
        config
    }

    /// Load a full config from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Fixed step length.
    #[inline]
    pub fn dt(&self) -> Fixed {
        FIXED_ONE / self.tick_rate.max(1) as Fixed
    }
}

// =============================================================================
// INPUTS AND RESULT
// =============================================================================

/// Inputs available for one tick, per driving participant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInputs {
    records: BTreeMap<ParticipantId, InputRecord>,
    latency_ticks: BTreeMap<ParticipantId, u32>,
}

impl TickInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input of one participant for this tick.
    pub fn insert(&mut self, participant: ParticipantId, record: InputRecord) {
        self.records.insert(participant, record);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, participant: ParticipantId, record: InputRecord) -> Self {
        self.insert(participant, record);
        self
    }

    /// How far behind the authority this participant sees the world.
    pub fn set_latency(&mut self, participant: ParticipantId, ticks: u32) {
        self.latency_ticks.insert(participant, ticks);
    }

    /// Input for a participant; `None` when it never arrived.
    #[inline]
    pub fn record(&self, participant: ParticipantId) -> Option<&InputRecord> {
        self.records.get(&participant)
    }

    #[inline]
    pub fn latency(&self, participant: ParticipantId) -> u32 {
        self.latency_ticks.get(&participant).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Round winner decided this tick
    pub round_won: Option<ParticipantId>,
    /// Round reset this tick
    pub round_reset: bool,
}

// =============================================================================
// TICK
// =============================================================================

/// Run one simulation tick.
///
/// # Determinism
///
/// - Entities are visited in `EntityId` order, the roster in arrival order
/// - Fixed-point math only
/// - Randomness only from `world.rng`, on the authority
/// - No wall-clock, no system calls
///
/// Rejected authority writes are logged and skipped; nothing here fails the
/// tick.
pub fn tick(world: &mut World, ctx: &AuthorityContext, inputs: &TickInputs, config: &SimConfig) -> TickResult {
    world.tick = world.tick.wrapping_add(1);
    let now = world.tick;
    let dt = config.dt();

    // 1. Platforms first: characters must see settled colliders
    let transitions: Vec<_> = world
        .platforms
        .iter_mut()
        .filter_map(|(id, platform)| platform.fixed_update(now).map(|transition| (*id, transition)))
        .collect();
    for (id, transition) in transitions {
        world.push_event(GameEvent::platform(now, id, transition));
    }

    // 2. Coin triggers
    for coin in world.coins.values_mut() {
        coin.fixed_update(ctx, now);
    }

    // 3. Players
    let platform_contacts = simulate_players(world, ctx, inputs, config);

    if ctx.is_authoritative() {
        // 4. Enemies
        for id in world.enemy_pool.clone() {
            if let Some(Entity::Enemy(enemy)) = world.entities.get_mut(&id) {
                if let Err(err) = enemy.fixed_update(ctx, now, dt) {
                    warn!(%err, "enemy update rejected");
                }
            }
        }

        // 5. Contacts
        trigger_platforms(world, ctx, &platform_contacts);
        collect_coins(world, ctx);
        resolve_enemy_contacts(world, ctx);

        // 6. Lifecycle
        if let Err(err) = lifecycle::update(world, ctx, config) {
            warn!(%err, "lifecycle update rejected");
        }
    }

    // 7. Lag-compensation history
    world.record_hitboxes();

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(tick = now, entities = world.entities.len(), events = world.events().len(), "tick complete");

    let events = world.take_events();
    let round_won = events.iter().find_map(|event| match event.data {
        GameEventData::RoundWon { winner } => Some(winner),
        _ => None,
    });
    let round_reset = events.iter().any(|event| matches!(event.data, GameEventData::RoundReset));

    TickResult {
        events,
        round_won,
        round_reset,
    }
}

/// Move every player this participant simulates. Returns (player, platform)
/// pairs for players standing on a falling platform.
fn simulate_players(
    world: &mut World,
    ctx: &AuthorityContext,
    inputs: &TickInputs,
    config: &SimConfig,
) -> Vec<(EntityId, u32)> {
    let now = world.tick;
    let dt = config.dt();
    let controller = world.controller();
    let mut contacts = Vec::new();

    for id in world.player_ids() {
        let Some(player) = world.player_mut(id) else {
            continue;
        };
        if !ctx.simulates(Some(player.driver)) {
            continue;
        }

        let driver = player.driver;
        let input = if player.is_controllable() { inputs.record(driver) } else { None };
        player.movement.body.active = player.health.is_alive();

        let outcome = resolve_movement(&mut player.movement, input, &config.movement, &controller, dt);
        let fire = input.is_some() && outcome.pressed.is_set(Button::Fire);
        let ray = aim_ray(player, config.combat.range);

        if outcome.jumped {
            world.push_event(GameEvent::new(now, EventPriority::Other, GameEventData::JumpStarted { entity: id }));
        }
        if outcome.landed {
            world.push_event(GameEvent::new(now, EventPriority::Other, GameEventData::Landed { entity: id }));
        }
        if let Some(platform) = outcome.support.and_then(|surface| surface.platform) {
            contacts.push((id, platform));
        }
        if fire {
            combat::fire(ctx, world, id, ray, inputs.latency(driver), &config.combat);
        }
    }
    contacts
}

fn trigger_platforms(world: &mut World, ctx: &AuthorityContext, contacts: &[(EntityId, u32)]) {
    let now = world.tick;
    for (entity, platform_id) in contacts {
        let Some(platform) = world.platforms.get_mut(platform_id) else {
            continue;
        };
        match platform.on_contact(ctx, now) {
            Ok(true) => world.push_event(GameEvent::new(
                now,
                EventPriority::Other,
                GameEventData::PlatformTriggered { platform: *platform_id, entity: *entity },
            )),
            Ok(false) => {}
            Err(err) => warn!(%err, "platform trigger rejected"),
        }
    }
}

/// Each enabled coin goes to the first overlapping living player (id order).
fn collect_coins(world: &mut World, ctx: &AuthorityContext) {
    let now = world.tick;
    let coin_ids: Vec<u32> = world.coins.keys().copied().collect();

    for coin_id in coin_ids {
        let Some(coin) = world.coins.get(&coin_id) else {
            continue;
        };
        if !coin.trigger_enabled() {
            continue;
        }
        let (position, radius) = (coin.position, coin.radius);

        let collector = world.entities.iter().find_map(|(id, entity)| {
            let player = entity.as_player()?;
            let touching = player.health.is_alive()
                && spheres_overlap(player.hitbox_center(), PLAYER_HITBOX_RADIUS, position, radius);
            touching.then_some(*id)
        });
        let Some(collector) = collector else {
            continue;
        };

        if let Some(coin) = world.coins.get_mut(&coin_id) {
            if let Err(err) = coin.collect(ctx, now) {
                warn!(%err, "coin pickup rejected");
                continue;
            }
        }
        let Some(player) = world.player_mut(collector) else {
            continue;
        };
        match player.collected_coins.modify(ctx, "collected_coins", |coins| {
            *coins += 1;
            *coins
        }) {
            Ok(total) => world.push_event(GameEvent::coin_collected(now, collector, coin_id, total)),
            Err(err) => warn!(%err, "coin credit rejected"),
        }
    }
}

/// Enemies die on contact with a living player or with level geometry.
fn resolve_enemy_contacts(world: &mut World, ctx: &AuthorityContext) {
    let now = world.tick;
    let colliders = world.colliders();
    let players: Vec<_> = world
        .entities
        .values()
        .filter_map(Entity::as_player)
        .filter(|player| player.health.is_alive())
        .map(|player| player.hitbox_center())
        .collect();

    let mut crashed = Vec::new();
    for id in &world.enemy_pool {
        let Some(enemy) = world.entity(*id).and_then(Entity::as_enemy) else {
            continue;
        };
        if !enemy.health.is_alive() {
            continue;
        }
        let touches_player = players
            .iter()
            .any(|center| spheres_overlap(*center, PLAYER_HITBOX_RADIUS, enemy.position, enemy.radius));
        let touches_ground = colliders
            .iter()
            .any(|surface| surface.covers(enemy.position.x, enemy.position.z) && enemy.position.y <= surface.top());
        if touches_player || touches_ground {
            crashed.push(*id);
        }
    }

    for id in crashed {
        let Some(entity) = world.entity_mut(id) else {
            continue;
        };
        match entity.health_mut().take_hit(ctx, now, LETHAL_DAMAGE) {
            Ok(true) => world.push_event(GameEvent::defeated(now, id, None, 0)),
            Ok(false) => {}
            Err(err) => warn!(%err, "enemy contact rejected"),
        }
    }
}

/// Replay a sequence of ticks from an initial world (for verification).
pub fn replay(
    initial: World,
    ctx: &AuthorityContext,
    inputs: &[TickInputs],
    config: &SimConfig,
) -> (World, Vec<GameEvent>) {
    let mut world = initial;
    let mut all_events = Vec::new();

    for tick_inputs in inputs {
        let result = tick(&mut world, ctx, tick_inputs, config);
        all_events.extend(result.events);
    }

    (world, all_events)
}

// =============================================================================
// TESTS
// =============================================================================
