//! World State
//!
//! The whole replicated game state of one session.
//! Uses BTreeMap for deterministic iteration order.
//!
//! ## Ownership
//!
//! ```text
//! ┌──────────────────────┬─────────────────────────────────────────────┐
//! │ entities             │ players (predicted by driver) and enemies   │
//! │ coins / platforms    │ interactables, timer-driven                 │
//! │ roster / round       │ authority-owned, guarded                    │
//! │ history              │ local hitbox history, never replicated      │
//! └──────────────────────┴─────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, from_int, ticks_from_seconds};
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::core::rng::DeterministicRng;
use crate::core::vec3::FixedVec3;
use crate::game::authority::{Guarded, ParticipantId};
use crate::game::combat::HitboxHistory;
use crate::game::controller::{Surface, SurfaceController};
use crate::game::entity::{Entity, EntityId, Hitbox, PlayerEntity};
use crate::game::events::GameEvent;
use crate::game::interactable::{Coin, FallingPlatform, InteractableConfig};
use crate::game::lifecycle::{Roster, RoundState};
use crate::game::movement::MovementState;
use crate::game::tick::SimConfig;
use crate::game::timer::Tick;

// =============================================================================
// LEVEL
// =============================================================================

/// Static layout a world is built from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Static walkable surfaces
    pub surfaces: Vec<Surface>,
    /// Falling platform tops
    pub platforms: Vec<Surface>,
    /// Coin positions
    pub coins: Vec<FixedVec3>,
}

impl Level {
    /// A single flat ground square centered on the origin.
    pub fn flat(half_extent: Fixed) -> Self {
        Self {
            surfaces: vec![Surface::flat(FixedVec3::ZERO, half_extent, half_extent)],
            ..Self::default()
        }
    }

    /// Small demo course: ground, a row of falling platforms and a coin ring.
    pub fn demo() -> Self {
        let mut level = Self::flat(from_int(60));
        for i in 0..4 {
            level.platforms.push(Surface::flat(FixedVec3::from_ints(0, 2 + i, 8 + 4 * i), from_int(1), from_int(1)));
        }
        for i in 0..12 {
            let x = [-6, -3, 3, 6][i % 4];
            let z = [-6, 0, 6][i / 4];
            level.coins.push(FixedVec3::from_ints(x, 1, z));
        }
        level
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// Replicated world of one session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct World {
    /// Last simulated tick
    pub tick: Tick,
    /// Seed the RNG started from
    pub rng_seed: u64,
    /// Randomness for authoritative lifecycle decisions
    pub rng: DeterministicRng,
    /// Every networked entity
    pub entities: BTreeMap<EntityId, Entity>,
    /// Coins by level id
    pub coins: BTreeMap<u32, Coin>,
    /// Falling platforms by level id
    pub platforms: BTreeMap<u32, FallingPlatform>,
    /// Static walkable surfaces
    pub surfaces: Vec<Surface>,
    /// Participants in arrival order
    pub roster: Guarded<Roster>,
    /// Round state machine
    pub round: Guarded<RoundState>,
    /// Enemies owned by the spawner
    pub enemy_pool: Vec<EntityId>,
    next_entity_id: u32,
    /// Hitboxes of recent ticks, for lag compensation
    #[serde(skip)]
    pub history: HitboxHistory,
    #[serde(skip)]
    events: Vec<GameEvent>,
}

impl World {
    /// Build a world from a level layout.
    pub fn new(seed: u64, level: &Level, config: &SimConfig) -> Self {
        Self::from_level(seed, level, &config.interactables, config.tick_rate, config.combat.history_ticks)
    }

    /// Build a world with explicit interactable tuning.
    pub fn from_level(
        seed: u64,
        level: &Level,
        interactables: &InteractableConfig,
        tick_rate: u32,
        history_ticks: u32,
    ) -> Self {
        let refresh = ticks_from_seconds(interactables.coin_refresh_seconds, tick_rate);
        let coins = level
            .coins
            .iter()
            .enumerate()
            .map(|(i, position)| (i as u32, Coin::new(i as u32, *position, interactables.coin_radius, refresh)))
            .collect();
        let platforms = level
            .platforms
            .iter()
            .enumerate()
            .map(|(i, surface)| (i as u32, FallingPlatform::from_config(i as u32, *surface, interactables, tick_rate)))
            .collect();

        Self {
            tick: 0,
            rng_seed: seed,
            rng: DeterministicRng::new(seed),
            entities: BTreeMap::new(),
            coins,
            platforms,
            surfaces: level.surfaces.clone(),
            roster: Guarded::new(Roster::default()),
            round: Guarded::new(RoundState::default()),
            enemy_pool: Vec::new(),
            next_entity_id: 1,
            history: HitboxHistory::new(history_ticks),
            events: Vec::new(),
        }
    }

    /// Reserve a fresh entity id.
    pub fn allocate_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    /// Insert an entity under a fresh id.
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        let id = self.allocate_entity_id();
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity. Unknown ids are a no-op.
    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn player(&self, id: EntityId) -> Option<&PlayerEntity> {
        self.entities.get(&id).and_then(Entity::as_player)
    }

    pub fn player_mut(&mut self, id: EntityId) -> Option<&mut PlayerEntity> {
        self.entities.get_mut(&id).and_then(Entity::as_player_mut)
    }

    /// Player entity driven by a participant.
    pub fn player_of(&self, participant: ParticipantId) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, entity)| entity.driver() == Some(participant))
            .map(|(id, _)| *id)
    }

    /// Ids of all player entities, in id order.
    pub fn player_ids(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, entity)| entity.as_player().is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Static surfaces plus active platform tops.
    pub fn colliders(&self) -> Vec<Surface> {
        let mut colliders = self.surfaces.clone();
        colliders.extend(self.platforms.values().filter_map(FallingPlatform::collider));
        colliders
    }

    /// Character controller over the current colliders.
    pub fn controller(&self) -> SurfaceController {
        SurfaceController::new(self.colliders())
    }

    /// Damageable spheres of every living entity.
    pub fn hitboxes(&self) -> Vec<Hitbox> {
        self.entities
            .iter()
            .filter_map(|(id, entity)| entity.hitbox(*id))
            .collect()
    }

    /// Store this tick's hitboxes in the lag-compensation history.
    pub fn record_hitboxes(&mut self) {
        let hitboxes = self.hitboxes();
        self.history.record(self.tick, hitboxes);
    }

    /// Queue an event for this tick.
    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Events queued so far this tick.
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replace replicated state with an authoritative copy, keeping local-only
    /// data (hitbox history).
    pub fn overwrite_with(&mut self, authoritative: World) {
        let history = std::mem::take(&mut self.history);
        *self = authoritative;
        self.history = history;
    }

    /// Compute state hash for determinism checks.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng_seed, |hasher| {
            let [s0, s1] = self.rng.state();
            hasher.update_u64(s0);
            hasher.update_u64(s1);

            // Entities in id order (BTreeMap guarantees this)
            for (id, entity) in &self.entities {
                hasher.update_u32(id.0);
                hash_entity(hasher, entity);
            }

            for (id, coin) in &self.coins {
                hasher.update_u32(*id);
                hasher.update_bool(coin.is_visible(self.tick));
                hasher.update_bool(coin.trigger_enabled());
            }

            for (id, platform) in &self.platforms {
                hasher.update_u32(*id);
                hasher.update_bool(platform.is_active());
                hasher.update_opt_u32(platform.cooldown().target_tick());
            }

            for entry in self.roster.get().iter() {
                hasher.update_uuid(entry.participant.as_bytes());
                hasher.update_u32(entry.entity.0);
            }

            let round = self.round.get();
            hasher.update_u8(round.phase as u8);
            hasher.update_opt_u32(round.round_over.target_tick());
            hasher.update_bool(round.winner.is_some());
            if let Some(winner) = round.winner {
                hasher.update_uuid(winner.as_bytes());
            }
            hasher.update_bool(round.best_hunter.is_some());
            if let Some(hunter) = round.best_hunter {
                hasher.update_uuid(hunter.as_bytes());
            }

            for id in &self.enemy_pool {
                hasher.update_u32(id.0);
            }
            hasher.update_u32(self.next_entity_id);
        })
    }
}

fn hash_movement(hasher: &mut StateHasher, movement: &MovementState) {
    hasher.update_vec3(movement.body.position);
    hasher.update_fixed(movement.body.vertical_velocity);
    hasher.update_bool(movement.body.grounded);
    hasher.update_bool(movement.body.active);
    hasher.update_vec3(movement.move_velocity);
    hasher.update_bool(movement.is_jumping);
    hasher.update_vec2(movement.look_rotation);
    hasher.update_fixed(movement.facing_yaw);
    hasher.update_u8(movement.previous_buttons.0);
}

fn hash_entity(hasher: &mut StateHasher, entity: &Entity) {
    match entity {
        Entity::Player(player) => {
            hasher.update_u8(0);
            hasher.update_uuid(player.driver.as_bytes());
            hash_movement(hasher, &player.movement);
            hasher.update_i32(player.health.current());
            hasher.update_opt_u32(player.health.death_cooldown().target_tick());
            hasher.update_i32(player.score.value());
            hasher.update_u32(player.collected_coins.value());
            hasher.update_bool(player.round_finished.value());
            hasher.update_str(player.nickname.get());
            hasher.update_u32(player.weapon.fire_count);
            hasher.update_vec3(player.weapon.hit_position);
            hasher.update_vec3(player.weapon.hit_normal);
        }
        Entity::Enemy(enemy) => {
            hasher.update_u8(1);
            hasher.update_vec3(enemy.position);
            hasher.update_vec3(enemy.direction);
            hasher.update_fixed(enemy.speed);
            hasher.update_i32(enemy.health.current());
            hasher.update_opt_u32(enemy.health.death_cooldown().target_tick());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::health::HealthState;

    fn player(byte: u8) -> Entity {
        Entity::Player(PlayerEntity::new(ParticipantId::new([byte; 16]), FixedVec3::ZERO, HealthState::new(3, 60)))
    }

    #[test]
    fn test_world_creation() {
        let world = World::new(12345, &Level::demo(), &SimConfig::default());
        assert_eq!(world.tick, 0);
        assert_eq!(world.coins.len(), 12);
        assert_eq!(world.platforms.len(), 4);
        assert!(world.entities.is_empty());
        assert_eq!(world.colliders().len(), 5);
    }

    #[test]
    fn test_spawn_and_lookup() {
        let mut world = World::new(1, &Level::flat(from_int(10)), &SimConfig::default());
        let a = world.spawn(player(5));
        let b = world.spawn(player(1));
        assert!(a < b);
        assert_eq!(world.player_of(ParticipantId::new([1; 16])), Some(b));
        assert_eq!(world.player_ids(), vec![a, b]);

        assert!(world.despawn(a).is_some());
        assert!(world.despawn(a).is_none());
        assert!(world.player(a).is_none());
        assert_eq!(world.player_of(ParticipantId::new([5; 16])), None);
    }

    #[test]
    fn test_hash_deterministic() {
        let config = SimConfig::default();
        let mut world1 = World::new(12345, &Level::demo(), &config);
        let mut world2 = World::new(12345, &Level::demo(), &config);
        world1.spawn(player(2));
        world2.spawn(player(2));
        assert_eq!(world1.compute_hash(), world2.compute_hash());

        world2.tick = 1;
        assert_ne!(world1.compute_hash(), world2.compute_hash());
    }

    #[test]
    fn test_overwrite_keeps_history() {
        let config = SimConfig::default();
        let mut local = World::new(1, &Level::flat(from_int(10)), &config);
        local.spawn(player(3));
        local.record_hitboxes();
        assert_eq!(local.history.len(), 1);

        let authoritative = World::new(1, &Level::flat(from_int(10)), &config);
        local.overwrite_with(authoritative);
        assert!(local.entities.is_empty());
        assert_eq!(local.history.len(), 1);
    }

    #[test]
    fn test_world_bincode_round_trip() {
        let mut world = World::new(77, &Level::demo(), &SimConfig::default());
        world.spawn(player(4));
        let bytes = bincode::serialize(&world).unwrap();
        let decoded: World = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.compute_hash(), world.compute_hash());
    }
}
