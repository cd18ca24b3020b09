//! Entities
//!
//! Entity kinds are composed from capabilities ([`HasHealth`],
//! [`HasMovement`]) and dispatched through the [`Entity`] tagged enum.
//! The world stores them in a `BTreeMap<EntityId, Entity>` so every
//! per-tick loop visits them in the same order on every participant.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, to_fixed};
use crate::core::vec3::FixedVec3;
use crate::game::authority::{AuthorityContext, AuthorityError, Guarded, ParticipantId};
use crate::game::enemy::EnemyState;
use crate::game::health::{HasHealth, HealthState};
use crate::game::movement::MovementState;

/// Height of the player hitbox center above the feet.
pub const PLAYER_HITBOX_OFFSET: Fixed = to_fixed(0.9);

/// Radius of the player hitbox.
pub const PLAYER_HITBOX_RADIUS: Fixed = to_fixed(0.9);

/// Height of the eyes (ray origin) above the feet.
pub const EYE_HEIGHT: Fixed = to_fixed(1.6);

/// Longest accepted nickname, in characters.
pub const MAX_NICKNAME_CHARS: usize = 24;

// =============================================================================
// ENTITY ID
// =============================================================================

/// Network-wide entity identifier, allocated by the authority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A damageable sphere at one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hitbox {
    /// Owner
    pub entity: EntityId,
    /// Sphere center
    pub center: FixedVec3,
    /// Sphere radius
    pub radius: Fixed,
}

/// Anything driven by the movement resolver.
pub trait HasMovement {
    /// Movement state.
    fn movement(&self) -> &MovementState;

    /// Mutable movement state.
    fn movement_mut(&mut self) -> &mut MovementState;

    /// Feet position.
    #[inline]
    fn position(&self) -> FixedVec3 {
        self.movement().body.position
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Replicated weapon state. Predicted by the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    /// Shots fired since spawn; presentation diffs it to play effects
    pub fire_count: u32,
    /// Impact point of the last shot (zero when it hit nothing)
    pub hit_position: FixedVec3,
    /// Impact normal of the last shot
    pub hit_normal: FixedVec3,
}

/// A participant-controlled character.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntity {
    /// Participant whose input drives this player
    pub driver: ParticipantId,
    /// Predicted movement
    pub movement: MovementState,
    /// Authority-owned health
    pub health: HealthState,
    /// Hunter score
    pub score: Guarded<i32>,
    /// Coins collected this round
    pub collected_coins: Guarded<u32>,
    /// Round is over for this player (winner found)
    pub round_finished: Guarded<bool>,
    /// Display name
    pub nickname: Guarded<String>,
    /// Weapon state
    pub weapon: Weapon,
}

impl PlayerEntity {
    /// Fresh player at a spawn position.
    pub fn new(driver: ParticipantId, position: FixedVec3, health: HealthState) -> Self {
        Self {
            driver,
            movement: MovementState::at(position),
            health,
            score: Guarded::new(0),
            collected_coins: Guarded::new(0),
            round_finished: Guarded::new(false),
            nickname: Guarded::new(String::new()),
            weapon: Weapon::default(),
        }
    }

    /// Does this player take input right now?
    #[inline]
    pub fn is_controllable(&self) -> bool {
        self.health.is_alive() && !self.round_finished.value()
    }

    /// Hitbox sphere center.
    #[inline]
    pub fn hitbox_center(&self) -> FixedVec3 {
        self.position().add(FixedVec3::new(0, PLAYER_HITBOX_OFFSET, 0))
    }

    /// Eye position, where shots start.
    #[inline]
    pub fn eye_position(&self) -> FixedVec3 {
        self.position().add(FixedVec3::new(0, EYE_HEIGHT, 0))
    }

    /// Put the player back at a spawn position with full health.
    ///
    /// The hunter score restarts with every life. `reset_round` also clears
    /// the per-round coin count and finished flag.
    pub fn respawn(&mut self, ctx: &AuthorityContext, position: FixedVec3, reset_round: bool) -> Result<(), AuthorityError> {
        self.health.revive(ctx)?;
        self.score.set(ctx, "score", 0)?;
        if reset_round {
            self.collected_coins.set(ctx, "collected_coins", 0)?;
            self.round_finished.set(ctx, "round_finished", false)?;
        }
        self.movement.respawn(position);
        self.weapon.hit_position = FixedVec3::ZERO;
        Ok(())
    }

    /// Idempotent nickname change. Trimmed and capped at
    /// [`MAX_NICKNAME_CHARS`] characters.
    pub fn set_nickname(&mut self, ctx: &AuthorityContext, nickname: &str) -> Result<bool, AuthorityError> {
        let clean: String = nickname.trim().chars().take(MAX_NICKNAME_CHARS).collect();
        self.nickname.set_if_different(ctx, "nickname", clean)
    }
}

impl HasHealth for PlayerEntity {
    fn health(&self) -> &HealthState {
        &self.health
    }

    fn health_mut(&mut self) -> &mut HealthState {
        &mut self.health
    }
}

impl HasMovement for PlayerEntity {
    fn movement(&self) -> &MovementState {
        &self.movement
    }

    fn movement_mut(&mut self) -> &mut MovementState {
        &mut self.movement
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// Kind tag, for events and views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Enemy,
}

/// Every networked entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Player(PlayerEntity),
    Enemy(EnemyState),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Player(_) => EntityKind::Player,
            Entity::Enemy(_) => EntityKind::Enemy,
        }
    }

    pub fn as_player(&self) -> Option<&PlayerEntity> {
        match self {
            Entity::Player(player) => Some(player),
            Entity::Enemy(_) => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerEntity> {
        match self {
            Entity::Player(player) => Some(player),
            Entity::Enemy(_) => None,
        }
    }

    pub fn as_enemy(&self) -> Option<&EnemyState> {
        match self {
            Entity::Enemy(enemy) => Some(enemy),
            Entity::Player(_) => None,
        }
    }

    pub fn as_enemy_mut(&mut self) -> Option<&mut EnemyState> {
        match self {
            Entity::Enemy(enemy) => Some(enemy),
            Entity::Player(_) => None,
        }
    }

    /// Participant driving this entity; enemies have none.
    pub fn driver(&self) -> Option<ParticipantId> {
        self.as_player().map(|player| player.driver)
    }

    /// World position.
    pub fn position(&self) -> FixedVec3 {
        match self {
            Entity::Player(player) => player.position(),
            Entity::Enemy(enemy) => enemy.position,
        }
    }

    /// Damageable sphere; dead entities have none.
    pub fn hitbox(&self, id: EntityId) -> Option<Hitbox> {
        if !self.is_alive() {
            return None;
        }
        let (center, radius) = match self {
            Entity::Player(player) => (player.hitbox_center(), PLAYER_HITBOX_RADIUS),
            Entity::Enemy(enemy) => (enemy.position, enemy.radius),
        };
        Some(Hitbox { entity: id, center, radius })
    }
}

impl HasHealth for Entity {
    fn health(&self) -> &HealthState {
        match self {
            Entity::Player(player) => &player.health,
            Entity::Enemy(enemy) => &enemy.health,
        }
    }

    fn health_mut(&mut self) -> &mut HealthState {
        match self {
            Entity::Player(player) => &mut player.health,
            Entity::Enemy(enemy) => &mut enemy.health,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::health::LETHAL_DAMAGE;

    fn host() -> AuthorityContext {
        AuthorityContext::host(ParticipantId::new([1; 16]))
    }

    fn player() -> PlayerEntity {
        PlayerEntity::new(ParticipantId::new([7; 16]), FixedVec3::from_ints(1, 0, 1), HealthState::new(3, 60))
    }

    #[test]
    fn test_nickname_is_trimmed_and_capped() {
        let ctx = host();
        let mut player = player();
        let long = "  abcdefghijklmnopqrstuvwxyz0123  ";
        assert!(player.set_nickname(&ctx, long).unwrap());
        assert_eq!(player.nickname.get().chars().count(), MAX_NICKNAME_CHARS);
        assert!(!player.set_nickname(&ctx, long).unwrap());
    }

    #[test]
    fn test_dead_player_has_no_hitbox() {
        let ctx = host();
        let mut entity = Entity::Player(player());
        assert!(entity.hitbox(EntityId(1)).is_some());

        entity.health_mut().take_hit(&ctx, 1, LETHAL_DAMAGE).unwrap();
        assert!(entity.hitbox(EntityId(1)).is_none());
    }

    #[test]
    fn test_respawn_resets_round_fields() {
        let ctx = host();
        let mut player = player();
        player.score.set(&ctx, "score", 4).unwrap();
        player.collected_coins.set(&ctx, "collected_coins", 9).unwrap();
        player.round_finished.set(&ctx, "round_finished", true).unwrap();
        player.health.take_hit(&ctx, 1, LETHAL_DAMAGE).unwrap();

        player.respawn(&ctx, FixedVec3::from_ints(5, 0, 5), false).unwrap();
        assert!(player.health.is_alive());
        assert_eq!(player.score.value(), 0);
        assert_eq!(player.collected_coins.value(), 9);
        assert!(player.round_finished.value());

        player.respawn(&ctx, FixedVec3::from_ints(5, 0, 5), true).unwrap();
        assert_eq!(player.collected_coins.value(), 0);
        assert!(!player.round_finished.value());
        assert_eq!(player.position(), FixedVec3::from_ints(5, 0, 5));
    }
}
