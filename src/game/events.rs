//! Game Events
//!
//! Events generated during simulation, for logging, replay checks and the
//! session host. Presentation never plays effects from these (they would
//! double-fire under resimulation); it diffs replicated state instead.

use serde::{Serialize, Deserialize};

use crate::core::vec3::FixedVec3;
use crate::game::authority::ParticipantId;
use crate::game::entity::EntityId;
use crate::game::interactable::PlatformTransition;
use crate::game::timer::Tick;

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Deaths processed first
    Defeat = 0,
    /// Then damage
    Damage = 1,
    /// Then pickups
    Pickup = 2,
    /// Then round transitions
    Round = 3,
    /// Then roster changes
    Roster = 4,
    /// Lowest priority
    Other = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Participant joined and got a player entity
    PlayerJoined {
        participant: ParticipantId,
        entity: EntityId,
    },

    /// Participant left; its entity was despawned
    PlayerLeft {
        participant: ParticipantId,
        entity: EntityId,
    },

    /// Player (re)spawned
    PlayerSpawned {
        entity: EntityId,
        position: FixedVec3,
    },

    /// Jump started
    JumpStarted { entity: EntityId },

    /// Touched ground after being airborne
    Landed { entity: EntityId },

    /// Weapon fired
    FireTriggered {
        entity: EntityId,
        fire_count: u32,
    },

    /// Damage applied
    Hit {
        shooter: Option<EntityId>,
        target: EntityId,
        damage: i32,
        remaining: i32,
    },

    /// Entity died
    Defeated {
        target: EntityId,
        by: Option<EntityId>,
        score_delta: i32,
    },

    /// Coin picked up
    CoinCollected {
        entity: EntityId,
        coin: u32,
        total: u32,
    },

    /// Falling platform changed state
    Platform {
        platform: u32,
        transition: PlatformTransition,
    },

    /// A fall was scheduled for a platform
    PlatformTriggered {
        platform: u32,
        entity: EntityId,
    },

    /// Enemy started a new flight
    EnemyRespawned { entity: EntityId },

    /// Round won
    RoundWon { winner: ParticipantId },

    /// Round reset after the end-of-round timer
    RoundReset,
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: Tick,

    /// Processing priority
    pub priority: EventPriority,

    /// Entity involved (for tie-breaking)
    pub entity: Option<EntityId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: Tick, priority: EventPriority, data: GameEventData) -> Self {
        let entity = match &data {
            GameEventData::PlayerJoined { entity, .. }
            | GameEventData::PlayerLeft { entity, .. }
            | GameEventData::PlayerSpawned { entity, .. }
            | GameEventData::JumpStarted { entity }
            | GameEventData::Landed { entity }
            | GameEventData::FireTriggered { entity, .. }
            | GameEventData::CoinCollected { entity, .. }
            | GameEventData::PlatformTriggered { entity, .. }
            | GameEventData::EnemyRespawned { entity } => Some(*entity),
            GameEventData::Hit { target, .. } | GameEventData::Defeated { target, .. } => Some(*target),
            GameEventData::Platform { .. } | GameEventData::RoundWon { .. } | GameEventData::RoundReset => None,
        };

        Self {
            tick,
            priority,
            entity,
            data,
        }
    }

    /// Create player joined event.
    pub fn player_joined(tick: Tick, participant: ParticipantId, entity: EntityId) -> Self {
        Self::new(tick, EventPriority::Roster, GameEventData::PlayerJoined { participant, entity })
    }

    /// Create player left event.
    pub fn player_left(tick: Tick, participant: ParticipantId, entity: EntityId) -> Self {
        Self::new(tick, EventPriority::Roster, GameEventData::PlayerLeft { participant, entity })
    }

    /// Create player spawned event.
    pub fn player_spawned(tick: Tick, entity: EntityId, position: FixedVec3) -> Self {
        Self::new(tick, EventPriority::Roster, GameEventData::PlayerSpawned { entity, position })
    }

    /// Create fire triggered event.
    pub fn fire_triggered(tick: Tick, entity: EntityId, fire_count: u32) -> Self {
        Self::new(tick, EventPriority::Other, GameEventData::FireTriggered { entity, fire_count })
    }

    /// Create hit event.
    pub fn hit(tick: Tick, shooter: Option<EntityId>, target: EntityId, damage: i32, remaining: i32) -> Self {
        Self::new(
            tick,
            EventPriority::Damage,
            GameEventData::Hit {
                shooter,
                target,
                damage,
                remaining,
            },
        )
    }

    /// Create defeated event.
    pub fn defeated(tick: Tick, target: EntityId, by: Option<EntityId>, score_delta: i32) -> Self {
        Self::new(tick, EventPriority::Defeat, GameEventData::Defeated { target, by, score_delta })
    }

    /// Create coin collected event.
    pub fn coin_collected(tick: Tick, entity: EntityId, coin: u32, total: u32) -> Self {
        Self::new(tick, EventPriority::Pickup, GameEventData::CoinCollected { entity, coin, total })
    }

    /// Create platform transition event.
    pub fn platform(tick: Tick, platform: u32, transition: PlatformTransition) -> Self {
        Self::new(tick, EventPriority::Other, GameEventData::Platform { platform, transition })
    }

    /// Create round won event.
    pub fn round_won(tick: Tick, winner: ParticipantId) -> Self {
        Self::new(tick, EventPriority::Round, GameEventData::RoundWon { winner })
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.priority == other.priority
            && self.entity == other.entity
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: tick, then priority, then entity
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.entity.cmp(&other.entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ordering() {
        let a = EntityId(1);
        let b = EntityId(2);

        let defeat = GameEvent::defeated(10, a, Some(b), 1);
        let pickup = GameEvent::coin_collected(10, a, 0, 3);
        let other_defeat = GameEvent::defeated(10, b, None, 0);

        // Same tick, but defeat < pickup
        assert!(defeat < pickup);

        // Same tick and priority, but a < b
        assert!(defeat < other_defeat);

        // Earlier tick always first
        assert!(GameEvent::round_won(9, ParticipantId::new([1; 16])) < defeat);
    }

    #[test]
    fn test_event_entity_extraction() {
        let event = GameEvent::hit(3, Some(EntityId(1)), EntityId(4), 1, 2);
        assert_eq!(event.entity, Some(EntityId(4)));
        assert_eq!(GameEvent::round_won(1, ParticipantId::new([1; 16])).entity, None);
    }
}
