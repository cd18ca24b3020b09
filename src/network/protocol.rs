//! Protocol Messages
//!
//! Wire format between participants and the session host.
//! Messages are serialized as JSON for debugging ease. Input packets and
//! world snapshots are flat structs and also travel as bincode.

use serde::{Serialize, Deserialize};

use crate::core::fixed::FIXED_ONE;
use crate::core::hash::StateHash;
use crate::core::vec2::FixedVec2;
use crate::game::authority::ParticipantId;
use crate::game::events::GameEvent;
use crate::game::input::{Buttons, InputRecord, normalize_intent};
use crate::game::lifecycle::RoundState;
use crate::game::state::World;
use crate::game::timer::Tick;

/// Protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// JSON encoding failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding failed.
    #[error("bincode: {0}")]
    Binary(#[from] bincode::Error),

    /// Decoded world does not hash to the advertised value.
    #[error("snapshot hash mismatch at tick {tick}: expected {expected}, got {actual}")]
    HashMismatch {
        tick: Tick,
        expected: String,
        actual: String,
    },

    /// Participant id is not a UUID.
    #[error("invalid participant id: {0}")]
    InvalidParticipant(String),
}

// =============================================================================
// CLIENT -> HOST MESSAGES
// =============================================================================

/// Messages sent from a participant to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the session.
    Join { nickname: String },

    /// Input for one tick.
    Input(InputPacket),

    /// Reliable nickname change.
    SetNickname { nickname: String },

    /// Latency measurement.
    Ping { timestamp: u64 },

    /// Leaving the session.
    Leave,
}

/// Consumed input for one tick, as sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPacket {
    /// Tick the input was consumed for.
    pub tick: Tick,
    /// Newest authoritative tick the sender had applied (lag compensation).
    pub ack_tick: Tick,
    /// Planar intent (Fixed as i32).
    pub move_direction: [i32; 2],
    /// Pitch and yaw (Fixed degrees as i32).
    pub look_rotation: [i32; 2],
    /// Button bits.
    pub buttons: u8,
}

impl InputPacket {
    /// Pack a record for the wire.
    pub fn from_record(tick: Tick, record: &InputRecord) -> Self {
        Self {
            tick,
            ack_tick: tick,
            move_direction: [record.move_direction.x, record.move_direction.y],
            look_rotation: [record.look_rotation.x, record.look_rotation.y],
            buttons: record.buttons.0,
        }
    }

    /// Same packet, stamped with the sender's newest applied snapshot.
    pub fn acknowledging(self, ack_tick: Tick) -> Self {
        Self { ack_tick, ..self }
    }

    /// Ticks between what the sender saw and what it predicted.
    pub fn latency_ticks(&self) -> u32 {
        self.tick.saturating_sub(self.ack_tick)
    }

    /// Unpack into a record. Oversized intents are clamped and normalized so
    /// a hostile client cannot move faster than the configured speed; an
    /// intent the driver already normalized comes back bit-identical.
    pub fn to_record(&self) -> InputRecord {
        let [x, y] = self.move_direction.map(|v| v.clamp(-FIXED_ONE, FIXED_ONE));
        InputRecord {
            move_direction: normalize_intent(FixedVec2::new(x, y)),
            look_rotation: FixedVec2::new(self.look_rotation[0], self.look_rotation[1]),
            buttons: Buttons(self.buttons),
        }
    }
}

// =============================================================================
// HOST -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from the host to participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join accepted.
    Welcome(WelcomeInfo),

    /// Authoritative world.
    Snapshot(WorldSnapshot),

    /// Events of one tick.
    Events { tick: Tick, events: Vec<GameEvent> },

    /// Round state changed.
    Round { tick: Tick, round: RoundState },

    /// Pong response.
    Pong { timestamp: u64, host_tick: Tick },

    /// Error message.
    Error(ServerError),

    /// Session is over.
    Shutdown { reason: String },
}

/// Join acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeInfo {
    /// Participant id (UUID string).
    pub participant: String,
    /// Player entity id.
    pub entity: u32,
    /// Host tick at join.
    pub tick: Tick,
    /// Simulation rate (Hz).
    pub tick_rate: u32,
    /// World seed.
    pub seed: u64,
}

impl WelcomeInfo {
    /// Parse the participant id.
    pub fn participant_id(&self) -> Result<ParticipantId, ProtocolError> {
        ParticipantId::from_uuid_str(&self.participant)
            .ok_or_else(|| ProtocolError::InvalidParticipant(self.participant.clone()))
    }
}

/// Bincode-encoded world plus its state hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Tick of the world.
    pub tick: Tick,
    /// State hash (hex).
    pub state_hash: String,
    /// Bincode world.
    pub world: Vec<u8>,
}

impl WorldSnapshot {
    /// Encode a world.
    pub fn encode(world: &World) -> Result<Self, ProtocolError> {
        Ok(Self {
            tick: world.tick,
            state_hash: hex::encode(world.compute_hash()),
            world: bincode::serialize(world)?,
        })
    }

    /// Decode and verify against the advertised hash.
    pub fn decode(&self) -> Result<World, ProtocolError> {
        let world: World = bincode::deserialize(&self.world)?;
        let actual: StateHash = world.compute_hash();
        let actual = hex::encode(actual);
        if actual != self.state_hash {
            return Err(ProtocolError::HashMismatch {
                tick: self.tick,
                expected: self.state_hash.clone(),
                actual,
            });
        }
        Ok(world)
    }
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Sender has not joined.
    NotJoined,
    /// Session is full.
    SessionFull,
    /// Input for a tick the host already simulated.
    StaleInput,
    /// Session already torn down.
    SessionClosed,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }
}

impl InputPacket {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(bincode::deserialize(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::from_int;
    use crate::game::authority::AuthorityContext;
    use crate::game::input::Button;
    use crate::game::lifecycle;
    use crate::game::state::Level;
    use crate::game::tick::SimConfig;

    #[test]
    fn test_nickname_messages_json_roundtrip() {
        for msg in [
            ClientMessage::Join { nickname: "Ada".to_string() },
            ClientMessage::SetNickname { nickname: "Grace Hopper".to_string() },
            ClientMessage::Leave,
        ] {
            let json = msg.to_json().unwrap();
            assert_eq!(ClientMessage::from_json(&json).unwrap(), msg);
        }

        let json = ClientMessage::SetNickname { nickname: "x".to_string() }.to_json().unwrap();
        assert!(json.contains("set_nickname"));
    }

    #[test]
    fn test_input_packet() {
        let record = InputRecord::with_movement(127, 0)
            .pressing(Button::Fire)
            .looking(FixedVec2::new(from_int(-10), from_int(90)));

        let packet = InputPacket::from_record(42, &record).acknowledging(37);
        assert_eq!(packet.latency_ticks(), 5);
        let bytes = packet.to_bytes().unwrap();
        let parsed = InputPacket::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.tick, 42);
        assert_eq!(parsed.to_record(), record);
    }

    #[test]
    fn test_every_stick_direction_survives_the_wire() {
        for x in i8::MIN..=i8::MAX {
            for y in i8::MIN..=i8::MAX {
                let record = InputRecord::with_movement(x, y).pressing(Button::Sprint);
                let bytes = InputPacket::from_record(5, &record).to_bytes().unwrap();
                let decoded = InputPacket::from_bytes(&bytes).unwrap().to_record();
                assert_eq!(decoded, record, "stick ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_oversized_intent_is_normalized() {
        let packet = InputPacket {
            tick: 1,
            ack_tick: 0,
            move_direction: [FIXED_ONE * 50, 0],
            look_rotation: [0, 0],
            buttons: 0,
        };
        assert_eq!(packet.to_record().move_direction, FixedVec2::new(FIXED_ONE, 0));
    }

    #[test]
    fn test_world_snapshot_roundtrip() {
        let config = SimConfig::default();
        let host = AuthorityContext::host(ParticipantId::new([1; 16]));
        let mut world = World::new(11, &Level::demo(), &config);
        lifecycle::join(&mut world, &host, ParticipantId::new([2; 16]), &config).unwrap();

        let snapshot = WorldSnapshot::encode(&world).unwrap();
        let decoded = snapshot.decode().unwrap();
        assert_eq!(decoded.compute_hash(), world.compute_hash());

        let msg = ServerMessage::Snapshot(snapshot.clone());
        let parsed = ServerMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);

        let mut tampered = snapshot;
        tampered.state_hash = hex::encode([0u8; 32]);
        assert!(matches!(tampered.decode(), Err(ProtocolError::HashMismatch { .. })));
    }

    #[test]
    fn test_events_message() {
        let event = GameEvent::round_won(300, ParticipantId::new([7; 16]));
        let msg = ServerMessage::Events { tick: 300, events: vec![event] };
        let json = msg.to_json().unwrap();
        assert!(json.contains("round_won") || json.contains("RoundWon"));
        assert!(ServerMessage::from_json(&json).is_ok());
    }

    #[test]
    fn test_error_codes() {
        let msg = ServerMessage::Error(ServerError {
            code: ErrorCode::StaleInput,
            message: "tick 3 already simulated".to_string(),
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains("stale_input"));
    }

    #[test]
    fn test_welcome_participant() {
        let id = ParticipantId::random();
        let info = WelcomeInfo {
            participant: id.to_uuid_string(),
            entity: 1,
            tick: 0,
            tick_rate: 60,
            seed: 1,
        };
        assert_eq!(info.participant_id().unwrap(), id);

        let bad = WelcomeInfo { participant: "nope".to_string(), ..info };
        assert!(matches!(bad.participant_id(), Err(ProtocolError::InvalidParticipant(_))));
    }
}
