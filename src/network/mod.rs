//! Network Layer
//!
//! The session host and its wire messages.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod session;

pub use protocol::{
    ClientMessage, ServerMessage, InputPacket, WorldSnapshot, ProtocolError,
};
pub use session::{Session, SessionCommand, SessionConfig, SessionError, SessionId, SessionSummary};
