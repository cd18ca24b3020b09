//! Game Logic Module
//!
//! All game simulation code. 100% deterministic apart from `presentation`,
//! which only reads.
//!
//! ## Module Structure
//!
//! - `timer`: Tick-based deferred expiry
//! - `authority`: Who may write authority-owned state
//! - `input`: Input accumulation, per-tick records, input log
//! - `controller`: Character controller over axis-aligned surfaces
//! - `movement`: Movement resolver
//! - `collision`: Sphere and ray tests
//! - `health`: Health and death cooldown
//! - `entity`: Players, enemies, hitboxes
//! - `enemy`: Flying enemies and their spawner
//! - `interactable`: Coins and falling platforms
//! - `combat`: Lag-compensated hit-scan
//! - `lifecycle`: Roster, spawns, round state machine
//! - `state`: World state and hashing
//! - `tick`: Simulation step
//! - `prediction`: Client prediction and reconciliation
//! - `presentation`: Interpolation and one-shot effects
//! - `events`: Game events for logging and replay checks

pub mod timer;
pub mod authority;
pub mod input;
pub mod controller;
pub mod movement;
pub mod collision;
pub mod health;
pub mod entity;
pub mod enemy;
pub mod interactable;
pub mod combat;
pub mod lifecycle;
pub mod state;
pub mod tick;
pub mod prediction;
pub mod presentation;
pub mod events;

// Re-export key types
pub use authority::{AuthorityContext, AuthorityError, AuthorityRole, Guarded, ParticipantId};
pub use entity::{Entity, EntityId, EntityKind, PlayerEntity};
pub use events::{GameEvent, GameEventData};
pub use input::{Button, Buttons, InputAccumulator, InputLog, InputRecord};
pub use lifecycle::{RoundPhase, RoundState};
pub use prediction::ClientPredictor;
pub use state::{Level, World};
pub use tick::{SimConfig, TickInputs, TickResult};
pub use timer::{Tick, TickTimer};
