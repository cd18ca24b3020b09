//! # Tickbound
//!
//! Tick-authoritative gameplay core for predicted multiplayer sessions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         TICKBOUND                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── vec2.rs     - 2D vector (intents, look rotation)        │
//! │  ├── vec3.rs     - 3D vector (positions, velocities)         │
//! │  ├── angle.rs    - Degree trigonometry                       │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Simulation (deterministic)                │
//! │  ├── timer.rs    - Tick timers                               │
//! │  ├── authority.rs- Authority model, guarded fields           │
//! │  ├── input.rs    - Input pipeline                            │
//! │  ├── movement.rs - Movement resolver                         │
//! │  ├── combat.rs   - Lag-compensated hit-scan                  │
//! │  ├── lifecycle.rs- Roster, spawns, rounds                    │
//! │  ├── tick.rs     - Simulation step                           │
//! │  ├── prediction.rs - Client prediction, resimulation         │
//! │  └── presentation.rs - Interpolation, one-shot effects       │
//! │                                                              │
//! │  network/        - Host edge (non-deterministic)             │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Session host                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules (apart from presentation output) are
//! **100% deterministic**:
//! - No floating-point arithmetic in game logic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from the world's seeded Xorshift128+
//!
//! Given identical inputs and start state, re-running a tick range produces
//! **identical results**, which is what makes resimulation safe.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE, DEFAULT_TICK_RATE};
pub use core::vec2::FixedVec2;
pub use core::vec3::FixedVec3;
pub use core::rng::DeterministicRng;
pub use game::authority::{AuthorityContext, ParticipantId};
pub use game::input::InputRecord;
pub use game::state::World;
pub use game::tick::{SimConfig, TickInputs};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
