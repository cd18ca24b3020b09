//! Core deterministic primitives.
//!
//! All types in this module are designed for bit-exact cross-platform
//! determinism, so a predicting participant replays ticks exactly the way
//! the authority ran them.

pub mod fixed;
pub mod vec2;
pub mod vec3;
pub mod angle;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec2::FixedVec2;
pub use vec3::FixedVec3;
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
