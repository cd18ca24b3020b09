//! Enemies
//!
//! Hostile flying NPCs. They are simulated on the authority only: each flies
//! in a straight line from its spawn point and dies when it strays too far,
//! touches a player or hits the ground. Clients receive them by value in
//! snapshots.
//!
//! ## Spawner
//!
//! ```text
//!            ● spawn (on circle, random height)
//!             ╲  aimed at center ± dispersion
//!     ( ─ ─ ─ ─✕─ ─ ─ ─ )   radius
//!            center
//! ```

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::angle::{atan2_deg, cos_deg, heading_deg, look_direction, sin_deg, DEG_360};
use crate::core::fixed::{Fixed, fixed_mul, from_int, ticks_from_seconds, to_fixed};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::core::vec3::FixedVec3;
use crate::game::authority::{AuthorityContext, AuthorityError};
use crate::game::health::{HasHealth, HealthState, LETHAL_DAMAGE};
use crate::game::timer::Tick;

/// Spawner tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemySpawnerConfig {
    /// Enemies kept alive at once
    pub count: u32,
    /// Center the enemies fly toward
    pub center: FixedVec3,
    /// Spawn circle radius
    pub spawn_radius: Fixed,
    /// Lowest spawn height
    pub height_min: Fixed,
    /// Highest spawn height
    pub height_max: Fixed,
    /// Slowest flight speed (units/second)
    pub speed_min: Fixed,
    /// Fastest flight speed (units/second)
    pub speed_max: Fixed,
    /// Random yaw offset from the center direction (degrees, ±)
    pub direction_dispersion: Fixed,
    /// Hit points
    pub health: i32,
    /// Death animation time (seconds)
    pub death_seconds: Fixed,
    /// Hitbox radius
    pub radius: Fixed,
}

impl Default for EnemySpawnerConfig {
    fn default() -> Self {
        Self {
            count: 30,
            center: FixedVec3::ZERO,
            spawn_radius: from_int(50),
            height_min: from_int(1),
            height_max: from_int(20),
            speed_min: from_int(5),
            speed_max: from_int(15),
            direction_dispersion: from_int(10),
            health: 1,
            death_seconds: to_fixed(1.0),
            radius: to_fixed(0.5),
        }
    }
}

impl EnemySpawnerConfig {
    /// No enemies at all (platformer levels).
    pub fn disabled() -> Self {
        Self { count: 0, ..Self::default() }
    }

    /// Distance an enemy may travel before it dies.
    #[inline]
    pub fn max_travel_distance(&self) -> Fixed {
        fixed_mul(self.spawn_radius, to_fixed(2.5))
    }
}

/// Replicated state of one enemy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyState {
    /// Authority-owned health
    pub health: HealthState,
    /// Current position
    pub position: FixedVec3,
    /// Unit flight direction
    pub direction: FixedVec3,
    /// Heading for rendering (degrees)
    pub yaw: Fixed,
    /// Flight speed (units/second)
    pub speed: Fixed,
    /// Where the current flight started
    pub start_position: FixedVec3,
    /// Flight length limit
    pub max_travel_distance: Fixed,
    /// Hitbox radius
    pub radius: Fixed,
}

impl EnemyState {
    /// Enemy resting at the spawner center; the spawner sends it flying.
    pub fn new(config: &EnemySpawnerConfig, tick_rate: u32) -> Self {
        Self {
            health: HealthState::new(config.health, ticks_from_seconds(config.death_seconds, tick_rate)),
            position: config.center,
            direction: FixedVec3::FORWARD,
            yaw: 0,
            speed: 0,
            start_position: config.center,
            max_travel_distance: config.max_travel_distance(),
            radius: config.radius,
        }
    }

    /// Start a new flight.
    pub fn respawn(
        &mut self,
        ctx: &AuthorityContext,
        position: FixedVec3,
        direction: FixedVec3,
        speed: Fixed,
        max_travel_distance: Fixed,
    ) -> Result<(), AuthorityError> {
        self.health.revive(ctx)?;
        self.position = position;
        self.start_position = position;
        self.direction = direction.normalize();
        self.yaw = heading_deg(self.direction);
        self.speed = speed;
        self.max_travel_distance = max_travel_distance;
        Ok(())
    }

    /// Advance one tick. Authority only; clients keep the replicated value.
    pub fn fixed_update(&mut self, ctx: &AuthorityContext, tick: Tick, dt: Fixed) -> Result<(), AuthorityError> {
        ctx.check_authoritative("enemy")?;
        if !self.health.is_alive() {
            return Ok(());
        }

        if self.start_position.distance(self.position) > self.max_travel_distance {
            self.health.take_hit(ctx, tick, LETHAL_DAMAGE)?;
            return Ok(());
        }

        self.position = self.position.add(self.direction.scale(fixed_mul(self.speed, dt)));
        Ok(())
    }
}

impl HasHealth for EnemyState {
    fn health(&self) -> &HealthState {
        &self.health
    }

    fn health_mut(&mut self) -> &mut HealthState {
        &mut self.health
    }
}

/// Pick a spawn position and flight direction for one enemy.
pub fn roll_flight(config: &EnemySpawnerConfig, rng: &mut DeterministicRng) -> (FixedVec3, FixedVec3, Fixed) {
    let angle = rng.next_fixed(DEG_360);
    let height = rng.next_fixed_range(config.height_min, config.height_max);
    let position = FixedVec3::new(
        config.center.x.wrapping_add(fixed_mul(sin_deg(angle), config.spawn_radius)),
        height,
        config.center.z.wrapping_add(fixed_mul(cos_deg(angle), config.spawn_radius)),
    );

    let to_center = config.center.sub(position);
    let dispersion = rng.next_fixed_range(-config.direction_dispersion, config.direction_dispersion);
    let yaw = heading_deg(to_center).wrapping_add(dispersion);
    // Positive pitch looks down
    let pitch = -atan2_deg(to_center.y, to_center.horizontal().length());
    let direction = look_direction(FixedVec2::new(pitch, yaw));

    let speed = rng.next_fixed_range(config.speed_min, config.speed_max);
    debug!(x = position.x >> 16, y = position.y >> 16, z = position.z >> 16, "enemy flight rolled");
    (position, direction, speed)
}

/// Respawn one enemy on the spawn circle.
pub fn respawn_enemy(
    enemy: &mut EnemyState,
    ctx: &AuthorityContext,
    config: &EnemySpawnerConfig,
    rng: &mut DeterministicRng,
) -> Result<(), AuthorityError> {
    ctx.check_authoritative("enemy")?;
    let (position, direction, speed) = roll_flight(config, rng);
    enemy.respawn(ctx, position, direction, speed, config.max_travel_distance())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{FIXED_ONE, TICK_DURATION};
    use crate::game::authority::ParticipantId;

    fn is_unit(direction: FixedVec3) -> bool {
        (direction.length() - FIXED_ONE).abs() < FIXED_ONE / 50
    }

    fn host() -> AuthorityContext {
        AuthorityContext::host(ParticipantId::new([1; 16]))
    }

    #[test]
    fn test_rolled_flight_is_on_circle_and_aimed_inward() {
        let config = EnemySpawnerConfig::default();
        let mut rng = DeterministicRng::new(99);

        for _ in 0..20 {
            let (position, direction, speed) = roll_flight(&config, &mut rng);
            let radial = position.horizontal().length();
            assert!((radial - config.spawn_radius).abs() < from_int(1));
            assert!(position.y >= config.height_min && position.y < config.height_max);
            assert!(speed >= config.speed_min && speed < config.speed_max);
            assert!(is_unit(direction));
            // Heading toward the center, give or take the dispersion
            assert!(direction.horizontal().dot(position.horizontal().negate()) > 0);
        }
    }

    #[test]
    fn test_enemy_flies_straight() {
        let ctx = host();
        let config = EnemySpawnerConfig::default();
        let mut enemy = EnemyState::new(&config, 60);
        enemy.respawn(&ctx, FixedVec3::from_ints(0, 5, -10), FixedVec3::FORWARD, from_int(6), from_int(100)).unwrap();

        for tick in 1..=60 {
            enemy.fixed_update(&ctx, tick, TICK_DURATION).unwrap();
        }
        assert_eq!(enemy.position.x, 0);
        assert_eq!(enemy.position.y, from_int(5));
        // 60 steps at 6 u/s ≈ 6 units
        assert!((enemy.position.z - from_int(-4)).abs() < FIXED_ONE / 10);
    }

    #[test]
    fn test_enemy_dies_when_too_far() {
        let ctx = host();
        let config = EnemySpawnerConfig::default();
        let mut enemy = EnemyState::new(&config, 60);
        enemy.respawn(&ctx, FixedVec3::ZERO, FixedVec3::FORWARD, from_int(10), from_int(1)).unwrap();

        let mut tick = 0;
        while enemy.health.is_alive() && tick < 100 {
            tick += 1;
            enemy.fixed_update(&ctx, tick, TICK_DURATION).unwrap();
        }
        assert!(!enemy.health.is_alive());
        assert!(tick < 20);
    }

    #[cfg(not(feature = "strict-authority"))]
    #[test]
    fn test_client_does_not_move_enemies() {
        let ctx = AuthorityContext::client(ParticipantId::new([2; 16]), ParticipantId::new([1; 16]));
        let config = EnemySpawnerConfig::default();
        let mut enemy = EnemyState::new(&config, 60);
        let before = enemy.clone();
        assert!(enemy.fixed_update(&ctx, 1, TICK_DURATION).is_err());
        assert_eq!(enemy, before);
    }
}
