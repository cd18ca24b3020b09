//! Health
//!
//! Authority-owned hit points with a death cooldown. An entity is *alive*
//! while it has health, *dead* at zero, and *finished* once the death
//! cooldown has elapsed and the lifecycle may respawn it.
//!
//! ```text
//!  alive ──take_hit→0──► dead ──death_ticks──► finished ──revive──► alive
//! ```

use serde::{Serialize, Deserialize};

use crate::game::authority::{AuthorityContext, AuthorityError, Guarded};
use crate::game::timer::{Tick, TickTimer};

/// Damage that kills anything (falling out of the level, timeouts).
pub const LETHAL_DAMAGE: i32 = 1000;

/// Hit points and death timer of one entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    current: Guarded<i32>,
    max: i32,
    death_ticks: u32,
    death_cooldown: Guarded<TickTimer>,
}

impl HealthState {
    /// Full health.
    pub fn new(max: i32, death_ticks: u32) -> Self {
        Self {
            current: Guarded::new(max),
            max,
            death_ticks,
            death_cooldown: Guarded::new(TickTimer::NONE),
        }
    }

    /// Current hit points (never negative).
    #[inline]
    pub fn current(&self) -> i32 {
        self.current.value()
    }

    /// Initial hit points.
    #[inline]
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Death timer; not running while alive.
    #[inline]
    pub fn death_cooldown(&self) -> TickTimer {
        self.death_cooldown.value()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.current() > 0
    }

    /// Dead and the death cooldown has elapsed.
    #[inline]
    pub fn is_finished(&self, tick: Tick) -> bool {
        !self.is_alive() && self.death_cooldown().is_expired(tick)
    }

    /// Apply damage. Returns `Ok(false)` when the entity was already dead.
    ///
    /// Health is clamped at zero; reaching zero starts the death cooldown.
    pub fn take_hit(&mut self, ctx: &AuthorityContext, tick: Tick, damage: i32) -> Result<bool, AuthorityError> {
        ctx.check_authoritative("health")?;
        if !self.is_alive() {
            return Ok(false);
        }

        let remaining = self.current.modify(ctx, "health", |current| {
            *current = current.saturating_sub(damage.max(0)).max(0);
            *current
        })?;

        if remaining == 0 {
            let timer = TickTimer::start(tick, self.death_ticks);
            self.death_cooldown.set(ctx, "death_cooldown", timer)?;
        }
        Ok(true)
    }

    /// Restore full health and cancel the death timer.
    pub fn revive(&mut self, ctx: &AuthorityContext) -> Result<(), AuthorityError> {
        self.current.set(ctx, "health", self.max)?;
        self.death_cooldown.set(ctx, "death_cooldown", TickTimer::NONE)
    }
}

/// Anything that can be damaged.
pub trait HasHealth {
    /// Health state.
    fn health(&self) -> &HealthState;

    /// Mutable health state.
    fn health_mut(&mut self) -> &mut HealthState;

    #[inline]
    fn is_alive(&self) -> bool {
        self.health().is_alive()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::authority::ParticipantId;

    fn host() -> AuthorityContext {
        AuthorityContext::host(ParticipantId::new([1; 16]))
    }

    #[test]
    fn test_three_hits_kill() {
        let ctx = host();
        let mut health = HealthState::new(3, 120);

        assert!(health.take_hit(&ctx, 10, 1).unwrap());
        assert_eq!(health.current(), 2);
        assert!(health.take_hit(&ctx, 11, 1).unwrap());
        assert_eq!(health.current(), 1);
        assert!(health.is_alive());
        assert!(health.take_hit(&ctx, 12, 1).unwrap());
        assert_eq!(health.current(), 0);
        assert!(!health.is_alive());

        assert!(!health.is_finished(12));
        assert!(!health.is_finished(131));
        assert!(health.is_finished(132));
    }

    #[test]
    fn test_hit_on_dead_is_noop() {
        let ctx = host();
        let mut health = HealthState::new(1, 60);
        assert!(health.take_hit(&ctx, 5, 1).unwrap());
        let timer = health.death_cooldown();

        assert!(!health.take_hit(&ctx, 6, 1).unwrap());
        assert_eq!(health.current(), 0);
        assert_eq!(health.death_cooldown(), timer);
    }

    #[test]
    fn test_lethal_damage_clamps_at_zero() {
        let ctx = host();
        let mut health = HealthState::new(3, 60);
        health.take_hit(&ctx, 1, LETHAL_DAMAGE).unwrap();
        assert_eq!(health.current(), 0);
    }

    #[test]
    fn test_revive_restores() {
        let ctx = host();
        let mut health = HealthState::new(3, 60);
        health.take_hit(&ctx, 1, LETHAL_DAMAGE).unwrap();
        health.revive(&ctx).unwrap();
        assert_eq!(health.current(), 3);
        assert!(health.death_cooldown().expired_or_not_running(1000));
    }

    #[cfg(not(feature = "strict-authority"))]
    #[test]
    fn test_client_cannot_damage() {
        let ctx = AuthorityContext::client(ParticipantId::new([2; 16]), ParticipantId::new([1; 16]));
        let mut health = HealthState::new(3, 60);
        assert!(matches!(
            health.take_hit(&ctx, 1, 1),
            Err(AuthorityError::NotAuthoritative { field: "health", .. })
        ));
        assert!(matches!(
            health.revive(&ctx),
            Err(AuthorityError::NotAuthoritative { field: "health", .. })
        ));
        assert_eq!(health.current(), 3);
    }
}
