//! Interactables
//!
//! Passive level objects whose state is nothing but a tick timer and a flag
//! re-derived from it every tick, so they replay identically.
//!
//! ## Coin
//!
//! ```text
//!  enabled ──collect(T)──► disabled ──T + refresh──► enabled
//! ```
//!
//! ## Falling platform
//!
//! ```text
//!  active ──contact(T)──► active, falling ──T + fall──► inactive
//!         ◄──────────── + reactivation ─────────────────┘
//! ```
//!
//! Coins are collected only on the authority. Platforms are predicted on
//! every participant, but only the authority starts a fall.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, ticks_from_seconds, to_fixed};
use crate::core::vec3::FixedVec3;
use crate::game::authority::{AuthorityContext, AuthorityError, Guarded};
use crate::game::controller::Surface;
use crate::game::timer::{Tick, TickTimer};

/// Interactable tuning, in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractableConfig {
    /// Coin reappears after this long
    pub coin_refresh_seconds: Fixed,
    /// Coin pickup radius
    pub coin_radius: Fixed,
    /// Delay between contact and the platform dropping
    pub platform_fall_seconds: Fixed,
    /// Delay before a dropped platform comes back
    pub platform_reactivation_seconds: Fixed,
}

impl Default for InteractableConfig {
    fn default() -> Self {
        Self {
            coin_refresh_seconds: to_fixed(4.0),
            coin_radius: to_fixed(0.75),
            platform_fall_seconds: to_fixed(0.2),
            platform_reactivation_seconds: to_fixed(1.0),
        }
    }
}

// =============================================================================
// COIN
// =============================================================================

/// Collectible that refreshes after a cooldown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Level-local id
    pub id: u32,
    /// Center of the pickup sphere
    pub position: FixedVec3,
    /// Pickup radius
    pub radius: Fixed,
    /// Refresh cooldown in ticks
    pub refresh_ticks: u32,
    cooldown: Guarded<TickTimer>,
    trigger_enabled: bool,
}

impl Coin {
    /// Coin ready to be collected.
    pub fn new(id: u32, position: FixedVec3, radius: Fixed, refresh_ticks: u32) -> Self {
        Self {
            id,
            position,
            radius,
            refresh_ticks,
            cooldown: Guarded::new(TickTimer::NONE),
            trigger_enabled: false,
        }
    }

    /// Re-derive the pickup trigger from the cooldown.
    pub fn fixed_update(&mut self, ctx: &AuthorityContext, tick: Tick) {
        self.trigger_enabled = ctx.is_authoritative() && self.cooldown.value().expired_or_not_running(tick);
    }

    /// Can a player pick this coin up this tick?
    #[inline]
    pub fn trigger_enabled(&self) -> bool {
        self.trigger_enabled
    }

    /// Should the coin be drawn?
    #[inline]
    pub fn is_visible(&self, tick: Tick) -> bool {
        self.cooldown.value().expired_or_not_running(tick)
    }

    /// Pick the coin up: hide it and start the refresh cooldown.
    pub fn collect(&mut self, ctx: &AuthorityContext, tick: Tick) -> Result<(), AuthorityError> {
        self.cooldown.set(ctx, "coin_cooldown", TickTimer::start(tick, self.refresh_ticks))?;
        self.trigger_enabled = false;
        Ok(())
    }
}

// =============================================================================
// FALLING PLATFORM
// =============================================================================

/// What a platform did this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformTransition {
    /// Dropped away; collider off
    Fell,
    /// Back in place; collider on
    Reactivated,
}

/// Platform that drops shortly after someone steps on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallingPlatform {
    /// Level-local id
    pub id: u32,
    /// Walkable top face while active
    pub surface: Surface,
    /// Contact-to-fall delay in ticks
    pub fall_ticks: u32,
    /// Fall-to-reactivation delay in ticks
    pub reactivation_ticks: u32,
    is_active: bool,
    cooldown: TickTimer,
}

impl FallingPlatform {
    /// Active platform at rest.
    pub fn new(id: u32, surface: Surface, fall_ticks: u32, reactivation_ticks: u32) -> Self {
        Self {
            id,
            surface: Surface { platform: Some(id), ..surface },
            fall_ticks,
            reactivation_ticks,
            is_active: true,
            cooldown: TickTimer::NONE,
        }
    }

    /// Platform built from tuning in seconds.
    pub fn from_config(id: u32, surface: Surface, config: &InteractableConfig, tick_rate: u32) -> Self {
        Self::new(
            id,
            surface,
            ticks_from_seconds(config.platform_fall_seconds, tick_rate),
            ticks_from_seconds(config.platform_reactivation_seconds, tick_rate),
        )
    }

    /// Is the collider on?
    #[inline]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Pending fall or reactivation.
    #[inline]
    pub fn cooldown(&self) -> TickTimer {
        self.cooldown
    }

    /// Advance the fall/reactivation cycle. Runs on every participant.
    ///
    /// Must run before characters move so the collider state is settled.
    pub fn fixed_update(&mut self, tick: Tick) -> Option<PlatformTransition> {
        if !self.cooldown.is_expired(tick) {
            return None;
        }

        if self.is_active {
            self.is_active = false;
            self.cooldown = TickTimer::start(tick, self.reactivation_ticks);
            Some(PlatformTransition::Fell)
        } else {
            self.is_active = true;
            self.cooldown = TickTimer::NONE;
            Some(PlatformTransition::Reactivated)
        }
    }

    /// A player touched the platform. Returns whether a fall was scheduled.
    pub fn on_contact(&mut self, ctx: &AuthorityContext, tick: Tick) -> Result<bool, AuthorityError> {
        ctx.check_authoritative("platform")?;
        if !self.is_active || self.cooldown.is_running(tick) {
            return Ok(false);
        }
        self.cooldown = TickTimer::start(tick, self.fall_ticks);
        Ok(true)
    }

    /// Surface to collide with, when active.
    #[inline]
    pub fn collider(&self) -> Option<Surface> {
        self.is_active.then_some(self.surface)
    }
}

// =============================================================================
// TESTS
// =============================================================================
