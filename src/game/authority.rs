//! Authority Model
//!
//! Decides who may change what. Every participant runs the same simulation
//! code, but only the session host's writes to authority-owned state are
//! ground truth. Everything else a client computes is a prediction that the
//! next authoritative snapshot overwrites.
//!
//! ## Roles
//!
//! ```text
//! ┌─────────────────┬──────────────────────────────────────────────┐
//! │ Authoritative   │ session host; may write every field          │
//! │ Driving         │ owns the input for one entity; predicts it   │
//! │ None            │ observer; reads replicated state only        │
//! └─────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! Authority-owned fields are wrapped in [`Guarded`], whose only write path
//! checks the caller's [`AuthorityContext`].

use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::warn;

// =============================================================================
// PARTICIPANT ID
// =============================================================================

/// Unique participant identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub [u8; 16]);

impl ParticipantId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random id (host side only, never inside a tick).
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

// =============================================================================
// ROLES AND CONTEXT
// =============================================================================

/// What a participant may do with a given entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityRole {
    /// Observer: reads replicated state only.
    None,
    /// Supplies the entity's input and predicts its movement.
    Driving,
    /// Session host: every write is ground truth.
    Authoritative,
}

/// Rejected write to authority-owned state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityError {
    /// Caller is not the state authority.
    #[error("participant {participant} is not authoritative for {field}")]
    NotAuthoritative {
        /// Short id of the offending participant.
        participant: String,
        /// What was being written.
        field: &'static str,
    },
}

/// Who is running the simulation right now, and in which mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorityContext {
    /// The participant executing this tick.
    pub local: ParticipantId,
    /// The session host.
    pub state_authority: ParticipantId,
    /// True while re-running a past tick during reconciliation.
    pub resimulating: bool,
}

impl AuthorityContext {
    /// Context for the session host itself.
    pub fn host(host: ParticipantId) -> Self {
        Self {
            local: host,
            state_authority: host,
            resimulating: false,
        }
    }

    /// Context for a client predicting against `host`.
    pub fn client(local: ParticipantId, host: ParticipantId) -> Self {
        Self {
            local,
            state_authority: host,
            resimulating: false,
        }
    }

    /// Same participant, flagged as re-running past ticks.
    pub fn resimulation(self) -> Self {
        Self { resimulating: true, ..self }
    }

    /// Is the local participant the state authority?
    #[inline]
    pub fn is_authoritative(&self) -> bool {
        self.local == self.state_authority
    }

    /// Role of the local participant for an entity driven by `driver`.
    pub fn role_for(&self, driver: Option<ParticipantId>) -> AuthorityRole {
        if self.is_authoritative() {
            AuthorityRole::Authoritative
        } else if driver == Some(self.local) {
            AuthorityRole::Driving
        } else {
            AuthorityRole::None
        }
    }

    /// Does the local participant simulate an entity driven by `driver`?
    #[inline]
    pub fn simulates(&self, driver: Option<ParticipantId>) -> bool {
        self.role_for(driver) != AuthorityRole::None
    }

    /// Reject (and log) a write to authority-owned state by a non-authority.
    pub fn check_authoritative(&self, field: &'static str) -> Result<(), AuthorityError> {
        if self.is_authoritative() {
            return Ok(());
        }

        warn!(
            participant = %self.local,
            field,
            "rejected write to authority-owned state"
        );

        debug_assert!(
            !cfg!(feature = "strict-authority"),
            "non-authoritative write to {}",
            field
        );

        Err(AuthorityError::NotAuthoritative {
            participant: self.local.short(),
            field,
        })
    }
}

// =============================================================================
// GUARDED FIELD
// =============================================================================

/// An authority-owned value.
///
/// Reads are free. Writes go through [`AuthorityContext::check_authoritative`],
/// so a predicting client cannot silently diverge authority-owned state.
/// Serializes as the bare inner value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guarded<T> {
    value: T,
}

impl<T> Guarded<T> {
    /// Initial value, set when the entity is created.
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replace the value. `field` names the state in rejection logs.
    pub fn set(&mut self, ctx: &AuthorityContext, field: &'static str, value: T) -> Result<(), AuthorityError> {
        ctx.check_authoritative(field)?;
        self.value = value;
        Ok(())
    }

    /// Mutate the value in place.
    pub fn modify<R>(
        &mut self,
        ctx: &AuthorityContext,
        field: &'static str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, AuthorityError> {
        ctx.check_authoritative(field)?;
        Ok(f(&mut self.value))
    }
}

impl<T: PartialEq> Guarded<T> {
    /// Write only when the value actually changes. Returns whether it did.
    ///
    /// Makes a repeated reliable message (e.g. a nickname) idempotent.
    pub fn set_if_different(
        &mut self,
        ctx: &AuthorityContext,
        field: &'static str,
        value: T,
    ) -> Result<bool, AuthorityError> {
        ctx.check_authoritative(field)?;
        if self.value == value {
            return Ok(false);
        }
        self.value = value;
        Ok(true)
    }
}

impl<T: Copy> Guarded<T> {
    /// Copy out the current value.
    #[inline]
    pub fn value(&self) -> T {
        self.value
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> ParticipantId {
        ParticipantId::new([1; 16])
    }

    fn client() -> ParticipantId {
        ParticipantId::new([2; 16])
    }

    #[test]
    fn test_roles() {
        let on_host = AuthorityContext::host(host());
        let on_client = AuthorityContext::client(client(), host());

        assert_eq!(on_host.role_for(Some(client())), AuthorityRole::Authoritative);
        assert_eq!(on_client.role_for(Some(client())), AuthorityRole::Driving);
        assert_eq!(on_client.role_for(Some(ParticipantId::new([3; 16]))), AuthorityRole::None);
        assert_eq!(on_client.role_for(None), AuthorityRole::None);
        assert!(on_client.simulates(Some(client())));
        assert!(!on_client.simulates(None));
    }

    #[cfg(not(feature = "strict-authority"))]
    #[test]
    fn test_guard_rejects_non_authority() {
        let mut score = Guarded::new(0i32);
        let on_client = AuthorityContext::client(client(), host());

        let result = score.set(&on_client, "score", 5);
        assert!(matches!(result, Err(AuthorityError::NotAuthoritative { field: "score", .. })));
        assert!(result.unwrap_err().to_string().ends_with("not authoritative for score"));
        assert_eq!(*score.get(), 0);

        assert!(score.modify(&on_client, "score", |s| *s += 1).is_err());
        assert_eq!(score.value(), 0);
    }

    #[test]
    fn test_guard_accepts_authority() {
        let mut score = Guarded::new(0i32);
        let on_host = AuthorityContext::host(host());

        score.set(&on_host, "score", 5).unwrap();
        let doubled = score.modify(&on_host, "score", |s| {
            *s *= 2;
            *s
        }).unwrap();
        assert_eq!(doubled, 10);
        assert_eq!(score.value(), 10);
    }

    #[test]
    fn test_set_if_different_is_idempotent() {
        let mut nickname = Guarded::new(String::new());
        let on_host = AuthorityContext::host(host());

        assert!(nickname.set_if_different(&on_host, "nickname", "ada".to_string()).unwrap());
        assert!(!nickname.set_if_different(&on_host, "nickname", "ada".to_string()).unwrap());
        assert_eq!(nickname.get(), "ada");
    }

    #[test]
    fn test_guarded_serializes_transparently() {
        let guarded = Guarded::new(7u32);
        assert_eq!(serde_json::to_string(&guarded).unwrap(), "7");
    }

    #[test]
    fn test_participant_id_uuid_round_trip() {
        let id = ParticipantId::random();
        let parsed = ParticipantId::from_uuid_str(&id.to_uuid_string());
        assert_eq!(parsed, Some(id));
        assert_eq!(id.short().len(), 8);
    }
}
