//! Client Prediction
//!
//! A client runs the same [`tick`] as the host, but only for the player it
//! drives. Every consumed input is logged. When an authoritative world
//! arrives, the local world is overwritten wholesale and the ticks the host
//! has not confirmed yet are re-run from the log.
//!
//! ```text
//!  confirmed            predicted
//!      │                    │
//!  ────●────────────────────●───►  ticks
//!      └─ overwrite_with ──►└── resimulate (events discarded)
//! ```
//!
//! Events produced while resimulating are dropped: they were already
//! reported the first time the tick was predicted.

use std::collections::BTreeMap;
use tracing::debug;

use crate::game::authority::{AuthorityContext, ParticipantId};
use crate::game::input::{InputLog, InputRecord};
use crate::game::movement::MovementState;
use crate::game::state::World;
use crate::game::tick::{SimConfig, TickInputs, TickResult, tick};
use crate::game::timer::Tick;

/// Outcome of one reconciliation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Tick of the authoritative world
    pub confirmed_tick: Tick,
    /// Ticks re-run on top of it
    pub resimulated: u32,
    /// Local player state at the confirmed tick differed from the prediction
    pub mispredicted: bool,
}

/// Running totals for logs and debug overlays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PredictionStats {
    pub reconciliations: u64,
    pub mispredictions: u64,
    pub resimulated_ticks: u64,
}

/// Prediction state of one client.
#[derive(Clone, Debug)]
pub struct ClientPredictor {
    local: ParticipantId,
    host: ParticipantId,
    inputs: InputLog,
    /// Predicted local movement after each tick
    predicted: BTreeMap<Tick, MovementState>,
    latency_ticks: u32,
    stats: PredictionStats,
}

impl ClientPredictor {
    /// Predictor for `local` playing against `host`.
    pub fn new(local: ParticipantId, host: ParticipantId) -> Self {
        Self::with_log(local, host, InputLog::default())
    }

    /// Predictor with a custom input log (capacity bounds resimulation).
    pub fn with_log(local: ParticipantId, host: ParticipantId, inputs: InputLog) -> Self {
        Self {
            local,
            host,
            inputs,
            predicted: BTreeMap::new(),
            latency_ticks: 0,
            stats: PredictionStats::default(),
        }
    }

    /// Context for live prediction.
    pub fn context(&self) -> AuthorityContext {
        AuthorityContext::client(self.local, self.host)
    }

    pub fn local(&self) -> ParticipantId {
        self.local
    }

    /// Logged inputs.
    pub fn inputs(&self) -> &InputLog {
        &self.inputs
    }

    pub fn stats(&self) -> PredictionStats {
        self.stats
    }

    /// Measured round trip in ticks, forwarded to lag-compensated fire.
    pub fn set_latency(&mut self, ticks: u32) {
        self.latency_ticks = ticks;
    }

    /// Predict the next tick with the local input.
    ///
    /// A tick that was already logged keeps its original record.
    pub fn predict(&mut self, world: &mut World, record: InputRecord, config: &SimConfig) -> TickResult {
        let next = world.tick.wrapping_add(1);
        self.inputs.insert(next, record);

        let ctx = self.context();
        let result = tick(world, &ctx, &self.inputs_for(next), config);
        self.remember(world);
        result
    }

    /// Adopt an authoritative world and re-run the unconfirmed ticks.
    pub fn reconcile(&mut self, world: &mut World, authoritative: World, config: &SimConfig) -> Reconciliation {
        let confirmed_tick = authoritative.tick;
        let predicted_tick = world.tick;

        let mispredicted = match (self.predicted.get(&confirmed_tick), local_movement(&authoritative, self.local)) {
            (Some(predicted), Some(actual)) => *predicted != actual,
            _ => false,
        };

        world.overwrite_with(authoritative);
        self.inputs.prune_through(confirmed_tick);
        self.predicted = self.predicted.split_off(&confirmed_tick.saturating_add(1));

        let ctx = self.context().resimulation();
        let mut resimulated = 0;
        while world.tick < predicted_tick {
            let next = world.tick.wrapping_add(1);
            // Already reported when first predicted
            let _ = tick(world, &ctx, &self.inputs_for(next), config);
            self.remember(world);
            resimulated += 1;
        }

        self.stats.reconciliations += 1;
        self.stats.resimulated_ticks += u64::from(resimulated);
        if mispredicted {
            self.stats.mispredictions += 1;
            debug!(participant = %self.local, confirmed_tick, resimulated, "misprediction corrected");
        }

        Reconciliation {
            confirmed_tick,
            resimulated,
            mispredicted,
        }
    }

    fn inputs_for(&self, tick: Tick) -> TickInputs {
        let mut inputs = TickInputs::new();
        if let Some(record) = self.inputs.get(tick) {
            inputs.insert(self.local, *record);
        }
        inputs.set_latency(self.local, self.latency_ticks);
        inputs
    }

    fn remember(&mut self, world: &World) {
        if let Some(movement) = local_movement(world, self.local) {
            self.predicted.insert(world.tick, movement);
        }
        while self.predicted.len() > self.inputs.capacity() {
            self.predicted.pop_first();
        }
    }
}

fn local_movement(world: &World, participant: ParticipantId) -> Option<MovementState> {
    let entity = world.player_of(participant)?;
    world.player(entity).map(|player| player.movement)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::from_int;
    use crate::game::events::GameEventData;
    use crate::game::input::Button;
    use crate::game::lifecycle;
    use crate::game::state::Level;

    const HOST: ParticipantId = ParticipantId::new([1; 16]);
    const ALICE: ParticipantId = ParticipantId::new([2; 16]);

    fn setup() -> (World, SimConfig) {
        let config = SimConfig::default();
        let host = AuthorityContext::host(HOST);
        let mut world = World::new(3, &Level::flat(from_int(50)), &config);
        lifecycle::join(&mut world, &host, ALICE, &config).unwrap();
        // Settle on the ground
        tick(&mut world, &host, &TickInputs::new(), &config);
        (world, config)
    }

    fn input_at(tick: Tick) -> InputRecord {
        let record = InputRecord::with_movement(if tick % 7 < 3 { 1 } else { -1 }, 1);
        if (4..=6).contains(&tick) {
            record.pressing(Button::Jump)
        } else {
            record
        }
    }

    fn host_tick(world: &mut World, record: Option<InputRecord>, config: &SimConfig) {
        let mut inputs = TickInputs::new();
        if let Some(record) = record {
            inputs.insert(ALICE, record);
        }
        tick(world, &AuthorityContext::host(HOST), &inputs, config);
    }

    #[test]
    fn test_reconcile_reproduces_host() {
        let (mut host_world, config) = setup();
        let mut client_world = host_world.clone();
        let mut predictor = ClientPredictor::new(ALICE, HOST);

        for t in 2..=10 {
            predictor.predict(&mut client_world, input_at(t), &config);
        }
        for t in 2..=6 {
            host_tick(&mut host_world, Some(input_at(t)), &config);
        }

        let result = predictor.reconcile(&mut client_world, host_world.clone(), &config);
        assert_eq!(result.confirmed_tick, 6);
        assert_eq!(result.resimulated, 4);
        assert!(!result.mispredicted);
        assert_eq!(client_world.tick, 10);

        for t in 7..=10 {
            host_tick(&mut host_world, Some(input_at(t)), &config);
        }
        assert_eq!(client_world.compute_hash(), host_world.compute_hash());
    }

    #[test]
    fn test_lost_input_is_mispredicted_then_corrected() {
        let (mut host_world, config) = setup();
        let mut client_world = host_world.clone();
        let mut predictor = ClientPredictor::new(ALICE, HOST);

        for t in 2..=10 {
            predictor.predict(&mut client_world, input_at(t), &config);
        }
        for t in 2..=6 {
            let record = if t == 3 { None } else { Some(input_at(t)) };
            host_tick(&mut host_world, record, &config);
        }

        let result = predictor.reconcile(&mut client_world, host_world.clone(), &config);
        assert!(result.mispredicted);
        assert_eq!(predictor.stats().mispredictions, 1);
        assert_eq!(predictor.inputs().latest_tick(), Some(10));

        for t in 7..=10 {
            host_tick(&mut host_world, Some(input_at(t)), &config);
        }
        assert_eq!(client_world.compute_hash(), host_world.compute_hash());
    }

    #[test]
    fn test_jump_fires_once_across_resimulation() {
        let (mut host_world, config) = setup();
        let mut client_world = host_world.clone();
        let mut predictor = ClientPredictor::new(ALICE, HOST);
        let count_jumps = |result: &TickResult| {
            result
                .events
                .iter()
                .filter(|event| matches!(event.data, GameEventData::JumpStarted { .. }))
                .count()
        };

        let mut jumps = 0;
        for t in 2..=8 {
            jumps += count_jumps(&predictor.predict(&mut client_world, input_at(t), &config));
        }
        for t in 2..=4 {
            host_tick(&mut host_world, Some(input_at(t)), &config);
        }
        predictor.reconcile(&mut client_world, host_world.clone(), &config);
        predictor.reconcile(&mut client_world, host_world.clone(), &config);
        for t in 9..=12 {
            jumps += count_jumps(&predictor.predict(&mut client_world, input_at(t), &config));
        }

        assert_eq!(jumps, 1);
        let entity = client_world.player_of(ALICE).unwrap();
        assert!(client_world.player(entity).unwrap().movement.is_jumping);
    }

    #[test]
    fn test_relogged_tick_keeps_original_input() {
        let (mut world, config) = setup();
        let mut predictor = ClientPredictor::new(ALICE, HOST);
        predictor.predict(&mut world, input_at(2), &config);

        predictor.inputs.insert(2, InputRecord::neutral());
        assert_eq!(predictor.inputs().get(2), Some(&input_at(2)));
    }

    #[test]
    fn test_authority_ahead_of_prediction() {
        let (mut host_world, config) = setup();
        let mut client_world = host_world.clone();
        let mut predictor = ClientPredictor::new(ALICE, HOST);

        predictor.predict(&mut client_world, input_at(2), &config);
        for t in 2..=5 {
            host_tick(&mut host_world, Some(input_at(t)), &config);
        }

        let result = predictor.reconcile(&mut client_world, host_world.clone(), &config);
        assert_eq!(result.resimulated, 0);
        assert_eq!(client_world.tick, 5);
        assert!(predictor.inputs().is_empty());
    }
}
