//! Session Host
//!
//! Owns one world for the lifetime of a session and is its state authority.
//! Participants join and leave, their inputs are buffered per tick, and
//! every tick the host steps the simulation and fans the results out.
//!
//! ```text
//!  SessionCommand ──mpsc──► Session::run ──interval──► run_tick ──► tick()
//!                                 │                        │
//!                                 └─ handle(ClientMessage) └──► ServerMessage ──mpsc──► participants
//! ```
//!
//! A session is constructed explicitly and consumed by [`Session::teardown`].

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::rng::derive_session_seed;
use crate::game::authority::{AuthorityContext, AuthorityError, ParticipantId};
use crate::game::entity::EntityId;
use crate::game::input::InputLog;
use crate::game::lifecycle::{self, RoundState};
use crate::game::state::{Level, World};
use crate::game::tick::{SimConfig, TickInputs, TickResult, tick};
use crate::game::timer::Tick;
use crate::network::protocol::{
    ClientMessage, ErrorCode, InputPacket, ProtocolError, ServerError, ServerMessage,
    WelcomeInfo, WorldSnapshot,
};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum participants.
    pub max_participants: usize,
    /// Ticks of future input buffered per participant.
    pub input_buffer_ticks: usize,
    /// Broadcast a world snapshot every N ticks.
    pub snapshot_interval: u32,
    /// Outbound queue length per participant.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_participants: 16,
            input_buffer_ticks: 128,
            snapshot_interval: 6, // 10 Hz at 60 Hz
            outbound_capacity: 256,
        }
    }
}

/// A joined participant.
#[derive(Debug)]
pub struct SessionParticipant {
    /// Participant identifier.
    pub participant: ParticipantId,
    /// Their player entity.
    pub entity: EntityId,
    /// Inputs received for upcoming ticks.
    pending: InputLog,
    /// Ticks between what they see and what they send.
    pub latency_ticks: u32,
    /// Newest input tick received.
    pub last_input_tick: Option<Tick>,
}

/// Inbound traffic for [`Session::run`].
#[derive(Debug)]
pub enum SessionCommand {
    /// Register the outbound channel of a participant (before `Join`).
    Connect {
        participant: ParticipantId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// A message from a participant.
    Message {
        participant: ParticipantId,
        message: ClientMessage,
    },
}

/// Final per-player numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSummary {
    pub participant: ParticipantId,
    pub nickname: String,
    pub score: i32,
    pub collected_coins: u32,
}

/// What is left of a session after teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: SessionId,
    /// Ticks simulated by this session.
    pub ticks_run: u32,
    /// World tick at teardown.
    pub final_tick: Tick,
    /// World hash at teardown (hex).
    pub final_hash: String,
    /// Rounds decided.
    pub rounds_won: u32,
    /// Players still joined at teardown, in arrival order.
    pub players: Vec<PlayerSummary>,
}

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Session is full.
    #[error("Session is full")]
    SessionFull,

    /// Sender has not joined.
    #[error("Participant {0} has not joined")]
    NotJoined(ParticipantId),

    /// Input for a tick that was already simulated.
    #[error("Input for tick {tick} arrived at host tick {host_tick}")]
    StaleInput { tick: Tick, host_tick: Tick },

    /// Rejected authority write.
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Encoding failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    /// Wire error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::SessionFull => ErrorCode::SessionFull,
            SessionError::NotJoined(_) => ErrorCode::NotJoined,
            SessionError::StaleInput { .. } => ErrorCode::StaleInput,
            SessionError::Authority(_) | SessionError::Protocol(_) => ErrorCode::InternalError,
        }
    }
}

/// One running session.
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    ctx: AuthorityContext,
    sim: SimConfig,
    config: SessionConfig,
    world: World,
    /// Joined participants.
    participants: BTreeMap<ParticipantId, SessionParticipant>,
    /// Outbound channels, registered on connect.
    connections: BTreeMap<ParticipantId, mpsc::Sender<ServerMessage>>,
    ticks_run: u32,
    rounds_won: u32,
}

impl Session {
    /// Create a session hosted by `host` on a level. Spawns the enemy pool.
    pub fn new(host: ParticipantId, level: &Level, sim: SimConfig, config: SessionConfig) -> Result<Self, SessionError> {
        let ctx = AuthorityContext::host(host);
        let id = uuid::Uuid::new_v4().into_bytes();

        // Seed 0 means "not pinned"
        let seed = if sim.seed == 0 { derive_session_seed(&id) } else { sim.seed };
        let mut world = World::new(seed, level, &sim);
        lifecycle::spawn_enemies(&mut world, &ctx, &sim)?;

        info!(session = %hex::encode(&id[..4]), host = %host, seed, "session created");

        Ok(Self {
            id,
            ctx,
            sim,
            config,
            world,
            participants: BTreeMap::new(),
            connections: BTreeMap::new(),
            ticks_run: 0,
            rounds_won: 0,
        })
    }

    /// Authoritative world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Simulation config.
    pub fn sim_config(&self) -> &SimConfig {
        &self.sim
    }

    /// Host context.
    pub fn context(&self) -> AuthorityContext {
        self.ctx
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participant(&self, participant: ParticipantId) -> Option<&SessionParticipant> {
        self.participants.get(&participant)
    }

    /// Register the outbound channel of a participant.
    pub fn connect(&mut self, participant: ParticipantId, sender: mpsc::Sender<ServerMessage>) {
        self.connections.insert(participant, sender);
    }

    /// Join a participant. Joining again returns the existing entity.
    pub fn join(&mut self, participant: ParticipantId, nickname: &str) -> Result<EntityId, SessionError> {
        if let Some(existing) = self.participants.get(&participant) {
            return Ok(existing.entity);
        }
        if self.participants.len() >= self.config.max_participants {
            return Err(SessionError::SessionFull);
        }

        // Roster and participants change together
        let entity = lifecycle::join(&mut self.world, &self.ctx, participant, &self.sim)?;
        self.participants.insert(participant, SessionParticipant {
            participant,
            entity,
            pending: InputLog::with_capacity(self.config.input_buffer_ticks),
            latency_ticks: 0,
            last_input_tick: None,
        });
        if let Some(player) = self.world.player_mut(entity) {
            player.set_nickname(&self.ctx, nickname)?;
        }

        let welcome = ServerMessage::Welcome(WelcomeInfo {
            participant: participant.to_uuid_string(),
            entity: entity.0,
            tick: self.world.tick,
            tick_rate: self.sim.tick_rate,
            seed: self.world.rng_seed,
        });
        self.send_to(participant, welcome);
        let snapshot = WorldSnapshot::encode(&self.world)?;
        self.send_to(participant, ServerMessage::Snapshot(snapshot));
        Ok(entity)
    }

    /// Remove a participant. Unknown participants are a no-op.
    pub fn leave(&mut self, participant: ParticipantId) -> Result<Option<EntityId>, SessionError> {
        let left = lifecycle::leave(&mut self.world, &self.ctx, participant, &self.sim)?;
        self.participants.remove(&participant);
        if let Some(sender) = self.connections.remove(&participant) {
            let _ = sender.try_send(ServerMessage::Shutdown { reason: "left".to_string() });
        }
        Ok(left)
    }

    /// Apply one message from a participant.
    pub fn handle(&mut self, participant: ParticipantId, message: ClientMessage) -> Result<(), SessionError> {
        match message {
            ClientMessage::Join { nickname } => self.join(participant, &nickname).map(|_| ()),
            ClientMessage::Input(packet) => self.buffer_input(participant, &packet),
            ClientMessage::SetNickname { nickname } => {
                let entity = self.entity_of(participant)?;
                if let Some(player) = self.world.player_mut(entity) {
                    if player.set_nickname(&self.ctx, &nickname)? {
                        debug!(participant = %participant, nickname = %player.nickname.get(), "nickname changed");
                    }
                }
                Ok(())
            }
            ClientMessage::Ping { timestamp } => {
                let host_tick = self.world.tick;
                self.send_to(participant, ServerMessage::Pong { timestamp, host_tick });
                Ok(())
            }
            ClientMessage::Leave => self.leave(participant).map(|_| ()),
        }
    }

    /// Like [`Session::handle`], but reports failures back to the sender.
    pub fn handle_or_reply(&mut self, participant: ParticipantId, message: ClientMessage) {
        if let Err(err) = self.handle(participant, message) {
            debug!(participant = %participant, %err, "message rejected");
            let reply = ServerMessage::Error(ServerError {
                code: err.code(),
                message: err.to_string(),
            });
            self.send_to(participant, reply);
        }
    }

    fn entity_of(&self, participant: ParticipantId) -> Result<EntityId, SessionError> {
        self.participants
            .get(&participant)
            .map(|joined| joined.entity)
            .ok_or(SessionError::NotJoined(participant))
    }

    fn buffer_input(&mut self, participant: ParticipantId, packet: &InputPacket) -> Result<(), SessionError> {
        let host_tick = self.world.tick;
        let joined = self
            .participants
            .get_mut(&participant)
            .ok_or(SessionError::NotJoined(participant))?;
        if packet.tick <= host_tick {
            return Err(SessionError::StaleInput {
                tick: packet.tick,
                host_tick,
            });
        }

        joined.pending.insert(packet.tick, packet.to_record());
        joined.latency_ticks = packet.latency_ticks();
        joined.last_input_tick = joined.last_input_tick.max(Some(packet.tick));
        Ok(())
    }

    /// Step the world once and broadcast the results.
    pub fn run_tick(&mut self) -> TickResult {
        let next = self.world.tick.wrapping_add(1);
        let mut inputs = TickInputs::new();
        for (participant, joined) in &mut self.participants {
            if let Some(record) = joined.pending.get(next) {
                inputs.insert(*participant, *record);
            }
            inputs.set_latency(*participant, joined.latency_ticks);
            joined.pending.prune_through(next);
        }

        let round_before: RoundState = *self.world.round.get();
        let result = tick(&mut self.world, &self.ctx, &inputs, &self.sim);
        self.ticks_run += 1;
        if let Some(winner) = result.round_won {
            self.rounds_won += 1;
            info!(session = %hex::encode(&self.id[..4]), winner = %winner, tick = next, "round decided");
        }

        if !result.events.is_empty() {
            self.broadcast(ServerMessage::Events {
                tick: next,
                events: result.events.clone(),
            });
        }
        let round = *self.world.round.get();
        if round != round_before {
            self.broadcast(ServerMessage::Round { tick: next, round });
        }
        if next % self.config.snapshot_interval.max(1) == 0 {
            match WorldSnapshot::encode(&self.world) {
                Ok(snapshot) => self.broadcast(ServerMessage::Snapshot(snapshot)),
                Err(err) => warn!(%err, tick = next, "snapshot encoding failed"),
            }
        }

        result
    }

    /// Current authoritative snapshot.
    pub fn snapshot(&self) -> Result<WorldSnapshot, SessionError> {
        Ok(WorldSnapshot::encode(&self.world)?)
    }

    /// Drive the session from a tokio interval until `max_ticks` ticks have
    /// run, then tear it down. Inbound commands are applied between ticks.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<SessionCommand>, max_ticks: u32) -> SessionSummary {
        let period = Duration::from_micros(1_000_000 / u64::from(self.sim.tick_rate.max(1)));
        let mut interval = tokio::time::interval(period);
        let mut inbox_open = true;

        while self.ticks_run < max_ticks {
            tokio::select! {
                biased;

                command = inbox.recv(), if inbox_open => match command {
                    Some(SessionCommand::Connect { participant, sender }) => self.connect(participant, sender),
                    Some(SessionCommand::Message { participant, message }) => self.handle_or_reply(participant, message),
                    None => inbox_open = false,
                },
                _ = interval.tick() => {
                    self.run_tick();
                }
            }
        }

        self.teardown()
    }

    /// End the session: tell everyone and summarize.
    pub fn teardown(self) -> SessionSummary {
        let players = self
            .world
            .roster
            .get()
            .iter()
            .filter_map(|entry| {
                let player = self.world.player(entry.entity)?;
                Some(PlayerSummary {
                    participant: entry.participant,
                    nickname: player.nickname.get().clone(),
                    score: player.score.value(),
                    collected_coins: player.collected_coins.value(),
                })
            })
            .collect();

        self.broadcast(ServerMessage::Shutdown { reason: "session over".to_string() });

        let summary = SessionSummary {
            id: self.id,
            ticks_run: self.ticks_run,
            final_tick: self.world.tick,
            final_hash: hex::encode(self.world.compute_hash()),
            rounds_won: self.rounds_won,
            players,
        };
        info!(
            session = %hex::encode(&self.id[..4]),
            ticks = summary.ticks_run,
            rounds = summary.rounds_won,
            hash = %&summary.final_hash[..16],
            "session torn down"
        );
        summary
    }

    fn send_to(&self, participant: ParticipantId, message: ServerMessage) {
        if let Some(sender) = self.connections.get(&participant) {
            if let Err(err) = sender.try_send(message) {
                debug!(participant = %participant, %err, "outbound message dropped");
            }
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        for participant in self.participants.keys() {
            self.send_to(*participant, message.clone());
        }
    }

    /// Outbound queue length for new connections.
    pub fn outbound_capacity(&self) -> usize {
        self.config.outbound_capacity
    }
}
