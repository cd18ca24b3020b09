//! Tickbound Session Host
//!
//! Runs one session on the demo level with bot participants. One bot
//! predicts locally and reconciles against the host's snapshots, so a run
//! exercises the whole loop.
//!
//! Environment: `RUST_LOG`, `TICKBOUND_BOTS`, `TICKBOUND_TICKS`, plus the
//! `SimConfig::from_env` variables.

use std::time::Duration;
use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tickbound::{
    VERSION, FixedVec2,
    core::fixed::from_int,
    game::{
        authority::ParticipantId,
        input::{Button, InputRecord},
        prediction::ClientPredictor,
        state::{Level, World},
        tick::SimConfig,
        timer::Tick,
    },
    network::{
        protocol::{ClientMessage, InputPacket, ServerMessage},
        session::{Session, SessionCommand, SessionConfig},
    },
};

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let sim = SimConfig::from_env();
    let bots: u8 = env_or("TICKBOUND_BOTS", 3);
    let ticks: u32 = env_or("TICKBOUND_TICKS", sim.tick_rate * 20);

    info!("Tickbound host v{}", VERSION);
    info!("Tick Rate: {} Hz, seed {}, {} bots, {} ticks", sim.tick_rate, sim.seed, bots, ticks);

    let host = ParticipantId::random();
    let session_config = SessionConfig::default();
    let capacity = session_config.outbound_capacity;
    let session = Session::new(host, &Level::demo(), sim.clone(), session_config).context("creating session")?;

    let (inbox_tx, inbox_rx) = mpsc::channel(1024);
    let mut bot_tasks = Vec::new();
    for index in 0..bots {
        let participant = ParticipantId::random();
        let (out_tx, out_rx) = mpsc::channel(capacity);
        inbox_tx
            .send(SessionCommand::Connect { participant, sender: out_tx })
            .await
            .context("session inbox closed")?;
        let bot = Bot {
            index,
            participant,
            host,
            inbox: inbox_tx.clone(),
            sim: sim.clone(),
        };
        bot_tasks.push(tokio::spawn(bot.run(out_rx, index == 0)));
    }
    drop(inbox_tx);

    let summary = tokio::spawn(session.run(inbox_rx, ticks)).await.context("session task failed")?;
    for task in bot_tasks {
        let report = task.await.context("bot task failed")?;
        info!(
            bot = report.index,
            snapshots = report.snapshots,
            reconciliations = report.reconciliations,
            mispredictions = report.mispredictions,
            "bot finished"
        );
    }

    info!("=== Session Results ===");
    info!("Ticks: {} (final tick {})", summary.ticks_run, summary.final_tick);
    info!("Rounds won: {}", summary.rounds_won);
    info!("Final State Hash: {}", summary.final_hash);
    for player in &summary.players {
        info!(
            "{} ({}) - score {}, coins {}",
            player.nickname,
            player.participant.short(),
            player.score,
            player.collected_coins
        );
    }
    Ok(())
}

struct BotReport {
    index: u8,
    snapshots: u32,
    reconciliations: u64,
    mispredictions: u64,
}

struct Bot {
    index: u8,
    participant: ParticipantId,
    host: ParticipantId,
    inbox: mpsc::Sender<SessionCommand>,
    sim: SimConfig,
}

impl Bot {
    /// Scripted input: walk in a slowly turning circle, jump and fire now
    /// and then.
    fn input_for(&self, tick: Tick) -> InputRecord {
        let phase = tick.wrapping_add(u32::from(self.index) * 97);
        let yaw = from_int((phase % 360) as i32);
        let mut record = InputRecord::with_movement(0, 127).looking(FixedVec2::new(0, yaw));
        if phase % 90 < 3 {
            record = record.pressing(Button::Jump);
        }
        if phase % 45 == 0 {
            record = record.pressing(Button::Fire);
        }
        if phase % 240 < 120 {
            record = record.pressing(Button::Sprint);
        }
        record
    }

    async fn send(&self, message: ClientMessage) -> bool {
        self.inbox
            .send(SessionCommand::Message { participant: self.participant, message })
            .await
            .is_ok()
    }

    async fn run(self, mut outbound: mpsc::Receiver<ServerMessage>, predicting: bool) -> BotReport {
        let mut report = BotReport {
            index: self.index,
            snapshots: 0,
            reconciliations: 0,
            mispredictions: 0,
        };
        if !self.send(ClientMessage::Join { nickname: format!("bot-{}", self.index) }).await {
            return report;
        }

        let mut predictor = ClientPredictor::new(self.participant, self.host);
        let mut predicted: Option<World> = None;
        let mut host_tick: Tick = 0;
        let mut confirmed_tick: Tick = 0;
        let period = Duration::from_micros(1_000_000 / u64::from(self.sim.tick_rate.max(1)));
        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                message = outbound.recv() => {
                    let Some(message) = message else { break };
                    match message {
                        ServerMessage::Welcome(info) => host_tick = info.tick,
                        ServerMessage::Snapshot(snapshot) => {
                            report.snapshots += 1;
                            host_tick = host_tick.max(snapshot.tick);
                            confirmed_tick = snapshot.tick;
                            if !predicting {
                                continue;
                            }
                            match snapshot.decode() {
                                Ok(world) => match predicted.as_mut() {
                                    Some(local) => {
                                        predictor.reconcile(local, world, &self.sim);
                                    }
                                    None => predicted = Some(world),
                                },
                                Err(err) => warn!(bot = self.index, %err, "bad snapshot"),
                            }
                        }
                        ServerMessage::Events { tick, .. } | ServerMessage::Round { tick, .. } => {
                            host_tick = host_tick.max(tick);
                        }
                        ServerMessage::Error(error) => debug!(bot = self.index, code = ?error.code, "host rejected message"),
                        ServerMessage::Shutdown { .. } => break,
                        ServerMessage::Pong { .. } => {}
                    }
                }
                _ = interval.tick() => {
                    let packet = match predicted.as_mut() {
                        Some(local) => {
                            // Stay a couple of ticks ahead of the host
                            while local.tick < host_tick.wrapping_add(2) {
                                let next = local.tick.wrapping_add(1);
                                let record = self.input_for(next);
                                predictor.predict(local, record, &self.sim);
                                let packet = InputPacket::from_record(next, &record).acknowledging(confirmed_tick);
                                if !self.send(ClientMessage::Input(packet)).await {
                                    break;
                                }
                            }
                            None
                        }
                        None => {
                            let next = host_tick.wrapping_add(2);
                            Some(InputPacket::from_record(next, &self.input_for(next)).acknowledging(confirmed_tick))
                        }
                    };
                    if let Some(packet) = packet {
                        if !self.send(ClientMessage::Input(packet)).await {
                            break;
                        }
                    }
                }
            }
        }

        let stats = predictor.stats();
        report.reconciliations = stats.reconciliations;
        report.mispredictions = stats.mispredictions;
        report
    }
}
