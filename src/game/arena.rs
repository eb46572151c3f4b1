//! Arena - the authoritative match task
//!
//! One `Arena` task owns the [`BattleEngine`]. Market refreshes, battle ticks,
//! the round restart timer and operator commands are all handled inside its
//! select loop, so every mutation runs to completion before the next begins.
//! Viewers talk to it through a cloneable [`ArenaHandle`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::market::{FeedError, MarketData, MarketFeed, MarketSnapshot, Trend};
use crate::util::time::unix_millis;
use crate::ws::protocol::ServerMsg;

use super::engine::{BattleEngine, BattleStats, RoundEnd, TickOutcome};
use super::scenario::Scenario;
use super::side::{Pair, Side};
use super::snapshot::SnapshotBuilder;

const REQUEST_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Privileged operations, only reachable through an [`OperatorHandle`]
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    /// Evaluate a battle tick now; the engine's guards still apply
    TriggerBattle,
    ResetGame,
    /// Override the scenario without touching the battle
    ForceScenario(Scenario),
    SetHealth(Pair<f64>),
    /// Move a side's market by a percentage
    Nudge { side: Side, percent: f64 },
    SetTrend { side: Side, trend: Trend },
    SetVolatility(f64),
    SetManualMode(bool),
    ResetMarket,
}

/// Arena errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArenaError {
    #[error("Arena task is not running")]
    Closed,

    #[error(transparent)]
    Feed(#[from] FeedError),
}

enum ArenaRequest {
    InitialState {
        reply: oneshot::Sender<ServerMsg>,
    },
    Stats {
        reply: oneshot::Sender<BattleStats>,
    },
    Admin {
        command: AdminCommand,
        reply: oneshot::Sender<Result<(), ArenaError>>,
    },
}

/// What a connected viewer is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerRole {
    Spectator,
    Operator,
}

#[derive(Debug, Clone)]
pub struct Viewer {
    pub role: ViewerRole,
    pub connected_at: DateTime<Utc>,
}

/// Scheduling parameters for the arena loop
#[derive(Debug, Clone, Copy)]
struct ArenaTiming {
    battle_interval: Duration,
    market_refresh_interval: Duration,
    round_restart_delay: Duration,
}

/// Deferred start of the next round
#[derive(Debug, Clone, Copy)]
struct PendingRound {
    epoch: u64,
    deadline: Instant,
}

/// Read-only access to the arena plus viewer bookkeeping
#[derive(Clone)]
pub struct ArenaHandle {
    request_tx: mpsc::Sender<ArenaRequest>,
    events_tx: broadcast::Sender<ServerMsg>,
    viewers: Arc<DashMap<Uuid, Viewer>>,
}

impl ArenaHandle {
    /// Subscribe to broadcast events. Subscribe before requesting the
    /// initial state so no event falls between the two.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    pub async fn initial_state(&self) -> Result<ServerMsg, ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.request(ArenaRequest::InitialState { reply }).await?;
        rx.await.map_err(|_| ArenaError::Closed)
    }

    pub async fn stats(&self) -> Result<BattleStats, ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.request(ArenaRequest::Stats { reply }).await?;
        rx.await.map_err(|_| ArenaError::Closed)
    }

    /// Operator capability, only granted to the operator role
    pub fn operator(&self, role: ViewerRole) -> Option<OperatorHandle> {
        match role {
            ViewerRole::Operator => Some(OperatorHandle {
                request_tx: self.request_tx.clone(),
            }),
            ViewerRole::Spectator => None,
        }
    }

    /// Register a viewer and broadcast the new count
    pub fn viewer_joined(&self, viewer_id: Uuid, role: ViewerRole) -> usize {
        self.viewers.insert(
            viewer_id,
            Viewer {
                role,
                connected_at: Utc::now(),
            },
        );
        self.broadcast_viewer_count()
    }

    /// Remove a viewer and broadcast the new count
    pub fn viewer_left(&self, viewer_id: Uuid) -> usize {
        if let Some((_, viewer)) = self.viewers.remove(&viewer_id) {
            let connected_secs = (Utc::now() - viewer.connected_at).num_seconds();
            debug!(viewer_id = %viewer_id, role = ?viewer.role, connected_secs, "Viewer left");
        }
        self.broadcast_viewer_count()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    pub fn operator_count(&self) -> usize {
        self.viewers
            .iter()
            .filter(|v| v.value().role == ViewerRole::Operator)
            .count()
    }

    fn broadcast_viewer_count(&self) -> usize {
        let count = self.viewers.len();
        let _ = self.events_tx.send(ServerMsg::UserCount(count));
        count
    }

    async fn request(&self, request: ArenaRequest) -> Result<(), ArenaError> {
        self.request_tx
            .send(request)
            .await
            .map_err(|_| ArenaError::Closed)
    }
}

/// Handle for privileged commands
#[derive(Clone)]
pub struct OperatorHandle {
    request_tx: mpsc::Sender<ArenaRequest>,
}

impl OperatorHandle {
    pub async fn execute(&self, command: AdminCommand) -> Result<(), ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.request_tx
            .send(ArenaRequest::Admin { command, reply })
            .await
            .map_err(|_| ArenaError::Closed)?;
        rx.await.map_err(|_| ArenaError::Closed)?
    }
}

/// The authoritative arena task
pub struct Arena {
    engine: BattleEngine,
    feed: Arc<dyn MarketFeed>,
    /// Last snapshot successfully pulled from the feed
    market: MarketData,
    snapshots: SnapshotBuilder,
    timing: ArenaTiming,
    pending_round: Option<PendingRound>,
    request_rx: mpsc::Receiver<ArenaRequest>,
    events_tx: broadcast::Sender<ServerMsg>,
}

impl Arena {
    /// Create the arena and the handle viewers use to reach it
    pub fn new(config: &Config, feed: Arc<dyn MarketFeed>) -> (Self, ArenaHandle) {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let handle = ArenaHandle {
            request_tx,
            events_tx: events_tx.clone(),
            viewers: Arc::new(DashMap::new()),
        };

        let arena = Self {
            engine: BattleEngine::new(config.game.rules()),
            feed,
            market: Pair::splat(MarketSnapshot::empty()),
            snapshots: SnapshotBuilder::new(config.tokens.clone()),
            timing: ArenaTiming {
                battle_interval: config.game.battle_interval,
                market_refresh_interval: config.game.market_refresh_interval,
                round_restart_delay: config.game.round_restart_delay,
            },
            pending_round: None,
            request_rx,
            events_tx,
        };

        (arena, handle)
    }

    /// Run until every handle has been dropped
    pub async fn run(mut self) {
        info!(
            battle_interval_ms = self.timing.battle_interval.as_millis() as u64,
            market_refresh_interval_ms = self.timing.market_refresh_interval.as_millis() as u64,
            "Arena started"
        );

        let mut market_interval = interval(self.timing.market_refresh_interval);
        market_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // First battle tick waits one full interval so a snapshot exists
        let mut battle_interval = interval_at(
            Instant::now() + self.timing.battle_interval,
            self.timing.battle_interval,
        );
        battle_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let round_deadline = self.pending_round.map(|p| p.deadline);

            tokio::select! {
                biased;

                _ = wait_until(round_deadline) => self.start_pending_round(),
                _ = market_interval.tick() => self.refresh_market(),
                _ = battle_interval.tick() => self.battle_tick(),
                request = self.request_rx.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
            }
        }

        info!("Arena stopped");
    }

    fn handle_request(&mut self, request: ArenaRequest) {
        match request {
            ArenaRequest::InitialState { reply } => {
                let _ = reply.send(self.snapshots.initial_state(&self.engine, &self.market));
            }
            ArenaRequest::Stats { reply } => {
                let _ = reply.send(self.engine.stats());
            }
            ArenaRequest::Admin { command, reply } => {
                let result = self.apply(command);
                let _ = reply.send(result);
            }
        }
    }

    fn apply(&mut self, command: AdminCommand) -> Result<(), ArenaError> {
        info!(?command, "Operator command");

        match command {
            AdminCommand::TriggerBattle => self.battle_tick(),
            AdminCommand::ResetGame => self.reset_game(),
            AdminCommand::ForceScenario(scenario) => {
                self.engine.set_scenario(scenario);
                self.publish(ServerMsg::ScenarioChange {
                    scenario,
                    timestamp: unix_millis(),
                });
            }
            AdminCommand::SetHealth(health) => {
                self.engine.set_health(health.a, health.b);
                self.publish(self.snapshots.state_update(&self.engine, &self.market));
            }
            AdminCommand::Nudge { side, percent } => self.feed.nudge(side, percent)?,
            AdminCommand::SetTrend { side, trend } => self.feed.set_trend(side, trend)?,
            AdminCommand::SetVolatility(value) => self.feed.set_volatility(value)?,
            AdminCommand::SetManualMode(enabled) => self.feed.set_manual_mode(enabled)?,
            AdminCommand::ResetMarket => {
                self.feed.reset()?;
                self.refresh_market();
                self.publish(self.snapshots.state_update(&self.engine, &self.market));
            }
        }

        Ok(())
    }

    /// Pull a fresh snapshot, keeping the last one if the feed fails
    fn refresh_market(&mut self) {
        match self.feed.snapshot() {
            Ok(data) => {
                self.market = data;
                self.engine.update_market_data(data.market_caps());
                debug!(
                    market_cap_a = data.a.market_cap,
                    market_cap_b = data.b.market_cap,
                    "Market data refreshed"
                );
            }
            Err(e) => {
                warn!(error = %e, "Market feed unavailable, keeping last snapshot");
            }
        }
    }

    fn battle_tick(&mut self) {
        match self.engine.process_battle() {
            TickOutcome::Skipped(reason) => {
                debug!(?reason, "Battle tick skipped");
            }
            TickOutcome::Idle => {
                debug!(round = self.engine.state().current_round, "Idle tick");
                self.publish(ServerMsg::ScenarioChange {
                    scenario: Scenario::Idle,
                    timestamp: unix_millis(),
                });
            }
            TickOutcome::Battle(event) => {
                if let Some(RoundEnd::NextRound { epoch }) = event.round_end {
                    self.pending_round = Some(PendingRound {
                        epoch,
                        deadline: Instant::now() + self.timing.round_restart_delay,
                    });
                    info!(
                        delay_ms = self.timing.round_restart_delay.as_millis() as u64,
                        "Next round scheduled"
                    );
                }
                let msg = self.snapshots.battle_update(&event, &self.engine, &self.market);
                self.publish(msg);
            }
        }
    }

    fn start_pending_round(&mut self) {
        let Some(pending) = self.pending_round.take() else {
            return;
        };
        if self.engine.start_next_round(pending.epoch) {
            self.publish(self.snapshots.round_start(&self.engine));
        }
    }

    fn reset_game(&mut self) {
        // Cancel before mutating so the old transition cannot fire into the new match
        if self.pending_round.take().is_some() {
            debug!("Pending round transition cancelled");
        }
        self.engine.reset_game();
        debug!(epoch = self.engine.epoch(), "Arena reset");
        self.engine.update_market_data(self.market.market_caps());

        self.publish(self.snapshots.game_reset(&self.engine));
        self.publish(self.snapshots.initial_state(&self.engine, &self.market));
    }

    fn publish(&self, msg: ServerMsg) {
        // No receivers is fine, viewers resync on connect
        let _ = self.events_tx.send(msg);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
