//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::config::TokenInfo;
use crate::game::{Pair, Scenario, Side};
use crate::market::{MarketData, Trend};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Evaluate a battle tick now, outside the schedule
    TriggerBattle,

    /// Reset the whole match to round 1
    ResetGame,

    /// Override the current scenario label
    ForceScenario { scenario: String },

    /// Manually set both health values
    SetHealth(Pair<f64>),

    /// Push a token's market cap up
    Pump(Nudge),

    /// Push a token's market cap down
    Dump(Nudge),

    SetTrend { side: Side, trend: Trend },

    SetVolatility { value: f64 },

    SetManualMode { enabled: bool },

    ResetMarket,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Whether the message needs the operator role
    pub fn is_privileged(&self) -> bool {
        !matches!(self, ClientMsg::Ping { .. })
    }
}

/// Pump/dump payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nudge {
    pub side: Side,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

fn default_intensity() -> f64 {
    1.0
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full state, sent once on connect and after a reset
    InitialState(Box<InitialState>),

    /// An attack resolved
    BattleUpdate(Box<BattleUpdate>),

    /// Scenario changed without an attack (idle tick or manual override)
    ScenarioChange { scenario: Scenario, timestamp: u64 },

    /// Match was reset
    GameReset(RoundInfo),

    /// A new round began after the restart delay
    RoundStart(RoundInfo),

    /// Health or market data changed outside a battle tick
    StateUpdate(StateUpdate),

    /// Number of connected viewers
    UserCount(usize),

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Static match configuration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    pub token_a: TokenInfo,
    pub token_b: TokenInfo,
    pub rounds_to_win: u32,
    pub max_rounds: u32,
    pub max_health: f64,
}

/// Everything a late joiner needs to render the current state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub config: MatchConfig,
    pub health: Pair<f64>,
    pub scenario: Scenario,
    pub combo: Pair<u32>,
    pub current_round: u32,
    pub score: Pair<u32>,
    pub is_round_active: bool,
    pub is_game_over: bool,
    pub winner: Option<Side>,
    pub last_damage: Pair<u64>,
    pub market_data: MarketData,
}

/// Marker serialized as `"type": "battle"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleKind {
    Battle,
}

/// Broadcast for each resolved attack
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleUpdate {
    #[serde(rename = "type")]
    pub kind: BattleKind,
    pub attacker: Side,
    pub defender: Side,
    pub damage: u32,
    pub scenario: Scenario,
    pub health: Pair<f64>,
    pub combo: Pair<u32>,
    pub current_round: u32,
    pub score: Pair<u32>,
    pub last_damage: Pair<u64>,
    pub is_round_active: bool,
    pub is_game_over: bool,
    pub winner: Option<Side>,
    pub market_data: MarketData,
}

/// Round-level fields sent on reset and round start
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundInfo {
    pub health: Pair<f64>,
    pub combo: Pair<u32>,
    pub scenario: Scenario,
    pub current_round: u32,
    pub score: Pair<u32>,
    pub is_round_active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub health: Pair<f64>,
    pub last_damage: Pair<u64>,
    pub market_data: MarketData,
}
