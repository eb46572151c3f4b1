//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::game::engine::BattleRules;
use crate::game::Pair;

/// Public identity of a competing token
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub address: String,
    pub chain: String,
}

/// Battle rules and scheduling
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub rounds_to_win: u32,
    pub max_health: f64,
    pub damage_multiplier: f64,
    /// Percentage-point gap required before a tick becomes an attack
    pub min_mc_diff_for_attack: f64,
    pub battle_interval: Duration,
    pub market_refresh_interval: Duration,
    /// Pause between a round-winning hit and the next round
    pub round_restart_delay: Duration,
}

impl GameConfig {
    pub fn rules(&self) -> BattleRules {
        BattleRules {
            rounds_to_win: self.rounds_to_win,
            max_health: self.max_health,
            damage_multiplier: self.damage_multiplier,
            min_mc_diff_for_attack: self.min_mc_diff_for_attack,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rounds_to_win: 3,
            max_health: 100.0,
            damage_multiplier: 12.0,
            min_mc_diff_for_attack: 0.08,
            battle_interval: Duration::from_millis(4000),
            market_refresh_interval: Duration::from_millis(3000),
            round_restart_delay: Duration::from_millis(5000),
        }
    }
}

/// Settings for the simulated market feed
#[derive(Clone, Debug, PartialEq)]
pub struct MockFeedConfig {
    /// Market only moves when nudged by an operator
    pub manual_mode: bool,
    /// Random walk amplitude in [0, 1]
    pub volatility: f64,
    pub auto_trends: bool,
    /// Fixed RNG seed, random when unset
    pub seed: Option<u64>,
}

impl Default for MockFeedConfig {
    fn default() -> Self {
        Self {
            manual_mode: true,
            volatility: 0.5,
            auto_trends: false,
            seed: None,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, `*` for any
    pub client_origin: String,
    /// HS256 secret for operator tokens. Admin commands are disabled when unset.
    pub operator_jwt_secret: Option<String>,

    pub tokens: Pair<TokenInfo>,
    pub game: GameConfig,
    pub mock: MockFeedConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3001".to_string()),
        };

        let defaults = GameConfig::default();
        let game = GameConfig {
            rounds_to_win: parse_or(&lookup, "ROUNDS_TO_WIN", defaults.rounds_to_win)?,
            max_health: parse_or(&lookup, "MAX_HEALTH", defaults.max_health)?,
            damage_multiplier: parse_or(&lookup, "DAMAGE_MULTIPLIER", defaults.damage_multiplier)?,
            min_mc_diff_for_attack: parse_or(
                &lookup,
                "MIN_MC_DIFF_FOR_ATTACK",
                defaults.min_mc_diff_for_attack,
            )?,
            battle_interval: millis_or(&lookup, "BATTLE_INTERVAL_MS", defaults.battle_interval)?,
            market_refresh_interval: millis_or(
                &lookup,
                "MARKET_REFRESH_INTERVAL_MS",
                defaults.market_refresh_interval,
            )?,
            round_restart_delay: millis_or(
                &lookup,
                "ROUND_RESTART_DELAY_MS",
                defaults.round_restart_delay,
            )?,
        };
        validate_game(&game)?;

        let mock_defaults = MockFeedConfig::default();
        let mock = MockFeedConfig {
            manual_mode: parse_or(&lookup, "MOCK_MANUAL_MODE", mock_defaults.manual_mode)?,
            volatility: parse_or(&lookup, "MOCK_VOLATILITY", mock_defaults.volatility)?,
            auto_trends: parse_or(&lookup, "MOCK_AUTO_TRENDS", mock_defaults.auto_trends)?,
            seed: lookup("MOCK_SEED")
                .map(|v| v.parse().map_err(|_| ConfigError::Invalid("MOCK_SEED")))
                .transpose()?,
        };

        let tokens = Pair::new(
            token_info(&lookup, "TOKEN_A", ["Solana Killer", "SOLKILL", "0xMOCK_TOKEN_A", "bsc"]),
            token_info(
                &lookup,
                "TOKEN_B",
                ["Pump Fun Supreme", "PUMPSUP", "0xMOCK_TOKEN_B", "solana"],
            ),
        );

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            operator_jwt_secret: lookup("OPERATOR_JWT_SECRET").filter(|s| !s.is_empty()),

            tokens,
            game,
            mock,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn millis_or<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let millis: u64 = parse_or(lookup, key, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(ConfigError::Invalid(key));
    }
    Ok(Duration::from_millis(millis))
}

fn token_info<F>(lookup: &F, prefix: &str, defaults: [&str; 4]) -> TokenInfo
where
    F: Fn(&str) -> Option<String>,
{
    let field = |name: &str, default: &str| {
        lookup(&format!("{}_{}", prefix, name)).unwrap_or_else(|| default.to_string())
    };
    TokenInfo {
        name: field("NAME", defaults[0]),
        symbol: field("SYMBOL", defaults[1]),
        address: field("ADDRESS", defaults[2]),
        chain: field("CHAIN", defaults[3]),
    }
}

fn validate_game(game: &GameConfig) -> Result<(), ConfigError> {
    if game.rounds_to_win == 0 {
        return Err(ConfigError::Invalid("ROUNDS_TO_WIN"));
    }
    if !(game.max_health.is_finite() && game.max_health > 0.0) {
        return Err(ConfigError::Invalid("MAX_HEALTH"));
    }
    if !(game.damage_multiplier.is_finite() && game.damage_multiplier > 0.0) {
        return Err(ConfigError::Invalid("DAMAGE_MULTIPLIER"));
    }
    if !(game.min_mc_diff_for_attack.is_finite() && game.min_mc_diff_for_attack >= 0.0) {
        return Err(ConfigError::Invalid("MIN_MC_DIFF_FOR_ATTACK"));
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
