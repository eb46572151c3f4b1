//! Market data feed - source of the market caps that drive the battle

pub mod mock;

pub use mock::MockMarketFeed;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::{Pair, Side};

/// One side's market reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub market_cap: f64,
    pub price: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
    pub last_update: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Placeholder used before the first successful fetch
    pub fn empty() -> Self {
        Self {
            market_cap: 0.0,
            price: 0.0,
            change_24h: 0.0,
            volume_24h: 0.0,
            last_update: DateTime::<Utc>::default(),
        }
    }
}

pub type MarketData = Pair<MarketSnapshot>;

impl MarketData {
    pub fn market_caps(&self) -> Pair<f64> {
        Pair::new(self.a.market_cap, self.b.market_cap)
    }
}

/// Direction of a pump or dump trend in the mock feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    #[default]
    Neutral,
    Pumping,
    Dumping,
}

/// Source of market snapshots for both tokens.
///
/// Only `snapshot` is needed by the battle. The remaining controls are operator
/// conveniences; feeds that cannot honour them report `Unsupported`.
pub trait MarketFeed: Send + Sync + 'static {
    /// Pull the current snapshot for both sides
    fn snapshot(&self) -> Result<MarketData, FeedError>;

    /// Move one side's market cap and price by `percent`
    fn nudge(&self, _side: Side, _percent: f64) -> Result<(), FeedError> {
        Err(FeedError::Unsupported("nudge"))
    }

    fn set_trend(&self, _side: Side, _trend: Trend) -> Result<(), FeedError> {
        Err(FeedError::Unsupported("set_trend"))
    }

    fn set_volatility(&self, _volatility: f64) -> Result<(), FeedError> {
        Err(FeedError::Unsupported("set_volatility"))
    }

    fn set_manual_mode(&self, _enabled: bool) -> Result<(), FeedError> {
        Err(FeedError::Unsupported("set_manual_mode"))
    }

    /// Return to the feed's initial values
    fn reset(&self) -> Result<(), FeedError> {
        Err(FeedError::Unsupported("reset"))
    }
}

/// Market feed errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    #[error("Market feed unavailable: {0}")]
    Unavailable(String),

    #[error("Market feed does not support {0}")]
    Unsupported(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
