//! Simulated market feed with manual pump/dump controls

use chrono::Utc;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::MockFeedConfig;
use crate::game::{Pair, Side};

use super::{FeedError, MarketData, MarketFeed, MarketSnapshot, Trend};

/// Manual nudges move the market by this many percent per unit of intensity
pub const NUDGE_PERCENT_PER_INTENSITY: f64 = 0.5;
/// Upper bound on a single nudge's intensity
pub const MAX_NUDGE_INTENSITY: f64 = 100.0;

const TREND_BIAS_PERCENT: f64 = 0.3;
const TREND_FLIP_CHANCE: f64 = 0.1;
const MIN_MARKET_CAP: f64 = 100_000.0;
const MIN_PRICE: f64 = 0.001;

struct MockState {
    cache: MarketData,
    trends: Pair<Trend>,
    volatility: f64,
    manual_mode: bool,
    auto_trends: bool,
    rng: ChaCha8Rng,
}

/// In-process market simulator.
///
/// In manual mode the market only moves when nudged, which makes battles
/// fully operator driven.
pub struct MockMarketFeed {
    state: Mutex<MockState>,
}

fn initial_cache() -> MarketData {
    let now = Utc::now();
    Pair::new(
        MarketSnapshot {
            market_cap: 5_000_000.0,
            price: 0.05,
            change_24h: 0.0,
            volume_24h: 500_000.0,
            last_update: now,
        },
        MarketSnapshot {
            market_cap: 8_000_000.0,
            price: 0.08,
            change_24h: 0.0,
            volume_24h: 800_000.0,
            last_update: now,
        },
    )
}

impl MockMarketFeed {
    pub fn new(config: &MockFeedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            state: Mutex::new(MockState {
                cache: initial_cache(),
                trends: Pair::default(),
                volatility: config.volatility.clamp(0.0, 1.0),
                manual_mode: config.manual_mode,
                auto_trends: config.auto_trends,
                rng,
            }),
        }
    }
}

impl MockState {
    fn simulate(&mut self, side: Side) {
        if self.manual_mode {
            return;
        }

        let mut pct = (self.rng.gen::<f64>() - 0.5) * 2.0 * self.volatility;
        match self.trends[side] {
            Trend::Pumping => pct += TREND_BIAS_PERCENT,
            Trend::Dumping => pct -= TREND_BIAS_PERCENT,
            Trend::Neutral => {}
        }

        if self.auto_trends && self.rng.gen_bool(TREND_FLIP_CHANCE) {
            let trend = match self.rng.gen_range(0..3) {
                0 => Trend::Neutral,
                1 => Trend::Pumping,
                _ => Trend::Dumping,
            };
            self.trends[side] = trend;
            debug!(%side, ?trend, "Mock trend changed");
        }

        let price_pct = pct + (self.rng.gen::<f64>() - 0.5) * 0.5;
        let volume_ratio = self.rng.gen_range(0.1..0.5);

        let data = &mut self.cache[side];
        data.market_cap = (data.market_cap * (1.0 + pct / 100.0)).max(MIN_MARKET_CAP);
        data.price = (data.price * (1.0 + price_pct / 100.0)).max(MIN_PRICE);
        data.change_24h = data.change_24h * 0.9 + pct * 0.1;
        data.volume_24h = data.market_cap * volume_ratio;
        data.last_update = Utc::now();
    }
}

impl MarketFeed for MockMarketFeed {
    fn snapshot(&self) -> Result<MarketData, FeedError> {
        let mut state = self.state.lock();
        for side in Side::BOTH {
            state.simulate(side);
        }
        Ok(state.cache)
    }

    fn nudge(&self, side: Side, percent: f64) -> Result<(), FeedError> {
        if !percent.is_finite() || percent <= -100.0 {
            return Err(FeedError::InvalidArgument(format!("nudge of {}%", percent)));
        }

        let mut state = self.state.lock();
        let data = &mut state.cache[side];
        data.market_cap *= 1.0 + percent / 100.0;
        data.price *= 1.0 + percent / 100.0;
        data.change_24h = percent;
        data.last_update = Utc::now();

        info!(
            %side,
            percent,
            market_cap = data.market_cap,
            "Manual market nudge"
        );
        Ok(())
    }

    fn set_trend(&self, side: Side, trend: Trend) -> Result<(), FeedError> {
        self.state.lock().trends[side] = trend;
        info!(%side, ?trend, "Mock trend set");
        Ok(())
    }

    fn set_volatility(&self, volatility: f64) -> Result<(), FeedError> {
        if !volatility.is_finite() {
            return Err(FeedError::InvalidArgument("volatility must be finite".to_string()));
        }
        let clamped = volatility.clamp(0.0, 1.0);
        self.state.lock().volatility = clamped;
        info!(volatility = clamped, "Mock volatility set");
        Ok(())
    }

    fn set_manual_mode(&self, enabled: bool) -> Result<(), FeedError> {
        self.state.lock().manual_mode = enabled;
        info!(enabled, "Mock manual mode");
        Ok(())
    }

    fn reset(&self) -> Result<(), FeedError> {
        let mut state = self.state.lock();
        state.cache = initial_cache();
        state.trends = Pair::default();
        info!("Mock market data reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(manual_mode: bool) -> MockMarketFeed {
        MockMarketFeed::new(&MockFeedConfig {
            manual_mode,
            volatility: 0.5,
            auto_trends: false,
            seed: Some(7),
        })
    }

    #[test]
    fn test_manual_mode_is_frozen() {
        let feed = feed(true);
        let first = feed.snapshot().unwrap();
        let second = feed.snapshot().unwrap();
        assert_eq!(first.market_caps(), second.market_caps());
        assert_eq!(first.market_caps(), Pair::new(5_000_000.0, 8_000_000.0));
    }

    #[test]
    fn test_pump_and_dump() {
        let feed = feed(true);
        feed.nudge(Side::A, NUDGE_PERCENT_PER_INTENSITY * 4.0).unwrap();
        feed.nudge(Side::B, -NUDGE_PERCENT_PER_INTENSITY).unwrap();

        let data = feed.snapshot().unwrap();
        assert!((data.a.market_cap - 5_100_000.0).abs() < 1e-6);
        assert!((data.a.price - 0.051).abs() < 1e-9);
        assert_eq!(data.a.change_24h, 2.0);
        assert!((data.b.market_cap - 7_960_000.0).abs() < 1e-6);
        assert_eq!(data.b.change_24h, -0.5);
    }

    #[test]
    fn test_rejects_invalid_nudges() {
        let feed = feed(true);
        assert!(feed.nudge(Side::A, f64::NAN).is_err());
        assert!(feed.nudge(Side::A, -100.0).is_err());
        assert_eq!(feed.snapshot().unwrap().a.market_cap, 5_000_000.0);
    }

    #[test]
    fn test_random_walk_respects_floors() {
        let feed = feed(false);
        feed.set_volatility(1.0).unwrap();
        feed.set_trend(Side::A, Trend::Dumping).unwrap();
        for _ in 0..500 {
            let data = feed.snapshot().unwrap();
            assert!(data.a.market_cap >= MIN_MARKET_CAP);
            assert!(data.a.price >= MIN_PRICE);
            assert!(data.b.market_cap > 0.0);
        }
    }

    #[test]
    fn test_same_seed_same_walk() {
        let a = feed(false);
        let b = feed(false);
        for _ in 0..10 {
            assert_eq!(
                a.snapshot().unwrap().market_caps(),
                b.snapshot().unwrap().market_caps()
            );
        }
    }

    #[test]
    fn test_reset_restores_seed_values() {
        let feed = feed(true);
        feed.nudge(Side::B, 10.0).unwrap();
        feed.reset().unwrap();
        assert_eq!(
            feed.snapshot().unwrap().market_caps(),
            Pair::new(5_000_000.0, 8_000_000.0)
        );
    }
}
