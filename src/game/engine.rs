//! Battle engine - converts market-cap movement into hits, rounds and a match result
//!
//! The engine performs no I/O. It is driven by the arena task, which feeds it
//! market data and calls [`BattleEngine::process_battle_at`] on a fixed cadence.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::util::time::unix_millis;

use super::scenario::Scenario;
use super::side::{Pair, Side};

/// Consecutive hits needed before the combo bonus applies
pub const COMBO_THRESHOLD: u32 = 3;
/// Damage multiplier while a combo is running
pub const COMBO_DAMAGE_FACTOR: f64 = 1.5;

/// Scoring constants for a match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BattleRules {
    /// Rounds needed to win the match
    pub rounds_to_win: u32,
    /// Health each side starts a round with
    pub max_health: f64,
    /// Damage per percentage point of change difference
    pub damage_multiplier: f64,
    /// Minimum change difference (percentage points) for an attack
    pub min_mc_diff_for_attack: f64,
}

impl BattleRules {
    /// Longest possible match, best of `2n - 1`
    pub fn max_rounds(&self) -> u32 {
        self.rounds_to_win.saturating_mul(2).saturating_sub(1)
    }
}

impl Default for BattleRules {
    fn default() -> Self {
        Self {
            rounds_to_win: 3,
            max_health: 100.0,
            damage_multiplier: 12.0,
            min_mc_diff_for_attack: 0.08,
        }
    }
}

/// Authoritative match state
#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    pub current_round: u32,
    pub max_rounds: u32,
    pub score: Pair<u32>,
    pub health: Pair<f64>,
    pub market_cap: Pair<f64>,
    /// Market caps seen at the previous tick; zero means not yet primed
    pub last_market_cap: Pair<f64>,
    pub current_scenario: Scenario,
    pub last_attacker: Option<Side>,
    pub combo: Pair<u32>,
    /// Unix millis of the last hit taken by each side
    pub last_damage: Pair<u64>,
    pub is_round_active: bool,
    pub is_game_over: bool,
    pub winner: Option<Side>,
}

impl MatchState {
    pub fn new(rules: &BattleRules) -> Self {
        Self {
            current_round: 1,
            max_rounds: rules.max_rounds(),
            score: Pair::default(),
            health: Pair::splat(rules.max_health),
            market_cap: Pair::default(),
            last_market_cap: Pair::default(),
            current_scenario: Scenario::Idle,
            last_attacker: None,
            combo: Pair::default(),
            last_damage: Pair::default(),
            is_round_active: true,
            is_game_over: false,
            winner: None,
        }
    }
}

/// Why a tick produced nothing to broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    RoundInactive,
    GameOver,
    /// First observation, memory was seeded
    Priming,
    /// Zero, negative or non-finite market cap
    DegenerateMarketData,
}

/// How a round-ending hit resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEnd {
    /// Next round should start after the restart delay, if the epoch still matches
    NextRound { epoch: u64 },
    GameOver { winner: Side },
}

/// A resolved attack
#[derive(Debug, Clone, PartialEq)]
pub struct BattleEvent {
    pub attacker: Side,
    pub defender: Side,
    /// Damage dealt, already rounded
    pub damage: u32,
    pub scenario: Scenario,
    pub health: Pair<f64>,
    pub combo: Pair<u32>,
    pub current_round: u32,
    pub score: Pair<u32>,
    pub round_end: Option<RoundEnd>,
}

/// Result of a single battle tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Idle,
    Battle(BattleEvent),
}

/// Aggregate numbers for the state endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStats {
    pub total_rounds: u32,
    pub score: Pair<u32>,
    pub current_round: u32,
    pub is_game_over: bool,
    pub winner: Option<Side>,
    pub health: Pair<f64>,
    pub scenario: Scenario,
}

/// The battle state machine
#[derive(Debug)]
pub struct BattleEngine {
    rules: BattleRules,
    state: MatchState,
    /// Bumped on every reset so stale round transitions can be refused
    epoch: u64,
}

impl BattleEngine {
    pub fn new(rules: BattleRules) -> Self {
        info!(
            rounds_to_win = rules.rounds_to_win,
            max_rounds = rules.max_rounds(),
            "Battle engine initialized"
        );
        Self {
            state: MatchState::new(&rules),
            rules,
            epoch: 0,
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn rules(&self) -> &BattleRules {
        &self.rules
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Store the latest market caps. No battle logic runs here.
    pub fn update_market_data(&mut self, market_cap: Pair<f64>) {
        self.state.market_cap = market_cap;
    }

    pub fn process_battle(&mut self) -> TickOutcome {
        self.process_battle_at(unix_millis())
    }

    /// Evaluate one tick against the current and previous market caps
    pub fn process_battle_at(&mut self, now: u64) -> TickOutcome {
        if self.state.is_game_over {
            return TickOutcome::Skipped(SkipReason::GameOver);
        }
        if !self.state.is_round_active {
            return TickOutcome::Skipped(SkipReason::RoundInactive);
        }

        if self.state.last_market_cap.a == 0.0 {
            self.advance_market_memory();
            return TickOutcome::Skipped(SkipReason::Priming);
        }

        let Some(change) = self.percent_changes() else {
            warn!(
                market_cap = ?self.state.market_cap,
                last_market_cap = ?self.state.last_market_cap,
                "Degenerate market data, skipping attack"
            );
            self.advance_market_memory();
            return TickOutcome::Skipped(SkipReason::DegenerateMarketData);
        };

        let diff = (change.a - change.b).abs();
        debug!(
            round = self.state.current_round,
            change_a = change.a,
            change_b = change.b,
            diff,
            "Battle check"
        );

        if diff < self.rules.min_mc_diff_for_attack {
            return self.idle_tick();
        }

        let attacker = if change.a > change.b { Side::A } else { Side::B };
        let defender = attacker.opponent();

        let streak = if self.state.last_attacker == Some(attacker) {
            self.state.combo[attacker] + 1
        } else {
            1
        };

        let (factor, scenario) = if streak >= COMBO_THRESHOLD {
            (COMBO_DAMAGE_FACTOR, Scenario::combo(attacker))
        } else {
            (1.0, Scenario::pump(attacker))
        };

        let damage = (diff * self.rules.damage_multiplier * factor).round();
        if damage < 1.0 {
            // A hit that rounds to nothing is not an attack
            return self.idle_tick();
        }

        if streak == 1 {
            self.state.combo = Pair::default();
        }
        self.state.combo[attacker] = streak;
        self.state.last_attacker = Some(attacker);

        self.state.health[defender] = (self.state.health[defender] - damage).max(0.0);
        self.state.last_damage[defender] = now;

        info!(
            round = self.state.current_round,
            %attacker,
            %defender,
            damage,
            combo = self.state.combo[attacker],
            defender_health = self.state.health[defender],
            "Attack landed"
        );

        // The victory cue belongs to the event; the state keeps the last attack cue
        self.state.current_scenario = scenario;
        let (round_end, event_scenario) = if self.state.health[defender] <= 0.0 {
            (Some(self.end_round(attacker)), Scenario::victory(attacker))
        } else {
            (None, scenario)
        };

        self.advance_market_memory();

        TickOutcome::Battle(BattleEvent {
            attacker,
            defender,
            damage: damage as u32,
            scenario: event_scenario,
            health: self.state.health,
            combo: self.state.combo,
            current_round: self.state.current_round,
            score: self.state.score,
            round_end,
        })
    }

    /// No attack this tick. The streak is broken but combo counters are kept
    /// until the next hit replaces them.
    fn idle_tick(&mut self) -> TickOutcome {
        self.state.current_scenario = Scenario::Idle;
        self.state.last_attacker = None;
        self.advance_market_memory();
        TickOutcome::Idle
    }

    fn end_round(&mut self, winner: Side) -> RoundEnd {
        self.state.score[winner] += 1;
        self.state.is_round_active = false;

        info!(
            round = self.state.current_round,
            %winner,
            score_a = self.state.score.a,
            score_b = self.state.score.b,
            "Round won"
        );

        if self.state.score[winner] >= self.rules.rounds_to_win {
            self.state.is_game_over = true;
            self.state.winner = Some(winner);
            info!(%winner, "Game over");
            RoundEnd::GameOver { winner }
        } else {
            RoundEnd::NextRound { epoch: self.epoch }
        }
    }

    /// Begin the next round. Returns false when the transition is stale.
    pub fn start_next_round(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.state.is_game_over || self.state.is_round_active {
            debug!(epoch, current_epoch = self.epoch, "Ignoring stale round transition");
            return false;
        }

        self.state.current_round += 1;
        self.state.health = Pair::splat(self.rules.max_health);
        self.state.combo = Pair::default();
        self.state.last_attacker = None;
        self.state.current_scenario = Scenario::Idle;
        self.state.is_round_active = true;

        info!(
            round = self.state.current_round,
            score_a = self.state.score.a,
            score_b = self.state.score.b,
            "Round started"
        );
        true
    }

    /// Reinitialize the match. Pending round transitions become stale.
    pub fn reset_game(&mut self) {
        self.state = MatchState::new(&self.rules);
        self.epoch += 1;
        info!(epoch = self.epoch, "Game reset");
    }

    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.state.current_scenario = scenario;
        info!(%scenario, "Scenario manually set");
    }

    pub fn set_health(&mut self, a: f64, b: f64) {
        let max = self.rules.max_health;
        self.state.health = Pair::new(a, b).map(|h| if h.is_finite() { h.clamp(0.0, max) } else { max });
        info!(health_a = self.state.health.a, health_b = self.state.health.b, "Health manually set");
    }

    pub fn stats(&self) -> BattleStats {
        BattleStats {
            total_rounds: self.state.score.a + self.state.score.b,
            score: self.state.score,
            current_round: self.state.current_round,
            is_game_over: self.state.is_game_over,
            winner: self.state.winner,
            health: self.state.health,
            scenario: self.state.current_scenario,
        }
    }

    fn advance_market_memory(&mut self) {
        self.state.last_market_cap = self.state.market_cap;
    }

    /// Percent change per side since the last tick, or None on unusable data
    fn percent_changes(&self) -> Option<Pair<f64>> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        let (now, last) = (self.state.market_cap, self.state.last_market_cap);
        if !Side::BOTH.iter().all(|&s| usable(now[s]) && usable(last[s])) {
            return None;
        }
        Some(Pair::new(
            (now.a - last.a) / last.a * 100.0,
            (now.b - last.b) / last.b * 100.0,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(engine: &mut BattleEngine, a: f64, b: f64) -> TickOutcome {
        engine.update_market_data(Pair::new(a, b));
        engine.process_battle_at(1_000)
    }

    fn battle(outcome: TickOutcome) -> BattleEvent {
        match outcome {
            TickOutcome::Battle(event) => event,
            other => panic!("expected battle, got {:?}", other),
        }
    }

    #[test]
    fn test_first_tick_primes_memory() {
        let mut engine = BattleEngine::new(BattleRules::default());
        let outcome = tick(&mut engine, 5_000_000.0, 8_000_000.0);
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::Priming));
        assert_eq!(engine.state().last_market_cap, Pair::new(5_000_000.0, 8_000_000.0));
        assert_eq!(engine.state().health, Pair::splat(100.0));
    }

    #[test]
    fn test_five_tick_knockout() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);

        let hit = battle(tick(&mut engine, 5_100_000.0, 8_000_000.0));
        assert_eq!(hit.attacker, Side::A);
        assert_eq!(hit.defender, Side::B);
        assert_eq!(hit.damage, 24);
        assert_eq!(hit.scenario, Scenario::pump(Side::A));
        assert_eq!(hit.combo, Pair::new(1, 0));
        assert_eq!(hit.health.b, 76.0);

        let hit = battle(tick(&mut engine, 5_202_000.0, 8_000_000.0));
        assert_eq!(hit.combo, Pair::new(2, 0));
        assert_eq!(hit.damage, 24);
        assert_eq!(hit.health.b, 52.0);

        let hit = battle(tick(&mut engine, 5_306_040.0, 8_000_000.0));
        assert_eq!(hit.combo, Pair::new(3, 0));
        assert_eq!(hit.damage, 36);
        assert_eq!(hit.scenario, Scenario::combo(Side::A));
        assert_eq!(hit.health.b, 16.0);

        let hit = battle(tick(&mut engine, 5_412_160.8, 8_000_000.0));
        assert_eq!(hit.damage, 36);
        assert_eq!(hit.health.b, 0.0);
        assert_eq!(hit.scenario, Scenario::victory(Side::A));
        assert_eq!(hit.score, Pair::new(1, 0));
        assert_eq!(hit.round_end, Some(RoundEnd::NextRound { epoch: 0 }));

        let state = engine.state();
        assert!(!state.is_round_active);
        assert!(!state.is_game_over);
        assert_eq!(state.current_scenario, Scenario::combo(Side::A));
        assert_eq!(state.last_damage.b, 1_000);
        assert_eq!(state.last_damage.a, 0);
    }

    #[test]
    fn test_small_difference_is_idle() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);

        // +0.05% vs 0% is inside the 0.08 band
        let outcome = tick(&mut engine, 5_002_500.0, 8_000_000.0);
        assert_eq!(outcome, TickOutcome::Idle);
        assert_eq!(engine.state().health, Pair::splat(100.0));
        assert_eq!(engine.state().current_scenario, Scenario::Idle);
        assert_eq!(engine.state().last_market_cap, Pair::new(5_002_500.0, 8_000_000.0));
    }

    #[test]
    fn test_unchanged_snapshot_is_idle() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);
        assert_eq!(tick(&mut engine, 5_000_000.0, 8_000_000.0), TickOutcome::Idle);
    }

    #[test]
    fn test_larger_change_attacks_even_when_both_fall() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);

        // A -1%, B -3%: A has the larger change, diff 2 points
        let hit = battle(tick(&mut engine, 4_950_000.0, 7_760_000.0));
        assert_eq!(hit.attacker, Side::A);
        assert_eq!(hit.damage, 24);
        assert_eq!(hit.health, Pair::new(100.0, 76.0));
    }

    #[test]
    fn test_attacker_switch_resets_combo() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);
        tick(&mut engine, 5_100_000.0, 8_000_000.0);
        tick(&mut engine, 5_202_000.0, 8_000_000.0);
        assert_eq!(engine.state().combo, Pair::new(2, 0));

        let hit = battle(tick(&mut engine, 5_202_000.0, 8_160_000.0));
        assert_eq!(hit.attacker, Side::B);
        assert_eq!(hit.combo, Pair::new(0, 1));
        assert_eq!(hit.scenario, Scenario::pump(Side::B));
        assert_eq!(hit.health.a, 76.0);
    }

    #[test]
    fn test_idle_tick_breaks_streak() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);
        tick(&mut engine, 5_100_000.0, 8_000_000.0);
        tick(&mut engine, 5_202_000.0, 8_000_000.0);
        assert_eq!(tick(&mut engine, 5_202_000.0, 8_000_000.0), TickOutcome::Idle);
        // Counters stay as last broadcast, only the streak is broken
        assert_eq!(engine.state().combo, Pair::new(2, 0));
        assert_eq!(engine.state().last_attacker, None);

        let hit = battle(tick(&mut engine, 5_306_040.0, 8_000_000.0));
        assert_eq!(hit.combo, Pair::new(1, 0));
        assert_eq!(hit.scenario, Scenario::pump(Side::A));
        assert_eq!(hit.damage, 24);
    }

    #[test]
    fn test_zero_market_cap_after_priming_is_skipped() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);

        let outcome = tick(&mut engine, 5_100_000.0, 0.0);
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::DegenerateMarketData));
        assert_eq!(engine.state().health, Pair::splat(100.0));
        assert_eq!(engine.state().last_market_cap, Pair::new(5_100_000.0, 0.0));

        // B's memory is now zero, so the next tick is skipped too
        let outcome = tick(&mut engine, 5_200_000.0, 8_000_000.0);
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::DegenerateMarketData));

        // Both sides usable again
        assert_eq!(tick(&mut engine, 5_200_000.0, 8_000_000.0), TickOutcome::Idle);
        assert!(engine.state().health.a.is_finite());
        assert!(engine.state().health.b.is_finite());
    }

    #[test]
    fn test_negative_market_cap_is_skipped() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);

        let outcome = tick(&mut engine, 5_100_000.0, -8_000_000.0);
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::DegenerateMarketData));
        assert_eq!(engine.state().health, Pair::splat(100.0));
        assert_eq!(engine.state().combo, Pair::new(0, 0));
    }

    #[test]
    fn test_non_finite_market_cap_is_skipped() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut engine = BattleEngine::new(BattleRules::default());
            tick(&mut engine, 5_000_000.0, 8_000_000.0);

            let outcome = tick(&mut engine, bad, 8_000_000.0);
            assert_eq!(outcome, TickOutcome::Skipped(SkipReason::DegenerateMarketData));

            // Memory now holds the bad value for A, so the next tick is skipped too
            let outcome = tick(&mut engine, 5_000_000.0, 8_160_000.0);
            assert_eq!(outcome, TickOutcome::Skipped(SkipReason::DegenerateMarketData));

            let health = engine.state().health;
            assert!(health.a.is_finite() && health.b.is_finite());
            assert_eq!(health, Pair::splat(100.0));
        }
    }

    #[test]
    fn test_side_b_streak_reaches_combo() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);

        let hit = battle(tick(&mut engine, 5_000_000.0, 8_160_000.0));
        assert_eq!(hit.scenario, Scenario::pump(Side::B));
        assert_eq!(hit.health.a, 76.0);

        let hit = battle(tick(&mut engine, 5_000_000.0, 8_323_200.0));
        assert_eq!(hit.combo, Pair::new(0, 2));
        assert_eq!(hit.health.a, 52.0);

        let hit = battle(tick(&mut engine, 5_000_000.0, 8_489_664.0));
        assert_eq!(hit.attacker, Side::B);
        assert_eq!(hit.combo, Pair::new(0, 3));
        assert_eq!(hit.damage, 36);
        assert_eq!(hit.scenario, Scenario::combo(Side::B));
        assert_eq!(hit.health.a, 16.0);
        assert_eq!(engine.state().current_scenario, Scenario::combo(Side::B));
    }

    #[test]
    fn test_knockout_keeps_attack_cue_in_state() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);

        let hit = battle(tick(&mut engine, 50_000_000.0, 8_000_000.0));
        assert_eq!(hit.scenario, Scenario::victory(Side::A));
        assert_eq!(engine.state().current_scenario, Scenario::pump(Side::A));
        assert_eq!(engine.stats().scenario, Scenario::pump(Side::A));
    }

    #[test]
    fn test_damage_rounding_to_zero_is_idle() {
        let rules = BattleRules {
            min_mc_diff_for_attack: 0.0,
            ..BattleRules::default()
        };
        let mut engine = BattleEngine::new(rules);
        tick(&mut engine, 5_000_000.0, 8_000_000.0);

        // +0.01% vs 0% gives 0.12 raw damage
        let outcome = tick(&mut engine, 5_000_500.0, 8_000_000.0);
        assert_eq!(outcome, TickOutcome::Idle);
        assert_eq!(engine.state().health, Pair::splat(100.0));
        assert_eq!(engine.state().last_attacker, None);
        assert_eq!(engine.state().last_market_cap, Pair::new(5_000_500.0, 8_000_000.0));
    }

    #[test]
    fn test_huge_rounds_to_win_does_not_overflow() {
        let rules = BattleRules {
            rounds_to_win: u32::MAX,
            ..BattleRules::default()
        };
        assert_eq!(rules.max_rounds(), u32::MAX - 1);
        let engine = BattleEngine::new(rules);
        assert_eq!(engine.state().max_rounds, u32::MAX - 1);
    }

    #[test]
    fn test_game_over_freezes_state() {
        let rules = BattleRules {
            rounds_to_win: 1,
            ..BattleRules::default()
        };
        let mut engine = BattleEngine::new(rules);
        assert_eq!(engine.state().max_rounds, 1);
        tick(&mut engine, 5_000_000.0, 8_000_000.0);

        let hit = battle(tick(&mut engine, 5_000_000.0, 16_000_000.0));
        assert_eq!(hit.attacker, Side::B);
        assert_eq!(hit.health.a, 0.0);
        assert_eq!(hit.round_end, Some(RoundEnd::GameOver { winner: Side::B }));
        assert!(engine.state().is_game_over);
        assert_eq!(engine.state().winner, Some(Side::B));

        let frozen = engine.state().clone();
        let outcome = tick(&mut engine, 50_000_000.0, 16_000_000.0);
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::GameOver));
        let mut expected = frozen;
        expected.market_cap = Pair::new(50_000_000.0, 16_000_000.0);
        assert_eq!(engine.state(), &expected);
    }

    #[test]
    fn test_inactive_round_skips_ticks() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);
        tick(&mut engine, 50_000_000.0, 8_000_000.0);
        assert!(!engine.state().is_round_active);

        let outcome = tick(&mut engine, 500_000_000.0, 8_000_000.0);
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::RoundInactive));
        assert_eq!(engine.state().score, Pair::new(1, 0));
    }

    #[test]
    fn test_next_round_resets_round_fields() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);
        let hit = battle(tick(&mut engine, 50_000_000.0, 8_000_000.0));
        let Some(RoundEnd::NextRound { epoch }) = hit.round_end else {
            panic!("expected round transition");
        };

        assert!(engine.start_next_round(epoch));
        let state = engine.state();
        assert_eq!(state.current_round, 2);
        assert_eq!(state.health, Pair::splat(100.0));
        assert_eq!(state.combo, Pair::new(0, 0));
        assert_eq!(state.last_attacker, None);
        assert_eq!(state.current_scenario, Scenario::Idle);
        assert!(state.is_round_active);
        assert_eq!(state.score, Pair::new(1, 0));

        // Already active
        assert!(!engine.start_next_round(epoch));
        assert_eq!(engine.state().current_round, 2);
    }

    #[test]
    fn test_reset_invalidates_pending_round() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);
        let hit = battle(tick(&mut engine, 50_000_000.0, 8_000_000.0));
        let Some(RoundEnd::NextRound { epoch }) = hit.round_end else {
            panic!("expected round transition");
        };

        engine.reset_game();
        // Freshly reset match is active, but the old epoch must not fire regardless
        assert!(!engine.start_next_round(epoch));
        assert_eq!(engine.state(), &MatchState::new(engine.rules()));
        assert_eq!(engine.epoch(), 1);
    }

    #[test]
    fn test_set_health_clamps() {
        let mut engine = BattleEngine::new(BattleRules::default());
        engine.set_health(150.0, -5.0);
        assert_eq!(engine.state().health, Pair::new(100.0, 0.0));
        engine.set_health(42.5, f64::NAN);
        assert_eq!(engine.state().health, Pair::new(42.5, 100.0));
    }

    #[test]
    fn test_stats_count_completed_rounds() {
        let mut engine = BattleEngine::new(BattleRules::default());
        tick(&mut engine, 5_000_000.0, 8_000_000.0);
        tick(&mut engine, 50_000_000.0, 8_000_000.0);
        engine.set_scenario(Scenario::Idle);

        let stats = engine.stats();
        assert_eq!(stats.total_rounds, 1);
        assert_eq!(stats.current_round, 1);
        assert_eq!(stats.scenario, Scenario::Idle);
        assert!(!stats.is_game_over);
    }
}
