//! Builds wire messages from the authoritative match state

use crate::config::TokenInfo;
use crate::market::MarketData;
use crate::ws::protocol::{
    BattleKind, BattleUpdate, InitialState, MatchConfig, RoundInfo, ServerMsg, StateUpdate,
};

use super::engine::{BattleEngine, BattleEvent};
use super::Pair;

/// Builds broadcast and join-time messages for one match
pub struct SnapshotBuilder {
    tokens: Pair<TokenInfo>,
}

impl SnapshotBuilder {
    pub fn new(tokens: Pair<TokenInfo>) -> Self {
        Self { tokens }
    }

    /// Full state for a viewer that just connected
    pub fn initial_state(&self, engine: &BattleEngine, market: &MarketData) -> ServerMsg {
        let state = engine.state();
        let rules = engine.rules();

        ServerMsg::InitialState(Box::new(InitialState {
            config: MatchConfig {
                token_a: self.tokens.a.clone(),
                token_b: self.tokens.b.clone(),
                rounds_to_win: rules.rounds_to_win,
                max_rounds: state.max_rounds,
                max_health: rules.max_health,
            },
            health: state.health,
            scenario: state.current_scenario,
            combo: state.combo,
            current_round: state.current_round,
            score: state.score,
            is_round_active: state.is_round_active,
            is_game_over: state.is_game_over,
            winner: state.winner,
            last_damage: state.last_damage,
            market_data: *market,
        }))
    }

    /// Broadcast payload for a resolved attack
    pub fn battle_update(
        &self,
        event: &BattleEvent,
        engine: &BattleEngine,
        market: &MarketData,
    ) -> ServerMsg {
        let state = engine.state();

        ServerMsg::BattleUpdate(Box::new(BattleUpdate {
            kind: BattleKind::Battle,
            attacker: event.attacker,
            defender: event.defender,
            damage: event.damage,
            scenario: event.scenario,
            health: event.health,
            combo: event.combo,
            current_round: event.current_round,
            score: event.score,
            last_damage: state.last_damage,
            is_round_active: state.is_round_active,
            is_game_over: state.is_game_over,
            winner: state.winner,
            market_data: *market,
        }))
    }

    pub fn game_reset(&self, engine: &BattleEngine) -> ServerMsg {
        ServerMsg::GameReset(Self::round_info(engine))
    }

    pub fn round_start(&self, engine: &BattleEngine) -> ServerMsg {
        ServerMsg::RoundStart(Self::round_info(engine))
    }

    fn round_info(engine: &BattleEngine) -> RoundInfo {
        let state = engine.state();
        RoundInfo {
            health: state.health,
            combo: state.combo,
            scenario: state.current_scenario,
            current_round: state.current_round,
            score: state.score,
            is_round_active: state.is_round_active,
        }
    }

    pub fn state_update(&self, engine: &BattleEngine, market: &MarketData) -> ServerMsg {
        let state = engine.state();
        ServerMsg::StateUpdate(StateUpdate {
            health: state.health,
            last_damage: state.last_damage,
            market_data: *market,
        })
    }
}
