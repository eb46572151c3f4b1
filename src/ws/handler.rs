//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{
    AdminCommand, ArenaError, ArenaHandle, OperatorHandle, Scenario, ScenarioError, ViewerRole,
};
use crate::http::middleware::resolve_role;
use crate::market::mock::{MAX_NUDGE_INTENSITY, NUDGE_PERCENT_PER_INTENSITY};
use crate::util::rate_limit::ViewerRateLimiter;
use crate::ws::protocol::{ClientMsg, Nudge, ServerMsg};

const DIRECT_CHANNEL_CAPACITY: usize = 16;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Operator JWT, spectators connect without one
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let secret = state.config.operator_jwt_secret.as_deref();
    match resolve_role(query.token.as_deref(), secret) {
        Ok(role) => ws.on_upgrade(move |socket| handle_socket(socket, role, state.arena)),
        Err(e) => {
            warn!(error = %e, "Operator token rejected");
            e.into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, role: ViewerRole, arena: ArenaHandle) {
    let viewer_id = Uuid::new_v4();
    info!(viewer_id = %viewer_id, ?role, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before the snapshot so nothing falls in between
    let events_rx = arena.subscribe();

    let initial = match arena.initial_state().await {
        Ok(msg) => msg,
        Err(e) => {
            error!(viewer_id = %viewer_id, error = %e, "Failed to fetch initial state");
            return;
        }
    };

    if let Err(e) = send_msg(&mut ws_sink, &initial).await {
        error!(viewer_id = %viewer_id, error = %e, "Failed to send initial state");
        return;
    }

    let viewers = arena.viewer_joined(viewer_id, role);
    info!(
        viewer_id = %viewer_id,
        viewers,
        operators = arena.operator_count(),
        "Viewer joined"
    );

    let operator = arena.operator(role);
    run_session(viewer_id, operator, ws_sink, ws_stream, events_rx).await;

    let remaining = arena.viewer_left(viewer_id);
    info!(viewer_id = %viewer_id, remaining, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    viewer_id: Uuid,
    operator: Option<OperatorHandle>,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut events_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ViewerRateLimiter::new();
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(DIRECT_CHANNEL_CAPACITY);

    // Writer task: broadcast events and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                event = events_rx.recv() => match event {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            viewer_id = %viewer_id,
                            lagged_count = n,
                            "Viewer lagged, skipping {} events", n
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(viewer_id = %viewer_id, "Event channel closed");
                        break;
                    }
                },
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(viewer_id = %viewer_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> arena
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(viewer_id = %viewer_id, "Rate limited viewer message");
                    continue;
                }

                let reply = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => handle_client_msg(viewer_id, operator.as_ref(), client_msg).await,
                    Err(e) => {
                        warn!(viewer_id = %viewer_id, error = %e, "Failed to parse client message");
                        Some(ServerMsg::error("bad_message", e.to_string()))
                    }
                };

                if let Some(reply) = reply {
                    if direct_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(viewer_id = %viewer_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(viewer_id = %viewer_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(viewer_id = %viewer_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(viewer_id = %viewer_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(viewer_id = %viewer_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Execute one client message, returning a reply for this viewer only
async fn handle_client_msg(
    viewer_id: Uuid,
    operator: Option<&OperatorHandle>,
    msg: ClientMsg,
) -> Option<ServerMsg> {
    if !msg.is_privileged() {
        return match msg {
            ClientMsg::Ping { t } => Some(ServerMsg::Pong { t }),
            _ => None,
        };
    }

    let Some(operator) = operator else {
        warn!(viewer_id = %viewer_id, ?msg, "Spectator attempted an operator command");
        return Some(ServerMsg::error("forbidden", "Operator role required"));
    };

    let command = match to_admin_command(msg) {
        Ok(command) => command,
        Err(reply) => {
            warn!(viewer_id = %viewer_id, ?reply, "Rejected operator command");
            return Some(reply);
        }
    };

    match operator.execute(command).await {
        Ok(()) => None,
        Err(ArenaError::Feed(e)) => Some(ServerMsg::error("market_feed", e.to_string())),
        Err(e) => Some(ServerMsg::error("unavailable", e.to_string())),
    }
}

/// Validate a privileged client message into an arena command
pub fn to_admin_command(msg: ClientMsg) -> Result<AdminCommand, ServerMsg> {
    let command = match msg {
        ClientMsg::TriggerBattle => AdminCommand::TriggerBattle,
        ClientMsg::ResetGame => AdminCommand::ResetGame,
        ClientMsg::ForceScenario { scenario } => {
            let scenario: Scenario = scenario
                .parse()
                .map_err(|e: ScenarioError| ServerMsg::error("unknown_scenario", e.to_string()))?;
            AdminCommand::ForceScenario(scenario)
        }
        ClientMsg::SetHealth(health) => AdminCommand::SetHealth(health),
        ClientMsg::Pump(nudge) => nudge_command(nudge, 1.0)?,
        ClientMsg::Dump(nudge) => nudge_command(nudge, -1.0)?,
        ClientMsg::SetTrend { side, trend } => AdminCommand::SetTrend { side, trend },
        ClientMsg::SetVolatility { value } => AdminCommand::SetVolatility(value),
        ClientMsg::SetManualMode { enabled } => AdminCommand::SetManualMode(enabled),
        ClientMsg::ResetMarket => AdminCommand::ResetMarket,
        ClientMsg::Ping { .. } => {
            return Err(ServerMsg::error("bad_message", "ping is not a command"));
        }
    };
    Ok(command)
}

fn nudge_command(nudge: Nudge, direction: f64) -> Result<AdminCommand, ServerMsg> {
    if !(nudge.intensity > 0.0 && nudge.intensity <= MAX_NUDGE_INTENSITY) {
        return Err(ServerMsg::error(
            "invalid_intensity",
            format!("intensity must be in (0, {}]", MAX_NUDGE_INTENSITY),
        ));
    }
    Ok(AdminCommand::Nudge {
        side: nudge.side,
        percent: direction * NUDGE_PERCENT_PER_INTENSITY * nudge.intensity,
    })
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Side;

    fn parse(json: &str) -> ClientMsg {
        serde_json::from_str(json).unwrap()
    }

    fn error_code(msg: ServerMsg) -> String {
        match msg {
            ServerMsg::Error { code, .. } => code,
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_pump_and_dump_become_signed_nudges() {
        let command =
            to_admin_command(parse(r#"{"event":"pump","data":{"side":"tokenA","intensity":4}}"#))
                .unwrap();
        assert_eq!(command, AdminCommand::Nudge { side: Side::A, percent: 2.0 });

        let command = to_admin_command(parse(r#"{"event":"dump","data":{"side":"tokenB"}}"#)).unwrap();
        assert_eq!(command, AdminCommand::Nudge { side: Side::B, percent: -0.5 });
    }

    #[test]
    fn test_invalid_intensity_is_rejected() {
        let err = to_admin_command(parse(r#"{"event":"pump","data":{"side":"tokenA","intensity":0}}"#))
            .unwrap_err();
        assert_eq!(error_code(err), "invalid_intensity");

        let err = to_admin_command(parse(r#"{"event":"dump","data":{"side":"tokenA","intensity":1000}}"#))
            .unwrap_err();
        assert_eq!(error_code(err), "invalid_intensity");
    }

    #[test]
    fn test_unknown_scenario_is_rejected() {
        let err = to_admin_command(parse(
            r#"{"event":"force_scenario","data":{"scenario":"solPump"}}"#,
        ))
        .unwrap_err();
        assert_eq!(error_code(err), "unknown_scenario");

        let command = to_admin_command(parse(
            r#"{"event":"force_scenario","data":{"scenario":"tokenBVictory"}}"#,
        ))
        .unwrap();
        assert_eq!(command, AdminCommand::ForceScenario(Scenario::victory(Side::B)));
    }

    #[test]
    fn test_spectator_commands_are_forbidden() {
        let reply =
            tokio_test::block_on(handle_client_msg(Uuid::new_v4(), None, ClientMsg::ResetGame));
        assert_eq!(error_code(reply.unwrap()), "forbidden");

        let reply =
            tokio_test::block_on(handle_client_msg(Uuid::new_v4(), None, ClientMsg::Ping { t: 9 }));
        assert!(matches!(reply, Some(ServerMsg::Pong { t: 9 })));
    }
}
