//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::PlayerId;
use crate::session::{Session, SessionGateway};
use crate::util::rate_limit::SessionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let Some(session) = state.gateway.connect(player_id) else {
        error!(player_id = %player_id, "Could not register session");
        return;
    };

    let (ws_sink, ws_stream) = socket.split();
    let rate_limiter = SessionRateLimiter::new(state.config.input_rate_limit);

    run_session(&state.gateway, session, ws_sink, ws_stream, rate_limiter).await;

    // Cleanup on disconnect
    state.gateway.disconnect(player_id);

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    gateway: &SessionGateway,
    session: Session,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    rate_limiter: SessionRateLimiter,
) {
    let Session {
        player_id,
        mut outbound,
    } = session;

    // Spawn writer task: outbound queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    // Reader loop: WebSocket -> gateway
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }
                if !route_text(gateway, player_id, &text) {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(player_id = %player_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(player_id = %player_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }

        if writer_handle.is_finished() {
            debug!(player_id = %player_id, "Writer stopped, closing session");
            break;
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Parse and dispatch one text frame. Returns false once the session should end.
fn route_text(gateway: &SessionGateway, player_id: PlayerId, text: &str) -> bool {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(ClientMsg::Leave) => {
            gateway.handle(player_id, ClientMsg::Leave);
            false
        }
        Ok(msg) => {
            gateway.handle(player_id, msg);
            true
        }
        Err(e) => {
            warn!(player_id = %player_id, error = %e, "Failed to parse client message");
            true
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
