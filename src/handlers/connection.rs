//! 연결 핸들러

use crate::lobby::ClientId;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// 새 연결 처리
pub async fn handle_connection(state: &AppState, sender: UnboundedSender<ServerMessage>) -> ClientId {
    let client_id = ClientId::generate();

    state.switchboard.attach(client_id.clone(), sender);
    state.lobby.lock().await.connect(&client_id, Instant::now());

    if let Err(e) = state.presence.increment_online().await {
        tracing::warn!(client_id = %client_id, error = %e, "Failed to increment online counter");
    }

    state.switchboard.send(
        &client_id,
        ServerMessage::Connected {
            client_id: client_id.clone(),
        },
    );

    tracing::info!(client_id = %client_id, "New connection established");
    client_id
}

/// 연결 해제 처리. 여러 번 불려도 안전하다
pub async fn handle_disconnect(state: &AppState, client_id: &ClientId, reason: &str) {
    let dispatches = state.lobby.lock().await.disconnect(client_id);
    state.switchboard.detach(client_id);

    let Some(dispatches) = dispatches else {
        tracing::debug!(client_id = %client_id, "Disconnect for unknown client ignored");
        return;
    };

    if let Err(e) = state.presence.decrement_online().await {
        tracing::warn!(client_id = %client_id, error = %e, "Failed to decrement online counter");
    }
    state.switchboard.deliver(dispatches);

    tracing::info!(client_id = %client_id, reason = %reason, "Connection closed");
}

/// Heartbeat 처리
pub async fn handle_heartbeat(state: &AppState, client_id: &ClientId) {
    let known = state.lobby.lock().await.heartbeat(client_id, Instant::now());
    if known {
        state.switchboard.send(client_id, ServerMessage::HeartbeatAck);
    }
}
