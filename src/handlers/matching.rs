//! 매칭 요청 핸들러

use crate::lobby::{ClientId, Preferences};
use crate::state::AppState;
use std::time::Instant;

/// find_match 처리: 즉시 짝을 찾거나 대기열에 넣는다
pub async fn handle_find_match(state: &AppState, client_id: &ClientId, preferences: Preferences) {
    let dispatches = state
        .lobby
        .lock()
        .await
        .find_match(client_id, preferences, Instant::now());
    state.switchboard.deliver(dispatches);
}

/// cancel_match 처리
pub async fn handle_cancel_match(state: &AppState, client_id: &ClientId) {
    if state.lobby.lock().await.cancel_match(client_id) {
        tracing::info!(client_id = %client_id, "Client stopped searching");
    }
}
