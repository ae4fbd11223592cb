//! WebRTC 시그널링 핸들러

use crate::lobby::{ClientId, RoomId};
use crate::state::AppState;
use serde_json::value::RawValue;
use std::time::Instant;

/// offer/answer/ICE candidate 중계. payload는 해석하지 않는다
pub async fn handle_signal(
    state: &AppState,
    from: &ClientId,
    room_id: &RoomId,
    payload: Box<RawValue>,
) {
    let dispatch = state
        .lobby
        .lock()
        .await
        .relay(from, room_id, payload, Instant::now());

    // 인가 실패는 lobby에서 이미 로그를 남김
    let Some(dispatch) = dispatch else {
        return;
    };

    let to = dispatch.to.clone();
    if state.switchboard.send(&dispatch.to, dispatch.message) {
        tracing::debug!(from = %from, to = %to, room_id = %room_id, "Relayed signal");
    }
}
