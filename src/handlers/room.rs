//! 방 관리 핸들러

use crate::lobby::{ClientId, RoomId};
use crate::state::AppState;

/// 방 나가기 처리. 상대에게 peer_left 전송
pub async fn handle_leave_room(state: &AppState, client_id: &ClientId, room_id: &RoomId) {
    let dispatches = state.lobby.lock().await.leave_room(client_id, room_id);
    state.switchboard.deliver(dispatches);
}
