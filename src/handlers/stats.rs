//! 접속 통계 집계 및 브로드캐스트

use crate::lobby::AggregateStats;
use crate::protocol::ServerMessage;
use crate::state::AppState;

/// 현재 통계. online은 presence 카운터 값을 우선 사용
pub async fn collect_stats(state: &AppState) -> AggregateStats {
    let local = state.lobby.lock().await.stats();
    with_presence(state, local).await
}

async fn with_presence(state: &AppState, local: AggregateStats) -> AggregateStats {
    match state.presence.count_online().await {
        Ok(online) => AggregateStats { online, ..local },
        Err(e) => {
            tracing::warn!(error = %e, "Presence counter unavailable, using local count");
            local
        }
    }
}

/// 모든 연결에 online_count / user_stats 전송
pub async fn broadcast_stats(state: &AppState) -> AggregateStats {
    let (local, recipients) = {
        let lobby = state.lobby.lock().await;
        (lobby.stats(), lobby.client_ids())
    };
    let stats = with_presence(state, local).await;

    state
        .switchboard
        .broadcast(&recipients, &ServerMessage::OnlineCount { count: stats.online });
    let delivered = state
        .switchboard
        .broadcast(&recipients, &ServerMessage::UserStats(stats));

    tracing::trace!(
        online = stats.online,
        waiting = stats.waiting,
        in_room = stats.in_room,
        active_rooms = stats.active_rooms,
        delivered = delivered,
        "Stats broadcast"
    );
    stats
}
