//! 오래된 대기/방/세션 정리

use crate::lobby::SweepReport;
use crate::state::AppState;
use std::time::Instant;

/// 한 번의 정리 실행
pub async fn run_cleanup(state: &AppState) -> SweepReport {
    let limits = state.sweep_limits();
    let report = state.lobby.lock().await.sweep(&limits, Instant::now());

    for client_id in &report.reaped {
        state.switchboard.detach(client_id);
        if let Err(e) = state.presence.decrement_online().await {
            tracing::warn!(client_id = %client_id, error = %e, "Failed to decrement online counter");
        }
        tracing::info!(client_id = %client_id, "Reaped silent session");
    }
    state.switchboard.deliver(report.dispatches.clone());

    if !report.timed_out.is_empty() || !report.evicted_rooms.is_empty() || !report.reaped.is_empty()
    {
        tracing::info!(
            timed_out = report.timed_out.len(),
            evicted_rooms = report.evicted_rooms.len(),
            reaped_sessions = report.reaped.len(),
            "Cleanup completed"
        );
    }
    report
}
