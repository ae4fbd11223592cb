//! HTTP/WebSocket 서버와 주기 작업

use crate::config::Config;
use crate::handlers;
use crate::lobby::ClientId;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 라우터 구성
pub fn router(state: Arc<AppState>) -> Router {
    // CORS 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 종료 시 열린 세션을 기다리는 최대 시간
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// 세션 종료 시 수신 중인 프레임 처리를 기다리는 시간
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// 서버 실행. 종료 시그널을 받으면 리스너를 닫고 열린 세션이 정리된 뒤 반환
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config));
    let tasks = spawn_background_tasks(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("🚀 Pairwire Signaling Server started");
    tracing::info!("Address: {}", listener.local_addr()?);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    let signal_state = state.clone();
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_state.connections.begin_shutdown();
        })
        .await
        .context("server terminated abnormally")?;

    // 업그레이드된 소켓은 axum이 기다리지 않는다
    state.connections.begin_shutdown();
    if tokio::time::timeout(DRAIN_TIMEOUT, state.connections.drained())
        .await
        .is_err()
    {
        tracing::warn!(
            remaining = state.connections.active(),
            "Timed out waiting for WebSocket sessions"
        );
    }

    for task in tasks {
        task.abort();
    }
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 통계 브로드캐스트와 정리 스케줄러
pub fn spawn_background_tasks(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    let stats_period = Duration::from_millis(state.config.timers.stats_interval_ms.max(1));
    let cleanup_period = Duration::from_millis(state.config.timers.cleanup_interval_ms.max(1));

    let stats_state = state.clone();
    let stats_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(stats_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            handlers::broadcast_stats(&stats_state).await;
        }
    });

    let cleanup_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            handlers::run_cleanup(&state).await;
        }
    });

    vec![stats_task, cleanup_task]
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "pairwire-signaling",
        "timestamp": SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }))
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(handlers::collect_stats(&state).await)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let _guard = state.connections.track();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 연결 처리. tx는 switchboard만 소유한다
    let client_id = handlers::handle_connection(&state, tx).await;

    // 송신 태스크
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg.to_json() {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode server message"),
            }
        }
        let _ = ws_sender.close().await;
    });

    // 수신 처리
    let recv_state = state.clone();
    let recv_id = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    handle_client_frame(&recv_state, &recv_id, &text).await;
                }
                Ok(Message::Binary(_)) => {
                    tracing::warn!(client_id = %recv_id, "Binary frame ignored");
                }
                Ok(Message::Close(frame)) => {
                    return frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "client closed".to_string());
                }
                Ok(_) => {}
                Err(e) => return format!("transport error: {e}"),
            }
        }
        "stream ended".to_string()
    });

    let reason = tokio::select! {
        reason = &mut recv_task => {
            send_task.abort();
            reason.unwrap_or_else(|_| "receiver aborted".to_string())
        }
        _ = &mut send_task => {
            recv_task.abort();
            "outbound channel closed".to_string()
        }
        _ = state.connections.shutdown_requested() => {
            // 쌓인 메시지를 보낸 뒤 close 프레임으로 닫는다
            state.switchboard.detach(&client_id);
            let _ = (&mut send_task).await;
            if tokio::time::timeout(CLOSE_GRACE, &mut recv_task).await.is_err() {
                recv_task.abort();
            }
            "server shutting down".to_string()
        }
    };

    // 연결 해제
    handlers::handle_disconnect(&state, &client_id, &reason).await;
}

async fn handle_client_frame(state: &AppState, client_id: &ClientId, text: &str) {
    let msg = match ClientMessage::parse(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(client_id = %client_id, error = %e, "Dropped invalid client frame");
            return;
        }
    };

    match msg {
        ClientMessage::Heartbeat => {
            handlers::handle_heartbeat(state, client_id).await;
        }
        ClientMessage::FindMatch { preferences } => {
            handlers::handle_find_match(state, client_id, preferences).await;
        }
        ClientMessage::CancelMatch => {
            handlers::handle_cancel_match(state, client_id).await;
        }
        ClientMessage::Signal { room_id, payload } => {
            handlers::handle_signal(state, client_id, &room_id, payload).await;
        }
        ClientMessage::LeaveRoom { room_id } => {
            handlers::handle_leave_room(state, client_id, &room_id).await;
        }
        ClientMessage::RequestIceConfig => {
            handlers::handle_ice_config_request(state, client_id).await;
        }
    }
}
