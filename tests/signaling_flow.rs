//! WebSocket 시그널링 흐름 통합 테스트
//!
//! 실제 라우터를 127.0.0.1:0에 띄우고 tokio-tungstenite 클라이언트로 검증한다.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use pairwire_signaling::config::Config;
use pairwire_signaling::lobby::{ClientId, RoomId};
use pairwire_signaling::server::{router, spawn_background_tasks};
use pairwire_signaling::state::AppState;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

const WAIT: Duration = Duration::from_secs(2);

async fn start_server(config: Config) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

/// 테스트용 WebSocket 클라이언트
struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    id: String,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        let mut client = Self {
            ws,
            id: String::new(),
        };
        let hello = client.expect("connected").await;
        client.id = hello["payload"]["clientId"].as_str().unwrap().to_string();
        client
    }

    async fn send(&mut self, frame: Value) {
        self.send_text(&frame.to_string()).await;
    }

    async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_string())).await.unwrap();
    }

    /// 다음 텍스트 프레임 원문
    async fn next_text(&mut self) -> String {
        tokio::time::timeout(WAIT, async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("connection ended: {other:?}"),
                }
            }
        })
        .await
        .expect("timed out waiting for frame")
    }

    /// 통계 브로드캐스트는 건너뛰고 원하는 이벤트를 기다린다
    async fn expect_text(&mut self, kind: &str) -> String {
        loop {
            let text = self.next_text().await;
            let value: Value = serde_json::from_str(&text).unwrap();
            if value["type"] == kind {
                return text;
            }
            let t = value["type"].as_str().unwrap_or_default();
            assert!(
                t == "online_count" || t == "user_stats",
                "expected {kind}, got {text}"
            );
        }
    }

    async fn expect(&mut self, kind: &str) -> Value {
        serde_json::from_str(&self.expect_text(kind).await).unwrap()
    }

    async fn assert_silent(&mut self, window: Duration) {
        if let Ok(Some(Ok(Message::Text(text)))) =
            tokio::time::timeout(window, self.ws.next()).await
        {
            panic!("unexpected frame: {text}");
        }
    }

    /// 서버가 소켓을 닫을 때까지 읽는다
    async fn expect_closed(&mut self) {
        tokio::time::timeout(WAIT, async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await
        .expect("socket was not closed");
    }

    async fn find_match(&mut self, preferences: Value) {
        self.send(json!({"type": "find_match", "payload": {"preferences": preferences}}))
            .await;
    }
}

async fn eventually<F: Fn() -> bool>(check: F) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn pair(addr: SocketAddr) -> (TestClient, TestClient, String) {
    let mut a = TestClient::connect(addr).await;
    let mut b = TestClient::connect(addr).await;
    a.find_match(json!({"country": "any"})).await;
    a.expect("waiting").await;
    b.find_match(json!({"country": "any"})).await;
    let matched_a = a.expect("matched").await;
    b.expect("matched").await;
    let room_id = matched_a["payload"]["roomId"].as_str().unwrap().to_string();
    (a, b, room_id)
}

#[tokio::test]
async fn two_clients_get_matched_with_one_initiator() {
    // given
    let (addr, _state) = start_server(Config::default()).await;
    let mut a = TestClient::connect(addr).await;
    let mut b = TestClient::connect(addr).await;

    // when
    a.find_match(json!({"country": "any"})).await;
    let waiting = a.expect("waiting").await;
    b.find_match(json!({"country": "any"})).await;
    let matched_a = a.expect("matched").await;
    let matched_b = b.expect("matched").await;

    // then
    assert_eq!(waiting["payload"]["queuePosition"], 1);
    assert_eq!(matched_a["payload"]["roomId"], matched_b["payload"]["roomId"]);
    let initiators = [&matched_a, &matched_b]
        .iter()
        .filter(|m| m["payload"]["isInitiator"] == true)
        .count();
    assert_eq!(initiators, 1);
    let peers = matched_a["payload"]["peers"].as_array().unwrap();
    assert!(peers.contains(&json!(a.id)));
    assert!(peers.contains(&json!(b.id)));
}

#[tokio::test]
async fn signal_payload_arrives_byte_identical() {
    // given
    let (addr, _state) = start_server(Config::default()).await;
    let (mut a, mut b, room_id) = pair(addr).await;
    let payload = r#"{"type":"offer",  "sdp":"v=0\r\no=- 46117 2 IN IP4 127.0.0.1\r\n","z":[1,2]}"#;

    // when
    a.send_text(&format!(
        r#"{{"type":"signal","payload":{{"roomId":"{room_id}","payload":{payload}}}}}"#
    ))
    .await;

    // then
    let text = b.expect_text("signal").await;
    assert!(text.contains(payload), "payload was altered: {text}");
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["payload"]["from"], json!(a.id));
}

#[tokio::test]
async fn disconnect_notifies_peer_and_closes_room() {
    // given
    let (addr, state) = start_server(Config::default()).await;
    let (mut a, mut b, room_id) = pair(addr).await;

    // when
    a.ws.close(None).await.unwrap();

    // then
    let left = b.expect("peer_left").await;
    assert_eq!(left["payload"]["roomId"], json!(room_id));
    let b_id = ClientId::from(b.id.as_str());
    let room_id = RoomId::from(room_id.as_str());
    let lobby = state.lobby.lock().await;
    assert!(lobby.rooms().get(&room_id).is_none());
    assert_eq!(lobby.registry().room_of(&b_id), None);
    assert_eq!(lobby.stats().online, 1);
}

#[tokio::test]
async fn leave_room_notifies_only_the_peer() {
    let (addr, state) = start_server(Config::default()).await;
    let (mut a, mut b, room_id) = pair(addr).await;

    a.send(json!({"type": "leave_room", "payload": {"roomId": room_id}}))
        .await;

    let left = b.expect("peer_left").await;
    assert_eq!(left["payload"]["roomId"], json!(room_id));
    a.assert_silent(Duration::from_millis(100)).await;
    assert_eq!(state.lobby.lock().await.stats().active_rooms, 0);
}

#[tokio::test]
async fn incompatible_preferences_keep_both_waiting() {
    let (addr, state) = start_server(Config::default()).await;
    let mut d = TestClient::connect(addr).await;
    let mut c = TestClient::connect(addr).await;

    d.find_match(json!({"gender": "female"})).await;
    d.expect("waiting").await;
    c.find_match(json!({"gender": "male"})).await;
    let waiting = c.expect("waiting").await;

    assert_eq!(waiting["payload"]["queuePosition"], 2);
    assert_eq!(state.lobby.lock().await.stats().waiting, 2);
}

#[tokio::test]
async fn signal_to_unknown_room_is_dropped_and_connection_survives() {
    // given
    let (addr, _state) = start_server(Config::default()).await;
    let (_a, mut b, _room_id) = pair(addr).await;
    let mut f = TestClient::connect(addr).await;

    // when
    f.send(json!({"type": "signal", "payload": {"roomId": "R9", "payload": {"type": "offer"}}}))
        .await;
    f.send_text("{not json").await;
    f.send(json!({"type": "heartbeat"})).await;

    // then
    f.expect("heartbeat_ack").await;
    b.assert_silent(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn duplicate_find_match_does_not_duplicate_entry() {
    let (addr, state) = start_server(Config::default()).await;
    let mut a = TestClient::connect(addr).await;

    a.find_match(json!({})).await;
    a.expect("waiting").await;
    a.find_match(json!({})).await;
    let again = a.expect("waiting").await;

    assert_eq!(again["payload"]["queuePosition"], 1);
    assert_eq!(state.lobby.lock().await.stats().waiting, 1);
}

#[tokio::test]
async fn cleanup_timer_times_out_waiting_client() {
    // given: 대기 한도 0, 정리 주기 20ms
    let mut config = Config::default();
    config.matching.max_wait_ms = 0;
    config.timers.cleanup_interval_ms = 20;
    config.timers.stats_interval_ms = 60_000;
    let (addr, state) = start_server(config).await;
    let tasks = spawn_background_tasks(state.clone());
    let mut e = TestClient::connect(addr).await;

    // when
    e.find_match(json!({"country": "any"})).await;

    // then: waiting과 search_timeout의 도착 순서는 보장되지 않는다
    loop {
        let value: Value = serde_json::from_str(&e.next_text().await).unwrap();
        if value["type"] == "search_timeout" {
            break;
        }
    }
    assert_eq!(state.lobby.lock().await.stats().waiting, 0);
    for task in tasks {
        task.abort();
    }
}

#[tokio::test]
async fn stats_are_broadcast_to_every_client() {
    let mut config = Config::default();
    config.timers.stats_interval_ms = 20;
    let (addr, state) = start_server(config).await;
    let mut a = TestClient::connect(addr).await;
    let mut b = TestClient::connect(addr).await;
    eventually(|| state.switchboard.len() == 2).await;
    let tasks = spawn_background_tasks(state.clone());

    let count_a = a.expect("online_count").await;
    let stats_b = b.expect("user_stats").await;

    assert_eq!(count_a["payload"]["count"], 2);
    assert_eq!(stats_b["payload"]["online"], 2);
    assert_eq!(stats_b["payload"]["activeRooms"], 0);
    for task in tasks {
        task.abort();
    }
}

#[tokio::test]
async fn non_string_and_null_preferences_are_accepted() {
    let (addr, _state) = start_server(Config::default()).await;
    let mut a = TestClient::connect(addr).await;
    let mut b = TestClient::connect(addr).await;

    a.find_match(json!({"country": "kr", "minAge": 18})).await;
    a.expect("waiting").await;
    b.find_match(Value::Null).await;

    a.expect("matched").await;
    b.expect("matched").await;
}

#[tokio::test]
async fn shutdown_closes_sockets_and_drains_sessions() {
    // given
    let (addr, state) = start_server(Config::default()).await;
    let (mut a, mut b, _room_id) = pair(addr).await;
    eventually(|| state.connections.active() == 2).await;

    // when
    state.connections.begin_shutdown();

    // then
    a.expect_closed().await;
    b.expect_closed().await;
    tokio::time::timeout(WAIT, state.connections.drained())
        .await
        .expect("sessions drained");
    let lobby = state.lobby.lock().await;
    assert_eq!(lobby.stats().online, 0);
    assert_eq!(lobby.stats().active_rooms, 0);
}

#[tokio::test]
async fn ice_config_lists_stun_servers() {
    let (addr, _state) = start_server(Config::default()).await;
    let mut a = TestClient::connect(addr).await;

    a.send(json!({"type": "request_ice_config"})).await;

    let config = a.expect("ice_config").await;
    assert_eq!(
        config["payload"]["iceServers"][0]["urls"][0],
        "stun:stun.l.google.com:19302"
    );
}

#[tokio::test]
async fn health_and_stats_endpoints_respond() {
    let state = Arc::new(AppState::new(Config::default()));

    let health = router(state.clone())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let stats = router(state)
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(stats.status(), StatusCode::OK);
    let body = axum::body::to_bytes(stats.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        value,
        json!({"online": 0, "waiting": 0, "inRoom": 0, "activeRooms": 0})
    );
}
