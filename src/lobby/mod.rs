//! 매칭 상태: 연결 레지스트리, 매칭 큐, 방 테이블
//!
//! 세 저장소는 `Lobby` 하나로 묶여 `AppState`의 Mutex 뒤에 있다. 여러 저장소에
//! 걸친 작업(매칭 후 방 생성, 연결 해제 연쇄 정리, 주기 정리)은 락 하나 안에서
//! 끝나고, 전송할 메시지는 `Dispatch` 목록으로 돌려준다. 실제 전송은 락을 푼 뒤
//! `Switchboard`가 한다.

pub mod ids;
pub mod preferences;
pub mod queue;
pub mod registry;
pub mod rooms;

pub use ids::{ClientId, RoomId};
pub use preferences::Preferences;
pub use queue::{MatchOutcome, MatchQueue, QueueEntry};
pub use registry::{ClientSession, ConnectionRegistry};
pub use rooms::{Room, RoomError, RoomTable};

use crate::protocol::ServerMessage;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::HashSet;
use std::time::{Duration, Instant};

const WAITING_MESSAGE: &str = "Waiting for a peer";
const ALREADY_WAITING_MESSAGE: &str = "Already searching for a peer";
const SEARCH_TIMEOUT_MESSAGE: &str = "No peer found in time, please search again";

/// 락 해제 후 보낼 메시지
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub to: ClientId,
    pub message: ServerMessage,
}

impl Dispatch {
    pub fn new(to: ClientId, message: ServerMessage) -> Self {
        Self { to, message }
    }
}

/// 집계 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub online: usize,
    pub waiting: usize,
    pub in_room: usize,
    pub active_rooms: usize,
}

/// 정리 작업 기준 시간
#[derive(Debug, Clone, Copy)]
pub struct SweepLimits {
    pub max_wait: Duration,
    pub max_idle: Duration,
    pub session_timeout: Option<Duration>,
}

/// 한 번의 정리 결과
#[derive(Debug, Default)]
pub struct SweepReport {
    pub dispatches: Vec<Dispatch>,
    pub timed_out: Vec<ClientId>,
    pub evicted_rooms: Vec<RoomId>,
    pub reaped: Vec<ClientId>,
}

#[derive(Debug)]
pub struct Lobby {
    registry: ConnectionRegistry,
    queue: MatchQueue,
    rooms: RoomTable,
}

impl Lobby {
    pub fn new(use_preferences: bool) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            queue: MatchQueue::new(use_preferences),
            rooms: RoomTable::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &MatchQueue {
        &self.queue
    }

    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }

    /// 새 연결 등록. 처음 등록이면 true
    pub fn connect(&mut self, id: &ClientId, now: Instant) -> bool {
        self.registry.add(id, now)
    }

    /// 연결 해제 연쇄 처리. 모르는 id면 None (중복 호출에 안전)
    pub fn disconnect(&mut self, id: &ClientId) -> Option<Vec<Dispatch>> {
        let session = self.registry.remove(id)?;
        let mut dispatches = Vec::new();

        if self.queue.remove(id) {
            tracing::debug!(client_id = %id, "Removed from match queue on disconnect");
        }
        if let Some(room_id) = session.room_id {
            if let Some(peer) = self.rooms.leave(id, &room_id, &mut self.registry) {
                tracing::info!(client_id = %id, room_id = %room_id, peer = %peer, "Room closed by disconnect");
                dispatches.push(Dispatch::new(peer, ServerMessage::PeerLeft { room_id }));
            }
        }
        Some(dispatches)
    }

    pub fn heartbeat(&mut self, id: &ClientId, now: Instant) -> bool {
        self.registry.touch(id, now)
    }

    /// 매칭 요청 처리
    pub fn find_match(
        &mut self,
        id: &ClientId,
        preferences: Preferences,
        now: Instant,
    ) -> Vec<Dispatch> {
        let Some(session) = self.registry.get(id) else {
            tracing::warn!(client_id = %id, "find_match from unregistered client ignored");
            return Vec::new();
        };
        if let Some(room_id) = &session.room_id {
            tracing::warn!(client_id = %id, room_id = %room_id, "find_match while already in a room ignored");
            return Vec::new();
        }

        // 중복 요청이면 세션의 선호 조건도 그대로 둔다
        match self.queue.request_match(id, &preferences, &self.registry, now) {
            MatchOutcome::AlreadyWaiting { position } => {
                vec![waiting(id, ALREADY_WAITING_MESSAGE, position)]
            }
            MatchOutcome::Waiting { position } => {
                self.registry.set_preferences(id, preferences);
                tracing::info!(client_id = %id, queue_position = position, "Client waiting for match");
                vec![waiting(id, WAITING_MESSAGE, position)]
            }
            MatchOutcome::Matched { waiting, requester } => {
                self.registry.set_preferences(id, preferences);
                self.open_room(waiting, requester, now)
            }
        }
    }

    fn open_room(&mut self, waiting: ClientId, requester: ClientId, now: Instant) -> Vec<Dispatch> {
        match self.rooms.create(&waiting, &requester, &mut self.registry, now) {
            Ok(room_id) => {
                tracing::info!(
                    room_id = %room_id,
                    waiting = %waiting,
                    requester = %requester,
                    "Match found, room created"
                );
                let peers = [waiting.clone(), requester.clone()];
                vec![
                    Dispatch::new(
                        waiting,
                        ServerMessage::Matched {
                            room_id: room_id.clone(),
                            peers: peers.clone(),
                            is_initiator: false,
                        },
                    ),
                    Dispatch::new(
                        requester,
                        ServerMessage::Matched {
                            room_id,
                            peers,
                            is_initiator: true,
                        },
                    ),
                ]
            }
            Err(RoomError::MemberGone { missing, survivor }) => {
                tracing::warn!(missing = %missing, "Matched peer vanished before room creation");
                let Some(survivor) = survivor else {
                    return Vec::new();
                };
                let preferences = self
                    .registry
                    .get(&survivor)
                    .map(|s| s.preferences.clone())
                    .unwrap_or_default();
                self.queue.requeue_front(&survivor, preferences, now);
                let position = self.queue.position(&survivor).unwrap_or(1);
                vec![waiting_dispatch(survivor, WAITING_MESSAGE, position)]
            }
            Err(err) => {
                tracing::warn!(error = %err, "Room creation failed");
                Vec::new()
            }
        }
    }

    /// 대기 취소. 대기 중이 아니면 false
    pub fn cancel_match(&mut self, id: &ClientId) -> bool {
        self.queue.remove(id)
    }

    /// 방 나가기. 멤버가 아니면 무시
    pub fn leave_room(&mut self, id: &ClientId, room_id: &RoomId) -> Vec<Dispatch> {
        match self.rooms.leave(id, room_id, &mut self.registry) {
            Some(peer) => {
                tracing::info!(client_id = %id, room_id = %room_id, "Client left room");
                vec![Dispatch::new(
                    peer,
                    ServerMessage::PeerLeft {
                        room_id: room_id.clone(),
                    },
                )]
            }
            None => {
                tracing::warn!(client_id = %id, room_id = %room_id, "leave_room for foreign or missing room ignored");
                Vec::new()
            }
        }
    }

    /// 시그널 중계. 인가 실패 시 None
    pub fn relay(
        &mut self,
        sender: &ClientId,
        room_id: &RoomId,
        payload: Box<RawValue>,
        now: Instant,
    ) -> Option<Dispatch> {
        let peer = match self.rooms.other_member(room_id, sender) {
            Ok(peer) => peer.clone(),
            Err(err) => {
                tracing::warn!(client_id = %sender, room_id = %room_id, error = %err, "Dropped unauthorized signal");
                return None;
            }
        };
        self.rooms.touch(room_id, now);
        Some(Dispatch::new(
            peer,
            ServerMessage::Signal {
                from: sender.clone(),
                payload,
            },
        ))
    }

    pub fn stats(&self) -> AggregateStats {
        AggregateStats {
            online: self.registry.count(),
            waiting: self.queue.len(),
            in_room: self.registry.in_room_count(),
            active_rooms: self.rooms.len(),
        }
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.registry.ids()
    }

    /// 오래된 대기, 유휴 방, 응답 없는 세션 정리
    pub fn sweep(&mut self, limits: &SweepLimits, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();

        for entry in self.queue.evict_stale(limits.max_wait, now) {
            report.dispatches.push(Dispatch::new(
                entry.client_id.clone(),
                ServerMessage::SearchTimeout {
                    message: SEARCH_TIMEOUT_MESSAGE.to_string(),
                },
            ));
            report.timed_out.push(entry.client_id);
        }

        for room in self.rooms.evict_stale(limits.max_idle, now, &mut self.registry) {
            for member in &room.members {
                report.dispatches.push(Dispatch::new(
                    member.clone(),
                    ServerMessage::PeerLeft {
                        room_id: room.id.clone(),
                    },
                ));
            }
            report.evicted_rooms.push(room.id);
        }

        if let Some(timeout) = limits.session_timeout {
            for id in self.registry.silent_since(timeout, now) {
                if let Some(dispatches) = self.disconnect(&id) {
                    report.dispatches.extend(dispatches);
                    report.reaped.push(id);
                }
            }
        }

        if !report.reaped.is_empty() {
            let reaped: HashSet<&ClientId> = report.reaped.iter().collect();
            report.dispatches.retain(|d| !reaped.contains(&d.to));
        }
        report
    }
}

fn waiting(id: &ClientId, message: &str, position: usize) -> Dispatch {
    waiting_dispatch(id.clone(), message, position)
}

fn waiting_dispatch(id: ClientId, message: &str, position: usize) -> Dispatch {
    Dispatch::new(
        id,
        ServerMessage::Waiting {
            message: message.to_string(),
            queue_position: position,
        },
    )
}
