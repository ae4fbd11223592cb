//! 연결 레지스트리: 접속 중인 클라이언트 세션의 유일한 소유자

use super::ids::{ClientId, RoomId};
use super::preferences::Preferences;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 클라이언트 세션 정보
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub id: ClientId,
    pub joined_at: Instant,
    pub last_heartbeat: Instant,
    pub room_id: Option<RoomId>,
    pub preferences: Preferences,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<ClientId, ClientSession>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세션 등록. 이미 있으면 heartbeat만 갱신하고 false 반환
    pub fn add(&mut self, id: &ClientId, now: Instant) -> bool {
        if let Some(session) = self.sessions.get_mut(id) {
            session.last_heartbeat = now;
            return false;
        }
        self.sessions.insert(
            id.clone(),
            ClientSession {
                id: id.clone(),
                joined_at: now,
                last_heartbeat: now,
                room_id: None,
                preferences: Preferences::default(),
            },
        );
        true
    }

    /// 세션만 제거한다. 큐/방 정리는 `Lobby::disconnect`가 담당
    pub fn remove(&mut self, id: &ClientId) -> Option<ClientSession> {
        self.sessions.remove(id)
    }

    pub fn touch(&mut self, id: &ClientId, now: Instant) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.last_heartbeat = now;
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get(&self, id: &ClientId) -> Option<&ClientSession> {
        self.sessions.get(id)
    }

    pub fn room_of(&self, id: &ClientId) -> Option<&RoomId> {
        self.sessions.get(id).and_then(|s| s.room_id.as_ref())
    }

    pub fn set_preferences(&mut self, id: &ClientId, preferences: Preferences) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.preferences = preferences;
        }
    }

    pub(crate) fn set_room(&mut self, id: &ClientId, room_id: Option<RoomId>) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.room_id = room_id;
                true
            }
            None => false,
        }
    }

    /// 방 id가 일치할 때만 해제 (다른 방으로 이미 옮겨간 경우 보호)
    pub(crate) fn clear_room(&mut self, id: &ClientId, room_id: &RoomId) {
        if let Some(session) = self.sessions.get_mut(id) {
            if session.room_id.as_ref() == Some(room_id) {
                session.room_id = None;
            }
        }
    }

    pub fn in_room_count(&self) -> usize {
        self.sessions.values().filter(|s| s.room_id.is_some()).count()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.sessions.keys().cloned().collect()
    }

    /// heartbeat가 `timeout`보다 오래 끊긴 세션
    pub fn silent_since(&self, timeout: Duration, now: Instant) -> Vec<ClientId> {
        self.sessions
            .values()
            .filter(|s| now.saturating_duration_since(s.last_heartbeat) > timeout)
            .map(|s| s.id.clone())
            .collect()
    }
}
