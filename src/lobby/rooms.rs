//! 1:1 방 테이블

use super::ids::{ClientId, RoomId};
use super::registry::ConnectionRegistry;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    /// 매칭과 방 생성 사이에 한쪽이 끊긴 경우
    #[error("member {missing} is no longer connected")]
    MemberGone {
        missing: ClientId,
        survivor: Option<ClientId>,
    },
    #[error("room {0} does not exist")]
    NotFound(RoomId),
    #[error("client {client_id} is not a member of room {room_id}")]
    NotAMember { client_id: ClientId, room_id: RoomId },
}

/// 방 정보. 항상 정확히 두 명
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub members: [ClientId; 2],
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl Room {
    pub fn peer_of(&self, id: &ClientId) -> Option<&ClientId> {
        match &self.members {
            [a, b] if a == id => Some(b),
            [a, b] if b == id => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomTable {
    rooms: HashMap<RoomId, Room>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 방을 만들고 두 세션의 room_id를 설정한다
    pub fn create(
        &mut self,
        a: &ClientId,
        b: &ClientId,
        registry: &mut ConnectionRegistry,
        now: Instant,
    ) -> Result<RoomId, RoomError> {
        match (registry.contains(a), registry.contains(b)) {
            (true, true) => {}
            (false, b_alive) => {
                return Err(RoomError::MemberGone {
                    missing: a.clone(),
                    survivor: b_alive.then(|| b.clone()),
                })
            }
            (true, false) => {
                return Err(RoomError::MemberGone {
                    missing: b.clone(),
                    survivor: Some(a.clone()),
                })
            }
        }

        let id = loop {
            let candidate = RoomId::generate();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        self.rooms.insert(
            id.clone(),
            Room {
                id: id.clone(),
                members: [a.clone(), b.clone()],
                created_at: now,
                last_activity: now,
            },
        );
        registry.set_room(a, Some(id.clone()));
        registry.set_room(b, Some(id.clone()));
        Ok(id)
    }

    pub fn touch(&mut self, room_id: &RoomId, now: Instant) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.last_activity = now;
        }
    }

    /// 멤버가 아니면 무시. 성공 시 방을 지우고 상대 id를 돌려준다
    pub fn leave(
        &mut self,
        id: &ClientId,
        room_id: &RoomId,
        registry: &mut ConnectionRegistry,
    ) -> Option<ClientId> {
        let peer = self.rooms.get(room_id)?.peer_of(id)?.clone();
        let room = self.rooms.remove(room_id)?;
        for member in &room.members {
            registry.clear_room(member, room_id);
        }
        Some(peer)
    }

    /// `max_idle`을 넘긴 방을 지우고 반환한다. 멤버들의 room_id도 해제된다
    pub fn evict_stale(
        &mut self,
        max_idle: Duration,
        now: Instant,
        registry: &mut ConnectionRegistry,
    ) -> Vec<Room> {
        let stale: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|r| now.saturating_duration_since(r.last_activity) > max_idle)
            .map(|r| r.id.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|room_id| self.rooms.remove(&room_id))
            .inspect(|room| {
                for member in &room.members {
                    registry.clear_room(member, &room.id);
                }
            })
            .collect()
    }

    /// 중계 대상 조회. 방이 없거나 멤버가 아니면 인가 실패
    pub fn other_member(&self, room_id: &RoomId, id: &ClientId) -> Result<&ClientId, RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        room.peer_of(id).ok_or_else(|| RoomError::NotAMember {
            client_id: id.clone(),
            room_id: room_id.clone(),
        })
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }
}
