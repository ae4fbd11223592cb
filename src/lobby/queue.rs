//! 매칭 대기열 (FIFO)

use super::ids::ClientId;
use super::preferences::Preferences;
use super::registry::ConnectionRegistry;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 대기 중인 클라이언트
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub client_id: ClientId,
    pub enqueued_at: Instant,
    /// 큐에 들어올 때의 선호 조건
    pub preferences: Preferences,
}

/// `request_match` 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// 이미 대기 중. 상태 변화 없음
    AlreadyWaiting { position: usize },
    /// 대기 중이던 `waiting`과 짝이 지어짐. 방 생성은 호출자 몫
    Matched {
        waiting: ClientId,
        requester: ClientId,
    },
    /// 큐 끝에 추가됨 (1부터 시작하는 순번)
    Waiting { position: usize },
}

#[derive(Debug)]
pub struct MatchQueue {
    entries: VecDeque<QueueEntry>,
    use_preferences: bool,
}

impl MatchQueue {
    pub fn new(use_preferences: bool) -> Self {
        Self {
            entries: VecDeque::new(),
            use_preferences,
        }
    }

    pub fn request_match(
        &mut self,
        id: &ClientId,
        preferences: &Preferences,
        registry: &ConnectionRegistry,
        now: Instant,
    ) -> MatchOutcome {
        if let Some(position) = self.position(id) {
            return MatchOutcome::AlreadyWaiting { position };
        }

        // 오래된 순서대로 스캔. 끊긴 세션의 항목은 그 자리에서 버린다
        let mut index = 0;
        while index < self.entries.len() {
            let entry = &self.entries[index];
            if !registry.contains(&entry.client_id) {
                tracing::debug!(client_id = %entry.client_id, "Discarded stale queue entry");
                self.entries.remove(index);
                continue;
            }
            if self.compatible(&entry.preferences, preferences) {
                if let Some(entry) = self.entries.remove(index) {
                    return MatchOutcome::Matched {
                        waiting: entry.client_id,
                        requester: id.clone(),
                    };
                }
            }
            index += 1;
        }

        self.entries.push_back(QueueEntry {
            client_id: id.clone(),
            enqueued_at: now,
            preferences: preferences.clone(),
        });
        MatchOutcome::Waiting {
            position: self.entries.len(),
        }
    }

    /// 방 생성 실패로 남겨진 클라이언트를 맨 앞으로 되돌린다
    pub fn requeue_front(&mut self, id: &ClientId, preferences: Preferences, now: Instant) {
        if self.position(id).is_some() {
            return;
        }
        self.entries.push_front(QueueEntry {
            client_id: id.clone(),
            enqueued_at: now,
            preferences,
        });
    }

    pub fn remove(&mut self, id: &ClientId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.client_id != id);
        before != self.entries.len()
    }

    /// `max_wait`보다 오래 기다린 항목을 모두 꺼낸다
    pub fn evict_stale(&mut self, max_wait: Duration, now: Instant) -> Vec<QueueEntry> {
        let (stale, fresh): (VecDeque<_>, VecDeque<_>) = self
            .entries
            .drain(..)
            .partition(|e| now.saturating_duration_since(e.enqueued_at) > max_wait);
        self.entries = fresh;
        stale.into()
    }

    pub fn position(&self, id: &ClientId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| &e.client_id == id)
            .map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn compatible(&self, queued: &Preferences, incoming: &Preferences) -> bool {
        !self.use_preferences || queued.is_compatible_with(incoming)
    }
}
