//! 접속자 수 카운터
//!
//! 여러 프로세스가 접속자 수를 공유할 때 외부 저장소 구현으로 교체할 수 있다.
//! 매칭/중계는 이 카운터에 의존하지 않으며, 통계만 이 값을 사용한다.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("presence backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PresenceCounter: Send + Sync {
    async fn increment_online(&self) -> Result<(), PresenceError>;

    async fn decrement_online(&self) -> Result<(), PresenceError>;

    async fn count_online(&self) -> Result<usize, PresenceError>;
}

/// 프로세스 내부 기본 구현
#[derive(Debug, Default)]
pub struct LocalPresence {
    online: AtomicUsize,
}

impl LocalPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceCounter for LocalPresence {
    async fn increment_online(&self) -> Result<(), PresenceError> {
        self.online.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn decrement_online(&self) -> Result<(), PresenceError> {
        // 0 아래로 내려가지 않게
        let _ = self
            .online
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        Ok(())
    }

    async fn count_online(&self) -> Result<usize, PresenceError> {
        Ok(self.online.load(Ordering::Relaxed))
    }
}
