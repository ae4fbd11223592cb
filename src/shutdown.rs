//! 종료 신호 전파와 열린 WebSocket 세션 추적
//!
//! axum의 graceful shutdown은 업그레이드된 소켓을 기다리지 않으므로,
//! 세션마다 `ConnectionGuard`를 잡고 `drained`로 모두 끝날 때까지 기다린다.

use std::sync::Arc;
use tokio::sync::watch;

pub struct ConnectionTracker {
    shutdown: watch::Sender<bool>,
    active: Arc<watch::Sender<usize>>,
}

/// 살아 있는 동안 세션 하나로 집계된다
pub struct ConnectionGuard {
    active: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        let (active, _) = watch::channel(0);
        Self {
            shutdown,
            active: Arc::new(active),
        }
    }

    pub fn track(&self) -> ConnectionGuard {
        self.active.send_modify(|n| *n += 1);
        ConnectionGuard {
            active: self.active.clone(),
        }
    }

    pub fn active(&self) -> usize {
        *self.active.borrow()
    }

    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// 종료가 요청될 때까지 대기
    pub async fn shutdown_requested(&self) {
        let mut rx = self.shutdown.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// 모든 세션이 끝날 때까지 대기
    pub async fn drained(&self) {
        let mut rx = self.active.subscribe();
        while *rx.borrow_and_update() > 0 {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }
}
