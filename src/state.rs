//! 애플리케이션 상태 관리

use crate::config::Config;
use crate::lobby::{Lobby, SweepLimits};
use crate::presence::{LocalPresence, PresenceCounter};
use crate::shutdown::ConnectionTracker;
use crate::switchboard::Switchboard;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 레지스트리/큐/방 테이블. 모든 변경은 이 락으로 직렬화된다
    pub lobby: Mutex<Lobby>,
    /// 연결별 송신 채널
    pub switchboard: Switchboard,
    pub presence: Arc<dyn PresenceCounter>,
    /// 열린 WebSocket 세션과 종료 신호
    pub connections: ConnectionTracker,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_presence(config, Arc::new(LocalPresence::new()))
    }

    pub fn with_presence(config: Config, presence: Arc<dyn PresenceCounter>) -> Self {
        Self {
            lobby: Mutex::new(Lobby::new(config.matching.use_preferences)),
            switchboard: Switchboard::new(),
            presence,
            connections: ConnectionTracker::new(),
            config: Arc::new(config),
        }
    }

    pub fn sweep_limits(&self) -> SweepLimits {
        SweepLimits {
            max_wait: self.config.max_wait(),
            max_idle: self.config.room_idle_timeout(),
            session_timeout: self.config.session_timeout(),
        }
    }
}
