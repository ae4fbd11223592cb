//! 환경 변수 기반 설정 관리

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub matching: MatchConfig,
    pub room: RoomConfig,
    pub session: SessionConfig,
    pub timers: TimerConfig,
    pub ice: IceConfig,
    pub log_level: String,
}

/// 매칭 큐 설정
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// 큐 대기 최대 시간 (초과 시 sweeper가 제거)
    pub max_wait_ms: u64,
    /// false면 선호 조건 없이 누구와도 매칭
    pub use_preferences: bool,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub idle_timeout_ms: u64,
}

/// 세션 설정
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// heartbeat 없이 버틸 수 있는 시간. 0이면 비활성화
    pub timeout_ms: u64,
}

/// 주기 작업 설정
#[derive(Debug, Clone)]
pub struct TimerConfig {
    pub stats_interval_ms: u64,
    pub cleanup_interval_ms: u64,
}

/// STUN/TURN 설정
#[derive(Debug, Clone)]
pub struct IceConfig {
    pub stun_servers: Vec<String>,
    pub turn_url: String,
    pub turn_secret: String,
    pub turn_port: u16,
    pub credential_ttl: u64,
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            port: var_or("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            matching: MatchConfig {
                max_wait_ms: var_or("MATCH_MAX_WAIT_MS", defaults.matching.max_wait_ms),
                use_preferences: env::var("MATCH_USE_PREFERENCES")
                    .map(|v| v != "false")
                    .unwrap_or(defaults.matching.use_preferences),
            },
            room: RoomConfig {
                idle_timeout_ms: var_or("ROOM_IDLE_TIMEOUT_MS", defaults.room.idle_timeout_ms),
            },
            session: SessionConfig {
                timeout_ms: var_or("SESSION_TIMEOUT_MS", defaults.session.timeout_ms),
            },
            timers: TimerConfig {
                stats_interval_ms: var_or("STATS_INTERVAL_MS", defaults.timers.stats_interval_ms),
                cleanup_interval_ms: var_or(
                    "CLEANUP_INTERVAL_MS",
                    defaults.timers.cleanup_interval_ms,
                ),
            },
            ice: IceConfig {
                stun_servers: env::var("STUN_SERVERS")
                    .map(|v| split_list(&v))
                    .unwrap_or(defaults.ice.stun_servers),
                turn_url: env::var("TURN_SERVER_URL").unwrap_or_default(),
                turn_secret: env::var("TURN_SECRET").unwrap_or_default(),
                turn_port: var_or("TURN_PORT", defaults.ice.turn_port),
                credential_ttl: var_or("TURN_CREDENTIAL_TTL", defaults.ice.credential_ttl),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.matching.max_wait_ms)
    }

    pub fn room_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.room.idle_timeout_ms)
    }

    /// 0이면 None (세션 정리 안 함)
    pub fn session_timeout(&self) -> Option<Duration> {
        (self.session.timeout_ms > 0).then(|| Duration::from_millis(self.session.timeout_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5502,
            host: "0.0.0.0".to_string(),
            matching: MatchConfig {
                max_wait_ms: 30_000,
                use_preferences: true,
            },
            room: RoomConfig {
                idle_timeout_ms: 600_000,
            },
            session: SessionConfig {
                timeout_ms: 120_000,
            },
            timers: TimerConfig {
                stats_interval_ms: 2_000,
                cleanup_interval_ms: 30_000,
            },
            ice: IceConfig {
                stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
                turn_url: String::new(),
                turn_secret: String::new(),
                turn_port: 3478,
                credential_ttl: 3600,
            },
            log_level: "info".to_string(),
        }
    }
}

/// 값이 없거나 파싱 실패 시 기본값 사용
fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
