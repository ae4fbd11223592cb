//! 클라이언트-서버 메시지 프로토콜 정의
//!
//! 모든 프레임은 `{"type": "<event>", "payload": {...}}` 형태의 JSON 텍스트.

use crate::lobby::{AggregateStats, ClientId, Preferences, RoomId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown event type: {0}")]
    UnknownType(String),
    #[error("event {0} requires a payload")]
    MissingPayload(&'static str),
}

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone)]
pub enum ClientMessage {
    FindMatch { preferences: Preferences },
    CancelMatch,
    /// payload는 해석하지 않고 그대로 전달
    Signal {
        room_id: RoomId,
        payload: Box<RawValue>,
    },
    LeaveRoom { room_id: RoomId },
    Heartbeat,
    RequestIceConfig,
}

#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: String,
    #[serde(borrow, default)]
    payload: Option<&'a RawValue>,
}

#[derive(Deserialize, Default)]
struct FindMatchPayload {
    /// 누락과 `null` 모두 조건 없음으로 본다
    #[serde(default)]
    preferences: Option<Preferences>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalPayload {
    room_id: RoomId,
    payload: Box<RawValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaveRoomPayload {
    room_id: RoomId,
}

impl ClientMessage {
    /// 텍스트 프레임 파싱. `type`과 `payload`의 순서는 상관없다
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope<'_> = serde_json::from_str(text)?;
        let payload = envelope.payload;

        let message = match envelope.kind.as_str() {
            "find_match" => {
                let body: FindMatchPayload = match payload {
                    Some(raw) => decode(raw)?,
                    None => FindMatchPayload::default(),
                };
                Self::FindMatch {
                    preferences: body.preferences.unwrap_or_default(),
                }
            }
            "cancel_match" => Self::CancelMatch,
            "signal" => {
                let body: SignalPayload = decode(payload.ok_or(ProtocolError::MissingPayload("signal"))?)?;
                Self::Signal {
                    room_id: body.room_id,
                    payload: body.payload,
                }
            }
            "leave_room" => {
                let body: LeaveRoomPayload =
                    decode(payload.ok_or(ProtocolError::MissingPayload("leave_room"))?)?;
                Self::LeaveRoom {
                    room_id: body.room_id,
                }
            }
            "heartbeat" => Self::Heartbeat,
            "request_ice_config" => Self::RequestIceConfig,
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        Ok(message)
    }
}

fn decode<T: DeserializeOwned>(raw: &RawValue) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(raw.get())?)
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    // Connection
    Connected { client_id: ClientId },
    HeartbeatAck,

    // Matching
    Matched {
        room_id: RoomId,
        peers: [ClientId; 2],
        is_initiator: bool,
    },
    Waiting {
        message: String,
        queue_position: usize,
    },
    SearchTimeout { message: String },

    // Room Events
    PeerLeft { room_id: RoomId },

    // WebRTC Signaling
    Signal {
        from: ClientId,
        payload: Box<RawValue>,
    },

    // Stats
    OnlineCount { count: usize },
    UserStats(AggregateStats),

    // ICE
    IceConfig {
        ice_servers: Vec<IceServer>,
        ttl: u64,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// ICE 서버 설정 (브라우저 RTCIceServer 형태)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}
