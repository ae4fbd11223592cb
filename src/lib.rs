//! Pairwire 시그널링/매칭 서버
//!
//! 익명 클라이언트를 1:1로 짝지어 방을 만들고, 방 안에서 WebRTC 협상 메시지를
//! 그대로 중계한다. 미디어는 이 서버를 거치지 않는다.

pub mod config;
pub mod handlers;
pub mod lobby;
pub mod presence;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod switchboard;
