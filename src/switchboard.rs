//! 연결별 송신 채널 관리

use crate::lobby::{ClientId, Dispatch};
use crate::protocol::ServerMessage;
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;

/// client_id -> 소켓 송신 태스크로 이어지는 채널
#[derive(Default)]
pub struct Switchboard {
    senders: DashMap<ClientId, UnboundedSender<ServerMessage>>,
}

impl Switchboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, id: ClientId, sender: UnboundedSender<ServerMessage>) {
        self.senders.insert(id, sender);
    }

    /// 채널을 떼어낸다. 마지막 sender가 사라지면 송신 태스크가 끝나고 소켓이 닫힌다
    pub fn detach(&self, id: &ClientId) -> bool {
        self.senders.remove(id).is_some()
    }

    pub fn send(&self, id: &ClientId, message: ServerMessage) -> bool {
        // 샤드 락을 잡은 채로 보내지 않도록 sender를 복제해 둔다
        let Some(sender) = self.senders.get(id).map(|s| s.value().clone()) else {
            tracing::debug!(client_id = %id, "No outbound channel for client");
            return false;
        };
        if sender.send(message).is_err() {
            tracing::debug!(client_id = %id, "Outbound channel closed");
            return false;
        }
        true
    }

    /// 한 명에게 실패해도 나머지는 계속 전송
    pub fn deliver(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            self.send(&dispatch.to, dispatch.message);
        }
    }

    pub fn broadcast(&self, recipients: &[ClientId], message: &ServerMessage) -> usize {
        recipients
            .iter()
            .filter(|id| self.send(id, message.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
