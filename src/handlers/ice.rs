//! ICE 서버 설정 핸들러 (STUN + TURN REST 자격증명)

use crate::config::IceConfig;
use crate::lobby::ClientId;
use crate::protocol::{IceServer, ServerMessage};
use crate::state::AppState;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

/// ICE 설정 요청 처리
pub async fn handle_ice_config_request(state: &AppState, client_id: &ClientId) {
    let ice = &state.config.ice;
    let ice_servers = build_ice_servers(ice, unix_now());

    state.switchboard.send(
        client_id,
        ServerMessage::IceConfig {
            ice_servers,
            ttl: ice.credential_ttl,
        },
    );
    tracing::debug!(client_id = %client_id, "ICE config sent");
}

/// STUN 목록 + (설정된 경우) TURN 서버
pub fn build_ice_servers(config: &IceConfig, now: u64) -> Vec<IceServer> {
    let mut servers: Vec<IceServer> = config
        .stun_servers
        .iter()
        .map(|url| IceServer {
            urls: vec![url.clone()],
            username: None,
            credential: None,
        })
        .collect();

    if config.turn_url.is_empty() || config.turn_secret.is_empty() {
        return servers;
    }

    // RFC 5766 TURN REST: username = "<만료 시각>:<임의 사용자>"
    let expiry = now + config.credential_ttl;
    let random: u64 = rand::random();
    let username = format!("{}:user_{}_{:x}", expiry, now, random);

    match sign(&username, &config.turn_secret) {
        Some(credential) => servers.push(IceServer {
            urls: vec![
                format!("turn:{}:{}?transport=udp", config.turn_url, config.turn_port),
                format!("turn:{}:{}?transport=tcp", config.turn_url, config.turn_port),
            ],
            username: Some(username),
            credential: Some(credential),
        }),
        None => tracing::warn!("TURN secret rejected by HMAC, serving STUN only"),
    }

    servers
}

fn sign(username: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(username.as_bytes());
    Some(BASE64.encode(mac.finalize().into_bytes()))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
