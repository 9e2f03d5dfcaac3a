use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::store::UserId;

/// Discriminator-only peek used to route an inbound frame before parsing
/// it fully, mirroring the original server's `message.get("type")` check.
#[derive(Deserialize, Debug)]
pub struct Discriminator {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// `{"type":"register", ...}` (§6.1).
#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    pub public_ip: Option<String>,
    pub public_port: Option<i64>,
    pub agent_id: Option<String>,
    pub relay_ip: Option<String>,
    pub relay_port: Option<i64>,
}

impl RegisterRequest {
    /// `public_ip` must be non-empty and `public_port` a positive integer.
    pub fn validate(&self) -> Option<(String, u32)> {
        let ip = self.public_ip.as_ref().filter(|s| !s.is_empty())?;
        let port = self.public_port.filter(|p| *p > 0)?;
        Some((ip.clone(), port as u32))
    }
}

/// `{"type":"pong", ...}` (§6.1). The timestamp is accepted but unused —
/// the server trusts its own clock for liveness bookkeeping.
#[derive(Deserialize, Debug)]
pub struct PongMessage {
    #[allow(dead_code)]
    pub timestamp: Option<f64>,
}

/// Peer visible to a registered session (§4.6).
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PeerInfo {
    pub peer_id: String,
    pub user_id: UserId,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub public_ip: String,
    pub public_port: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_port: Option<u32>,
    pub virtual_ip: Ipv4Addr,
}

/// Server → client frames (§6.1). Serialized with `#[serde(tag = "type")]`
/// so every variant carries its own discriminator on the wire.
#[derive(Serialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "register_agent_response")]
    RegisterOk {
        status: &'static str,
        virtual_ip: Ipv4Addr,
        connection_id: String,
        existing_peers: Vec<PeerInfo>,
    },
    #[serde(rename = "peer_online")]
    PeerOnline { peer: PeerInfo },
    #[serde(rename = "peer_offline")]
    PeerOffline { peer: PeerInfo },
    #[serde(rename = "ping")]
    Ping { timestamp: f64 },
}

/// Non-fatal `{"error": ...}` frame (§6.1, §7 ProtocolError/ContractError).
#[derive(Serialize, Debug)]
pub struct ErrorMessage<'a> {
    pub error: &'a str,
}

pub fn error_frame(message: &str) -> String {
    serde_json::to_string(&ErrorMessage { error: message }).expect("error frame always serializes")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstFrameOutcome {
    Register,
    NotRegister,
}

impl Discriminator {
    pub fn classify(&self) -> FirstFrameOutcome {
        match self.kind.as_deref() {
            Some("register") => FirstFrameOutcome::Register,
            _ => FirstFrameOutcome::NotRegister,
        }
    }

    pub fn classify_pong(&self) -> bool {
        self.kind.as_deref() == Some("pong")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_response_shape() {
        let msg = ServerMessage::RegisterOk {
            status: "registered",
            virtual_ip: "10.0.0.1".parse().unwrap(),
            connection_id: "abc".into(),
            existing_peers: vec![],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"register_agent_response\""));
        assert!(json.contains("\"status\":\"registered\""));
    }

    #[test]
    fn register_request_rejects_missing_fields() {
        let req = RegisterRequest {
            public_ip: None,
            public_port: Some(5000),
            agent_id: None,
            relay_ip: None,
            relay_port: None,
        };
        assert!(req.validate().is_none());
    }

    #[test]
    fn register_request_rejects_non_positive_port() {
        let req = RegisterRequest {
            public_ip: Some("1.2.3.4".into()),
            public_port: Some(0),
            agent_id: None,
            relay_ip: None,
            relay_port: None,
        };
        assert!(req.validate().is_none());
    }

    #[test]
    fn classify_non_register_type() {
        let d: Discriminator = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(d.classify(), FirstFrameOutcome::NotRegister);
    }
}
