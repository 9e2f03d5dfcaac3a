use ipnetwork::Ipv4Network;
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::store::{OrgId, UserId};

/// What a session's outbox can carry: a pre-serialized text frame, or an
/// instruction to close the socket with a specific code and reason. Both
/// flow through the same channel so close always lands after anything
/// already queued ahead of it.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Ephemeral, in-memory state for one live WebSocket connection (§3).
///
/// Owned exclusively by its Session Actor; the Presence Registry only ever
/// holds an `Arc<Session>` back-reference, never a mutable one.
pub struct Session {
    pub connection_id: Uuid,
    pub peer_id: String,
    pub user_id: UserId,
    pub email: String,
    pub org_id: OrgId,
    pub subnet: Ipv4Network,
    pub virtual_ip: Ipv4Addr,
    pub public_ip: String,
    pub public_port: u32,
    pub relay_ip: Option<String>,
    pub relay_port: Option<u32>,
    pub agent_id: Option<String>,

    /// Owned by this session; the heartbeat watcher reads it through the
    /// session handle rather than a separate global map, so there's nothing
    /// left to go stale after teardown (§9).
    last_pong_at: Mutex<Option<Instant>>,

    /// Outbound frames for this connection's WebSocket sink.
    outbox: UnboundedSender<OutboundFrame>,

    /// Cancels this session's two heartbeat tasks on teardown.
    pub cancel: CancellationToken,

    /// Guards teardown so it only ever runs once (P7).
    torn_down: AtomicBool,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connection_id: Uuid,
        peer_id: String,
        user_id: UserId,
        email: String,
        org_id: OrgId,
        subnet: Ipv4Network,
        virtual_ip: Ipv4Addr,
        public_ip: String,
        public_port: u32,
        relay_ip: Option<String>,
        relay_port: Option<u32>,
        agent_id: Option<String>,
        outbox: UnboundedSender<OutboundFrame>,
    ) -> Self {
        Self {
            connection_id,
            peer_id,
            user_id,
            email,
            org_id,
            subnet,
            virtual_ip,
            public_ip,
            public_port,
            relay_ip,
            relay_port,
            agent_id,
            last_pong_at: Mutex::new(None),
            outbox,
            cancel: CancellationToken::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Transitions the session to torn-down state. Returns `true` only for
    /// the call that won the race — callers use this to make teardown
    /// idempotent (P7).
    pub fn begin_teardown(&self) -> bool {
        self.torn_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Sends a pre-serialized frame to this session's socket. Failures mean
    /// the socket is gone; the caller decides what to do about it (usually
    /// nothing, since teardown will follow from the read side).
    pub fn send(&self, body: String) -> Result<(), ()> {
        self.outbox.send(OutboundFrame::Text(body)).map_err(|_| ())
    }

    /// Queues a close frame with `code`/`reason` behind anything already
    /// queued ahead of it, then lets the socket's send loop stop.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), ()> {
        self.outbox
            .send(OutboundFrame::Close {
                code,
                reason: reason.into(),
            })
            .map_err(|_| ())
    }

    pub fn record_pong(&self, at: Instant) {
        *self.last_pong_at.lock() = Some(at);
    }

    /// Seeds `last_pong_at` if unset, giving the client one full ping
    /// interval before the watcher can declare it dead (§4.7).
    pub fn seed_pong_if_unset(&self, at: Instant) {
        let mut guard = self.last_pong_at.lock();
        if guard.is_none() {
            *guard = Some(at);
        }
    }

    pub fn last_pong_at(&self) -> Option<Instant> {
        *self.last_pong_at.lock()
    }

    pub fn peer_info(&self) -> crate::message::PeerInfo {
        crate::message::PeerInfo {
            peer_id: self.peer_id.clone(),
            user_id: self.user_id,
            email: self.email.clone(),
            agent_id: self.agent_id.clone(),
            public_ip: self.public_ip.clone(),
            public_port: self.public_port,
            relay_ip: self.relay_ip.clone(),
            relay_port: self.relay_port,
            virtual_ip: self.virtual_ip,
        }
    }

    /// Same-subnet filter (§4.5): true iff both virtual IPs fall inside
    /// `self.subnet`. Must be preserved verbatim even though, today, every
    /// mapping in an org shares the org's subnet.
    pub fn shares_subnet_with(&self, other: &Session) -> bool {
        self.subnet.contains(self.virtual_ip) && self.subnet.contains(other.virtual_ip)
    }
}

/// Derives the fallback peer id used when the client omits `agent_id`.
pub fn derive_peer_id(user_id: UserId, connection_id: &Uuid) -> String {
    let short = connection_id.simple().to_string();
    format!("peer_{user_id}_{}", &short[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_derivation_uses_first_eight_hex_chars() {
        let id = Uuid::parse_str("12345678-1234-1234-1234-123456789abc").unwrap();
        assert_eq!(derive_peer_id(42, &id), "peer_42_12345678");
    }
}
