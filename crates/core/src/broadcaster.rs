use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use uuid::Uuid;

use crate::message::ServerMessage;
use crate::registry::Registry;
use crate::store::OrgId;

/// Subnet-scoped fan-out of presence events to sessions in an org (C6).
///
/// Snapshots the registry under its lock, then sends without holding it
/// (§5). Per-recipient failures are logged and don't abort the broadcast;
/// the returned count is successes only.
pub fn broadcast(
    registry: &Registry,
    org_id: OrgId,
    message: &ServerMessage,
    exclude: Uuid,
    filter: Option<(Ipv4Network, Ipv4Addr)>,
) -> usize {
    let body = match serde_json::to_string(message) {
        Ok(body) => body,
        Err(e) => {
            log::error!("failed to serialize broadcast message for org {org_id}: {e}");
            return 0;
        }
    };

    let mut sent = 0;
    for session in registry.snapshot(org_id) {
        if session.connection_id == exclude {
            continue;
        }

        if let Some((subnet, virtual_ip)) = filter {
            if !(subnet.contains(virtual_ip) && subnet.contains(session.virtual_ip)) {
                continue;
            }
        }

        match session.send(body.clone()) {
            Ok(()) => sent += 1,
            Err(()) => {
                log::warn!(
                    "broadcast send failed for peer {} in org {org_id}",
                    session.peer_id
                );
            }
        }
    }

    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use std::sync::Arc;
    use tokio::sync::mpsc::unbounded_channel;

    fn make_session(
        org_id: OrgId,
        ip: &str,
        subnet: &str,
    ) -> (
        Arc<Session>,
        tokio::sync::mpsc::UnboundedReceiver<crate::session::OutboundFrame>,
    ) {
        let (tx, rx) = unbounded_channel();
        let session = Arc::new(Session::new(
            Uuid::new_v4(),
            format!("peer-{ip}"),
            1,
            "a@example.com".into(),
            org_id,
            subnet.parse().unwrap(),
            ip.parse().unwrap(),
            "1.2.3.4".into(),
            5000,
            None,
            None,
            None,
            tx,
        ));
        (session, rx)
    }

    #[test]
    fn excludes_self_and_counts_successes() {
        let registry = Registry::new();
        let (a, mut a_rx) = make_session(1, "10.0.0.1", "10.0.0.0/24");
        let (b, mut b_rx) = make_session(1, "10.0.0.2", "10.0.0.0/24");
        registry.add(a.clone());
        registry.add(b.clone());

        let msg = ServerMessage::PeerOnline {
            peer: a.peer_info(),
        };
        let sent = broadcast(&registry, 1, &msg, a.connection_id, None);

        assert_eq!(sent, 1);
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());
    }

    #[test]
    fn subnet_filter_excludes_other_subnets() {
        let registry = Registry::new();
        let (a, _a_rx) = make_session(1, "10.0.0.1", "10.0.0.0/24");
        let (b, mut b_rx) = make_session(1, "10.0.1.1", "10.0.1.0/24");
        registry.add(a.clone());
        registry.add(b.clone());

        let msg = ServerMessage::PeerOnline {
            peer: a.peer_info(),
        };
        let filter = Some((a.subnet, a.virtual_ip));
        let sent = broadcast(&registry, 1, &msg, a.connection_id, filter);

        assert_eq!(sent, 0);
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn dead_recipient_does_not_abort_broadcast() {
        let registry = Registry::new();
        let (a, _a_rx) = make_session(1, "10.0.0.1", "10.0.0.0/24");
        let (b, b_rx) = make_session(1, "10.0.0.2", "10.0.0.0/24");
        let (c, mut c_rx) = make_session(1, "10.0.0.3", "10.0.0.0/24");
        registry.add(a.clone());
        registry.add(b.clone());
        registry.add(c.clone());
        drop(b_rx); // simulate a dead socket

        let msg = ServerMessage::PeerOnline {
            peer: a.peer_info(),
        };
        let sent = broadcast(&registry, 1, &msg, a.connection_id, None);

        assert_eq!(sent, 1);
        assert!(c_rx.try_recv().is_ok());
    }
}
