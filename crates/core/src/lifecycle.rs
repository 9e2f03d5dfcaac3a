use std::sync::Arc;

use crate::broadcaster::broadcast;
use crate::message::ServerMessage;
use crate::registry::Registry;
use crate::session::Session;

/// Shared teardown path for both a graceful disconnect and a heartbeat
/// timeout (§4.5 step 5, §9 open question 2): **remove → snapshot →
/// broadcast**, so the departing session never receives its own
/// `peer_offline` and P7 (idempotent teardown) holds regardless of which
/// caller wins the race.
///
/// Returns the number of peers the `peer_offline` notification reached, or
/// `0` if this session was already torn down.
pub fn teardown(registry: &Registry, session: &Arc<Session>) -> usize {
    if !session.begin_teardown() {
        return 0;
    }

    session.cancel.cancel();
    registry.remove(session.org_id, session.connection_id);

    let notification = ServerMessage::PeerOffline {
        peer: session.peer_info(),
    };

    broadcast(
        registry,
        session.org_id,
        &notification,
        session.connection_id,
        Some((session.subnet, session.virtual_ip)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::sync::mpsc::unbounded_channel;
    use uuid::Uuid;

    fn make_session(ip: &str) -> Arc<Session> {
        let (tx, _rx) = unbounded_channel();
        Arc::new(Session::new(
            Uuid::new_v4(),
            format!("peer-{ip}"),
            1,
            "a@example.com".into(),
            1,
            "10.0.0.0/24".parse().unwrap(),
            ip.parse::<Ipv4Addr>().unwrap(),
            "1.2.3.4".into(),
            5000,
            None,
            None,
            None,
            tx,
        ))
    }

    #[test]
    fn double_teardown_broadcasts_offline_once() {
        let registry = Registry::new();
        let departing = make_session("10.0.0.1");
        let (observer, mut observer_rx) = {
            let (tx, rx) = unbounded_channel();
            (
                Arc::new(Session::new(
                    Uuid::new_v4(),
                    "observer".into(),
                    2,
                    "b@example.com".into(),
                    1,
                    "10.0.0.0/24".parse().unwrap(),
                    "10.0.0.2".parse::<Ipv4Addr>().unwrap(),
                    "5.6.7.8".into(),
                    6000,
                    None,
                    None,
                    None,
                    tx,
                )),
                rx,
            )
        };

        registry.add(departing.clone());
        registry.add(observer.clone());

        let first = teardown(&registry, &departing);
        let second = teardown(&registry, &departing);

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert!(observer_rx.try_recv().is_ok());
        assert!(observer_rx.try_recv().is_err());
        assert!(registry.snapshot(1).iter().all(|s| s.connection_id != departing.connection_id));
    }

    #[test]
    fn departing_session_never_receives_its_own_offline() {
        let registry = Registry::new();
        let departing = make_session("10.0.0.1");
        registry.add(departing.clone());

        let sent = teardown(&registry, &departing);
        assert_eq!(sent, 0);
    }
}
