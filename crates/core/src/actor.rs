use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, TokenVerifier};
use crate::error::{HubError, Result};
use crate::message::{PeerInfo, RegisterRequest, ServerMessage};
use crate::registry::Registry;
use crate::session::{derive_peer_id, OutboundFrame, Session};
use crate::store::{Store, User};
use tokio::sync::mpsc::UnboundedSender;

/// Everything the register path produced: the now-live session, already
/// inserted into `registry`, and the frame to send back on the socket.
pub struct RegisterOutcome {
    pub session: Arc<Session>,
    pub response: ServerMessage,
}

/// Recovers the caller's identity from a bearer token and loads the backing
/// `User` row (§4.3, §9.1 `get_user_from_token`). A token that verifies but
/// names a user that's missing or deactivated is still an auth failure —
/// the original checks `user.is_active` right alongside the token lookup.
pub async fn authenticate(
    verifier: &dyn TokenVerifier,
    store: &dyn Store,
    token: &str,
) -> Result<User> {
    let AuthenticatedUser { user_id } = verifier
        .verify(token)
        .await
        .ok_or_else(|| HubError::Auth("invalid or expired token".to_string()))?;

    let user = store
        .find_user_by_id(user_id)
        .await
        .map_err(|e| HubError::Persistence(e.to_string()))?
        .ok_or_else(|| HubError::Auth("unknown user".to_string()))?;

    if !user.is_active {
        return Err(HubError::Auth("user is not active".to_string()));
    }

    Ok(user)
}

/// Drives the full register transition (§4.5 step 3, §9 open question 2):
/// validate -> pick an org the caller has a virtual IP in -> snapshot ->
/// build the response -> insert into the registry -> broadcast
/// `peer_online`. The session never sits in `registry` only partially
/// initialized: every fallible step runs before `registry.add`.
#[allow(clippy::too_many_arguments)]
pub async fn handle_register(
    store: &dyn Store,
    registry: &Registry,
    user: &User,
    req: RegisterRequest,
    outbox: UnboundedSender<OutboundFrame>,
) -> Result<RegisterOutcome> {
    let (public_ip, public_port) = req.validate().ok_or_else(|| {
        HubError::Contract("Missing required fields: public_ip, public_port".to_string())
    })?;

    let orgs = store
        .list_user_orgs(user.id)
        .await
        .map_err(|e| HubError::Persistence(e.to_string()))?;

    let mut picked = None;
    for org in &orgs {
        if let Some(ip) = store
            .get_mapping(user.id, org.id)
            .await
            .map_err(|e| HubError::Persistence(e.to_string()))?
        {
            picked = Some((org.clone(), ip));
            break;
        }
    }

    let (org, virtual_ip) = picked.ok_or_else(|| {
        HubError::Contract("No virtual IP allocated for user in any organization".to_string())
    })?;

    let connection_id = Uuid::new_v4();
    let peer_id = req
        .agent_id
        .clone()
        .unwrap_or_else(|| derive_peer_id(user.id, &connection_id));

    let session = Arc::new(Session::new(
        connection_id,
        peer_id,
        user.id,
        user.email.clone(),
        org.id,
        org.subnet,
        virtual_ip,
        public_ip,
        public_port,
        req.relay_ip,
        req.relay_port.map(|p| p as u32),
        req.agent_id.clone(),
        outbox,
    ));

    // snapshot -> serialize response -> add to registry -> broadcast (§5, §9).
    let existing_peers: Vec<PeerInfo> = registry
        .snapshot(org.id)
        .iter()
        .filter(|other| session.shares_subnet_with(other))
        .map(|other| other.peer_info())
        .collect();

    let response = ServerMessage::RegisterOk {
        status: "registered",
        virtual_ip,
        connection_id: connection_id.to_string(),
        existing_peers,
    };

    registry.add(session.clone());

    let notification = ServerMessage::PeerOnline {
        peer: session.peer_info(),
    };
    let sent = crate::broadcaster::broadcast(
        registry,
        org.id,
        &notification,
        session.connection_id,
        Some((session.subnet, session.virtual_ip)),
    );
    log::info!(
        "peer {} registered in org {} ({} peer_online notifications sent)",
        session.peer_id,
        org.id,
        sent
    );

    Ok(RegisterOutcome { session, response })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_store::MemoryStore;
    use tokio::sync::mpsc::unbounded_channel;

    fn register_req(ip: &str, port: i64) -> RegisterRequest {
        RegisterRequest {
            public_ip: Some(ip.to_string()),
            public_port: Some(port),
            agent_id: None,
            relay_ip: None,
            relay_port: None,
        }
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_before_any_allocation() {
        let store = MemoryStore::new();
        store.seed_org(1, "org", "10.0.0.0/24").await;
        store.seed_user(1, "a@example.com", true).await;
        store.seed_membership(1, 1).await;

        let registry = Registry::new();
        let (tx, _rx) = unbounded_channel();
        let req = RegisterRequest {
            public_ip: None,
            public_port: Some(5000),
            agent_id: None,
            relay_ip: None,
            relay_port: None,
        };
        let user = store.find_user_by_id(1).await.unwrap().unwrap();
        let err = handle_register(&store, &registry, &user, req, tx)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Contract(msg) if msg.contains("public_ip")));
        assert!(registry.snapshot(1).is_empty());
    }

    #[tokio::test]
    async fn no_membership_anywhere_is_contract_error() {
        let store = MemoryStore::new();
        store.seed_user(1, "a@example.com", true).await;

        let registry = Registry::new();
        let (tx, _rx) = unbounded_channel();
        let user = store.find_user_by_id(1).await.unwrap().unwrap();
        let err = handle_register(&store, &registry, &user, register_req("1.2.3.4", 5000), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Contract(msg) if msg.contains("No virtual IP")));
    }

    #[tokio::test]
    async fn successful_register_inserts_and_responds() {
        let store = MemoryStore::new();
        store.seed_org(1, "org", "10.0.0.0/24").await;
        store.seed_user(1, "a@example.com", true).await;
        store.seed_membership(1, 1).await;

        let registry = Registry::new();
        let (tx, _rx) = unbounded_channel();
        let user = store.find_user_by_id(1).await.unwrap().unwrap();
        let outcome = handle_register(&store, &registry, &user, register_req("1.2.3.4", 5000), tx)
            .await
            .unwrap();

        assert_eq!(registry.snapshot(1).len(), 1);
        match outcome.response {
            ServerMessage::RegisterOk { status, .. } => assert_eq!(status, "registered"),
            _ => panic!("expected RegisterOk"),
        }
    }

    #[tokio::test]
    async fn second_registrant_sees_first_as_existing_peer_and_first_gets_peer_online() {
        let store = MemoryStore::new();
        store.seed_org(1, "org", "10.0.0.0/24").await;
        store.seed_user(1, "a@example.com", true).await;
        store.seed_user(2, "b@example.com", true).await;
        store.seed_membership(1, 1).await;
        store.seed_membership(2, 1).await;

        let registry = Registry::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let user_a = store.find_user_by_id(1).await.unwrap().unwrap();
        let _outcome_a = handle_register(
            &store,
            &registry,
            &user_a,
            register_req("1.2.3.4", 5000),
            tx_a,
        )
        .await
        .unwrap();

        let (tx_b, _rx_b) = unbounded_channel();
        let user_b = store.find_user_by_id(2).await.unwrap().unwrap();
        let outcome_b = handle_register(
            &store,
            &registry,
            &user_b,
            register_req("5.6.7.8", 6000),
            tx_b,
        )
        .await
        .unwrap();

        match outcome_b.response {
            ServerMessage::RegisterOk { existing_peers, .. } => {
                assert_eq!(existing_peers.len(), 1);
                assert_eq!(existing_peers[0].user_id, 1);
            }
            _ => panic!("expected RegisterOk"),
        }
        assert!(rx_a.try_recv().is_ok());
    }

    #[tokio::test]
    async fn inactive_user_fails_authentication() {
        let store = MemoryStore::new();
        store.seed_user(1, "a@example.com", false).await;
        struct AlwaysUser;
        #[async_trait::async_trait]
        impl TokenVerifier for AlwaysUser {
            async fn verify(&self, _token: &str) -> Option<AuthenticatedUser> {
                Some(AuthenticatedUser { user_id: 1 })
            }
        }
        let err = authenticate(&AlwaysUser, &store, "tok").await.unwrap_err();
        assert!(matches!(err, HubError::Auth(_)));
    }
}
