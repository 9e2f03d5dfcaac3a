pub mod auth;
pub mod config;
pub mod http;
pub mod logging;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use hub_core::{Clock, HeartbeatConfig, Registry, Store, SystemClock, TokenVerifier};

use auth::JwtVerifier;
use config::Config;
use logging::LogLayer;

/// Shared state handed to every axum handler: the presence registry, the
/// persistence and auth ports, and the clock the heartbeat supervisor reads
/// (C0, C9).
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub clock: Arc<dyn Clock>,
    pub heartbeat_config: HeartbeatConfig,
}

/// Builds the in-memory store the hub runs against, pre-populated from
/// `config.seed` (§3 NEW). There is no registration/OTP flow in scope, so
/// this is the only way users, organizations, and memberships come to
/// exist.
pub async fn build_seeded_store(config: &Config) -> memory_store::MemoryStore {
    let store = memory_store::MemoryStore::new();

    for org in &config.seed.orgs {
        store.seed_org(org.id, &org.name, &org.subnet).await;
    }
    for user in &config.seed.users {
        store.seed_user(user.id, &user.email, user.is_active).await;
    }
    for membership in &config.seed.memberships {
        store
            .seed_membership(membership.user_id, membership.org_id)
            .await;
    }

    store
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/", get(ws::ws_handler))
        .route("/organizations/{org_id}/allocate_ip", post(http::allocate_ip))
        .route("/organizations/{org_id}/ips", get(http::list_ips))
        .route("/healthz", get(http::healthz))
        .with_state(state)
        .layer(LogLayer)
}

/// Starts the hub: loads a seeded in-memory store, wires the JWT verifier
/// and system clock, binds the listener, and serves until the process is
/// killed. Split out from `main` so integration tests can drive the same
/// startup path the binary uses.
pub async fn server_main(config: Config) -> anyhow::Result<()> {
    let store = build_seeded_store(&config).await;
    let state = Arc::new(AppState {
        store: Arc::new(store),
        registry: Registry::new(),
        verifier: Arc::new(JwtVerifier::new(config.auth.secret.clone())),
        clock: Arc::new(SystemClock),
        heartbeat_config: config.heartbeat.as_core_config(),
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.hub.listen).await?;
    log::info!(
        "signaling hub listening on {} (realm {})",
        config.hub.listen,
        config.hub.realm
    );
    axum::serve(listener, app).await?;
    Ok(())
}
