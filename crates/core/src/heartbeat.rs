use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::message::ServerMessage;
use crate::session::Session;

/// Tuning knobs for the heartbeat supervisor (C7). Defaults match §4.7;
/// tests shrink them to keep suites fast.
#[derive(Clone, Copy, Debug)]
pub struct HeartbeatConfig {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub watch_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
            watch_interval: Duration::from_secs(10),
        }
    }
}

/// Handles for the two heartbeat tasks started after a session registers.
/// Dropping or awaiting these after `session.cancel` fires is how the
/// Session Actor joins its children before freeing resources (§9).
pub struct HeartbeatTasks {
    pub ping: JoinHandle<()>,
    pub watch: JoinHandle<()>,
}

/// Starts the ping emitter and pong watcher for `session` (§4.7).
///
/// `timeout_tx` receives one `()` the moment the watcher declares the
/// session dead; the caller (the Session Actor) is responsible for running
/// the teardown path and closing the socket with code 1000 in response —
/// the heartbeat subsystem never touches the socket directly.
pub fn spawn(
    session: Arc<Session>,
    clock: Arc<dyn Clock>,
    config: HeartbeatConfig,
    timeout_tx: UnboundedSender<()>,
) -> HeartbeatTasks {
    let ping = tokio::spawn(ping_emitter(session.clone(), clock.clone(), config));
    let watch = tokio::spawn(pong_watcher(session, clock, config, timeout_tx));
    HeartbeatTasks { ping, watch }
}

async fn ping_emitter(session: Arc<Session>, clock: Arc<dyn Clock>, config: HeartbeatConfig) {
    loop {
        tokio::select! {
            _ = session.cancel.cancelled() => return,
            _ = tokio::time::sleep(config.ping_interval) => {}
        }

        if session.cancel.is_cancelled() {
            return;
        }

        let now = clock.now();
        // Give the client one full interval to respond before the watcher
        // can time it out.
        session.seed_pong_if_unset(now);

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        let ping = ServerMessage::Ping { timestamp };
        if let Ok(body) = serde_json::to_string(&ping) {
            if session.send(body).is_err() {
                log::warn!("ping send failed for peer {}, socket is gone", session.peer_id);
                return;
            }
        }
    }
}

async fn pong_watcher(
    session: Arc<Session>,
    clock: Arc<dyn Clock>,
    config: HeartbeatConfig,
    timeout_tx: UnboundedSender<()>,
) {
    loop {
        tokio::select! {
            _ = session.cancel.cancelled() => return,
            _ = tokio::time::sleep(config.watch_interval) => {}
        }

        if session.cancel.is_cancelled() {
            return;
        }

        // Unset means no ping has gone out yet; never a false timeout.
        let Some(last_pong) = session.last_pong_at() else {
            continue;
        };

        if clock.now().duration_since(last_pong) > config.pong_timeout {
            log::info!(
                "pong timeout for peer {} in org {}",
                session.peer_id,
                session.org_id
            );
            let _ = timeout_tx.send(());
            return;
        }
    }
}
