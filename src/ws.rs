use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

use hub_core::message::{error_frame, Discriminator, FirstFrameOutcome, PongMessage, RegisterRequest};
use hub_core::{handle_register, heartbeat, lifecycle, pick_token, OutboundFrame};

use crate::AppState;

#[derive(Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

/// `GET /ws/` upgrade entrypoint (§6.1). The upgrade is unconditional;
/// authentication happens after accept so a missing or invalid token is
/// reported with a close frame rather than a pre-upgrade HTTP status.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let auth_header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = pick_token(params.token.as_deref(), auth_header);

    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

/// Drives one connection end to end: authenticate, await a valid `register`
/// frame, run heartbeats, then relay `pong`s until the socket closes or the
/// heartbeat supervisor declares it dead (§4.5).
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, token: Option<String>) {
    let Some(token) = token else {
        close_with(socket, 4001, "No token provided").await;
        return;
    };

    let user = match hub_core::authenticate(state.verifier.as_ref(), state.store.as_ref(), &token)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            log::warn!("websocket authentication failed: {e}");
            close_with(socket, 4001, "Authentication failed").await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let (outbox_tx, mut outbox_rx) = unbounded_channel::<OutboundFrame>();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            match frame {
                OutboundFrame::Text(body) => {
                    if sink.send(Message::Text(body.into())).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close { code, reason } => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
        let _ = sink.close().await;
    });

    let session = loop {
        let Some(Ok(msg)) = stream.next().await else {
            send_task.abort();
            return;
        };
        let Message::Text(text) = msg else { continue };

        let discriminator: Discriminator = match serde_json::from_str(&text) {
            Ok(d) => d,
            Err(_) => {
                let _ = outbox_tx.send(OutboundFrame::Text(error_frame("Invalid JSON")));
                continue;
            }
        };

        match discriminator.classify() {
            FirstFrameOutcome::NotRegister => {
                let _ = outbox_tx.send(OutboundFrame::Text(error_frame(
                    "First message must be register",
                )));
            }
            FirstFrameOutcome::Register => {
                let req: RegisterRequest = match serde_json::from_str(&text) {
                    Ok(r) => r,
                    Err(_) => {
                        let _ = outbox_tx
                            .send(OutboundFrame::Text(error_frame("invalid register payload")));
                        continue;
                    }
                };

                match handle_register(
                    state.store.as_ref(),
                    &state.registry,
                    &user,
                    req,
                    outbox_tx.clone(),
                )
                .await
                {
                    Ok(outcome) => {
                        if let Ok(body) = serde_json::to_string(&outcome.response) {
                            let _ = outbox_tx.send(OutboundFrame::Text(body));
                        }
                        break outcome.session;
                    }
                    Err(e) => {
                        let _ = outbox_tx
                            .send(OutboundFrame::Text(error_frame(&e.wire_message())));
                        send_task.abort();
                        return;
                    }
                }
            }
        }
    };

    let (timeout_tx, mut timeout_rx) = unbounded_channel();
    let heartbeat_tasks = heartbeat::spawn(
        session.clone(),
        state.clock.clone(),
        state.heartbeat_config,
        timeout_tx,
    );

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let is_pong = serde_json::from_str::<Discriminator>(&text)
                            .map(|d| d.classify_pong())
                            .unwrap_or(false)
                            && serde_json::from_str::<PongMessage>(&text).is_ok();
                        if is_pong {
                            session.record_pong(state.clock.now());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        log::warn!("websocket read error for peer {}: {e}", session.peer_id);
                        break;
                    }
                    _ => {}
                }
            }
            _ = timeout_rx.recv() => {
                log::info!("closing peer {} after pong timeout", session.peer_id);
                let _ = session.close(1000, "Connection timeout - no pong received");
                break;
            }
        }
    }

    lifecycle::teardown(&state.registry, &session);
    let _ = heartbeat_tasks.ping.await;
    let _ = heartbeat_tasks.watch.await;
    drop(outbox_tx);
    drop(session);
    let _ = send_task.await;
}
