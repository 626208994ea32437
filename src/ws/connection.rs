//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered alert events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{SubscriptionTarget, Target, WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{AlertEvent, ParachainId};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(socket: WebSocket, mut event_rx: broadcast::Receiver<AlertEvent>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(alert_event) => {
                        if subs.matches(alert_event.parachain_id()) {
                            let msg = WsMessage::server(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&alert_event).unwrap_or_default(),
                            );
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Splits raw targets into para ids, the wildcard flag and rejected
/// entries.
fn resolve_targets(targets: &[SubscriptionTarget]) -> (Vec<ParachainId>, bool, usize) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    let mut rejected = 0;
    for target in targets {
        match target.resolve() {
            Some(Target::All) => wildcard = true,
            Some(Target::Parachain(id)) => ids.push(id),
            None => rejected += 1,
        }
    }
    (ids, wildcard, rejected)
}

/// Handles a text message from the client, returning an optional JSON response.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error(String::new(), 400, "malformed JSON")).ok();
    };

    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let payload = match command {
        WsCommand::Subscribe {
            parachain_ids,
            system,
        } => {
            let (ids, wildcard, rejected) = resolve_targets(&parachain_ids);
            subs.subscribe(&ids, wildcard, system);
            serde_json::json!({
                "subscribed": subs.parachain_ids(),
                "wildcard": subs.is_subscribed_all(),
                "system": subs.receives_system(),
                "rejected": rejected,
            })
        }
        WsCommand::Unsubscribe {
            parachain_ids,
            system,
        } => {
            let (ids, wildcard, rejected) = resolve_targets(&parachain_ids);
            subs.unsubscribe(&ids, wildcard, system);
            serde_json::json!({
                "subscribed": subs.parachain_ids(),
                "wildcard": subs.is_subscribed_all(),
                "system": subs.receives_system(),
                "rejected": rejected,
            })
        }
        WsCommand::Ping => serde_json::json!({ "pong": true }),
    };

    serde_json::to_string(&WsMessage::server(msg.id, WsMessageType::Response, payload)).ok()
}
