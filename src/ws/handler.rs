//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();
    ws.on_upgrade(move |socket| run_connection(socket, event_rx))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    use crate::api::build_app;
    use crate::app_state::testing::state;
    use crate::domain::{AlertEvent, AlertType, ParachainId, Severity};

    fn resolved(parachain_id: Option<ParachainId>) -> AlertEvent {
        AlertEvent::AlertResolved {
            alert_id: uuid::Uuid::new_v4(),
            alert_type: AlertType::ParachainIssue,
            parachain_id,
            severity: Severity::Critical,
            by: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_only_its_parachains() {
        let (state, _) = state();
        let bus = state.event_bus.clone();
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind should succeed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, build_app(state)).await;
        });

        let Ok((mut socket, _)) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await
        else {
            panic!("ws handshake should succeed");
        };
        let subscribe = serde_json::json!({
            "id": "sub-1",
            "type": "command",
            "timestamp": Utc::now(),
            "payload": { "command": "subscribe", "parachain_ids": [2004] },
        });
        let Ok(()) = socket.send(Message::text(subscribe.to_string())).await else {
            panic!("send should succeed");
        };
        let Some(Ok(reply)) = socket.next().await else {
            panic!("subscribe reply expected");
        };
        let Ok(text) = reply.to_text() else {
            panic!("text frame expected");
        };
        assert!(text.contains("\"sub-1\""));

        let _ = bus.publish(resolved(None));
        let _ = bus.publish(resolved(Some(ParachainId::new(2006))));
        let _ = bus.publish(resolved(Some(ParachainId::new(2004))));

        let Ok(Some(Ok(event))) =
            tokio::time::timeout(Duration::from_secs(5), socket.next()).await
        else {
            panic!("event expected");
        };
        let Ok(text) = event.to_text() else {
            panic!("text frame expected");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
            panic!("event should be json");
        };
        assert_eq!(value["type"], "event");
        assert_eq!(value["payload"]["event_type"], "alert_resolved");
        assert_eq!(value["payload"]["parachain_id"], 2004);
    }
}
