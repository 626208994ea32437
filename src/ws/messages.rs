//! WebSocket message types: envelope, commands, and subscription targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ParachainId;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server message stamped with the current time.
    #[must_use]
    pub fn server(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error message with a numeric code.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self::server(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send in the payload of a `command` message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to alert events.
    Subscribe {
        /// Para ids to follow. `"*"` follows every parachain and system
        /// alerts.
        #[serde(default)]
        parachain_ids: Vec<SubscriptionTarget>,
        /// Also receive system alerts (those without a parachain).
        #[serde(default)]
        system: bool,
    },
    /// Stop following parachains or system alerts.
    Unsubscribe {
        /// Para ids to drop. `"*"` clears the wildcard.
        #[serde(default)]
        parachain_ids: Vec<SubscriptionTarget>,
        /// Stop receiving system alerts.
        #[serde(default)]
        system: bool,
    },
    /// Liveness check.
    Ping,
}

/// One entry of a subscription list: a para id as number or string, or
/// the `"*"` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionTarget {
    /// Numeric para id.
    Id(u32),
    /// `"*"` or a para id written as a string.
    Text(String),
}

/// A subscription target after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Every parachain and system alerts.
    All,
    /// One parachain.
    Parachain(ParachainId),
}

impl SubscriptionTarget {
    /// Validates the entry; `None` for text that is neither `"*"` nor a
    /// para id.
    #[must_use]
    pub fn resolve(&self) -> Option<Target> {
        match self {
            Self::Id(id) => Some(Target::Parachain(ParachainId::new(*id))),
            Self::Text(s) if s == "*" => Some(Target::All),
            Self::Text(s) => s
                .trim()
                .parse::<u32>()
                .ok()
                .map(|id| Target::Parachain(ParachainId::new(id))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_accepts_numbers_strings_and_wildcard() {
        let Ok(WsCommand::Subscribe {
            parachain_ids,
            system,
        }) = serde_json::from_value::<WsCommand>(serde_json::json!({
            "command": "subscribe",
            "parachain_ids": [2004, "2006", "*", "moonbeam"],
        }))
        else {
            panic!("subscribe should parse");
        };
        assert!(!system);
        let resolved: Vec<_> = parachain_ids.iter().map(SubscriptionTarget::resolve).collect();
        assert_eq!(
            resolved,
            vec![
                Some(Target::Parachain(ParachainId::new(2004))),
                Some(Target::Parachain(ParachainId::new(2006))),
                Some(Target::All),
                None,
            ]
        );
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(
            serde_json::from_value::<WsCommand>(serde_json::json!({ "command": "swap" })).is_err()
        );
    }
}
