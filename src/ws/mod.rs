//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The endpoint at `/ws` streams alert lifecycle events. Clients choose
//! which parachains they follow and whether they want system alerts.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
