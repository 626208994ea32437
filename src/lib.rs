//! # parachain-sentinel
//!
//! Metrics collector and threshold alerting service for Polkadot
//! parachains.
//!
//! A scheduler periodically reads chain state through a Substrate API
//! Sidecar, stores hourly TVL and activity snapshots, compares them with
//! the snapshot from a day earlier and raises alerts when the change
//! crosses a threshold. A per `(type, parachain)` cooldown keeps repeats
//! quiet. Alerts are delivered by webhook and email and streamed to
//! WebSocket clients.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── AlertService, ParachainService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── Scheduler (scheduler/) ── DataAggregator (aggregator/) ── Sidecar
//!     │        │
//!     │        └── AlertChecker, AlertEngine (engine/) ── notify/
//!     │
//!     └── PostgreSQL or in-memory store (store/)
//! ```

pub mod aggregator;
pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod ws;
