//! Domain layer: parachains, metric snapshots, alerts, and the event system.
//!
//! This module contains the server-side domain model: parachain identity,
//! values read from the chain, hourly metric snapshots, alert records with
//! their lifecycle, the event bus for broadcasting alert changes, and the
//! per-key write locks used when persisting snapshots.

pub mod alert;
pub mod alert_event;
pub mod chain;
pub mod event_bus;
pub mod parachain;
pub mod snapshot;
pub mod write_locks;

pub use alert::{
    Alert, AlertFilter, AlertSource, AlertStats, AlertStatus, AlertType, DeliveryStatus, NewAlert,
    NotificationAttempt, NotificationMethod, NotificationPrefs, Severity,
};
pub use alert_event::AlertEvent;
pub use chain::{BlockRange, ParachainState, Transfer, TransferSummary, TvlReading};
pub use event_bus::EventBus;
pub use parachain::{Parachain, ParachainId, ParachainStatus};
pub use snapshot::{
    ActivitySnapshot, ActivityUpdate, MetricKind, MetricSnapshot, SnapshotKey, TvlSnapshot,
};
pub use write_locks::{SnapshotLockKey, WriteLocks};
