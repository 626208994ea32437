//! Service layer: business logic behind the REST and WebSocket surfaces.
//!
//! [`AlertService`] handles alert queries and operator actions and emits
//! events through the [`super::domain::EventBus`]. [`ParachainService`]
//! serves the registry and stored metric history.

pub mod alert_service;
pub mod parachain_service;

pub use alert_service::AlertService;
pub use parachain_service::{AccountActivity, ParachainOverview, ParachainService};
