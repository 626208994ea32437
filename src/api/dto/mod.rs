//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain records ([`crate::domain::Alert`], snapshots, job state) are
//! serialized as-is; the types here cover query strings, request bodies
//! and list envelopes.

pub mod alert_dto;
pub mod common_dto;
pub mod parachain_dto;
pub mod scheduler_dto;

pub use alert_dto::*;
pub use common_dto::*;
pub use parachain_dto::*;
pub use scheduler_dto::*;
