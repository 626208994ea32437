//! Parachain identity and registry records.
//!
//! [`ParachainId`] is a newtype around the relay-chain assigned `u32`
//! para id so it cannot be confused with block numbers or counts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Relay-chain assigned parachain identifier (e.g. `2004` for Moonbeam).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(transparent)]
pub struct ParachainId(u32);

impl ParachainId {
    /// Wraps a raw para id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw para id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ParachainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ParachainId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<ParachainId> for i64 {
    fn from(id: ParachainId) -> Self {
        Self::from(id.0)
    }
}

impl TryFrom<i64> for ParachainId {
    type Error = std::num::TryFromIntError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value).map(Self)
    }
}

/// Lifecycle status of a registered parachain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParachainStatus {
    /// Producing blocks and monitored by every job.
    Active,
    /// Registered but not monitored.
    Inactive,
    /// Announced, not yet onboarded.
    ComingSoon,
    /// Offboarded.
    Retired,
}

impl ParachainStatus {
    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::ComingSoon => "coming_soon",
            Self::Retired => "retired",
        }
    }
}

impl FromStr for ParachainStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "coming_soon" => Ok(Self::ComingSoon),
            "retired" => Ok(Self::Retired),
            other => Err(format!("unknown parachain status: {other}")),
        }
    }
}

/// A registered parachain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Parachain {
    /// Para id.
    pub id: ParachainId,
    /// Display name (e.g. `"Moonbeam"`).
    pub name: String,
    /// Native token symbol (e.g. `"GLMR"`).
    pub symbol: String,
    /// Lifecycle status.
    pub status: ParachainStatus,
}

impl Parachain {
    /// Creates an active parachain record.
    #[must_use]
    pub fn active(id: u32, name: &str, symbol: &str) -> Self {
        Self {
            id: ParachainId::new(id),
            name: name.to_string(),
            symbol: symbol.to_string(),
            status: ParachainStatus::Active,
        }
    }

    /// Returns `true` if the scheduler should monitor this parachain.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ParachainStatus::Active
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_is_raw_number() {
        assert_eq!(ParachainId::new(2004).to_string(), "2004");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&ParachainId::new(2000)).unwrap_or_default();
        assert_eq!(json, "2000");
    }

    #[test]
    fn negative_database_id_is_rejected() {
        assert!(ParachainId::try_from(-1_i64).is_err());
        let Ok(id) = ParachainId::try_from(2006_i64) else {
            panic!("valid id");
        };
        assert_eq!(id.get(), 2006);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ParachainStatus::Active,
            ParachainStatus::Inactive,
            ParachainStatus::ComingSoon,
            ParachainStatus::Retired,
        ] {
            assert_eq!(status.as_str().parse::<ParachainStatus>(), Ok(status));
        }
    }
}
