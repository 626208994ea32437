//! Hourly metric snapshots.
//!
//! Both metric kinds are bucketed by UTC hour: every write inside the same
//! hour for the same parachain lands on one row. Activity rows are filled
//! in by two different jobs, so writes to them are partial merges
//! ([`ActivityUpdate`]).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, DurationRound, NaiveDate, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::ParachainId;
use super::chain::{ParachainState, TransferSummary, TvlReading};

/// Source tag stored on snapshots written by the collectors.
pub const CHAIN_SOURCE: &str = "chain-rpc";

/// Which time series a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Total value locked.
    Tvl,
    /// Chain state and transfer activity.
    Activity,
}

impl MetricKind {
    /// Every kind, in alert-check order.
    pub const ALL: [Self; 2] = [Self::Tvl, Self::Activity];

    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tvl => "tvl",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tvl" => Ok(Self::Tvl),
            "activity" => Ok(Self::Activity),
            other => Err(format!("unknown metric kind: {other}")),
        }
    }
}

/// Truncates `at` to the start of its UTC hour.
#[must_use]
pub fn hour_bucket(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::hours(1)).unwrap_or(at)
}

/// Upsert key of a snapshot row: one row per parachain, kind and hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    /// Parachain the row belongs to.
    pub parachain_id: ParachainId,
    /// Time series.
    pub kind: MetricKind,
    /// Start of the UTC hour.
    pub bucket: DateTime<Utc>,
}

impl SnapshotKey {
    /// Key of the hour containing `at`.
    #[must_use]
    pub fn for_time(parachain_id: ParachainId, kind: MetricKind, at: DateTime<Utc>) -> Self {
        Self {
            parachain_id,
            kind,
            bucket: hour_bucket(at),
        }
    }

    /// Calendar date of the bucket.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.bucket.date_naive()
    }

    /// Hour of day (0–23) of the bucket.
    #[must_use]
    pub fn hour(&self) -> u32 {
        self.bucket.hour()
    }
}

/// One hourly TVL observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TvlSnapshot {
    /// Parachain the row belongs to.
    pub parachain_id: ParachainId,
    /// Parachain display name at write time.
    pub parachain_name: String,
    /// Locked value in planck (decimal string).
    pub total_value_locked: String,
    /// Locked value in USD.
    pub total_value_locked_usd: f64,
    /// Number of tokens contributing to the value.
    pub token_count: u32,
    /// Price used for the USD conversion.
    pub price_usd: f64,
    /// Relay-chain block the reading was taken at, if known.
    pub block_number: Option<u64>,
    /// Data source tag.
    pub source: String,
    /// Time of the latest write into this bucket.
    pub timestamp: DateTime<Utc>,
    /// Start of the UTC hour.
    pub bucket: DateTime<Utc>,
}

impl TvlSnapshot {
    /// Builds the snapshot row for a TVL reading.
    #[must_use]
    pub fn from_reading(reading: &TvlReading, parachain_name: &str) -> Self {
        Self {
            parachain_id: reading.parachain_id,
            parachain_name: parachain_name.to_string(),
            total_value_locked: reading.total_value_locked.to_string(),
            total_value_locked_usd: reading.total_value_locked_usd,
            token_count: reading.token_count,
            price_usd: reading.price_usd,
            block_number: None,
            source: CHAIN_SOURCE.to_string(),
            timestamp: reading.timestamp,
            bucket: hour_bucket(reading.timestamp),
        }
    }

    /// Upsert key of this row.
    #[must_use]
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            parachain_id: self.parachain_id,
            kind: MetricKind::Tvl,
            bucket: self.bucket,
        }
    }
}

/// One hourly activity observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ActivitySnapshot {
    /// Parachain the row belongs to.
    pub parachain_id: ParachainId,
    /// Parachain display name at write time.
    pub parachain_name: String,
    /// Relay-chain head at the latest write.
    pub block_number: Option<u64>,
    /// Relay-chain head hash from the latest state read.
    pub block_hash: Option<String>,
    /// Parachain head data from the latest state read.
    pub parachain_head: Option<String>,
    /// Para lifecycle from the latest state read.
    pub lifecycle: Option<String>,
    /// Validator count from the latest state read.
    pub validator_count: Option<u32>,
    /// Blocks covered by the latest transfer scan.
    pub blocks_produced: u64,
    /// Transfers observed in the latest scan.
    pub total_transactions: u64,
    /// Transfers per scanned block.
    pub transactions_per_block: f64,
    /// Distinct senders and receivers.
    pub unique_active_accounts: u64,
    /// Transfers observed (same as `total_transactions` for balance transfers).
    pub total_transfers: u64,
    /// Transfer volume in planck (decimal string).
    pub transfer_volume: String,
    /// Transfer volume in USD.
    pub transfer_volume_usd: f64,
    /// Data source tag.
    pub source: String,
    /// Time of the latest write into this bucket.
    pub timestamp: DateTime<Utc>,
    /// Start of the UTC hour.
    pub bucket: DateTime<Utc>,
}

/// Partial write into an activity row.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityUpdate {
    /// Chain state collected by the parachain data job.
    ChainState(ParachainState),
    /// Transfer aggregation from the activity job.
    Transfers(TransferSummary),
}

impl ActivitySnapshot {
    /// An empty row for `key`, as created on the first write of the hour.
    #[must_use]
    pub fn empty(key: &SnapshotKey, parachain_name: &str, at: DateTime<Utc>) -> Self {
        Self {
            parachain_id: key.parachain_id,
            parachain_name: parachain_name.to_string(),
            block_number: None,
            block_hash: None,
            parachain_head: None,
            lifecycle: None,
            validator_count: None,
            blocks_produced: 0,
            total_transactions: 0,
            transactions_per_block: 0.0,
            unique_active_accounts: 0,
            total_transfers: 0,
            transfer_volume: "0".to_string(),
            transfer_volume_usd: 0.0,
            source: CHAIN_SOURCE.to_string(),
            timestamp: at,
            bucket: key.bucket,
        }
    }

    /// Merges `update` into the row. Fields the update does not carry are
    /// left untouched.
    pub fn apply(&mut self, update: &ActivityUpdate, at: DateTime<Utc>) {
        match update {
            ActivityUpdate::ChainState(state) => {
                self.block_number = Some(state.block_number);
                self.block_hash = Some(state.block_hash.clone());
                self.parachain_head = Some(state.head.clone());
                self.lifecycle = Some(state.lifecycle.clone());
                self.validator_count = Some(state.validator_count);
            }
            ActivityUpdate::Transfers(summary) => {
                self.block_number = Some(summary.block_number);
                self.blocks_produced = summary.blocks_scanned;
                self.total_transactions = summary.total_transactions;
                self.transactions_per_block = summary.transactions_per_block;
                self.unique_active_accounts = summary.unique_active_accounts;
                self.total_transfers = summary.total_transactions;
                self.transfer_volume = summary.transfer_volume.to_string();
                self.transfer_volume_usd = summary.transfer_volume_usd;
            }
        }
        self.timestamp = at;
    }

    /// Upsert key of this row.
    #[must_use]
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            parachain_id: self.parachain_id,
            kind: MetricKind::Activity,
            bucket: self.bucket,
        }
    }
}

/// A snapshot of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricSnapshot {
    /// TVL row.
    Tvl(TvlSnapshot),
    /// Activity row.
    Activity(ActivitySnapshot),
}

impl MetricSnapshot {
    /// Time series the snapshot belongs to.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        match self {
            Self::Tvl(_) => MetricKind::Tvl,
            Self::Activity(_) => MetricKind::Activity,
        }
    }

    /// Parachain the snapshot belongs to.
    #[must_use]
    pub const fn parachain_id(&self) -> ParachainId {
        match self {
            Self::Tvl(s) => s.parachain_id,
            Self::Activity(s) => s.parachain_id,
        }
    }

    /// Time of the latest write.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Tvl(s) => s.timestamp,
            Self::Activity(s) => s.timestamp,
        }
    }

    /// Returns `false` for activity rows the transfer scan has not filled in
    /// yet; their zero transaction count is not a measurement.
    #[must_use]
    pub const fn is_comparable(&self) -> bool {
        match self {
            Self::Tvl(_) => true,
            Self::Activity(s) => s.blocks_produced > 0,
        }
    }

    /// Value compared by the alert checks: USD TVL or transaction count.
    #[must_use]
    pub fn alert_value(&self) -> f64 {
        match self {
            Self::Tvl(s) => s.total_value_locked_usd,
            Self::Activity(s) => s.total_transactions as f64,
        }
    }
}
