//! Database row models and their conversions to domain types.
//!
//! PostgreSQL has no unsigned integers, so counters are stored as `BIGINT`
//! and planck amounts as decimal `TEXT`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::{
    ActivitySnapshot, Alert, NotificationAttempt, NotificationPrefs, Parachain, ParachainId,
    TvlSnapshot,
};
use crate::error::MonitorError;

/// A row from the `parachains` table.
#[derive(Debug, Clone, FromRow)]
pub struct ParachainRow {
    /// Para id.
    pub parachain_id: i64,
    /// Display name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Status string (e.g. `"active"`).
    pub status: String,
}

impl TryFrom<ParachainRow> for Parachain {
    type Error = MonitorError;

    fn try_from(row: ParachainRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parachain_id(row.parachain_id)?,
            name: row.name,
            symbol: row.symbol,
            status: row.status.parse().map_err(MonitorError::Persistence)?,
        })
    }
}

/// A row from the `tvl_snapshots` table.
#[derive(Debug, Clone, FromRow)]
pub struct TvlRow {
    /// Para id.
    pub parachain_id: i64,
    /// Start of the UTC hour.
    pub bucket: DateTime<Utc>,
    /// Display name at write time.
    pub parachain_name: String,
    /// Planck amount as decimal text.
    pub total_value_locked: String,
    /// USD value.
    pub total_value_locked_usd: f64,
    /// Contributing tokens.
    pub token_count: i64,
    /// Price used.
    pub price_usd: f64,
    /// Block the reading was taken at.
    pub block_number: Option<i64>,
    /// Source tag.
    pub source: String,
    /// Latest write time.
    pub recorded_at: DateTime<Utc>,
}

impl TryFrom<TvlRow> for TvlSnapshot {
    type Error = MonitorError;

    fn try_from(row: TvlRow) -> Result<Self, Self::Error> {
        Ok(Self {
            parachain_id: parachain_id(row.parachain_id)?,
            parachain_name: row.parachain_name,
            total_value_locked: row.total_value_locked,
            total_value_locked_usd: row.total_value_locked_usd,
            token_count: u32::try_from(row.token_count).unwrap_or(0),
            price_usd: row.price_usd,
            block_number: row.block_number.map(unsigned),
            source: row.source,
            timestamp: row.recorded_at,
            bucket: row.bucket,
        })
    }
}

/// A row from the `activity_snapshots` table.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityRow {
    /// Para id.
    pub parachain_id: i64,
    /// Start of the UTC hour.
    pub bucket: DateTime<Utc>,
    /// Display name at write time.
    pub parachain_name: String,
    /// Relay-chain head.
    pub block_number: Option<i64>,
    /// Relay-chain head hash.
    pub block_hash: Option<String>,
    /// Parachain head data.
    pub parachain_head: Option<String>,
    /// Para lifecycle.
    pub lifecycle: Option<String>,
    /// Validator count.
    pub validator_count: Option<i64>,
    /// Blocks scanned.
    pub blocks_produced: i64,
    /// Transfers observed.
    pub total_transactions: i64,
    /// Transfers per block.
    pub transactions_per_block: f64,
    /// Distinct accounts.
    pub unique_active_accounts: i64,
    /// Transfers observed.
    pub total_transfers: i64,
    /// Planck volume as decimal text.
    pub transfer_volume: String,
    /// USD volume.
    pub transfer_volume_usd: f64,
    /// Source tag.
    pub source: String,
    /// Latest write time.
    pub recorded_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivitySnapshot {
    type Error = MonitorError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            parachain_id: parachain_id(row.parachain_id)?,
            parachain_name: row.parachain_name,
            block_number: row.block_number.map(unsigned),
            block_hash: row.block_hash,
            parachain_head: row.parachain_head,
            lifecycle: row.lifecycle,
            validator_count: row
                .validator_count
                .map(|v| u32::try_from(v).unwrap_or(0)),
            blocks_produced: unsigned(row.blocks_produced),
            total_transactions: unsigned(row.total_transactions),
            transactions_per_block: row.transactions_per_block,
            unique_active_accounts: unsigned(row.unique_active_accounts),
            total_transfers: unsigned(row.total_transfers),
            transfer_volume: row.transfer_volume,
            transfer_volume_usd: row.transfer_volume_usd,
            source: row.source,
            timestamp: row.recorded_at,
            bucket: row.bucket,
        })
    }
}

/// A row from the `alerts` table.
#[derive(Debug, Clone, FromRow)]
pub struct AlertRow {
    /// Alert ID.
    pub id: Uuid,
    /// Type string.
    pub alert_type: String,
    /// Severity string.
    pub severity: String,
    /// Title.
    pub title: String,
    /// Message.
    pub message: String,
    /// Scoped parachain.
    pub parachain_id: Option<i64>,
    /// Scoped parachain name.
    pub parachain_name: Option<String>,
    /// Crossed threshold.
    pub threshold: Option<f64>,
    /// Current value.
    pub current_value: Option<f64>,
    /// Baseline value.
    pub previous_value: Option<f64>,
    /// Change percentage.
    pub change_percentage: Option<f64>,
    /// Source string.
    pub source: String,
    /// Active flag.
    pub is_active: bool,
    /// Acknowledged flag.
    pub is_acknowledged: bool,
    /// Acknowledging operator.
    pub acknowledged_by: Option<String>,
    /// Acknowledgement time.
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Resolution time.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Resolving operator.
    pub resolved_by: Option<String>,
    /// Channel preferences as JSONB.
    pub notifications: Json<NotificationPrefs>,
    /// Delivery attempts as JSONB.
    pub notification_history: Json<Vec<NotificationAttempt>>,
    /// Cooldown end.
    pub cooldown_until: Option<DateTime<Utc>>,
    /// First observation.
    pub first_seen: DateTime<Utc>,
    /// Last modification.
    pub last_seen: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Update time.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = MonitorError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            alert_type: row.alert_type.parse().map_err(stored_value)?,
            severity: row.severity.parse().map_err(stored_value)?,
            title: row.title,
            message: row.message,
            parachain_id: row.parachain_id.map(parachain_id).transpose()?,
            parachain_name: row.parachain_name,
            threshold: row.threshold,
            current_value: row.current_value,
            previous_value: row.previous_value,
            change_percentage: row.change_percentage,
            source: row.source.parse().map_err(stored_value)?,
            is_active: row.is_active,
            is_acknowledged: row.is_acknowledged,
            acknowledged_by: row.acknowledged_by,
            acknowledged_at: row.acknowledged_at,
            resolved_at: row.resolved_at,
            resolved_by: row.resolved_by,
            notifications: row.notifications.0,
            notification_history: row.notification_history.0,
            cooldown_until: row.cooldown_until,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Converts an unsigned counter to `BIGINT`, saturating at `i64::MAX`.
#[must_use]
pub fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Converts a `BIGINT` counter back, clamping negatives to zero.
#[must_use]
pub fn unsigned(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn parachain_id(raw: i64) -> Result<ParachainId, MonitorError> {
    ParachainId::try_from(raw)
        .map_err(|_| MonitorError::Persistence(format!("invalid parachain id in row: {raw}")))
}

fn stored_value(err: MonitorError) -> MonitorError {
    MonitorError::Persistence(format!("unreadable alert row: {err}"))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AlertType, Severity};

    fn alert_row() -> AlertRow {
        let now = Utc::now();
        AlertRow {
            id: Uuid::new_v4(),
            alert_type: "activity_spike".to_string(),
            severity: "medium".to_string(),
            title: "Activity Spike Alert: Astar".to_string(),
            message: "Transaction activity increased by 60.00% in the last 24 hours".to_string(),
            parachain_id: Some(2006),
            parachain_name: Some("Astar".to_string()),
            threshold: Some(50.0),
            current_value: Some(160.0),
            previous_value: Some(100.0),
            change_percentage: Some(60.0),
            source: "system".to_string(),
            is_active: true,
            is_acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_at: None,
            resolved_by: None,
            notifications: Json(NotificationPrefs::default()),
            notification_history: Json(Vec::new()),
            cooldown_until: Some(now),
            first_seen: now,
            last_seen: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn alert_row_converts() {
        let Ok(alert) = Alert::try_from(alert_row()) else {
            panic!("row should convert");
        };
        assert_eq!(alert.alert_type, AlertType::ActivitySpike);
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.parachain_id, Some(ParachainId::new(2006)));
    }

    #[test]
    fn unknown_enum_value_is_a_persistence_error() {
        let mut row = alert_row();
        row.severity = "apocalyptic".to_string();
        assert!(matches!(
            Alert::try_from(row),
            Err(MonitorError::Persistence(_))
        ));
    }

    #[test]
    fn counters_saturate_instead_of_wrapping() {
        assert_eq!(signed(u64::MAX), i64::MAX);
        assert_eq!(unsigned(-5), 0);
        assert_eq!(unsigned(signed(42)), 42);
    }
}
