//! PostgreSQL implementation of the repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::models::{ActivityRow, AlertRow, ParachainRow, TvlRow, signed};
use super::{AlertRepository, MetricRepository, ParachainRepository};
use crate::domain::{
    ActivitySnapshot, ActivityUpdate, Alert, AlertFilter, AlertStats, AlertStatus, AlertType,
    MetricKind, MetricSnapshot, Parachain, ParachainId, SnapshotKey, TvlSnapshot,
};
use crate::error::MonitorError;

const TVL_COLUMNS: &str = "parachain_id, bucket, parachain_name, total_value_locked, \
     total_value_locked_usd, token_count, price_usd, block_number, source, recorded_at";

const ACTIVITY_COLUMNS: &str = "parachain_id, bucket, parachain_name, block_number, block_hash, \
     parachain_head, lifecycle, validator_count, blocks_produced, total_transactions, \
     transactions_per_block, unique_active_accounts, total_transfers, transfer_volume, \
     transfer_volume_usd, source, recorded_at";

const ALERT_COLUMNS: &str = "id, alert_type, severity, title, message, parachain_id, \
     parachain_name, threshold, current_value, previous_value, change_percentage, source, \
     is_active, is_acknowledged, acknowledged_by, acknowledged_at, resolved_at, resolved_by, \
     notifications, notification_history, cooldown_until, first_seen, last_seen, created_at, \
     updated_at";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store on top of an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] if the database is unreachable
    /// or a migration fails.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: std::time::Duration,
    ) -> Result<Self, MonitorError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| MonitorError::Persistence(e.to_string()))?;
        Ok(Self::new(pool))
    }

    async fn fetch_tvl(
        &self,
        parachain_id: ParachainId,
        condition: &str,
        order: &str,
        bounds: &[DateTime<Utc>],
    ) -> Result<Vec<MetricSnapshot>, MonitorError> {
        let sql = format!(
            "SELECT {TVL_COLUMNS} FROM tvl_snapshots WHERE parachain_id = $1 {condition} {order}"
        );
        let mut query = sqlx::query_as::<_, TvlRow>(&sql).bind(i64::from(parachain_id));
        for bound in bounds {
            query = query.bind(*bound);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| TvlSnapshot::try_from(row).map(MetricSnapshot::Tvl))
            .collect()
    }

    async fn fetch_activity(
        &self,
        parachain_id: ParachainId,
        condition: &str,
        order: &str,
        bounds: &[DateTime<Utc>],
    ) -> Result<Vec<MetricSnapshot>, MonitorError> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_snapshots WHERE parachain_id = $1 {condition} {order}"
        );
        let mut query = sqlx::query_as::<_, ActivityRow>(&sql).bind(i64::from(parachain_id));
        for bound in bounds {
            query = query.bind(*bound);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| ActivitySnapshot::try_from(row).map(MetricSnapshot::Activity))
            .collect()
    }

    async fn fetch_snapshots(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
        condition: &str,
        order: &str,
        bounds: &[DateTime<Utc>],
    ) -> Result<Vec<MetricSnapshot>, MonitorError> {
        match kind {
            MetricKind::Tvl => self.fetch_tvl(parachain_id, condition, order, bounds).await,
            MetricKind::Activity => {
                self.fetch_activity(parachain_id, condition, order, bounds)
                    .await
            }
        }
    }
}

#[async_trait]
impl MetricRepository for PostgresStore {
    async fn upsert_tvl(&self, snapshot: TvlSnapshot) -> Result<(), MonitorError> {
        sqlx::query(&format!(
            "INSERT INTO tvl_snapshots ({TVL_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (parachain_id, bucket) DO UPDATE SET \
             parachain_name = EXCLUDED.parachain_name, \
             total_value_locked = EXCLUDED.total_value_locked, \
             total_value_locked_usd = EXCLUDED.total_value_locked_usd, \
             token_count = EXCLUDED.token_count, \
             price_usd = EXCLUDED.price_usd, \
             block_number = EXCLUDED.block_number, \
             source = EXCLUDED.source, \
             recorded_at = EXCLUDED.recorded_at"
        ))
        .bind(i64::from(snapshot.parachain_id))
        .bind(snapshot.bucket)
        .bind(&snapshot.parachain_name)
        .bind(&snapshot.total_value_locked)
        .bind(snapshot.total_value_locked_usd)
        .bind(i64::from(snapshot.token_count))
        .bind(snapshot.price_usd)
        .bind(snapshot.block_number.map(signed))
        .bind(&snapshot.source)
        .bind(snapshot.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_activity(
        &self,
        key: SnapshotKey,
        parachain_name: &str,
        update: ActivityUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, ActivityRow>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_snapshots \
             WHERE parachain_id = $1 AND bucket = $2 FOR UPDATE"
        ))
        .bind(i64::from(key.parachain_id))
        .bind(key.bucket)
        .fetch_optional(&mut *tx)
        .await?;

        let mut row = match existing {
            Some(row) => ActivitySnapshot::try_from(row)?,
            None => ActivitySnapshot::empty(&key, parachain_name, at),
        };
        row.parachain_name = parachain_name.to_string();
        row.apply(&update, at);

        sqlx::query(&format!(
            "INSERT INTO activity_snapshots ({ACTIVITY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             ON CONFLICT (parachain_id, bucket) DO UPDATE SET \
             parachain_name = EXCLUDED.parachain_name, \
             block_number = EXCLUDED.block_number, \
             block_hash = EXCLUDED.block_hash, \
             parachain_head = EXCLUDED.parachain_head, \
             lifecycle = EXCLUDED.lifecycle, \
             validator_count = EXCLUDED.validator_count, \
             blocks_produced = EXCLUDED.blocks_produced, \
             total_transactions = EXCLUDED.total_transactions, \
             transactions_per_block = EXCLUDED.transactions_per_block, \
             unique_active_accounts = EXCLUDED.unique_active_accounts, \
             total_transfers = EXCLUDED.total_transfers, \
             transfer_volume = EXCLUDED.transfer_volume, \
             transfer_volume_usd = EXCLUDED.transfer_volume_usd, \
             source = EXCLUDED.source, \
             recorded_at = EXCLUDED.recorded_at"
        ))
        .bind(i64::from(row.parachain_id))
        .bind(row.bucket)
        .bind(&row.parachain_name)
        .bind(row.block_number.map(signed))
        .bind(&row.block_hash)
        .bind(&row.parachain_head)
        .bind(&row.lifecycle)
        .bind(row.validator_count.map(i64::from))
        .bind(signed(row.blocks_produced))
        .bind(signed(row.total_transactions))
        .bind(row.transactions_per_block)
        .bind(signed(row.unique_active_accounts))
        .bind(signed(row.total_transfers))
        .bind(&row.transfer_volume)
        .bind(row.transfer_volume_usd)
        .bind(&row.source)
        .bind(row.timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_latest(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
    ) -> Result<Option<MetricSnapshot>, MonitorError> {
        Ok(self
            .fetch_snapshots(parachain_id, kind, "", "ORDER BY recorded_at DESC LIMIT 1", &[])
            .await?
            .into_iter()
            .next())
    }

    async fn find_latest_before(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
        before: DateTime<Utc>,
    ) -> Result<Option<MetricSnapshot>, MonitorError> {
        Ok(self
            .fetch_snapshots(
                parachain_id,
                kind,
                "AND recorded_at <= $2",
                "ORDER BY recorded_at DESC LIMIT 1",
                &[before],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn find_in_range(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSnapshot>, MonitorError> {
        self.fetch_snapshots(
            parachain_id,
            kind,
            "AND recorded_at >= $2 AND recorded_at <= $3",
            "ORDER BY recorded_at ASC",
            &[start, end],
        )
        .await
    }

    async fn has_any_since(
        &self,
        kind: MetricKind,
        since: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        let table = match kind {
            MetricKind::Tvl => "tvl_snapshots",
            MetricKind::Activity => "activity_snapshots",
        };
        let found = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {table} WHERE recorded_at >= $1)"
        ))
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}

#[async_trait]
impl AlertRepository for PostgresStore {
    async fn find_active_in_cooldown(
        &self,
        alert_type: AlertType,
        parachain_id: Option<ParachainId>,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>, MonitorError> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE alert_type = $1 AND parachain_id IS NOT DISTINCT FROM $2 \
             AND is_active AND cooldown_until > $3 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(alert_type.as_str())
        .bind(parachain_id.map(i64::from))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Alert::try_from).transpose()
    }

    async fn create(&self, alert: Alert) -> Result<Alert, MonitorError> {
        sqlx::query(&format!(
            "INSERT INTO alerts ({ALERT_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
              $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)"
        ))
        .bind(alert.id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.parachain_id.map(i64::from))
        .bind(&alert.parachain_name)
        .bind(alert.threshold)
        .bind(alert.current_value)
        .bind(alert.previous_value)
        .bind(alert.change_percentage)
        .bind(alert.source.as_str())
        .bind(alert.is_active)
        .bind(alert.is_acknowledged)
        .bind(&alert.acknowledged_by)
        .bind(alert.acknowledged_at)
        .bind(alert.resolved_at)
        .bind(&alert.resolved_by)
        .bind(Json(&alert.notifications))
        .bind(Json(&alert.notification_history))
        .bind(alert.cooldown_until)
        .bind(alert.first_seen)
        .bind(alert.last_seen)
        .bind(alert.created_at)
        .bind(alert.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(alert)
    }

    async fn update(&self, alert: &Alert) -> Result<(), MonitorError> {
        let result = sqlx::query(
            "UPDATE alerts SET is_active = $2, is_acknowledged = $3, acknowledged_by = $4, \
             acknowledged_at = $5, resolved_at = $6, resolved_by = $7, notifications = $8, \
             notification_history = $9, cooldown_until = $10, last_seen = $11, updated_at = $12 \
             WHERE id = $1",
        )
        .bind(alert.id)
        .bind(alert.is_active)
        .bind(alert.is_acknowledged)
        .bind(&alert.acknowledged_by)
        .bind(alert.acknowledged_at)
        .bind(alert.resolved_at)
        .bind(&alert.resolved_by)
        .bind(Json(&alert.notifications))
        .bind(Json(&alert.notification_history))
        .bind(alert.cooldown_until)
        .bind(alert.last_seen)
        .bind(alert.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MonitorError::AlertNotFound(alert.id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Alert>, MonitorError> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Alert::try_from).transpose()
    }

    async fn list(&self, filter: &AlertFilter) -> Result<(Vec<Alert>, u64), MonitorError> {
        let mut count: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM alerts WHERE TRUE");
        push_filter(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut page: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE TRUE"));
        push_filter(&mut page, filter);
        page.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(signed(filter.limit as u64))
            .push(" OFFSET ")
            .push_bind(signed(filter.offset as u64));
        let alerts = page
            .build_query_as::<AlertRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Alert::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((alerts, u64::try_from(total).unwrap_or(0)))
    }

    async fn stats(&self) -> Result<AlertStats, MonitorError> {
        let rows = sqlx::query_as::<_, (String, String, bool, bool, bool, i64)>(
            "SELECT alert_type, severity, is_active, is_acknowledged, resolved_at IS NOT NULL, \
             COUNT(*) FROM alerts GROUP BY 1, 2, 3, 4, 5",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = AlertStats::default();
        for (alert_type, severity, is_active, is_acknowledged, resolved, count) in rows {
            let status = if resolved {
                AlertStatus::Resolved
            } else if !is_active {
                AlertStatus::Inactive
            } else if is_acknowledged {
                AlertStatus::Acknowledged
            } else {
                AlertStatus::Active
            };
            stats.tally(
                alert_type.parse()?,
                severity.parse()?,
                status,
                u64::try_from(count).unwrap_or(0),
            );
        }
        Ok(stats)
    }
}

#[async_trait]
impl ParachainRepository for PostgresStore {
    async fn list_active(&self) -> Result<Vec<Parachain>, MonitorError> {
        sqlx::query_as::<_, ParachainRow>(
            "SELECT parachain_id, name, symbol, status FROM parachains \
             WHERE status = 'active' ORDER BY parachain_id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Parachain::try_from)
        .collect()
    }

    async fn list_all(&self) -> Result<Vec<Parachain>, MonitorError> {
        sqlx::query_as::<_, ParachainRow>(
            "SELECT parachain_id, name, symbol, status FROM parachains ORDER BY parachain_id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Parachain::try_from)
        .collect()
    }

    async fn get(&self, id: ParachainId) -> Result<Option<Parachain>, MonitorError> {
        let row = sqlx::query_as::<_, ParachainRow>(
            "SELECT parachain_id, name, symbol, status FROM parachains WHERE parachain_id = $1",
        )
        .bind(i64::from(id))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Parachain::try_from).transpose()
    }

    async fn register(&self, parachain: &Parachain) -> Result<(), MonitorError> {
        sqlx::query(
            "INSERT INTO parachains (parachain_id, name, symbol, status) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (parachain_id) DO UPDATE SET name = EXCLUDED.name, \
             symbol = EXCLUDED.symbol, status = EXCLUDED.status, updated_at = NOW()",
        )
        .bind(i64::from(parachain.id))
        .bind(&parachain.name)
        .bind(&parachain.symbol)
        .bind(parachain.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Appends the `AND ...` clauses for every set filter field.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &AlertFilter) {
    if let Some(status) = filter.status {
        builder.push(match status {
            AlertStatus::Active => " AND resolved_at IS NULL AND is_active AND NOT is_acknowledged",
            AlertStatus::Acknowledged => " AND resolved_at IS NULL AND is_active AND is_acknowledged",
            AlertStatus::Inactive => " AND resolved_at IS NULL AND NOT is_active",
            AlertStatus::Resolved => " AND resolved_at IS NOT NULL",
        });
    }
    if let Some(severity) = filter.severity {
        builder.push(" AND severity = ").push_bind(severity.as_str());
    }
    if let Some(alert_type) = filter.alert_type {
        builder.push(" AND alert_type = ").push_bind(alert_type.as_str());
    }
    if let Some(parachain_id) = filter.parachain_id {
        builder
            .push(" AND parachain_id = ")
            .push_bind(i64::from(parachain_id));
    }
}
