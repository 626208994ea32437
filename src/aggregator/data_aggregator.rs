//! Connection-managed access to relay-chain data.
//!
//! [`DataAggregator`] owns the chain session. It exposes a small state
//! machine (`Disconnected → Connecting → Connected`) and the read
//! operations the collection jobs need. Operations never reconnect on
//! their own: a transport failure marks the aggregator disconnected and
//! the caller decides when to call [`DataAggregator::reconnect`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use super::price::PriceSource;
use super::rpc::{ChainEvent, ChainRpc, RpcError};
use crate::config::AggregatorSettings;
use crate::domain::{BlockRange, ParachainId, ParachainState, Transfer, TransferSummary, TvlReading};
use crate::error::MonitorError;

/// Id used in errors for relay-wide queries that are not tied to a parachain.
pub const RELAY_CHAIN: ParachainId = ParachainId::new(0);

/// Pallets whose events count as account activity.
const ACCOUNT_SECTIONS: [&str; 4] = ["balances", "staking", "democracy", "council"];

/// Session state of the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session.
    Disconnected,
    /// A connect or reconnect is in progress.
    Connecting,
    /// Session established.
    Connected,
}

impl ConnectionState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

/// An event in a scanned block that mentions a given account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct AccountEvent {
    /// Pallet that emitted the event.
    pub section: String,
    /// Event name.
    pub method: String,
    /// Block the event was emitted in.
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: String,
}

/// Reads parachain state, transfer activity and TVL from the relay chain.
#[derive(Debug)]
pub struct DataAggregator {
    rpc: Arc<dyn ChainRpc>,
    price: Arc<dyn PriceSource>,
    settings: AggregatorSettings,
    state: AtomicU8,
    session: AtomicU64,
    connect_lock: Mutex<()>,
}

impl DataAggregator {
    /// Creates a disconnected aggregator.
    #[must_use]
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        price: Arc<dyn PriceSource>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            rpc,
            price,
            settings,
            state: AtomicU8::new(ConnectionState::Disconnected.to_u8()),
            session: AtomicU64::new(0),
            connect_lock: Mutex::new(()),
        }
    }

    /// Current session state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` while a session is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Number of sessions established so far. Grows by one on every
    /// successful connect.
    #[must_use]
    pub fn session(&self) -> u64 {
        self.session.load(Ordering::Acquire)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    /// Establishes the session. Returns immediately if already connected.
    ///
    /// Each attempt is bounded by the connect timeout; failed attempts are
    /// retried with linear backoff (`attempt × base delay`).
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Connection`] once every attempt has failed.
    pub async fn connect(&self) -> Result<(), MonitorError> {
        let _guard = self.connect_lock.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        self.establish().await
    }

    /// Drops the current session (if any) and runs the connect retry loop.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Connection`] once every attempt has failed.
    pub async fn reconnect(&self) -> Result<(), MonitorError> {
        let _guard = self.connect_lock.lock().await;
        self.restart().await
    }

    /// Like [`DataAggregator::reconnect`], but returns at once if a session
    /// newer than `seen` (a value read from [`DataAggregator::session`]) is
    /// already up. Callers that queued behind another reconnect reuse its
    /// session instead of tearing it down.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Connection`] once every attempt has failed.
    pub async fn reconnect_since(&self, seen: u64) -> Result<(), MonitorError> {
        let _guard = self.connect_lock.lock().await;
        if self.is_connected() && self.session() != seen {
            tracing::debug!(session = self.session(), "session already re-established");
            return Ok(());
        }
        self.restart().await
    }

    async fn restart(&self) -> Result<(), MonitorError> {
        self.rpc.disconnect().await;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("reconnecting to chain endpoint");
        self.establish().await
    }

    /// Closes the session. A no-op when already disconnected.
    pub async fn disconnect(&self) {
        let _guard = self.connect_lock.lock().await;
        if self.connection_state() == ConnectionState::Disconnected {
            return;
        }
        self.rpc.disconnect().await;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("disconnected from chain endpoint");
    }

    async fn establish(&self) -> Result<(), MonitorError> {
        self.set_state(ConnectionState::Connecting);
        let attempts = self.settings.max_reconnect_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.settings.connect_timeout, self.rpc.connect()).await {
                Ok(Ok(())) => {
                    self.session.fetch_add(1, Ordering::AcqRel);
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(attempt, "connected to chain endpoint");
                    return Ok(());
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!(
                        "timed out after {}s",
                        self.settings.connect_timeout.as_secs_f64()
                    );
                }
            }
            tracing::warn!(attempt, max_attempts = attempts, error = %last_error, "chain connect attempt failed");
            if attempt < attempts {
                tokio::time::sleep(self.settings.reconnect_base_delay.saturating_mul(attempt)).await;
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Err(MonitorError::Connection(format!(
            "gave up after {attempts} attempts: {last_error}"
        )))
    }

    fn ensure_connected(&self) -> Result<(), MonitorError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(MonitorError::NotConnected)
        }
    }

    fn upstream(
        &self,
        parachain_id: ParachainId,
        operation: &'static str,
        err: RpcError,
    ) -> MonitorError {
        if err.is_transport() {
            self.set_state(ConnectionState::Disconnected);
            tracing::warn!(parachain_id = %parachain_id, operation, error = %err, "lost chain connection");
        }
        MonitorError::Upstream {
            parachain_id,
            operation,
            message: err.to_string(),
        }
    }

    /// Planck per whole token.
    #[must_use]
    pub fn planck_per_token(&self) -> f64 {
        10_f64.powi(i32::try_from(self.settings.planck_decimals).unwrap_or(10))
    }

    /// Latest relay-chain block number.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NotConnected`] without a session, or
    /// [`MonitorError::Upstream`] if the query fails.
    pub async fn current_block_number(&self) -> Result<u64, MonitorError> {
        self.ensure_connected()?;
        self.rpc
            .header()
            .await
            .map(|h| h.number)
            .map_err(|e| self.upstream(RELAY_CHAIN, "current_block_number", e))
    }

    /// Head block, para head, para lifecycle and validator count, read
    /// concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NotConnected`] without a session, or
    /// [`MonitorError::Upstream`] if any of the reads fails.
    pub async fn get_parachain_state(
        &self,
        parachain_id: ParachainId,
    ) -> Result<ParachainState, MonitorError> {
        self.ensure_connected()?;
        let id = parachain_id.get();
        let (header, head, lifecycle, validator_count) = tokio::try_join!(
            self.rpc.header(),
            self.rpc.para_head(id),
            self.rpc.para_lifecycle(id),
            self.rpc.validator_count(),
        )
        .map_err(|e| self.upstream(parachain_id, "get_parachain_state", e))?;

        Ok(ParachainState {
            parachain_id,
            block_number: header.number,
            block_hash: header.hash,
            head: head.unwrap_or_default(),
            lifecycle: lifecycle.unwrap_or_else(|| "Unknown".to_string()),
            validator_count,
            timestamp: Utc::now(),
        })
    }

    /// Balance transfers emitted in every block of `range` (inclusive).
    ///
    /// Pauses briefly every `pause_every_blocks` blocks to spread load on
    /// the endpoint. Malformed transfer events are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NotConnected`] without a session, or
    /// [`MonitorError::Upstream`] if a block cannot be read.
    pub async fn get_transfer_activity(
        &self,
        parachain_id: ParachainId,
        range: BlockRange,
    ) -> Result<Vec<Transfer>, MonitorError> {
        let mut transfers = Vec::new();
        self.scan_blocks(parachain_id, range, "get_transfer_activity", |n, _, event| {
            if !event.is_balance_transfer() {
                return;
            }
            match parse_transfer(event, n) {
                Some(transfer) => transfers.push(transfer),
                None => {
                    tracing::debug!(parachain_id = %parachain_id, block = n, "skipping malformed transfer event");
                }
            }
        })
        .await?;
        Ok(transfers)
    }

    /// Events in `range` from the balances, staking, democracy and council
    /// pallets whose arguments mention `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NotConnected`] without a session, or
    /// [`MonitorError::Upstream`] if a block cannot be read.
    pub async fn get_account_activity(
        &self,
        parachain_id: ParachainId,
        address: &str,
        range: BlockRange,
    ) -> Result<Vec<AccountEvent>, MonitorError> {
        let mut found = Vec::new();
        self.scan_blocks(parachain_id, range, "get_account_activity", |n, hash, event| {
            let relevant = ACCOUNT_SECTIONS
                .iter()
                .any(|s| event.section.eq_ignore_ascii_case(s));
            if relevant && event.data.iter().any(|arg| arg.as_str() == Some(address)) {
                found.push(AccountEvent {
                    section: event.section.clone(),
                    method: event.method.clone(),
                    block_number: n,
                    block_hash: hash.to_string(),
                });
            }
        })
        .await?;
        Ok(found)
    }

    async fn scan_blocks<F>(
        &self,
        parachain_id: ParachainId,
        range: BlockRange,
        operation: &'static str,
        mut visit: F,
    ) -> Result<(), MonitorError>
    where
        F: FnMut(u64, &str, &ChainEvent) + Send,
    {
        self.ensure_connected()?;
        let pause_every = self.settings.pause_every_blocks;
        for n in range.start..=range.end {
            let hash = self
                .rpc
                .block_hash(n)
                .await
                .map_err(|e| self.upstream(parachain_id, operation, e))?;
            let events = self
                .rpc
                .events_at(&hash)
                .await
                .map_err(|e| self.upstream(parachain_id, operation, e))?;
            for event in &events {
                visit(n, &hash, event);
            }
            if pause_every > 0 && n % pause_every == 0 {
                tokio::time::sleep(self.settings.pause).await;
            }
        }
        Ok(())
    }

    /// Total value locked, approximated as total issuance valued at the
    /// current token price.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NotConnected`] without a session,
    /// [`MonitorError::Upstream`] if the issuance query fails, or
    /// [`MonitorError::Computation`] if the price is unusable.
    pub async fn calculate_tvl(&self, parachain_id: ParachainId) -> Result<TvlReading, MonitorError> {
        self.ensure_connected()?;
        let issuance = self
            .rpc
            .total_issuance()
            .await
            .map_err(|e| self.upstream(parachain_id, "calculate_tvl", e))?;
        let price = self.checked_price().await?;

        Ok(TvlReading {
            parachain_id,
            total_value_locked: issuance,
            total_value_locked_usd: issuance as f64 / self.planck_per_token() * price,
            token_count: 1,
            price_usd: price,
            timestamp: Utc::now(),
        })
    }

    /// Aggregates `transfers` over `range` and values the volume at the
    /// current token price.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Computation`] if the price is unusable.
    pub async fn summarize_transfers(
        &self,
        transfers: &[Transfer],
        range: BlockRange,
    ) -> Result<TransferSummary, MonitorError> {
        let price = self.checked_price().await?;
        Ok(TransferSummary::from_transfers(
            transfers,
            range,
            self.planck_per_token(),
            price,
        ))
    }

    async fn checked_price(&self) -> Result<f64, MonitorError> {
        let price = self.price.price_usd().await?;
        if !price.is_finite() || price < 0.0 {
            return Err(MonitorError::Computation(format!(
                "unusable token price: {price}"
            )));
        }
        Ok(price)
    }
}

fn parse_transfer(event: &ChainEvent, block_number: u64) -> Option<Transfer> {
    let from = event.data.first()?.as_str()?.to_string();
    let to = event.data.get(1)?.as_str()?.to_string();
    let amount = match event.data.get(2)? {
        serde_json::Value::String(s) => s.parse().ok()?,
        serde_json::Value::Number(n) => n.to_string().parse().ok()?,
        _ => return None,
    };
    Some(Transfer {
        from,
        to,
        amount,
        block_number,
    })
}
