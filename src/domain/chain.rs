//! Plain values derived from chain state by the data aggregator.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParachainId;

/// Inclusive range of relay-chain block numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    /// First block (inclusive).
    pub start: u64,
    /// Last block (inclusive).
    pub end: u64,
}

impl BlockRange {
    /// Creates a range, swapping the bounds if they are reversed.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// The `window` blocks leading up to `head`, never starting below block 1.
    #[must_use]
    pub fn trailing(head: u64, window: u64) -> Self {
        Self::new(head.saturating_sub(window).max(1), head)
    }

    /// Number of blocks between the bounds (`end - start`).
    #[must_use]
    pub const fn span(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Current on-chain state of a parachain as seen from the relay chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParachainState {
    /// Parachain the state belongs to.
    pub parachain_id: ParachainId,
    /// Relay-chain head block number.
    pub block_number: u64,
    /// Relay-chain head block hash.
    pub block_hash: String,
    /// Hex-encoded parachain head data.
    pub head: String,
    /// Para lifecycle (e.g. `"Parachain"`, `"Parathread"`).
    pub lifecycle: String,
    /// Configured validator count.
    pub validator_count: u32,
    /// When the state was read.
    pub timestamp: DateTime<Utc>,
}

/// A single balances `Transfer` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Sender account.
    pub from: String,
    /// Receiver account.
    pub to: String,
    /// Amount in planck.
    pub amount: u128,
    /// Block the event was emitted in.
    pub block_number: u64,
}

/// Aggregated transfer activity over a block range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSummary {
    /// Relay-chain head at the end of the scanned range.
    pub block_number: u64,
    /// Blocks covered by the scan.
    pub blocks_scanned: u64,
    /// Number of transfers observed.
    pub total_transactions: u64,
    /// Transfers per scanned block.
    pub transactions_per_block: f64,
    /// Distinct senders and receivers.
    pub unique_active_accounts: u64,
    /// Sum of transferred planck.
    pub transfer_volume: u128,
    /// Transfer volume converted to USD.
    pub transfer_volume_usd: f64,
}

impl TransferSummary {
    /// Aggregates transfers seen in `range`.
    ///
    /// `planck_per_token` converts planck to whole tokens before applying
    /// `price_usd`.
    #[must_use]
    pub fn from_transfers(
        transfers: &[Transfer],
        range: BlockRange,
        planck_per_token: f64,
        price_usd: f64,
    ) -> Self {
        let accounts: HashSet<&str> = transfers
            .iter()
            .flat_map(|t| [t.from.as_str(), t.to.as_str()])
            .collect();
        let volume = transfers
            .iter()
            .fold(0_u128, |acc, t| acc.saturating_add(t.amount));
        let total = transfers.len() as u64;
        let blocks = range.span();
        let per_block = if blocks == 0 {
            0.0
        } else {
            total as f64 / blocks as f64
        };

        Self {
            block_number: range.end,
            blocks_scanned: blocks,
            total_transactions: total,
            transactions_per_block: per_block,
            unique_active_accounts: accounts.len() as u64,
            transfer_volume: volume,
            transfer_volume_usd: volume as f64 / planck_per_token * price_usd,
        }
    }
}

/// Total value locked for a parachain at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvlReading {
    /// Parachain the reading belongs to.
    pub parachain_id: ParachainId,
    /// Locked value in planck.
    pub total_value_locked: u128,
    /// Locked value in USD.
    pub total_value_locked_usd: f64,
    /// Number of tokens contributing to the value.
    pub token_count: u32,
    /// Price used for the conversion.
    pub price_usd: f64,
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &str, to: &str, amount: u128) -> Transfer {
        Transfer {
            from: from.to_string(),
            to: to.to_string(),
            amount,
            block_number: 1,
        }
    }

    #[test]
    fn trailing_range_is_clamped_to_genesis() {
        assert_eq!(BlockRange::trailing(50, 100), BlockRange::new(1, 50));
        assert_eq!(BlockRange::trailing(1_000, 100), BlockRange::new(900, 1_000));
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let range = BlockRange::new(10, 5);
        assert_eq!(range.start, 5);
        assert_eq!(range.end, 10);
    }

    #[test]
    fn summary_counts_unique_accounts_across_both_sides() {
        let transfers = vec![
            transfer("alice", "bob", 10),
            transfer("bob", "carol", 20),
            transfer("alice", "carol", 30),
        ];
        let summary =
            TransferSummary::from_transfers(&transfers, BlockRange::new(900, 1_000), 10.0, 2.0);
        assert_eq!(summary.unique_active_accounts, 3);
        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.transfer_volume, 60);
        assert_eq!(summary.blocks_scanned, 100);
        assert!((summary.transactions_per_block - 0.03).abs() < f64::EPSILON);
        assert!((summary.transfer_volume_usd - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_range_does_not_divide_by_zero() {
        let summary = TransferSummary::from_transfers(&[], BlockRange::new(7, 7), 1.0, 1.0);
        assert_eq!(summary.transactions_per_block, 0.0);
        assert_eq!(summary.unique_active_accounts, 0);
    }
}
