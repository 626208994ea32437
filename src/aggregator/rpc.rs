//! Chain RPC boundary.
//!
//! [`ChainRpc`] is the narrow set of relay-chain queries the aggregator
//! needs. The shipped implementation is
//! [`SidecarClient`](super::SidecarClient); tests substitute in-memory
//! fakes.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Failure of a single chain RPC call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// The endpoint could not be reached or the request timed out.
    #[error("transport: {0}")]
    Transport(String),

    /// The endpoint answered with an error.
    #[error("rpc status {status}: {message}")]
    Rpc {
        /// HTTP or JSON-RPC status code.
        status: u16,
        /// Error message returned by the endpoint.
        message: String,
    },

    /// The response could not be decoded.
    #[error("decode: {0}")]
    Decode(String),
}

impl RpcError {
    /// Returns `true` if the failure means the session is gone.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Number and hash of a relay-chain block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block number.
    pub number: u64,
    /// Block hash (hex).
    pub hash: String,
}

/// A runtime event emitted in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Pallet name, lower camel case (e.g. `"balances"`).
    pub section: String,
    /// Event name (e.g. `"Transfer"`).
    pub method: String,
    /// Event arguments in declaration order.
    pub data: Vec<serde_json::Value>,
}

impl ChainEvent {
    /// Returns `true` for `balances.Transfer`.
    #[must_use]
    pub fn is_balance_transfer(&self) -> bool {
        self.section.eq_ignore_ascii_case("balances") && self.method == "Transfer"
    }
}

/// Relay-chain queries used by the data aggregator.
#[async_trait]
pub trait ChainRpc: Send + Sync + fmt::Debug {
    /// Opens (or verifies) the session with the endpoint.
    async fn connect(&self) -> Result<(), RpcError>;

    /// Latest block header.
    async fn header(&self) -> Result<BlockHeader, RpcError>;

    /// Hash of block `number`.
    async fn block_hash(&self, number: u64) -> Result<String, RpcError>;

    /// Events emitted in the block with `hash`.
    async fn events_at(&self, hash: &str) -> Result<Vec<ChainEvent>, RpcError>;

    /// `balances.totalIssuance` in planck.
    async fn total_issuance(&self) -> Result<u128, RpcError>;

    /// `paras.heads(id)` as hex, or `None` if unset.
    async fn para_head(&self, id: u32) -> Result<Option<String>, RpcError>;

    /// `paras.paraLifecycles(id)`, or `None` if unset.
    async fn para_lifecycle(&self, id: u32) -> Result<Option<String>, RpcError>;

    /// `staking.validatorCount`.
    async fn validator_count(&self) -> Result<u32, RpcError>;

    /// Closes the session. Closing an already closed session is a no-op.
    async fn disconnect(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_drop_the_session() {
        assert!(RpcError::Transport("reset".to_string()).is_transport());
        assert!(
            !RpcError::Rpc {
                status: 500,
                message: "boom".to_string()
            }
            .is_transport()
        );
        assert!(!RpcError::Decode("bad".to_string()).is_transport());
    }

    #[test]
    fn transfer_event_matching() {
        let event = ChainEvent {
            section: "balances".to_string(),
            method: "Transfer".to_string(),
            data: Vec::new(),
        };
        assert!(event.is_balance_transfer());
        let deposit = ChainEvent {
            method: "Deposit".to_string(),
            ..event
        };
        assert!(!deposit.is_balance_transfer());
    }
}
