//! Chain data collection.
//!
//! [`DataAggregator`] wraps a [`ChainRpc`] session and a [`PriceSource`]
//! and turns raw chain queries into the values the jobs persist:
//! parachain state, transfer activity and TVL.

pub mod data_aggregator;
pub mod price;
pub mod rpc;
pub mod sidecar;

pub use data_aggregator::{AccountEvent, ConnectionState, DataAggregator, RELAY_CHAIN};
pub use price::{CoinGeckoPrice, FixedPrice, PriceSource};
pub use rpc::{BlockHeader, ChainEvent, ChainRpc, RpcError};
pub use sidecar::SidecarClient;
