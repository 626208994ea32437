//! [`ChainRpc`] over the Substrate API Sidecar REST interface.
//!
//! Sidecar exposes decoded relay-chain data as JSON, so this adapter does no
//! SCALE decoding. Numeric values arrive as decimal strings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::rpc::{BlockHeader, ChainEvent, ChainRpc, RpcError};

/// HTTP client for a Substrate API Sidecar instance.
#[derive(Debug, Clone)]
pub struct SidecarClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct BlockSummary {
    number: Value,
    hash: String,
}

#[derive(Debug, Deserialize)]
struct StorageItem {
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EventMethod {
    pallet: String,
    method: String,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    method: EventMethod,
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct EventHolder {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockEvents {
    #[serde(default)]
    on_initialize: EventHolder,
    #[serde(default)]
    extrinsics: Vec<EventHolder>,
    #[serde(default)]
    on_finalize: EventHolder,
}

impl SidecarClient {
    /// Creates a client for the sidecar at `base_url`; every request is
    /// bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RpcError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RpcError::Rpc {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| RpcError::Decode(format!("{path}: {e}")))
    }

    async fn storage(&self, path: &str) -> Result<Option<Value>, RpcError> {
        let item: StorageItem = self.get_json(path).await?;
        Ok(item.value.filter(|v| !v.is_null()))
    }
}

/// Maps a reqwest failure onto the RPC taxonomy.
fn classify(err: reqwest::Error) -> RpcError {
    if err.is_decode() {
        RpcError::Decode(err.to_string())
    } else if let Some(status) = err.status().filter(|s| *s != StatusCode::REQUEST_TIMEOUT) {
        RpcError::Rpc {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else {
        RpcError::Transport(err.to_string())
    }
}

/// Parses a sidecar number, which may be a JSON number or a decimal string.
fn number<T: std::str::FromStr>(value: &Value, what: &str) -> Result<T, RpcError> {
    let parsed = match value {
        Value::String(s) => s.parse::<T>().ok(),
        Value::Number(n) => n.to_string().parse::<T>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RpcError::Decode(format!("{what}: expected a number, got {value}")))
}

fn text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl ChainRpc for SidecarClient {
    async fn connect(&self) -> Result<(), RpcError> {
        let _: Value = self.get_json("/node/version").await?;
        tracing::debug!(url = %self.base_url, "sidecar reachable");
        Ok(())
    }

    async fn header(&self) -> Result<BlockHeader, RpcError> {
        let block: BlockSummary = self.get_json("/blocks/head?noFees=true").await?;
        Ok(BlockHeader {
            number: number(&block.number, "block number")?,
            hash: block.hash,
        })
    }

    async fn block_hash(&self, number: u64) -> Result<String, RpcError> {
        let block: BlockSummary = self
            .get_json(&format!("/blocks/{number}?noFees=true"))
            .await?;
        Ok(block.hash)
    }

    async fn events_at(&self, hash: &str) -> Result<Vec<ChainEvent>, RpcError> {
        let block: BlockEvents = self
            .get_json(&format!("/blocks/{hash}?noFees=true"))
            .await?;
        let events = block
            .on_initialize
            .events
            .into_iter()
            .chain(block.extrinsics.into_iter().flat_map(|x| x.events))
            .chain(block.on_finalize.events)
            .map(|raw| ChainEvent {
                section: raw.method.pallet,
                method: raw.method.method,
                data: raw.data,
            })
            .collect();
        Ok(events)
    }

    async fn total_issuance(&self) -> Result<u128, RpcError> {
        let value = self
            .storage("/pallets/balances/storage/totalIssuance")
            .await?
            .ok_or_else(|| RpcError::Decode("totalIssuance is empty".to_string()))?;
        number(&value, "totalIssuance")
    }

    async fn para_head(&self, id: u32) -> Result<Option<String>, RpcError> {
        Ok(self
            .storage(&format!("/pallets/paras/storage/heads?keys[]={id}"))
            .await?
            .map(text))
    }

    async fn para_lifecycle(&self, id: u32) -> Result<Option<String>, RpcError> {
        Ok(self
            .storage(&format!("/pallets/paras/storage/paraLifecycles?keys[]={id}"))
            .await?
            .map(text))
    }

    async fn validator_count(&self) -> Result<u32, RpcError> {
        let value = self
            .storage("/pallets/staking/storage/validatorCount")
            .await?
            .ok_or_else(|| RpcError::Decode("validatorCount is empty".to_string()))?;
        number(&value, "validatorCount")
    }

    async fn disconnect(&self) {
        tracing::debug!(url = %self.base_url, "sidecar session closed");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> SidecarClient {
        let Ok(client) = SidecarClient::new(&server.uri(), Duration::from_secs(5)) else {
            panic!("client should build");
        };
        client
    }

    #[tokio::test]
    async fn reads_head_number_from_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/head"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "number": "18000123",
                "hash": "0xabc",
                "parentHash": "0x000",
                "extrinsics": []
            })))
            .mount(&server)
            .await;

        let Ok(header) = client(&server).await.header().await else {
            panic!("header should decode");
        };
        assert_eq!(header.number, 18_000_123);
        assert_eq!(header.hash, "0xabc");
    }

    #[tokio::test]
    async fn collects_events_from_every_phase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/0xdef"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "number": "10",
                "hash": "0xdef",
                "onInitialize": { "events": [
                    { "method": { "pallet": "paraInclusion", "method": "CandidateIncluded" }, "data": [] }
                ]},
                "extrinsics": [
                    { "events": [
                        { "method": { "pallet": "balances", "method": "Transfer" },
                          "data": ["alice", "bob", "1000"] },
                        { "method": { "pallet": "system", "method": "ExtrinsicSuccess" }, "data": [] }
                    ]}
                ],
                "onFinalize": { "events": [] }
            })))
            .mount(&server)
            .await;

        let Ok(events) = client(&server).await.events_at("0xdef").await else {
            panic!("events should decode");
        };
        assert_eq!(events.len(), 3);
        let transfers: Vec<_> = events.iter().filter(|e| e.is_balance_transfer()).collect();
        assert_eq!(transfers.len(), 1);
    }

    #[tokio::test]
    async fn storage_values_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pallets/balances/storage/totalIssuance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pallet": "balances", "storageItem": "totalIssuance", "value": "14000000000000000000"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pallets/paras/storage/paraLifecycles"))
            .and(query_param("keys[]", "2000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "Parachain" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pallets/paras/storage/heads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
            .mount(&server)
            .await;

        let client = client(&server).await;
        assert_eq!(client.total_issuance().await, Ok(14_000_000_000_000_000_000));
        assert_eq!(
            client.para_lifecycle(2000).await,
            Ok(Some("Parachain".to_string()))
        );
        assert_eq!(client.para_head(2000).await, Ok(None));
    }

    #[tokio::test]
    async fn error_status_is_an_rpc_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("node unavailable"))
            .mount(&server)
            .await;

        let result = client(&server).await.validator_count().await;
        assert_eq!(
            result,
            Err(RpcError::Rpc {
                status: 500,
                message: "node unavailable".to_string()
            })
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let Ok(client) = SidecarClient::new("http://127.0.0.1:9", Duration::from_millis(500))
        else {
            panic!("client should build");
        };
        let Err(err) = client.connect().await else {
            panic!("connect should fail");
        };
        assert!(err.is_transport());
    }

    #[test]
    fn numbers_accept_strings_and_json_numbers() {
        assert_eq!(number::<u64>(&json!("42"), "n"), Ok(42));
        assert_eq!(number::<u64>(&json!(42), "n"), Ok(42));
        assert!(number::<u64>(&json!("x"), "n").is_err());
    }
}
