//! JSON-RPC ledger client.
//!
//! Speaks the full-node JSON-RPC 2.0 API over HTTP(S). Websocket-style
//! endpoint URLs are accepted and rewritten to their HTTP form; every
//! method used here is plain request/response.

use crate::ledger::{LedgerClient, LedgerError};
use crate::models::{MinerInfo, MinerPower, StoragePower};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger client over JSON-RPC.
pub struct RpcLedgerClient {
    http: reqwest::Client,
    endpoint: String,
    /// The snapshot reference sent with every query. The empty tipset key
    /// asks the node to evaluate against its current head, and using the
    /// same reference for the whole run keeps all queries on one logical
    /// snapshot.
    snapshot: Value,
    next_id: AtomicU64,
}

impl RpcLedgerClient {
    /// Build a client for the given node endpoint.
    ///
    /// `timeout` bounds every request, including the initial miner listing
    /// that happens before fan-out.
    pub fn new(
        endpoint: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let endpoint = normalize_endpoint(endpoint);

        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|err| LedgerError::Transport(format!("invalid auth token: {}", err)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| LedgerError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            snapshot: json!([]),
            next_id: AtomicU64::new(1),
        })
    }

    /// Perform one JSON-RPC call and decode its result.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, LedgerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!(%method, "ledger rpc call");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LedgerError::Transport(format!("request to {} timed out", self.endpoint))
                } else if err.is_connect() {
                    LedgerError::Transport(format!("cannot connect to node at {}", self.endpoint))
                } else {
                    LedgerError::Transport(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Transport(format!(
                "node answered http {}: {}",
                status, body
            )));
        }

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|err| LedgerError::Decode(err.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        envelope
            .result
            .ok_or_else(|| LedgerError::Decode("response carried neither result nor error".into()))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn list_miners(&self) -> Result<Vec<String>, LedgerError> {
        self.call("Filecoin.StateListMiners", json!([self.snapshot.clone()]))
            .await
    }

    async fn miner_power(&self, miner: &str) -> Result<MinerPower, LedgerError> {
        let wire: MinerPowerResult = self
            .call(
                "Filecoin.StateMinerPower",
                json!([miner, self.snapshot.clone()]),
            )
            .await?;
        power_from_wire(wire)
    }

    async fn miner_info(&self, miner: &str) -> Result<MinerInfo, LedgerError> {
        let wire: MinerInfoResult = self
            .call(
                "Filecoin.StateMinerInfo",
                json!([miner, self.snapshot.clone()]),
            )
            .await?;
        Ok(info_from_wire(miner, wire))
    }
}

/// Rewrite websocket endpoint schemes to their HTTP equivalents.
fn normalize_endpoint(endpoint: &str) -> String {
    if let Some(rest) = endpoint.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = endpoint.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        endpoint.to_string()
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `StateMinerPower` result, as the node encodes it.
#[derive(Debug, Deserialize)]
struct MinerPowerResult {
    #[serde(rename = "MinerPower")]
    miner_power: PowerClaim,
    #[serde(rename = "HasMinPower")]
    has_min_power: bool,
}

#[derive(Debug, Deserialize)]
struct PowerClaim {
    /// Big integers cross the wire as decimal strings.
    #[serde(rename = "QualityAdjPower")]
    quality_adj_power: String,
}

/// `StateMinerInfo` result, reduced to the fields the survey reads.
#[derive(Debug, Deserialize)]
struct MinerInfoResult {
    #[serde(rename = "PeerId")]
    peer_id: Option<String>,
    /// Multiaddr bytes, base64-encoded per entry. May be null on chain.
    #[serde(rename = "Multiaddrs")]
    multiaddrs: Option<Vec<String>>,
}

fn power_from_wire(wire: MinerPowerResult) -> Result<MinerPower, LedgerError> {
    let quality_adj_power = wire
        .miner_power
        .quality_adj_power
        .parse::<StoragePower>()
        .map_err(|err| {
            LedgerError::Decode(format!(
                "quality-adjusted power {:?} is not an integer: {}",
                wire.miner_power.quality_adj_power, err
            ))
        })?;

    Ok(MinerPower {
        has_min_power: wire.has_min_power,
        quality_adj_power,
    })
}

/// Decode the wire form of a miner's network identity.
///
/// Entries that are not valid base64 are dropped one by one; the miner
/// keeps whatever valid addresses remain.
fn info_from_wire(miner: &str, wire: MinerInfoResult) -> MinerInfo {
    let mut multiaddrs = Vec::new();
    for encoded in wire.multiaddrs.unwrap_or_default() {
        match BASE64.decode(&encoded) {
            Ok(bytes) => multiaddrs.push(bytes),
            Err(err) => warn!(%miner, %err, "dropping undecodable multiaddr entry"),
        }
    }

    MinerInfo {
        peer_id: wire.peer_id,
        multiaddrs,
    }
}
