//! Ledger client port.
//!
//! The survey engine talks to the chain through this trait so the
//! orchestrator can be exercised against in-memory fakes. The production
//! implementation is the JSON-RPC adapter in [`rpc`].

pub mod rpc;

pub use rpc::RpcLedgerClient;

use crate::models::{MinerInfo, MinerPower};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a ledger client.
///
/// All variants are terminal for the requesting worker only; the survey as
/// a whole aborts solely when listing miners fails before fan-out.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The node could not be reached or the request failed in transit.
    #[error("ledger transport: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("ledger rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node's answer could not be decoded into the expected shape.
    #[error("ledger decode: {0}")]
    Decode(String),
}

/// Read-only chain state queries used by the survey.
///
/// Implementations answer every query against one fixed snapshot reference
/// chosen at construction, so all miners are surveyed against the same
/// chain state.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// List every miner actor registered at the snapshot.
    async fn list_miners(&self) -> Result<Vec<String>, LedgerError>;

    /// Fetch a miner's power claim.
    async fn miner_power(&self, miner: &str) -> Result<MinerPower, LedgerError>;

    /// Fetch a miner's on-chain network identity.
    async fn miner_info(&self, miner: &str) -> Result<MinerInfo, LedgerError>;
}
