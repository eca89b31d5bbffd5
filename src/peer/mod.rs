//! Peer host port.
//!
//! The survey engine obtains a miner's self-reported agent string through
//! this trait. The production implementation is the short-lived libp2p
//! identify probe in [`identify`].

pub mod identify;

pub use identify::IdentifyHost;

use async_trait::async_trait;
use libp2p::{Multiaddr, PeerId};
use thiserror::Error;

/// Errors surfaced by a peer host. Terminal for the requesting worker only.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The peer could not be dialed on any advertised address.
    #[error("connecting to peer: {0}")]
    Connect(String),

    /// The connection succeeded but closed before the peer identified
    /// itself, so no agent string is available. An absent value, not a
    /// protocol failure.
    #[error("peer closed the connection without identifying itself")]
    AgentUnavailable,

    /// The local host could not be constructed.
    #[error("building p2p host: {0}")]
    Host(String),
}

/// Outbound handshake queries against remote peers.
#[async_trait]
pub trait PeerHost: Send + Sync {
    /// Dial `peer` on `addrs`, perform the identify handshake, and return
    /// the remote agent-version string. The connection is torn down before
    /// returning, on every path.
    async fn agent_version(
        &self,
        peer: PeerId,
        addrs: Vec<Multiaddr>,
    ) -> Result<String, PeerError>;
}
