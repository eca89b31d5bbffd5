//! Identify-based peer probing.
//!
//! Each probe builds a fresh, listen-less libp2p host, dials the miner's
//! advertised addresses, waits for the remote's identify payload, and
//! reads the agent-version string out of it. Dropping the swarm on return
//! tears the connection down on every path.

use crate::peer::{PeerError, PeerHost};
use async_trait::async_trait;
use futures::StreamExt;
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::swarm::SwarmEvent;
use libp2p::{identify, noise, tcp, yamux, Multiaddr, PeerId, Swarm, SwarmBuilder};
use std::time::Duration;
use tracing::{debug, trace};

/// Protocol-version string advertised in our own identify payload. The
/// surveyed network's hosts all advertise this family string.
const PROTOCOL_VERSION: &str = "ipfs/0.1.0";

/// Agent string we advertise to the peers we probe.
const AGENT_VERSION: &str = concat!("power-stats/", env!("CARGO_PKG_VERSION"));

/// Peer host backed by ephemeral libp2p swarms.
///
/// Stateless: each probe is its own host with a fresh identity, so probes
/// never share connections and a wedged remote cannot poison later ones.
#[derive(Debug, Default)]
pub struct IdentifyHost;

impl IdentifyHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PeerHost for IdentifyHost {
    async fn agent_version(
        &self,
        peer: PeerId,
        addrs: Vec<Multiaddr>,
    ) -> Result<String, PeerError> {
        let mut swarm = build_swarm().map_err(|err| PeerError::Host(err.to_string()))?;

        debug!(%peer, addrs = addrs.len(), "dialing peer");
        swarm
            .dial(DialOpts::peer_id(peer).addresses(addrs).build())
            .map_err(|err| PeerError::Connect(err.to_string()))?;

        loop {
            match swarm.select_next_some().await {
                SwarmEvent::Behaviour(identify::Event::Received { info, .. }) => {
                    return Ok(info.agent_version);
                }
                SwarmEvent::OutgoingConnectionError { error, .. } => {
                    return Err(PeerError::Connect(error.to_string()));
                }
                SwarmEvent::ConnectionClosed { .. } => {
                    return Err(PeerError::AgentUnavailable);
                }
                event => trace!(?event, "swarm event"),
            }
        }
    }
}

/// Build a listen-less host that only speaks identify.
fn build_swarm() -> anyhow::Result<Swarm<identify::Behaviour>> {
    let swarm = SwarmBuilder::with_new_identity()
        .with_tokio()
        .with_tcp(
            tcp::Config::default(),
            noise::Config::new,
            yamux::Config::default,
        )?
        .with_dns()?
        .with_behaviour(|key| {
            identify::Behaviour::new(
                identify::Config::new(PROTOCOL_VERSION.to_string(), key.public())
                    .with_agent_version(AGENT_VERSION.to_string()),
            )
        })?
        .with_swarm_config(|config| {
            // A probe only needs the connection long enough to identify.
            config.with_idle_connection_timeout(Duration::from_secs(60))
        })
        .build();

    Ok(swarm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_swarm_succeeds() {
        // Host construction must not depend on any network state.
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        assert!(build_swarm().is_ok());
    }

    #[tokio::test]
    async fn test_probe_unreachable_peer_is_a_connect_error() {
        let host = IdentifyHost::new();
        let peer = PeerId::random();
        let addr: Multiaddr = "/ip4/127.0.0.1/tcp/1".parse().unwrap();

        let result = host.agent_version(peer, vec![addr]).await;
        assert!(matches!(result, Err(PeerError::Connect(_))));
    }

    #[test]
    fn test_advertised_agent_names_this_tool() {
        assert!(AGENT_VERSION.starts_with("power-stats/"));
    }
}
