//! Survey orchestration.
//!
//! Lists every miner at the snapshot, fans out one worker task per miner
//! behind a bounded throttle, joins them all, and folds the accumulated
//! sums into the final report. Worker failures are terminal for that miner
//! only; nothing before the join barrier reads the accumulator.

pub mod accumulator;
pub mod classify;
pub mod proportion;

pub use accumulator::PowerAccumulator;
pub use classify::classify_agent;
pub use proportion::venus_share;

use crate::ledger::LedgerClient;
use crate::models::{format_power, Lineage, SurveyReport};
use crate::peer::PeerHost;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use libp2p::{Multiaddr, PeerId};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Tunables for one survey run.
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    /// Maximum worker pipelines in flight at once.
    pub concurrency: usize,
    /// Deadline applied to every network call a worker makes.
    pub call_timeout: Duration,
    /// Optional deadline for the whole run. On expiry, outstanding workers
    /// are aborted and the report is built from what finished.
    pub run_timeout: Option<Duration>,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            concurrency: 100,
            call_timeout: Duration::from_secs(30),
            run_timeout: None,
        }
    }
}

/// Drives a full survey run against a ledger client and a peer host.
pub struct Surveyor<L, H> {
    ledger: Arc<L>,
    host: Arc<H>,
    config: SurveyConfig,
}

impl<L, H> Surveyor<L, H>
where
    L: LedgerClient + 'static,
    H: PeerHost + 'static,
{
    pub fn new(ledger: Arc<L>, host: Arc<H>, config: SurveyConfig) -> Self {
        Self {
            ledger,
            host,
            config,
        }
    }

    /// Run the survey to completion and build the report.
    ///
    /// Fatal only if the miner listing itself fails; every per-miner
    /// failure is logged by the worker and excluded from the sums.
    pub async fn run(&self) -> Result<SurveyReport> {
        let started = Instant::now();

        let miners = self
            .ledger
            .list_miners()
            .await
            .context("listing miners on chain")?;
        let total_miners = miners.len();
        info!(total_miners, "listed miners at snapshot");

        let accumulator = Arc::new(PowerAccumulator::new());
        let throttle = Arc::new(Semaphore::new(self.config.concurrency));
        let progress = survey_progress_bar(total_miners);
        let call_timeout = self.config.call_timeout;
        let mut workers = JoinSet::new();

        let mut timed_out = false;
        {
            let fan_out = async {
                for miner in miners {
                    // Admission blocks here, before the spawn, so at most
                    // `concurrency` workers exist at any instant. The permit
                    // moves into the task and is released by drop on every
                    // exit path, including panic and abort.
                    let permit = throttle
                        .clone()
                        .acquire_owned()
                        .await
                        .context("survey throttle closed")?;

                    let ledger = Arc::clone(&self.ledger);
                    let host = Arc::clone(&self.host);
                    let accumulator = Arc::clone(&accumulator);
                    let progress = progress.clone();
                    workers.spawn(async move {
                        let _permit = permit;
                        survey_miner(ledger, host, accumulator, miner, call_timeout).await;
                        progress.inc(1);
                    });
                }

                // Join barrier: every worker (and its throttle release) is
                // observed before the accumulator is read.
                while let Some(joined) = workers.join_next().await {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            error!(%err, "survey worker panicked");
                        }
                    }
                }
                Ok::<(), anyhow::Error>(())
            };
            tokio::pin!(fan_out);

            match self.config.run_timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut fan_out).await {
                    Ok(result) => result?,
                    Err(_) => timed_out = true,
                },
                None => fan_out.await?,
            }
        }
        if timed_out {
            warn!("run deadline exceeded; aborting outstanding workers");
            workers.shutdown().await;
        }
        progress.finish_and_clear();

        let (venus_power, lotus_power) = accumulator.snapshot();
        let share = venus_share(&venus_power, &lotus_power);

        Ok(SurveyReport {
            total_miners,
            venus_power,
            lotus_power,
            venus_share: share,
            duration_seconds: started.elapsed().as_secs_f64(),
        })
    }
}

/// The per-miner pipeline.
///
/// Every step short-circuits by returning; no error ever propagates to the
/// orchestrator. Exactly one accumulator add happens for a classified,
/// above-threshold miner, zero otherwise.
async fn survey_miner<L: LedgerClient, H: PeerHost>(
    ledger: Arc<L>,
    host: Arc<H>,
    accumulator: Arc<PowerAccumulator>,
    miner: String,
    call_timeout: Duration,
) {
    let power = match bounded(call_timeout, ledger.miner_power(&miner)).await {
        Ok(power) => power,
        Err(err) => {
            error!(miner = %miner, %err, "fetching power claim");
            return;
        }
    };
    if !power.has_min_power {
        debug!(miner = %miner, "miner does not meet min power");
        return;
    }

    let info = match bounded(call_timeout, ledger.miner_info(&miner)).await {
        Ok(info) => info,
        Err(err) => {
            error!(miner = %miner, %err, "fetching miner info");
            return;
        }
    };

    let Some(peer_id) = info.peer_id.as_deref() else {
        debug!(miner = %miner, "miner has no peer id set on chain");
        return;
    };
    if info.multiaddrs.is_empty() {
        debug!(miner = %miner, "miner has no multiaddrs set on chain");
        return;
    }

    let peer: PeerId = match peer_id.parse() {
        Ok(peer) => peer,
        Err(err) => {
            warn!(miner = %miner, %err, "miner peer id does not parse");
            return;
        }
    };

    let mut addrs = Vec::with_capacity(info.multiaddrs.len());
    for raw in &info.multiaddrs {
        match Multiaddr::try_from(raw.clone()) {
            Ok(addr) => addrs.push(addr),
            Err(err) => warn!(miner = %miner, %err, "miner had invalid multiaddr in miner info"),
        }
    }
    if addrs.is_empty() {
        debug!(miner = %miner, "no valid multiaddr survived parsing");
        return;
    }

    let agent = match bounded(call_timeout, host.agent_version(peer, addrs)).await {
        Ok(agent) => agent,
        Err(err) => {
            warn!(miner = %miner, %err, "identify handshake failed");
            return;
        }
    };

    match classify_agent(&agent) {
        Lineage::Unknown => {
            debug!(miner = %miner, agent = %agent, "agent matches no known lineage");
        }
        lineage => {
            accumulator.add(lineage, &power.quality_adj_power);
            info!(
                miner = %miner,
                agent = %agent,
                lineage = %lineage,
                power = %format_power(&power.quality_adj_power),
                "classified miner"
            );
        }
    }
}

/// Apply the per-call deadline to one network operation. Expiry is
/// reported the same way as any other transport failure.
async fn bounded<T, E>(
    limit: Duration,
    operation: impl Future<Output = Result<T, E>>,
) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(anyhow::anyhow!("timed out after {:?}", limit)),
    }
}

fn survey_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} miners ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerError;
    use crate::models::{MinerInfo, MinerPower, Proportion, StoragePower};
    use crate::peer::PeerError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockLedger {
        miners: Vec<String>,
        power: HashMap<String, MinerPower>,
        info: HashMap<String, MinerInfo>,
    }

    #[async_trait]
    impl LedgerClient for MockLedger {
        async fn list_miners(&self) -> Result<Vec<String>, LedgerError> {
            Ok(self.miners.clone())
        }

        async fn miner_power(&self, miner: &str) -> Result<MinerPower, LedgerError> {
            self.power
                .get(miner)
                .cloned()
                .ok_or_else(|| LedgerError::Transport("power lookup failed".into()))
        }

        async fn miner_info(&self, miner: &str) -> Result<MinerInfo, LedgerError> {
            self.info
                .get(miner)
                .cloned()
                .ok_or_else(|| LedgerError::Transport("info lookup failed".into()))
        }
    }

    #[derive(Default)]
    struct MockHost {
        agents: HashMap<String, String>,
        delay: Duration,
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
    }

    #[async_trait]
    impl PeerHost for MockHost {
        async fn agent_version(
            &self,
            peer: PeerId,
            _addrs: Vec<Multiaddr>,
        ) -> Result<String, PeerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.agents
                .get(&peer.to_string())
                .cloned()
                .ok_or(PeerError::AgentUnavailable)
        }
    }

    fn claim(power: i64, has_min_power: bool) -> MinerPower {
        MinerPower {
            has_min_power,
            quality_adj_power: StoragePower::from(power),
        }
    }

    fn identity() -> (PeerId, MinerInfo) {
        let peer = PeerId::random();
        let addr: Multiaddr = "/ip4/203.0.113.7/tcp/24001".parse().unwrap();
        (
            peer,
            MinerInfo {
                peer_id: Some(peer.to_string()),
                multiaddrs: vec![addr.to_vec()],
            },
        )
    }

    fn quick_config(concurrency: usize) -> SurveyConfig {
        SurveyConfig {
            concurrency,
            call_timeout: Duration::from_secs(5),
            run_timeout: None,
        }
    }

    #[tokio::test]
    async fn test_survey_end_to_end_scenario() {
        let (venus_peer, venus_info) = identity();
        let (lotus_peer, lotus_info) = identity();

        let mut ledger = MockLedger::default();
        ledger.miners = vec!["f01".into(), "f02".into(), "f03".into()];
        ledger.power.insert("f01".into(), claim(100, true));
        ledger.power.insert("f02".into(), claim(50, true));
        ledger.power.insert("f03".into(), claim(200, false));
        ledger.info.insert("f01".into(), venus_info);
        ledger.info.insert("f02".into(), lotus_info);

        let mut host = MockHost::default();
        host.agents.insert(venus_peer.to_string(), "venus/1.4".into());
        host.agents.insert(lotus_peer.to_string(), "lotus-miner".into());

        let surveyor = Surveyor::new(Arc::new(ledger), Arc::new(host), quick_config(4));
        let report = surveyor.run().await.unwrap();

        assert_eq!(report.total_miners, 3);
        assert_eq!(report.venus_power, StoragePower::from(100));
        assert_eq!(report.lotus_power, StoragePower::from(50));
        assert_eq!(report.venus_share.to_string(), "66.667%");
    }

    #[tokio::test]
    async fn test_survey_throttle_bounds_in_flight_workers() {
        let mut ledger = MockLedger::default();
        let mut host = MockHost {
            delay: Duration::from_millis(20),
            ..MockHost::default()
        };

        for i in 0..12 {
            let miner = format!("f0{}", i);
            let (peer, info) = identity();
            ledger.miners.push(miner.clone());
            ledger.power.insert(miner.clone(), claim(10, true));
            ledger.info.insert(miner, info);
            host.agents.insert(peer.to_string(), "venus/1.4".into());
        }

        let host = Arc::new(host);
        let surveyor = Surveyor::new(Arc::new(ledger), Arc::clone(&host), quick_config(3));
        let report = surveyor.run().await.unwrap();

        assert_eq!(report.venus_power, StoragePower::from(120));
        assert!(host.high_water.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_survey_isolates_per_miner_failures() {
        let (venus_peer, venus_info) = identity();

        let mut ledger = MockLedger::default();
        ledger.miners = vec!["f01".into(), "f02".into()];
        // f02 has no power entry: its worker hits a transport error and is
        // skipped without failing the run.
        ledger.power.insert("f01".into(), claim(100, true));
        ledger.info.insert("f01".into(), venus_info);

        let mut host = MockHost::default();
        host.agents.insert(venus_peer.to_string(), "venus/1.4".into());

        let surveyor = Surveyor::new(Arc::new(ledger), Arc::new(host), quick_config(4));
        let report = surveyor.run().await.unwrap();

        assert_eq!(report.total_miners, 2);
        assert_eq!(report.venus_power, StoragePower::from(100));
        assert_eq!(report.lotus_power, StoragePower::from(0));
    }

    #[tokio::test]
    async fn test_survey_excludes_unknown_agents() {
        let (peer, info) = identity();

        let mut ledger = MockLedger::default();
        ledger.miners = vec!["f01".into()];
        ledger.power.insert("f01".into(), claim(100, true));
        ledger.info.insert("f01".into(), info);

        let mut host = MockHost::default();
        host.agents.insert(peer.to_string(), "forest/0.5".into());

        let surveyor = Surveyor::new(Arc::new(ledger), Arc::new(host), quick_config(4));
        let report = surveyor.run().await.unwrap();

        assert_eq!(report.total_miners, 1);
        assert_eq!(report.venus_power, StoragePower::from(0));
        assert_eq!(report.lotus_power, StoragePower::from(0));
        assert_eq!(report.venus_share, Proportion::NotApplicable);
    }

    #[tokio::test]
    async fn test_survey_skips_miners_without_network_identity() {
        let mut ledger = MockLedger::default();
        ledger.miners = vec!["f01".into()];
        ledger.power.insert("f01".into(), claim(100, true));
        ledger.info.insert("f01".into(), MinerInfo::default());

        let surveyor = Surveyor::new(
            Arc::new(ledger),
            Arc::new(MockHost::default()),
            quick_config(4),
        );
        let report = surveyor.run().await.unwrap();

        assert_eq!(report.venus_power, StoragePower::from(0));
        assert_eq!(report.lotus_power, StoragePower::from(0));
    }

    #[tokio::test]
    async fn test_survey_run_deadline_aborts_outstanding_workers() {
        let (peer, info) = identity();

        let mut ledger = MockLedger::default();
        ledger.miners = vec!["f01".into()];
        ledger.power.insert("f01".into(), claim(100, true));
        ledger.info.insert("f01".into(), info);

        let mut host = MockHost {
            delay: Duration::from_secs(30),
            ..MockHost::default()
        };
        host.agents.insert(peer.to_string(), "venus/1.4".into());

        let config = SurveyConfig {
            concurrency: 2,
            call_timeout: Duration::from_secs(60),
            run_timeout: Some(Duration::from_millis(50)),
        };
        let surveyor = Surveyor::new(Arc::new(ledger), Arc::new(host), config);

        let started = Instant::now();
        let report = surveyor.run().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.total_miners, 1);
        assert_eq!(report.venus_power, StoragePower::from(0));
    }
}
