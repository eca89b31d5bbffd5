//! Data models for the power survey.
//!
//! This module contains the core data structures used throughout the
//! application for representing miners, their power claims, and the
//! final survey report.

use num::{BigInt, ToPrimitive};
use std::fmt;

/// Quality-adjusted storage power, in bytes. The chain reports it as an
/// arbitrary-precision integer and network-wide sums exceed u128 range.
pub type StoragePower = BigInt;

/// Implementation family of a miner's node software, inferred from the
/// self-reported agent string exchanged during the identify handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lineage {
    /// The venus implementation family (venus, droplet, market agents).
    Venus,
    /// The lotus implementation family (lotus, boost agents).
    Lotus,
    /// Agent string matched neither family. Never accumulated.
    Unknown,
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lineage::Venus => write!(f, "venus"),
            Lineage::Lotus => write!(f, "lotus"),
            Lineage::Unknown => write!(f, "unknown"),
        }
    }
}

/// A miner's power claim at the survey snapshot.
#[derive(Debug, Clone)]
pub struct MinerPower {
    /// Whether the miner meets the network's minimum power threshold.
    /// Miners below it take no part in the survey.
    pub has_min_power: bool,
    /// The miner's quality-adjusted power.
    pub quality_adj_power: StoragePower,
}

/// A miner's on-chain network identity.
///
/// Both fields are optional on chain: a miner that never published a peer
/// id or addresses cannot be dialed and is skipped by the survey.
#[derive(Debug, Clone, Default)]
pub struct MinerInfo {
    /// The miner's libp2p peer id, as the chain's string encoding.
    pub peer_id: Option<String>,
    /// Raw multiaddr bytes as stored on chain. Parsed lazily per entry so
    /// one malformed address does not invalidate the rest.
    pub multiaddrs: Vec<Vec<u8>>,
}

/// Share of classified power held by the venus family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Proportion {
    /// No classified power at all; a share is undefined.
    NotApplicable,
    /// Venus share of classified power, in percent.
    Percent(f64),
}

impl Proportion {
    /// The percentage value, if defined.
    pub fn as_percent(&self) -> Option<f64> {
        match self {
            Proportion::NotApplicable => None,
            Proportion::Percent(value) => Some(*value),
        }
    }
}

impl fmt::Display for Proportion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proportion::NotApplicable => write!(f, "n/a (no classified power)"),
            Proportion::Percent(value) => write!(f, "{:.3}%", value),
        }
    }
}

/// The complete result of one survey run.
#[derive(Debug, Clone)]
pub struct SurveyReport {
    /// Number of miners registered on chain at the snapshot, including
    /// those below the minimum power threshold.
    pub total_miners: usize,
    /// Summed quality-adjusted power of classified venus miners.
    pub venus_power: StoragePower,
    /// Summed quality-adjusted power of classified lotus miners.
    pub lotus_power: StoragePower,
    /// Venus share of the classified power.
    pub venus_share: Proportion,
    /// Wall-clock duration of the run in seconds.
    pub duration_seconds: f64,
}

/// Binary size units used for human-scaled power output.
const SIZE_UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB"];

/// Format a storage power value in human-scaled binary units.
///
/// Matches the chain tooling convention: divide by 1024 until the value
/// fits the unit, print up to three fractional digits, trim trailing zeros.
pub fn format_power(power: &StoragePower) -> String {
    let mut value = power.to_f64().unwrap_or(f64::INFINITY);
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.3}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}
