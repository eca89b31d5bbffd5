//! Agent-string classification.
//!
//! Maps the free-form agent string a node reports during the identify
//! handshake to an implementation lineage.

use crate::models::Lineage;

/// Substrings identifying the venus family. The droplet and market agents
/// are venus sub-projects and count toward it.
const VENUS_AGENT_TOKENS: &[&str] = &["venus", "droplet", "market"];

/// Substrings identifying the lotus family. Boost is the lotus markets
/// process and counts toward it.
const LOTUS_AGENT_TOKENS: &[&str] = &["lotus", "boost"];

/// Classify an agent string into an implementation lineage.
///
/// Pure and deterministic. Venus tokens are checked before lotus tokens;
/// an agent string matching both sets classifies as venus. That ordering
/// is deliberate policy, kept stable so repeated surveys agree.
pub fn classify_agent(agent: &str) -> Lineage {
    if VENUS_AGENT_TOKENS.iter().any(|token| agent.contains(token)) {
        Lineage::Venus
    } else if LOTUS_AGENT_TOKENS.iter().any(|token| agent.contains(token)) {
        Lineage::Lotus
    } else {
        Lineage::Unknown
    }
}
