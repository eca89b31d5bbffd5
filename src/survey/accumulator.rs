//! Thread-safe accumulation of per-lineage power sums.

use crate::models::{Lineage, StoragePower};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Running per-lineage power sums, shared by all survey workers.
///
/// Both sums only ever grow while workers run. Readers must wait for the
/// orchestrator's join barrier: [`snapshot`](Self::snapshot) is meaningful
/// only once every worker has terminated, and the orchestrator is the only
/// caller.
#[derive(Debug, Default)]
pub struct PowerAccumulator {
    sums: Mutex<LineageSums>,
}

#[derive(Debug, Default)]
struct LineageSums {
    venus: StoragePower,
    lotus: StoragePower,
}

impl PowerAccumulator {
    /// Create an accumulator with both sums at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically add `power` to the sum for `lineage`.
    ///
    /// Safe under arbitrary interleaving from concurrent workers; addition
    /// is commutative, so completion order cannot affect the final sums.
    /// `Unknown` carries no sum and the call is a no-op.
    pub fn add(&self, lineage: Lineage, power: &StoragePower) {
        let mut sums = self.sums.lock().unwrap_or_else(PoisonError::into_inner);
        match lineage {
            Lineage::Venus => sums.venus += power,
            Lineage::Lotus => sums.lotus += power,
            Lineage::Unknown => debug!("ignoring add for unknown lineage"),
        }
    }

    /// Read the final `(venus, lotus)` sums.
    ///
    /// Call only after all workers have been joined; the join barrier, not
    /// the lock, is what makes every `add` visible here.
    pub fn snapshot(&self) -> (StoragePower, StoragePower) {
        let sums = self.sums.lock().unwrap_or_else(PoisonError::into_inner);
        (sums.venus.clone(), sums.lotus.clone())
    }
}
