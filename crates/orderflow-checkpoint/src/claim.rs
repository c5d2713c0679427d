//! Run claims.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A worker's lease on a run.
///
/// A claim older than its lease is stale and may be taken over by any worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub run_id: String,
    pub worker: String,
    pub claimed_at: DateTime<Utc>,
    pub lease_secs: u64,
}

impl Claim {
    pub fn new(run_id: impl Into<String>, worker: impl Into<String>, lease: Duration) -> Self {
        Self {
            run_id: run_id.into(),
            worker: worker.into(),
            claimed_at: Utc::now(),
            lease_secs: lease.as_secs().max(1),
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let lease = chrono::Duration::seconds(self.lease_secs.min(i64::MAX as u64) as i64);
        self.claimed_at + lease < now
    }

    pub fn is_held_by(&self, worker: &str) -> bool {
        self.worker == worker
    }

    /// Extend the lease from now.
    pub fn refresh(&mut self) {
        self.claimed_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_claim_is_not_stale() {
        let claim = Claim::new("order-001", "worker-a", Duration::from_secs(60));
        assert!(!claim.is_stale(Utc::now()));
        assert!(claim.is_held_by("worker-a"));
        assert!(!claim.is_held_by("worker-b"));
    }

    #[test]
    fn test_expired_claim_is_stale() {
        let mut claim = Claim::new("order-001", "worker-a", Duration::from_secs(60));
        claim.claimed_at = Utc::now() - chrono::Duration::seconds(61);
        assert!(claim.is_stale(Utc::now()));

        claim.refresh();
        assert!(!claim.is_stale(Utc::now()));
    }
}
