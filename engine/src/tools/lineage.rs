//! Branch lineage tracking
//!
//! One [`BranchTracker`] is owned by each run and passed by `&mut` into every
//! dispatch. `start` is fixed by the first recorded identifier; `latest` always
//! holds the most recent one.

use sdk::types::Lineage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchTracker {
    start: Option<String>,
    latest: Option<String>,
}

impl BranchTracker {
    /// Create a tracker, optionally seeded with a known branch
    pub fn new(seed: Option<&str>) -> Self {
        let mut tracker = Self::default();
        if let Some(seed) = seed {
            tracker.record(seed);
        }
        tracker
    }

    /// Record an observed branch identifier; blank identifiers are ignored
    pub fn record(&mut self, branch_id: &str) {
        let branch_id = branch_id.trim();
        if branch_id.is_empty() {
            return;
        }
        if self.start.is_none() {
            self.start = Some(branch_id.to_string());
        }
        self.latest = Some(branch_id.to_string());
    }

    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }

    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    /// Snapshot of the observed range
    pub fn range(&self) -> Lineage {
        Lineage {
            start_branch_id: self.start.clone(),
            latest_branch_id: self.latest.clone(),
        }
    }
}
