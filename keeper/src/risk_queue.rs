//! Priority queue of evaluated snapshots (max-heap by risk score)

use crate::report::SnapshotReport;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Highest score first; equal scores in ascending snapshot id order
type RiskPriority = (u8, Reverse<String>);

fn priority(report: &SnapshotReport) -> RiskPriority {
    (report.risk_score(), Reverse(report.snapshot_id.clone()))
}

/// Latest evaluation per snapshot, ordered by risk
pub struct RiskQueue {
    queue: PriorityQueue<String, RiskPriority>,
    /// Map for O(1) lookups
    map: HashMap<String, SnapshotReport>,
}

impl RiskQueue {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            map: HashMap::new(),
        }
    }

    /// Push or replace the evaluation of a snapshot
    pub fn push(&mut self, report: SnapshotReport) {
        let id = report.snapshot_id.clone();
        self.queue.push(id.clone(), priority(&report));
        self.map.insert(id, report);
    }

    /// Pop the riskiest snapshot
    #[cfg(test)]
    pub fn pop(&mut self) -> Option<SnapshotReport> {
        let (id, _priority) = self.queue.pop()?;
        self.map.remove(&id)
    }

    pub fn peek(&self) -> Option<&SnapshotReport> {
        let (id, _priority) = self.queue.peek()?;
        self.map.get(id)
    }

    pub fn remove(&mut self, snapshot_id: &str) -> Option<SnapshotReport> {
        self.queue.remove(snapshot_id);
        self.map.remove(snapshot_id)
    }

    #[cfg(test)]
    pub fn get(&self, snapshot_id: &str) -> Option<&SnapshotReport> {
        self.map.get(snapshot_id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All entries, riskiest first
    pub fn ranked(&self) -> Vec<&SnapshotReport> {
        let mut entries: Vec<(&String, &RiskPriority)> = self.queue.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1));
        entries
            .into_iter()
            .filter_map(|(id, _)| self.map.get(id))
            .collect()
    }

    /// Entries scoring at or above `threshold`, riskiest first
    pub fn alerts(&self, threshold: u8) -> Vec<&SnapshotReport> {
        self.ranked()
            .into_iter()
            .filter(|report| report.risk_score() >= threshold)
            .collect()
    }

    /// Drop snapshots that are no longer present on disk
    pub fn retain_ids(&mut self, live: &[String]) {
        let stale: Vec<String> = self
            .map
            .keys()
            .filter(|id| !live.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            log::debug!("Dropping stale snapshot {}", id);
            self.remove(&id);
        }
    }
}

impl Default for RiskQueue {
    fn default() -> Self {
        Self::new()
    }
}
