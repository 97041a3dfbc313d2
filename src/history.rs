//! history.rs: bounded in-memory log of finished scan cycles.

use std::sync::Mutex;

use crate::scheduler::CycleReport;

const MAX_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct CycleHistory {
    inner: Mutex<Vec<CycleReport>>,
    cap: usize,
}

impl CycleHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, MAX_CAPACITY);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    /// Append a report, evicting the oldest beyond capacity.
    pub fn push(&self, report: CycleReport) {
        // A poisoned lock only means a reader panicked mid-clone; the Vec is intact.
        let mut v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.push(report);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<CycleReport> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn last(&self) -> Option<CycleReport> {
        self.snapshot_last_n(1).pop()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
