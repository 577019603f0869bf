//! Pending-start table: when did each thread leave the processor

use dashmap::DashMap;

use crate::domain::Tid;

/// Switch-out timestamps keyed by thread ID
///
/// An entry lives from the moment a thread is switched out until it is
/// switched back in. Threads that exit while off-CPU leave an orphaned entry
/// behind until the session ends.
#[derive(Default)]
pub struct PendingStarts {
    starts: DashMap<Tid, u64>,
}

impl PendingStarts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `tid` left the CPU at `timestamp_ns`
    ///
    /// Last write wins: a stale start left by a missed switch-in is replaced.
    pub fn record(&self, tid: Tid, timestamp_ns: u64) {
        self.starts.insert(tid, timestamp_ns);
    }

    /// Read and remove the start for `tid`
    ///
    /// `None` means the thread was filtered out or left the CPU before the
    /// probe attached; the caller drops the sample.
    pub fn take(&self, tid: Tid) -> Option<u64> {
        self.starts.remove(&tid).map(|(_, start)| start)
    }

    /// Outstanding starts (threads currently off-CPU or orphaned)
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}
