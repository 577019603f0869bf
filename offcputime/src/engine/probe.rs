//! Off-CPU sampling procedure
//!
//! [`OffCpuProbe::on_switch`] runs once per scheduling transition. It stamps
//! the outgoing thread, settles the incoming thread's pending start, and adds
//! the blocked time to the count table under the incoming thread's name and
//! kernel stack. Nothing here blocks beyond a single shard lock, and no
//! per-event failure escapes: missed starts and short blocks are dropped,
//! failed captures fall back to the unknown stack.

use std::sync::atomic::{AtomicU64, Ordering};

use super::counts::CountTable;
use super::pending::PendingStarts;
use super::stacks::StackStore;
use crate::config::{InclusionFilter, SessionConfig};
use crate::domain::{CaptureError, CountKey, Micros, Pid, ThreadName, Tid};

/// The task leaving the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutgoingTask {
    pub tid: Tid,
    pub pid: Pid,
    pub kthread: bool,
}

/// The task entering the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingTask {
    pub tid: Tid,
    pub name: ThreadName,
}

/// One scheduling transition as seen by the probe
#[derive(Debug, Clone)]
pub struct Transition<'a> {
    pub timestamp_ns: u64,
    /// Unknown for the first transition observed on a CPU
    pub outgoing: Option<OutgoingTask>,
    pub incoming: IncomingTask,
    /// Kernel stack of the incoming task, innermost frame first
    pub stack: Result<&'a [u64], CaptureError>,
}

/// Relaxed counters for the end-of-session summary
#[derive(Debug, Default)]
pub struct ProbeStats {
    pub transitions: AtomicU64,
    pub filtered: AtomicU64,
    pub missed_starts: AtomicU64,
    pub short_blocks: AtomicU64,
    pub samples: AtomicU64,
}

/// Plain copy of [`ProbeStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeSnapshot {
    pub transitions: u64,
    pub filtered: u64,
    pub missed_starts: u64,
    pub short_blocks: u64,
    pub samples: u64,
}

impl ProbeStats {
    pub fn snapshot(&self) -> ProbeSnapshot {
        ProbeSnapshot {
            transitions: self.transitions.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            missed_starts: self.missed_starts.load(Ordering::Relaxed),
            short_blocks: self.short_blocks.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Shared tables plus the sampling procedure that feeds them
pub struct OffCpuProbe {
    filter: InclusionFilter,
    min_block_us: u64,
    pending: PendingStarts,
    stacks: StackStore,
    counts: CountTable,
    stats: ProbeStats,
}

impl OffCpuProbe {
    #[must_use]
    pub fn new(filter: InclusionFilter, min_block_us: u64, stack_storage_size: usize) -> Self {
        Self {
            filter,
            min_block_us,
            pending: PendingStarts::new(),
            stacks: StackStore::with_capacity(stack_storage_size),
            counts: CountTable::new(),
            stats: ProbeStats::default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.filter, config.min_block_us, config.stack_storage_size)
    }

    pub fn on_switch(&self, transition: &Transition<'_>) {
        bump(&self.stats.transitions);

        if let Some(out) = transition.outgoing {
            if self.filter.includes(out.pid, out.kthread) {
                self.pending.record(out.tid, transition.timestamp_ns);
            } else {
                bump(&self.stats.filtered);
            }
        }

        let Some(start) = self.pending.take(transition.incoming.tid) else {
            bump(&self.stats.missed_starts);
            return;
        };

        let delta = Micros::from_nanos(transition.timestamp_ns.saturating_sub(start));
        if delta.0 < self.min_block_us {
            bump(&self.stats.short_blocks);
            return;
        }

        let stack = self.stacks.capture(transition.stack);
        self.counts.add(CountKey { name: transition.incoming.name, stack }, delta);
        bump(&self.stats.samples);
    }

    pub fn filter(&self) -> InclusionFilter {
        self.filter
    }

    pub fn pending(&self) -> &PendingStarts {
        &self.pending
    }

    pub fn stacks(&self) -> &StackStore {
        &self.stacks
    }

    pub fn counts(&self) -> &CountTable {
        &self.counts
    }

    pub fn stats(&self) -> &ProbeStats {
        &self.stats
    }
}
