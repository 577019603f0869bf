//! Drain, sort and render
//!
//! [`collect`] takes a snapshot of the count table, clearing it, and orders
//! the entries so the largest contributors come last. The renderers in
//! [`render`] turn that snapshot into one of the two wire formats.

pub mod render;

pub use render::{header, render_folded, render_multiline, stack_warning};

use crate::domain::{CountKey, Micros};
use crate::engine::OffCpuProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportEntry {
    pub key: CountKey,
    pub total: Micros,
}

/// One drained accumulation window
#[derive(Debug, Default)]
pub struct Report {
    /// Ascending by total, ties by key
    pub entries: Vec<ReportEntry>,
    /// Captures that ended up under the unknown stack
    pub missing_stacks: u64,
}

impl Report {
    #[must_use]
    pub fn from_counts(counts: Vec<(CountKey, Micros)>, missing_stacks: u64) -> Self {
        let mut entries: Vec<ReportEntry> =
            counts.into_iter().map(|(key, total)| ReportEntry { key, total }).collect();
        entries.sort_unstable_by(|a, b| a.total.cmp(&b.total).then_with(|| a.key.cmp(&b.key)));
        Self { entries, missing_stacks }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drain the probe's count table into a sorted report
///
/// The stack store is left untouched so ids stay resolvable.
pub fn collect(probe: &OffCpuProbe) -> Report {
    let stacks = probe.stacks();
    Report::from_counts(probe.counts().drain(), stacks.dropped() + stacks.failed())
}
