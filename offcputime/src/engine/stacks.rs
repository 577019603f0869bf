//! Fixed-capacity kernel stack store
//!
//! Interns captured stacks by content: the same frame sequence always maps to
//! the same [`StackId`]. Ids are slot indexes handed out by an atomic counter,
//! and each slot is written once, so resolving an id never takes a lock.
//!
//! When every slot is used, new unique stacks are not stored and the capture
//! degrades to [`StackId::UNKNOWN`]. Stacks that were already interned keep
//! their ids. The store is never cleared during a session, so ids stay valid
//! across drains.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{CaptureError, StackId};

/// Default number of unique stacks kept per session
pub const DEFAULT_STACK_STORAGE_SIZE: usize = 1024;

pub struct StackStore {
    /// Content → id
    index: DashMap<Box<[u64]>, StackId>,
    /// Id → frames, innermost first
    slots: Box<[OnceLock<Box<[u64]>>]>,
    next_slot: AtomicUsize,
    /// Unique stacks turned away because every slot was taken
    dropped: AtomicU64,
    /// Captures whose stack walk failed
    failed: AtomicU64,
}

impl StackStore {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: DashMap::new(),
            slots: (0..capacity).map(|_| OnceLock::new()).collect(),
            next_slot: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Turn a stack walk result into a fingerprint
    ///
    /// Never fails: a failed walk or a full store yields [`StackId::UNKNOWN`]
    /// and bumps the matching counter.
    pub fn capture(&self, walk: Result<&[u64], CaptureError>) -> StackId {
        let Ok(frames) = walk else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            return StackId::UNKNOWN;
        };

        self.intern(frames).unwrap_or_else(|| {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            StackId::UNKNOWN
        })
    }

    /// Id for `frames`, storing them if there is room
    pub fn intern(&self, frames: &[u64]) -> Option<StackId> {
        if let Some(id) = self.index.get(frames) {
            return Some(*id);
        }

        // The entry holds the shard lock, so two racing captures of the same
        // new stack cannot both take a slot
        match self.index.entry(frames.into()) {
            Entry::Occupied(entry) => Some(*entry.get()),
            Entry::Vacant(entry) => {
                let slot = self
                    .next_slot
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < self.slots.len()).then_some(n + 1)
                    })
                    .ok()?;
                // The slot index is ours alone, so the cell is still empty
                let _ = self.slots[slot].set(frames.into());
                #[allow(clippy::cast_possible_wrap)]
                let id = StackId(slot as i64);
                entry.insert(id);
                Some(id)
            }
        }
    }

    /// Frames for `id`, innermost first
    pub fn frames(&self, id: StackId) -> Option<&[u64]> {
        self.slots.get(id.as_index()?)?.get().map(|frames| &**frames)
    }

    /// Unique stacks stored so far
    pub fn len(&self) -> usize {
        self.next_slot.load(Ordering::Acquire).min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Captures that lost their stack because the store was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Captures that lost their stack because the walk failed
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl Default for StackStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STACK_STORAGE_SIZE)
    }
}
