//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep thread IDs, process IDs and stack fingerprints
//! from being mixed up, and make function signatures more expressive.

use offcputime_common::TASK_COMM_LEN;
use std::fmt;

/// Thread ID
///
/// The kernel's per-task `pid`. Unique per schedulable entity at a point in
/// time; reused after the thread exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(pub u32);

/// Process ID
///
/// The kernel's `tgid`: shared by all threads of one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

/// Interned kernel stack fingerprint
///
/// Issued by the stack store. Negative values mean no stack is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId(pub i64);

impl StackId {
    /// Sentinel for a capture that failed or could not be stored
    pub const UNKNOWN: StackId = StackId(-1);

    /// Returns true if this stack ID refers to a stored stack
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Slot index in the stack store, or `None` for the sentinel
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_index(self) -> Option<usize> {
        self.is_valid().then_some(self.0 as usize)
    }
}

/// Bounded thread name (the kernel `comm`)
///
/// Stored as the raw NUL-padded buffer so it can be copied and hashed on the
/// probe path without allocating. Many threads may share one name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadName([u8; TASK_COMM_LEN]);

impl ThreadName {
    /// Wrap a raw `comm` buffer
    #[must_use]
    pub fn from_comm(comm: [u8; TASK_COMM_LEN]) -> Self {
        Self(comm)
    }

    /// Build a name from a string, truncating to `TASK_COMM_LEN - 1` bytes
    ///
    /// The kernel always keeps a trailing NUL in `comm`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut comm = [0u8; TASK_COMM_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(TASK_COMM_LEN - 1);
        comm[..len].copy_from_slice(&bytes[..len]);
        Self(comm)
    }

    /// Name bytes up to the first NUL
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(TASK_COMM_LEN);
        &self.0[..end]
    }
}

impl fmt::Display for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadName({self})")
    }
}

/// Aggregation key: blocked time is summed per (thread name, stack)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountKey {
    pub name: ThreadName,
    pub stack: StackId,
}

/// Duration in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Micros(pub u64);

impl Micros {
    /// Convert a nanosecond delta, truncating like the kernel side does
    #[must_use]
    pub fn from_nanos(ns: u64) -> Self {
        Self(ns / 1_000)
    }
}

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_id_validity() {
        assert!(StackId(5).is_valid());
        assert!(!StackId::UNKNOWN.is_valid());
        assert_eq!(StackId(42).as_index(), Some(42));
        assert_eq!(StackId::UNKNOWN.as_index(), None);
    }

    #[test]
    fn test_thread_name_trims_nul_padding() {
        let mut comm = [0u8; TASK_COMM_LEN];
        comm[..6].copy_from_slice(b"worker");
        let name = ThreadName::from_comm(comm);
        assert_eq!(name.to_string(), "worker");
        assert_eq!(name, ThreadName::new("worker"));
    }

    #[test]
    fn test_thread_name_truncates_like_comm() {
        let name = ThreadName::new("a-very-long-thread-name");
        assert_eq!(name.as_bytes().len(), TASK_COMM_LEN - 1);
        assert_eq!(name.to_string(), "a-very-long-thr");
    }

    #[test]
    fn test_thread_name_invalid_utf8_is_lossy() {
        let mut comm = [0u8; TASK_COMM_LEN];
        comm[0] = b'x';
        comm[1] = 0xff;
        assert_eq!(ThreadName::from_comm(comm).to_string(), "x\u{fffd}");
    }

    #[test]
    fn test_micros_truncates() {
        assert_eq!(Micros::from_nanos(1_999), Micros(1));
        assert_eq!(Micros::from_nanos(999), Micros(0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Pid(185).to_string(), "PID:185");
        assert_eq!(Micros(1500).to_string(), "1500");
    }
}
