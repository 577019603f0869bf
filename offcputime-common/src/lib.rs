//! # Shared Data Structures (eBPF ↔ Userspace)
//!
//! Types exchanged between the `finish_task_switch` kprobe and the userspace
//! event reader. All types use `#[repr(C)]` so both sides agree on layout.
//!
//! ## Key Types
//!
//! - [`SwitchEvent`] - One scheduling transition, written to the `EVENTS` ring buffer
//! - [`TaskSnapshot`] - Identity of a task as seen on one side of a transition
//!
//! The inclusion filter is shared too ([`task_included`]), so the kprobe can
//! skip transitions userspace would discard anyway.

#![no_std]

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of kernel stack frames captured per transition
///
/// Kernel eBPF programs are limited to 127 frames (`PERF_MAX_STACK_DEPTH`).
pub const MAX_STACK_DEPTH: usize = 127;

/// Length of the kernel's `comm` buffer (`TASK_COMM_LEN`)
pub const TASK_COMM_LEN: usize = 16;

/// Size in bytes of the buffer handed to `bpf_get_stack`
#[allow(clippy::cast_possible_truncation)]
pub const STACK_BUF_BYTES: u32 = (MAX_STACK_DEPTH * core::mem::size_of::<u64>()) as u32;

/// [`TaskSnapshot::flags`]: the snapshot describes a real task
///
/// Cleared for the first transition observed on a CPU, where the outgoing
/// task is not known yet.
pub const TASK_VALID: u32 = 1 << 0;

/// [`TaskSnapshot::flags`]: the task has no user address space (kernel thread)
pub const TASK_KTHREAD: u32 = 1 << 1;

/// `CONFIG` key: inclusion mode, one of the `FILTER_*` values
pub const CONFIG_FILTER_MODE: u32 = 0;

/// `CONFIG` key: thread-group id matched by [`FILTER_PROCESS`]
pub const CONFIG_TARGET_TGID: u32 = 1;

/// Every task is included (also the mode when `CONFIG` is unset)
pub const FILTER_ALL: u64 = 0;

/// Only tasks of one process are included
pub const FILTER_PROCESS: u64 = 1;

/// Kernel threads are excluded
pub const FILTER_USER_THREADS: u64 = 2;

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Identity of a task at a scheduling transition
///
/// The kernel side keeps one of these per CPU for the task currently running,
/// so the next transition on that CPU can report it as the outgoing task.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Thread ID (kernel `pid`)
    pub tid: u32,

    /// Process ID (kernel `tgid`)
    pub tgid: u32,

    /// Bit set of `TASK_VALID` and `TASK_KTHREAD`
    pub flags: u32,

    /// Padding for 8-byte alignment
    #[allow(clippy::pub_underscore_fields)]
    pub _padding: u32,
}

impl TaskSnapshot {
    /// Returns true if this snapshot describes a task
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.flags & TASK_VALID != 0
    }

    /// Returns true if the task is a kernel thread
    #[must_use]
    pub const fn is_kthread(&self) -> bool {
        self.flags & TASK_KTHREAD != 0
    }
}

/// Whether `task` passes the inclusion filter selected by `mode`
///
/// Invalid snapshots never pass. [`TASK_KTHREAD`] is only set by the kprobe
/// in [`FILTER_USER_THREADS`] mode, which is the only mode that reads it.
#[must_use]
pub const fn task_included(mode: u64, target_tgid: u32, task: &TaskSnapshot) -> bool {
    if !task.is_valid() {
        return false;
    }
    match mode {
        FILTER_PROCESS => task.tgid == target_tgid,
        FILTER_USER_THREADS => !task.is_kthread(),
        _ => true,
    }
}

/// One scheduling transition, sent from eBPF to userspace via ring buffer
///
/// Emitted from `finish_task_switch`, where `current` is already the incoming
/// task. The kernel stack captured here is the stack the incoming task was
/// blocked on.
///
/// **Size**: 1080 bytes, dominated by the stack buffer
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SwitchEvent {
    /// Timestamp in nanoseconds (from `bpf_ktime_get_ns()`)
    pub timestamp_ns: u64,

    /// Task that was switched out (check [`TaskSnapshot::is_valid`])
    pub prev: TaskSnapshot,

    /// Task that was switched in
    pub next: TaskSnapshot,

    /// Name of the task that was switched in (NUL-padded)
    pub next_comm: [u8; TASK_COMM_LEN],

    /// Return value of `bpf_get_stack`
    ///
    /// - Positive: number of valid bytes in `kernel_stack`
    /// - Zero or negative: the stack walk failed (negative errno)
    pub kernel_stack_len: i64,

    /// Kernel return addresses, innermost frame first
    pub kernel_stack: [u64; MAX_STACK_DEPTH],
}

impl SwitchEvent {
    /// Number of valid frames in `kernel_stack`, or `None` if the walk failed
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn stack_depth(&self) -> Option<usize> {
        if self.kernel_stack_len <= 0 {
            return None;
        }
        let frames = self.kernel_stack_len as usize / core::mem::size_of::<u64>();
        Some(if frames > MAX_STACK_DEPTH { MAX_STACK_DEPTH } else { frames })
    }
}

#[cfg(feature = "user")]
use aya::Pod;

// Pod marks the types as safe to reinterpret from ring buffer bytes
#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for TaskSnapshot {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for SwitchEvent {}
