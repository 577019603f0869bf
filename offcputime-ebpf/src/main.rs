//! # eBPF Kernel-Side Instrumentation
//!
//! A kprobe on `finish_task_switch` that reports scheduling transitions to
//! userspace. The attribution logic (pending starts, thresholds, stack
//! interning, aggregation) runs in the userspace probe. This program only
//! observes, and skips transitions where neither task passes the inclusion
//! filter.
//!
//! ## Programs
//!
//! - **Kprobe**: `oncpu` - attached to `finish_task_switch` and its
//!   compiler-cloned variants (`finish_task_switch.isra.0`, ...)
//!
//! ## Maps (Shared with Userspace)
//!
//! - `EVENTS` - Ring buffer (16MB) of [`SwitchEvent`]s
//! - `ON_CPU` - Per-CPU snapshot of the task currently running
//! - `DROPPED` - Per-CPU count of transitions lost to a full ring buffer
//! - `CONFIG` - Inclusion filter set by userspace before attaching
//!
//! ## Build
//!
//! ```bash
//! cargo xtask build-ebpf --release
//! ```

#![no_std]
#![no_main]
#![allow(unused_unsafe)]

use core::ffi::c_void;

use aya_ebpf::{
    bindings::BPF_F_USER_STACK,
    helpers::{bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_get_stack, bpf_ktime_get_ns},
    macros::{kprobe, map},
    maps::{HashMap, PerCpuArray, RingBuf},
    programs::ProbeContext,
    EbpfContext,
};
use offcputime_common::{
    task_included, SwitchEvent, TaskSnapshot, CONFIG_FILTER_MODE, CONFIG_TARGET_TGID,
    FILTER_ALL, FILTER_USER_THREADS, STACK_BUF_BYTES, TASK_KTHREAD, TASK_VALID,
};

// ============================================================================
// eBPF Maps
// ============================================================================

/// Ring buffer of scheduling transitions
///
/// - **Size**: 16MB (~15k events of 1080 bytes)
/// - **Usage**: Kernel reserves and submits, userspace reads with `ring_buf.next()`
/// - A full buffer drops the transition; userspace treats the gap as missed starts
#[map]
static EVENTS: RingBuf = RingBuf::with_byte_size(16 * 1024 * 1024, 0);

/// Task currently running on each CPU
///
/// `finish_task_switch` runs in the context of the incoming task, so the
/// outgoing task is whichever task the previous transition on this CPU
/// switched in.
#[map]
static ON_CPU: PerCpuArray<TaskSnapshot> = PerCpuArray::with_max_entries(1, 0);

/// Transitions that could not be reserved in `EVENTS`, summed by userspace
#[map]
static DROPPED: PerCpuArray<u64> = PerCpuArray::with_max_entries(1, 0);

/// Map: Config key → Config value
///
/// - **Key 0** (`CONFIG_FILTER_MODE`): `FILTER_ALL`, `FILTER_PROCESS` or `FILTER_USER_THREADS`
/// - **Key 1** (`CONFIG_TARGET_TGID`): process matched by `FILTER_PROCESS`
#[map]
static CONFIG: HashMap<u32, u64> = HashMap::with_max_entries(16, 0);

// ============================================================================
// eBPF Program Hooks
// ============================================================================

/// Hook: `finish_task_switch(struct task_struct *prev)`
#[kprobe]
pub fn oncpu(ctx: ProbeContext) -> u32 {
    match try_oncpu(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn try_oncpu(ctx: &ProbeContext) -> Result<(), i64> {
    let now = unsafe { bpf_ktime_get_ns() };
    let mode = unsafe { CONFIG.get(&CONFIG_FILTER_MODE).copied().unwrap_or(FILTER_ALL) };
    let target_tgid = unsafe { CONFIG.get(&CONFIG_TARGET_TGID).map_or(0, |v| *v as u32) };

    let pid_tgid = unsafe { bpf_get_current_pid_tgid() };
    let mut next = TaskSnapshot {
        tid: pid_tgid as u32,
        tgid: (pid_tgid >> 32) as u32,
        flags: TASK_VALID,
        _padding: 0,
    };
    // Only the user-threads filter needs the extra stack walk
    if mode == FILTER_USER_THREADS && is_kernel_thread(ctx) {
        next.flags |= TASK_KTHREAD;
    }

    // Swap the per-CPU snapshot: what was running becomes `prev`
    let slot = ON_CPU.get_ptr_mut(0).ok_or(1i64)?;
    let prev = unsafe { core::ptr::replace(slot, next) };

    // An excluded `next` never has a pending start, so there is nothing to
    // settle; an excluded `prev` gets no start
    let record_prev = task_included(mode, target_tgid, &prev);
    let settle_next = task_included(mode, target_tgid, &next);
    if !record_prev && !settle_next {
        return Ok(());
    }

    let Some(mut entry) = EVENTS.reserve::<SwitchEvent>(0) else {
        if let Some(dropped) = DROPPED.get_ptr_mut(0) {
            unsafe { *dropped += 1 };
        }
        return Err(1);
    };
    let event = entry.as_mut_ptr();

    unsafe {
        (*event).timestamp_ns = now;
        (*event).prev = prev;
        (*event).next = next;
        (*event).next_comm = bpf_get_current_comm().unwrap_or([0u8; 16]);
        // Kernel stack of the incoming task: the path it blocked on
        (*event).kernel_stack_len = if settle_next {
            bpf_get_stack(
                ctx.as_ptr(),
                (*event).kernel_stack.as_mut_ptr().cast::<c_void>(),
                STACK_BUF_BYTES,
                0,
            )
        } else {
            0
        };
    }

    entry.submit(0);
    Ok(())
}

/// Kernel threads have no user address space, so no user frames can be walked
fn is_kernel_thread(ctx: &ProbeContext) -> bool {
    let mut user_ip = [0u64; 1];
    let len = unsafe {
        bpf_get_stack(
            ctx.as_ptr(),
            user_ip.as_mut_ptr().cast::<c_void>(),
            core::mem::size_of::<u64>() as u32,
            BPF_F_USER_STACK as u64,
        )
    };
    len <= 0
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}

/// `bpf_get_stack` is a GPL-only helper
#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 4] = *b"GPL\0";
