//! # eBPF Program Loading
//!
//! - [`load_ebpf_program()`] - Load the kprobe object embedded at build time
//! - [`bump_memlock_rlimit()`] - Lift `RLIMIT_MEMLOCK` for kernels that still
//!   charge BPF maps against it (before 5.11)

#![allow(unsafe_code)] // setrlimit() requires unsafe

use aya::{include_bytes_aligned, Ebpf};
use log::{debug, warn};

use crate::domain::ProfilerError;

/// Load the eBPF program binary
///
/// Always uses the release build: debug builds pull in formatting code that
/// the BPF target cannot link.
///
/// # Errors
/// Returns an error if the kernel rejects the object or its maps
pub fn load_ebpf_program() -> Result<Ebpf, ProfilerError> {
    let bpf = Ebpf::load(include_bytes_aligned!(
        "../../../target/bpfel-unknown-none/release/offcputime"
    ))?;
    Ok(bpf)
}

/// The 16MB event ring buffer does not fit the default 8MB memlock limit
pub fn bump_memlock_rlimit() {
    let rlim = libc::rlimit { rlim_cur: libc::RLIM_INFINITY, rlim_max: libc::RLIM_INFINITY };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret == 0 {
        debug!("Raised RLIMIT_MEMLOCK to infinity");
    } else {
        warn!("Failed to increase RLIMIT_MEMLOCK, map creation may fail on older kernels");
    }
}
