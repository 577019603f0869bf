//! # Kernel-Side Profiling
//!
//! Everything that talks to the kernel on behalf of the engine:
//! - `ebpf_setup`: load the kprobe object, lift the memlock limit
//! - `host`: [`TraceHost`] seam and the kprobe-backed [`KprobeHost`]
//! - `event_reader`: ring buffer thread turning `SwitchEvent`s into
//!   probe transitions

pub mod ebpf_setup;
pub mod event_reader;
pub mod host;

pub use ebpf_setup::{bump_memlock_rlimit, load_ebpf_program};
pub use event_reader::{decode, transition_from, EventReader};
pub use host::{KprobeHost, TraceHost, SCHED_HOOK};
