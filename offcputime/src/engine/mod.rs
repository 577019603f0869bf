//! Off-CPU attribution engine
//!
//! Leaf first:
//! - [`stacks`]: fixed-capacity, content-interned kernel stack store
//! - [`pending`]: per-thread switch-out timestamps
//! - [`counts`]: blocked microseconds per (thread name, stack)
//! - [`probe`]: the per-transition sampling procedure over those tables
//!
//! All three tables sit on `dashmap::DashMap`, so concurrent transitions
//! only contend when they touch the same shard.

pub mod counts;
pub mod pending;
pub mod probe;
pub mod stacks;

pub use counts::CountTable;
pub use pending::PendingStarts;
pub use probe::{IncomingTask, OffCpuProbe, OutgoingTask, ProbeSnapshot, ProbeStats, Transition};
pub use stacks::{StackStore, DEFAULT_STACK_STORAGE_SIZE};
