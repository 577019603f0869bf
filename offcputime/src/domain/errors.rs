//! Structured error types for offcputime
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only configuration and attachment errors ever reach the user; per-event
//! failures are absorbed where they happen.

use thiserror::Error;

/// Invalid session configuration, detected before anything is attached
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("use either -p or -u")]
    ConflictingFilters,

    #[error("minimum block time must be at least 1 us")]
    ZeroMinBlock,

    #[error("stack storage size must be at least 1")]
    ZeroStackStorage,
}

#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("eBPF object has no {0}")]
    MissingFromObject(&'static str),

    #[error("0 functions traced for {hook}")]
    NoHookPoints { hook: String },

    #[error("Failed to attach {probe} to {function}: {error}")]
    ProbeAttachFailed { probe: String, function: String, error: String },

    #[error("Failed to read /proc/kallsyms: {0}")]
    KallsymsUnavailable(String),

    #[error(transparent)]
    Aya(#[from] aya::EbpfError),

    #[error(transparent)]
    Map(#[from] aya::maps::MapError),

    #[error(transparent)]
    Program(#[from] aya::programs::ProgramError),
}

/// Why a kernel stack could not be captured for a transition
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    #[error("stack walk failed: {0}")]
    Walk(i64),

    #[error("stack walk returned no frames")]
    Empty,
}
