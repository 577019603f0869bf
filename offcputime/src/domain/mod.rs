//! Domain model for offcputime
//!
//! Core domain types and errors:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{CountKey, Micros, Pid, StackId, ThreadName, Tid};

pub use errors::{CaptureError, ConfigError, ProfilerError};
