//! # offcputime - Off-CPU Time by Kernel Stack
//!
//! Measures how long threads stay blocked off-processor and attributes the
//! blocked time to the kernel stack they blocked on. No application changes:
//! the kernel's context-switch path is hooked with an eBPF kprobe.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  eBPF kprobe (Kernel)                           │
//! │  • finish_task_switch (+ .isra/.constprop clones)               │
//! │  • per-CPU "who is running" snapshot → outgoing task            │
//! │  • bpf_get_stack → incoming task's kernel stack                 │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ SwitchEvent ring buffer
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     offcputime (This Crate)                     │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │  Profiling   │──▶│    Engine    │──▶│    Report    │        │
//! │  │ (host+reader)│   │ (OffCpuProbe)│   │ (drain+sort) │        │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘        │
//! │                                               │                 │
//! │                                        ┌──────▼───────┐        │
//! │                                        │ Symbolization│        │
//! │                                        │ (kallsyms)   │        │
//! │                                        └──────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`engine`]: the attribution core. Pending starts, the stack store and
//!   the count table, all on `dashmap`, plus the per-transition
//!   sampling procedure ([`engine::OffCpuProbe`]).
//! - [`report`]: drain, sort ascending, render folded or multi-line.
//! - [`symbolization`]: `/proc/kallsyms` lookup behind [`symbolization::ResolveSymbol`].
//! - [`profiling`]: eBPF loading, the [`profiling::TraceHost`] attach seam and
//!   the ring buffer reader.
//! - [`session`]: attach, wait for duration or Ctrl-C, drain and render.
//! - [`config`] / [`cli`]: command line → validated [`config::SessionConfig`].
//! - [`domain`]: newtypes (`Tid`, `Pid`, `StackId`, `ThreadName`) and errors.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Trace everything until Ctrl-C
//! sudo ./offcputime
//!
//! # 10 seconds of one process, folded for flamegraph.pl
//! sudo ./offcputime -p 185 -f 10 > out.folded
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod preflight;
pub mod profiling;
pub mod report;
pub mod session;
pub mod symbolization;
