//! # offcputime - Main Entry Point
//!
//! Validate options, check the host, load kernel symbols and the kprobe,
//! then trace until the duration elapses or Ctrl-C, and print the report.

use std::io::{self, BufWriter};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use offcputime::cli::Args;
use offcputime::config::SessionConfig;
use offcputime::domain::{ConfigError, ProfilerError};
use offcputime::preflight::{check_kernel_symbols, run_preflight_checks};
use offcputime::profiling::{bump_memlock_rlimit, KprobeHost};
use offcputime::session::Session;
use offcputime::symbolization::KernelSymbols;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            if code == EXIT_ERROR && is_no_hook_points(&e) {
                println!("0 functions traced. Exiting.");
            } else {
                eprintln!("error: {e:#}");
            }
            code
        }
    });
}

fn is_no_hook_points(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<ProfilerError>(), Some(ProfilerError::NoHookPoints { .. }))
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return EXIT_USAGE;
    }
    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();

    // Reject bad option combinations before touching the kernel
    let config = SessionConfig::try_from(&args)?;

    run_preflight_checks()?;

    let symbols = Arc::new(KernelSymbols::load()?);
    check_kernel_symbols(&symbols);
    info!("Loaded {} kernel symbols", symbols.len());

    bump_memlock_rlimit();
    let host = KprobeHost::load(Arc::clone(&symbols)).context("Failed to load eBPF program")?;

    let session = Session::start(config, host)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    session.write_header(&mut out)?;
    io::Write::flush(&mut out)?;

    session.wait().await;

    session.finish(&*symbols, &mut out)?;
    Ok(())
}
