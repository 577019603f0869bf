use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::Command;

/// eBPF package and the binary it produces
const EBPF_PACKAGE: &str = "offcputime-ebpf";
const EBPF_BINARY: &str = "offcputime";

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Build the finish_task_switch kprobe object
    BuildEbpf {
        #[arg(long, default_value = "bpfel-unknown-none")]
        target: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::BuildEbpf { target } => build_ebpf(&target)?,
    }

    Ok(())
}

/// `target/<target>/release/offcputime`, embedded by the userspace crate
fn artifact_path(target: &str) -> PathBuf {
    Path::new("target").join(target).join("release").join(EBPF_BINARY)
}

fn build_ebpf(target: &str) -> Result<()> {
    // Debug builds pull in formatting code the BPF linker rejects; the
    // userspace crate only embeds the release object anyway.
    let status = Command::new("cargo")
        .arg("+nightly")
        .arg("build")
        .arg("--package")
        .arg(EBPF_PACKAGE)
        .arg("--target")
        .arg(target)
        .arg("-Z")
        .arg("build-std=core")
        .arg("--release")
        .status()
        .context("Failed to run cargo for the eBPF program")?;

    if !status.success() {
        anyhow::bail!("Failed to build eBPF program");
    }

    let artifact = artifact_path(target);
    let size = std::fs::metadata(&artifact)
        .with_context(|| format!("eBPF object missing at {}", artifact.display()))?
        .len();

    println!("✓ eBPF program built successfully");
    println!("  Object: {} ({size} bytes)", artifact.display());

    Ok(())
}
