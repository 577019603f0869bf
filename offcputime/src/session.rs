//! One trace session: attach, wait, drain, render
//!
//! ```text
//! SessionConfig ──▶ Session::start ──▶ wait (duration | Ctrl-C) ──▶ finish
//!                     │                                              │
//!                     └─ TraceHost::attach(finish_task_switch)       └─ drain + render
//! ```
//!
//! Configuration is validated before a session exists, so a rejected
//! configuration never reaches [`TraceHost::attach`].

use std::io::{self, Write};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{OutputFormat, SessionConfig};
use crate::domain::ProfilerError;
use crate::engine::OffCpuProbe;
use crate::profiling::{TraceHost, SCHED_HOOK};
use crate::report::{self, Report};
use crate::symbolization::ResolveSymbol;

pub struct Session<H: TraceHost> {
    config: SessionConfig,
    probe: Arc<OffCpuProbe>,
    host: H,
    attached: usize,
}

impl<H: TraceHost> Session<H> {
    /// Attach the probe to the scheduling hook
    ///
    /// # Errors
    /// Returns [`ProfilerError::NoHookPoints`] if the host instrumented
    /// nothing, or the host's own error if attaching failed outright
    pub fn start(config: SessionConfig, mut host: H) -> Result<Self, ProfilerError> {
        let probe = Arc::new(OffCpuProbe::from_config(&config));
        let attached = host.attach(SCHED_HOOK, Arc::clone(&probe))?;
        if attached == 0 {
            return Err(ProfilerError::NoHookPoints { hook: SCHED_HOOK.to_string() });
        }
        info!("Tracing {attached} function(s) for {SCHED_HOOK}, {}", config.filter);

        Ok(Self { config, probe, host, attached })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn probe(&self) -> &OffCpuProbe {
        &self.probe
    }

    /// Number of kernel functions instrumented
    pub fn attached(&self) -> usize {
        self.attached
    }

    /// Print the tracing banner (multi-line output only)
    ///
    /// # Errors
    /// Returns any error from writing to `out`
    pub fn write_header<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.config.format == OutputFormat::MultiLine {
            writeln!(out, "{}", report::header(self.config.duration))?;
        }
        Ok(())
    }

    /// Block until the duration elapses or Ctrl-C arrives
    pub async fn wait(&self) {
        let duration = self.config.duration;
        let elapsed = async move {
            match duration {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(elapsed);

        tokio::select! {
            () = &mut elapsed => debug!("Trace duration elapsed"),
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => debug!("Interrupted, draining"),
                Err(e) => {
                    warn!("Failed to listen for Ctrl-C: {e}");
                    elapsed.await;
                }
            },
        }
    }

    /// Stop the host, drain the count table and render it
    ///
    /// # Errors
    /// Returns any error from writing to `out`
    pub fn finish<W: Write>(mut self, symbols: &dyn ResolveSymbol, out: &mut W) -> io::Result<Report> {
        self.host.stop();
        let report = report::collect(&self.probe);

        match self.config.format {
            OutputFormat::Folded => {
                report::render_folded(&report, self.probe.stacks(), symbols, out)?;
                if report.missing_stacks > 0 {
                    eprintln!("{}", report::stack_warning(report.missing_stacks));
                }
            }
            OutputFormat::MultiLine => {
                writeln!(out)?;
                report::render_multiline(&report, self.probe.stacks(), symbols, out)?;
                writeln!(out, "Detaching...")?;
            }
        }
        out.flush()?;

        self.log_summary(&report);
        Ok(report)
    }

    /// End-of-session counters, one line each
    pub fn summary(&self, report: &Report) -> Vec<String> {
        let stats = self.probe.stats().snapshot();
        let stacks = self.probe.stacks();
        let mut lines = vec![
            format!(
                "Session summary: {} transitions, {} samples, {} filtered, {} missed starts, {} short blocks",
                stats.transitions, stats.samples, stats.filtered, stats.missed_starts, stats.short_blocks,
            ),
            format!(
                "Stacks: {} stored of {}, {} not stored, {} failed walks; {} entries rendered",
                stacks.len(),
                stacks.capacity(),
                stacks.dropped(),
                stacks.failed(),
                report.entries.len(),
            ),
        ];
        let orphaned = self.probe.pending().len();
        if orphaned > 0 {
            lines.push(format!("{orphaned} threads still off-CPU at exit"));
        }
        lines
    }

    /// `--verbose` prints the summary to stderr, otherwise it is logged
    fn log_summary(&self, report: &Report) {
        for line in self.summary(report) {
            if self.config.verbose {
                eprintln!("{line}");
            } else {
                info!("{line}");
            }
        }
        let lost = self.host.lost_events();
        if lost > 0 {
            warn!("{lost} transitions lost to a full ring buffer");
        }
    }
}
