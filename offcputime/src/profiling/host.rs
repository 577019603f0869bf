//! Attach boundary between the engine and the kernel
//!
//! The engine never touches eBPF directly. A [`TraceHost`] takes the probe
//! and a hook name, instruments every matching kernel function, and reports
//! how many it instrumented. The session treats zero as fatal.

use std::sync::Arc;

use aya::maps::{HashMap, PerCpuArray, RingBuf};
use aya::programs::KProbe;
use aya::Ebpf;
use log::{info, warn};
use offcputime_common::{CONFIG_FILTER_MODE, CONFIG_TARGET_TGID};

use super::ebpf_setup::load_ebpf_program;
use super::event_reader::EventReader;
use crate::domain::ProfilerError;
use crate::engine::OffCpuProbe;
use crate::symbolization::KernelSymbols;

/// Kernel scheduling hook the probe is attached to
pub const SCHED_HOOK: &str = "finish_task_switch";

/// Capability to run the probe on every scheduling transition
pub trait TraceHost {
    /// Instrument `hook` and deliver its transitions to `probe`
    ///
    /// Returns the number of instrumented functions.
    ///
    /// # Errors
    /// Returns an error if the instrumentation itself cannot be set up
    fn attach(&mut self, hook: &str, probe: Arc<OffCpuProbe>) -> Result<usize, ProfilerError>;

    /// Stop delivering transitions; samples already counted are kept
    fn stop(&mut self) {}

    /// Transitions lost before reaching the probe
    fn lost_events(&self) -> u64 {
        0
    }
}

/// Production host: the `oncpu` kprobe plus a ring buffer reader thread
///
/// Probes are detached when the host is dropped.
pub struct KprobeHost {
    bpf: Ebpf,
    symbols: Arc<KernelSymbols>,
    reader: Option<EventReader>,
}

impl KprobeHost {
    /// Load the eBPF object; nothing is attached yet
    ///
    /// # Errors
    /// Returns an error if the eBPF object cannot be loaded
    pub fn load(symbols: Arc<KernelSymbols>) -> Result<Self, ProfilerError> {
        Ok(Self { bpf: load_ebpf_program()?, symbols, reader: None })
    }
}

impl TraceHost for KprobeHost {
    fn attach(&mut self, hook: &str, probe: Arc<OffCpuProbe>) -> Result<usize, ProfilerError> {
        let functions: Vec<String> =
            self.symbols.functions_matching(hook).into_iter().map(str::to_string).collect();
        if functions.is_empty() {
            warn!("No kernel function named {hook} in kallsyms");
            return Ok(0);
        }

        // The kprobe reads the filter on every transition, so set it first
        let (mode, target_tgid) = probe.filter().kernel_config();
        let mut config: HashMap<_, u32, u64> = HashMap::try_from(
            self.bpf.map_mut("CONFIG").ok_or(ProfilerError::MissingFromObject("CONFIG map"))?,
        )?;
        config.insert(CONFIG_FILTER_MODE, mode, 0)?;
        config.insert(CONFIG_TARGET_TGID, target_tgid, 0)?;
        info!("✓ Set kernel-side filter: {}", probe.filter());

        let program: &mut KProbe = self
            .bpf
            .program_mut("oncpu")
            .ok_or(ProfilerError::MissingFromObject("oncpu program"))?
            .try_into()?;
        program.load()?;

        let mut attached = 0;
        for function in &functions {
            match program.attach(function.as_str(), 0) {
                Ok(_) => {
                    attached += 1;
                    info!("✓ Attached kprobe: {function}");
                }
                Err(e) => {
                    let err = ProfilerError::ProbeAttachFailed {
                        probe: "oncpu".to_string(),
                        function: function.clone(),
                        error: e.to_string(),
                    };
                    warn!("{err}");
                }
            }
        }
        if attached == 0 {
            return Ok(0);
        }

        let events = self
            .bpf
            .take_map("EVENTS")
            .ok_or(ProfilerError::MissingFromObject("EVENTS map"))?;
        let ring_buf = RingBuf::try_from(events)?;
        self.reader = Some(EventReader::spawn(ring_buf, probe));

        Ok(attached)
    }

    fn stop(&mut self) {
        if let Some(reader) = &self.reader {
            reader.stop();
        }
    }

    fn lost_events(&self) -> u64 {
        let Some(map) = self.bpf.map("DROPPED") else {
            return 0;
        };
        let per_cpu = PerCpuArray::<_, u64>::try_from(map).and_then(|array| array.get(&0, 0));
        match per_cpu {
            Ok(values) => values.iter().sum(),
            Err(e) => {
                warn!("Failed to read dropped event count: {e}");
                0
            }
        }
    }
}
