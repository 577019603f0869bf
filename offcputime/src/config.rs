//! Session configuration
//!
//! [`SessionConfig`] is built from the command line and validated before any
//! probe is attached, so a bad combination never touches the kernel.

use std::fmt;
use std::time::Duration;

use offcputime_common::{FILTER_ALL, FILTER_PROCESS, FILTER_USER_THREADS};

use crate::cli::Args;
use crate::domain::{ConfigError, Pid};
use crate::engine::DEFAULT_STACK_STORAGE_SIZE;

/// Which outgoing threads get a pending start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InclusionFilter {
    #[default]
    All,
    /// Threads whose thread-group id is this process
    Process(Pid),
    /// Everything except kernel threads
    UserThreads,
}

impl InclusionFilter {
    #[must_use]
    pub fn includes(self, pid: Pid, kthread: bool) -> bool {
        match self {
            Self::All => true,
            Self::Process(target) => pid == target,
            Self::UserThreads => !kthread,
        }
    }

    /// `(mode, target tgid)` for the kprobe's `CONFIG` map
    #[must_use]
    pub fn kernel_config(self) -> (u64, u64) {
        match self {
            Self::All => (FILTER_ALL, 0),
            Self::Process(pid) => (FILTER_PROCESS, u64::from(pid.0)),
            Self::UserThreads => (FILTER_USER_THREADS, 0),
        }
    }
}

impl fmt::Display for InclusionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all threads"),
            Self::Process(pid) => write!(f, "threads of {pid}"),
            Self::UserThreads => f.write_str("user threads"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    MultiLine,
    /// One `name;frame;...;frame duration` line per entry
    Folded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub filter: InclusionFilter,
    /// `None` runs until interrupted
    pub duration: Option<Duration>,
    pub format: OutputFormat,
    /// Echo the session summary to stderr
    pub verbose: bool,
    pub min_block_us: u64,
    pub stack_storage_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            filter: InclusionFilter::All,
            duration: None,
            format: OutputFormat::MultiLine,
            verbose: false,
            min_block_us: 1,
            stack_storage_size: DEFAULT_STACK_STORAGE_SIZE,
        }
    }
}

impl TryFrom<&Args> for SessionConfig {
    type Error = ConfigError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let filter = match (args.pid, args.user_threads_only) {
            (Some(_), true) => return Err(ConfigError::ConflictingFilters),
            (Some(pid), false) => InclusionFilter::Process(Pid(pid)),
            (None, true) => InclusionFilter::UserThreads,
            (None, false) => InclusionFilter::All,
        };
        if args.min_block_time == 0 {
            return Err(ConfigError::ZeroMinBlock);
        }
        if args.stack_storage_size == 0 {
            return Err(ConfigError::ZeroStackStorage);
        }

        Ok(Self {
            filter,
            duration: args.duration.map(Duration::from_secs),
            format: if args.folded { OutputFormat::Folded } else { OutputFormat::MultiLine },
            verbose: args.verbose,
            min_block_us: args.min_block_time,
            stack_storage_size: args.stack_storage_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> Result<SessionConfig, ConfigError> {
        let args = Args::try_parse_from(std::iter::once("offcputime").chain(argv.iter().copied()))
            .unwrap();
        SessionConfig::try_from(&args)
    }

    #[test]
    fn test_pid_and_user_only_conflict() {
        assert_eq!(parse(&["-p", "185", "-u"]), Err(ConfigError::ConflictingFilters));
    }

    #[test]
    fn test_defaults_trace_everything_until_interrupted() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_filters_and_format() {
        let config = parse(&["-p", "185", "-f", "10"]).unwrap();
        assert_eq!(config.filter, InclusionFilter::Process(Pid(185)));
        assert_eq!(config.format, OutputFormat::Folded);
        assert_eq!(config.duration, Some(Duration::from_secs(10)));
        assert_eq!(parse(&["-u"]).unwrap().filter, InclusionFilter::UserThreads);
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert_eq!(parse(&["-m", "0"]), Err(ConfigError::ZeroMinBlock));
        assert_eq!(parse(&["--stack-storage-size", "0"]), Err(ConfigError::ZeroStackStorage));
    }

    #[test]
    fn test_filter_predicate() {
        assert!(InclusionFilter::All.includes(Pid(1), true));
        assert!(InclusionFilter::Process(Pid(9)).includes(Pid(9), false));
        assert!(!InclusionFilter::Process(Pid(9)).includes(Pid(10), false));
        assert!(InclusionFilter::UserThreads.includes(Pid(3), false));
        assert!(!InclusionFilter::UserThreads.includes(Pid(2), true));
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(InclusionFilter::All.to_string(), "all threads");
        assert_eq!(InclusionFilter::Process(Pid(185)).to_string(), "threads of PID:185");
        assert_eq!(InclusionFilter::UserThreads.to_string(), "user threads");
    }

    #[test]
    fn test_kernel_config_encoding() {
        assert_eq!(InclusionFilter::All.kernel_config(), (FILTER_ALL, 0));
        assert_eq!(InclusionFilter::Process(Pid(185)).kernel_config(), (FILTER_PROCESS, 185));
        assert_eq!(InclusionFilter::UserThreads.kernel_config(), (FILTER_USER_THREADS, 0));
    }

    #[test]
    fn test_kernel_filter_agrees_with_probe_filter() {
        use offcputime_common::{task_included, TaskSnapshot, TASK_KTHREAD, TASK_VALID};

        let filters = [
            InclusionFilter::All,
            InclusionFilter::Process(Pid(10)),
            InclusionFilter::UserThreads,
        ];
        for filter in filters {
            let (mode, target) = filter.kernel_config();
            let target = u32::try_from(target).unwrap();
            for (tgid, kthread) in [(10, false), (10, true), (11, false), (2, true)] {
                let flags = if kthread { TASK_VALID | TASK_KTHREAD } else { TASK_VALID };
                let task = TaskSnapshot { tid: tgid, tgid, flags, _padding: 0 };
                assert_eq!(
                    task_included(mode, target, &task),
                    filter.includes(Pid(tgid), kthread),
                    "{filter} tgid={tgid} kthread={kthread}"
                );
            }
        }
    }
}
