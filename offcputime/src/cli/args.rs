//! CLI argument definitions

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "offcputime",
    about = "Summarize off-CPU time by kernel stack trace",
    after_help = "\
EXAMPLES:
    sudo offcputime                 Trace all threads until Ctrl-C
    sudo offcputime 5               Trace for 5 seconds only
    sudo offcputime -f 5            5 seconds, folded output for flame graphs
    sudo offcputime -p 185          Only trace threads of PID 185
    sudo offcputime -u              Only trace user threads (no kernel)
    sudo offcputime -v 5            Print session statistics to stderr at exit"
)]
pub struct Args {
    /// Duration of trace, in seconds (default: until Ctrl-C)
    #[arg(value_name = "DURATION")]
    pub duration: Option<u64>,

    /// Trace this PID only
    #[arg(short, long)]
    pub pid: Option<u32>,

    /// User threads only (no kernel threads)
    #[arg(short, long)]
    pub user_threads_only: bool,

    /// Print session statistics (samples, stack usage) to stderr at exit
    #[arg(short, long)]
    pub verbose: bool,

    /// Output folded format
    #[arg(short, long)]
    pub folded: bool,

    /// Ignore blocks shorter than this many microseconds
    #[arg(short, long, value_name = "US", default_value_t = 1)]
    pub min_block_time: u64,

    /// Number of unique kernel stacks to keep
    #[arg(long, value_name = "N", default_value_t = 1024)]
    pub stack_storage_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["offcputime"]).unwrap();
        assert_eq!(args.duration, None);
        assert_eq!(args.min_block_time, 1);
        assert_eq!(args.stack_storage_size, 1024);
        assert!(!args.folded);
    }

    #[test]
    fn test_short_flags_and_duration() {
        let args = Args::try_parse_from(["offcputime", "-f", "-v", "-p", "185", "5"]).unwrap();
        assert_eq!(args.duration, Some(5));
        assert_eq!(args.pid, Some(185));
        assert!(args.folded);
        assert!(args.verbose);
    }

    #[test]
    fn test_conflicting_filters_parse() {
        // Rejected later by SessionConfig so no probe is attached
        let args = Args::try_parse_from(["offcputime", "-u", "-p", "1"]).unwrap();
        assert!(args.user_threads_only);
        assert_eq!(args.pid, Some(1));
    }
}
