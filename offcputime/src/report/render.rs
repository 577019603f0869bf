//! Output formats
//!
//! Folded (one line per entry, consumed by flame graph tools):
//!
//! ```text
//! worker;entry_SYSCALL_64;do_syscall_64;schedule 1500
//! ```
//!
//! Multi-line (frames innermost first, then the thread name and total):
//!
//! ```text
//!     ffffffff81c3e1a5 schedule
//!     ffffffff8100403c do_syscall_64
//!     -                worker
//!         1500
//! ```

use std::io::{self, Write};
use std::time::Duration;

use super::Report;
use crate::engine::StackStore;
use crate::symbolization::ResolveSymbol;

/// Rendered in place of the frames of the unknown stack
pub const MISSED_STACK: &str = "[Missed Kernel Stack]";

/// First line of a multi-line session
#[must_use]
pub fn header(duration: Option<Duration>) -> String {
    match duration {
        Some(d) => format!("Tracing off-CPU time (us) by kernel stack for {} secs.", d.as_secs()),
        None => "Tracing off-CPU time (us) by kernel stack... Hit Ctrl-C to end.".to_string(),
    }
}

#[must_use]
pub fn stack_warning(missing: u64) -> String {
    format!("WARNING: {missing} stack traces could not be stored.")
}

/// `name;outermost;...;innermost total` per entry
///
/// # Errors
/// Returns any error from writing to `out`
pub fn render_folded<W: Write>(
    report: &Report,
    stacks: &StackStore,
    symbols: &dyn ResolveSymbol,
    out: &mut W,
) -> io::Result<()> {
    for entry in &report.entries {
        let mut line = entry.key.name.to_string();
        match stacks.frames(entry.key.stack) {
            Some(frames) => {
                for &addr in frames.iter().rev() {
                    line.push(';');
                    line.push_str(&symbols.resolve(addr));
                }
            }
            None => {
                line.push(';');
                line.push_str(MISSED_STACK);
            }
        }
        writeln!(out, "{line} {}", entry.total)?;
    }
    Ok(())
}

/// One block per entry, plus the lost-stack warning if any
///
/// # Errors
/// Returns any error from writing to `out`
pub fn render_multiline<W: Write>(
    report: &Report,
    stacks: &StackStore,
    symbols: &dyn ResolveSymbol,
    out: &mut W,
) -> io::Result<()> {
    for entry in &report.entries {
        match stacks.frames(entry.key.stack) {
            Some(frames) => {
                for &addr in frames {
                    writeln!(out, "    {addr:<16x} {}", symbols.resolve(addr))?;
                }
            }
            None => writeln!(out, "    {MISSED_STACK}")?,
        }
        writeln!(out, "    {:<16} {}", "-", entry.key.name)?;
        writeln!(out, "        {}", entry.total)?;
        writeln!(out)?;
    }

    if report.missing_stacks > 0 {
        writeln!(out, "{}", stack_warning(report.missing_stacks))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CountKey, Micros, StackId, ThreadName};
    use std::collections::HashMap;

    struct Names(HashMap<u64, &'static str>);

    impl ResolveSymbol for Names {
        fn resolve(&self, addr: u64) -> String {
            self.0.get(&addr).map_or_else(|| format!("0x{addr:x}"), |s| (*s).to_string())
        }
    }

    const FRAME_A: u64 = 0xffff_ffff_8100_00a0;
    const FRAME_B: u64 = 0xffff_ffff_8100_00b0;

    fn fixture() -> (Report, StackStore, Names) {
        let stacks = StackStore::with_capacity(8);
        // Stored innermost first: frameB was called by frameA
        let id = stacks.capture(Ok(&[FRAME_B, FRAME_A]));
        let report = Report::from_counts(
            vec![(CountKey { name: ThreadName::new("worker"), stack: id }, Micros(1500))],
            0,
        );
        let names = Names(HashMap::from([(FRAME_A, "frameA"), (FRAME_B, "frameB")]));
        (report, stacks, names)
    }

    fn to_string(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_folded_outermost_first() {
        let (report, stacks, names) = fixture();
        let out = to_string(|buf| render_folded(&report, &stacks, &names, buf));
        assert_eq!(out, "worker;frameA;frameB 1500\n");
    }

    #[test]
    fn test_multiline_innermost_first_with_addresses() {
        let (report, stacks, names) = fixture();
        let out = to_string(|buf| render_multiline(&report, &stacks, &names, buf));
        assert_eq!(
            out,
            "    ffffffff810000b0 frameB\n\
             \x20   ffffffff810000a0 frameA\n\
             \x20   -                worker\n\
             \x20       1500\n\n"
        );
    }

    #[test]
    fn test_multiline_unresolved_frame_keeps_address_column() {
        let stacks = StackStore::with_capacity(8);
        let id = stacks.capture(Ok(&[0xffff_ffff_8123_4560]));
        let report = Report::from_counts(
            vec![(CountKey { name: ThreadName::new("kworker/0:1"), stack: id }, Micros(42))],
            0,
        );
        let out = to_string(|buf| render_multiline(&report, &stacks, &Names(HashMap::new()), buf));
        assert_eq!(out.lines().next(), Some("    ffffffff81234560 0xffffffff81234560"));
    }

    #[test]
    fn test_unknown_stack_and_unresolved_frame() {
        let stacks = StackStore::with_capacity(8);
        let id = stacks.capture(Ok(&[0x1234]));
        let report = Report::from_counts(
            vec![
                (CountKey { name: ThreadName::new("a"), stack: id }, Micros(3)),
                (CountKey { name: ThreadName::new("b"), stack: StackId::UNKNOWN }, Micros(9)),
            ],
            2,
        );
        let names = Names(HashMap::new());

        let folded = to_string(|buf| render_folded(&report, &stacks, &names, buf));
        assert_eq!(folded, "a;0x1234 3\nb;[Missed Kernel Stack] 9\n");

        let multi = to_string(|buf| render_multiline(&report, &stacks, &names, buf));
        assert!(multi.contains("    [Missed Kernel Stack]\n"));
        assert!(multi.ends_with("WARNING: 2 stack traces could not be stored.\n"));
    }

    #[test]
    fn test_header() {
        assert_eq!(
            header(Some(Duration::from_secs(5))),
            "Tracing off-CPU time (us) by kernel stack for 5 secs."
        );
        assert!(header(None).ends_with("Hit Ctrl-C to end."));
    }
}
