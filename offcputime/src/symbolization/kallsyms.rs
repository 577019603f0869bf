//! `/proc/kallsyms` parsing and lookup

use std::fs;
use std::path::Path;

use log::debug;
use rustc_demangle::demangle;

use super::{address_literal, ResolveSymbol};
use crate::domain::ProfilerError;

pub const KALLSYMS_PATH: &str = "/proc/kallsyms";

#[derive(Debug, Clone, PartialEq, Eq)]
struct KernelSymbol {
    addr: u64,
    name: String,
}

/// Sorted table of kernel text symbols
#[derive(Debug, Default)]
pub struct KernelSymbols {
    symbols: Vec<KernelSymbol>,
}

impl KernelSymbols {
    /// Load the running kernel's symbols
    ///
    /// # Errors
    /// Returns [`ProfilerError::KallsymsUnavailable`] if the file cannot be read
    pub fn load() -> Result<Self, ProfilerError> {
        Self::from_path(KALLSYMS_PATH)
    }

    /// # Errors
    /// Returns [`ProfilerError::KallsymsUnavailable`] if the file cannot be read
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ProfilerError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ProfilerError::KallsymsUnavailable(format!("{}: {e}", path.display())))?;
        let symbols = Self::parse(&text);
        debug!("Loaded {} kernel text symbols from {}", symbols.len(), path.display());
        Ok(symbols)
    }

    /// Parse kallsyms text, skipping malformed lines and non-text symbols
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut symbols: Vec<KernelSymbol> = text.lines().filter_map(parse_line).collect();
        symbols.sort_by_key(|sym| sym.addr);
        Self { symbols }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// True when `kptr_restrict` zeroed every address
    pub fn addresses_hidden(&self) -> bool {
        !self.symbols.is_empty() && self.symbols.iter().all(|sym| sym.addr == 0)
    }

    /// Name of the symbol containing `addr`, if any
    pub fn lookup(&self, addr: u64) -> Option<&str> {
        let idx = self.symbols.partition_point(|sym| sym.addr <= addr);
        let sym = &self.symbols[idx.checked_sub(1)?];
        // A zero address is a hidden entry, not a real match
        (sym.addr != 0).then_some(sym.name.as_str())
    }

    /// Symbols named `base` or a compiler clone of it (`base.isra.0`, ...)
    ///
    /// Sorted and deduplicated, ready to be used as attach points.
    pub fn functions_matching(&self, base: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .symbols
            .iter()
            .map(|sym| sym.name.as_str())
            .filter(|name| is_clone_of(name, base))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl ResolveSymbol for KernelSymbols {
    fn resolve(&self, addr: u64) -> String {
        self.lookup(addr).map_or_else(|| address_literal(addr), str::to_string)
    }
}

fn is_clone_of(name: &str, base: &str) -> bool {
    name.strip_prefix(base)
        .is_some_and(|rest| rest.is_empty() || (rest.starts_with('.') && rest.len() > 1))
}

/// `ffffffff81000000 T _stext` with an optional trailing `[module]`
fn parse_line(line: &str) -> Option<KernelSymbol> {
    let mut fields = line.split_whitespace();
    let addr = u64::from_str_radix(fields.next()?, 16).ok()?;
    let kind = fields.next()?;
    let name = fields.next()?;
    if !matches!(kind, "t" | "T" | "w" | "W") {
        return None;
    }

    let name = if name.starts_with("_R") {
        format!("{:#}", demangle(name))
    } else {
        name.to_string()
    };
    Some(KernelSymbol { addr, name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
ffffffff81000000 T _stext
ffffffff81c3e190 T schedule
ffffffff81c3e240 t finish_task_switch.isra.0
ffffffff81c3e400 T io_schedule
ffffffff82000000 D some_data
ffffffff81c3e500 t finish_task_switch_helper
ffffffffc0a01000 t ext4_file_read_iter\t[ext4]
";

    #[test]
    fn test_lookup_nearest_preceding_symbol() {
        let syms = KernelSymbols::parse(SAMPLE);
        assert_eq!(syms.lookup(0xffff_ffff_81c3_e190), Some("schedule"));
        assert_eq!(syms.lookup(0xffff_ffff_81c3_e1a5), Some("schedule"));
        assert_eq!(syms.lookup(0xffff_ffff_81c3_e250), Some("finish_task_switch.isra.0"));
        assert_eq!(syms.lookup(0xffff_ffff_c0a0_1010), Some("ext4_file_read_iter"));
    }

    #[test]
    fn test_unresolved_falls_back_to_literal() {
        let syms = KernelSymbols::parse(SAMPLE);
        assert_eq!(syms.resolve(0x1000), "0x1000");
        assert_eq!(KernelSymbols::default().resolve(0xdead), "0xdead");
    }

    #[test]
    fn test_data_symbols_skipped() {
        let syms = KernelSymbols::parse(SAMPLE);
        assert_eq!(syms.len(), 6);
        assert!(syms.functions_matching("some_data").is_empty());
    }

    #[test]
    fn test_functions_matching_includes_clones_only() {
        let syms = KernelSymbols::parse(
            "ffffffff81000010 t finish_task_switch\n\
             ffffffff81000020 t finish_task_switch.isra.0\n\
             ffffffff81000030 t finish_task_switch_helper\n\
             ffffffff81000040 t finish_task_switch.\n",
        );
        assert_eq!(
            syms.functions_matching("finish_task_switch"),
            vec!["finish_task_switch", "finish_task_switch.isra.0"]
        );
    }

    #[test]
    fn test_hidden_addresses() {
        let syms = KernelSymbols::parse(
            "0000000000000000 T schedule\n0000000000000000 t finish_task_switch.isra.0\n",
        );
        assert!(syms.addresses_hidden());
        assert_eq!(syms.resolve(0xffff_ffff_8100_0000), "0xffffffff81000000");
        assert_eq!(syms.functions_matching("finish_task_switch").len(), 1);
        assert!(!KernelSymbols::parse(SAMPLE).addresses_hidden());
    }

    #[test]
    fn test_rust_symbols_demangled() {
        let syms = KernelSymbols::parse("ffffffff81000000 T _RNvCs1234_7mycrate3foo\n");
        assert_eq!(syms.lookup(0xffff_ffff_8100_0000), Some("mycrate::foo"));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let syms = KernelSymbols::from_path(file.path()).unwrap();
        assert_eq!(syms.resolve(0xffff_ffff_81c3_e400), "io_schedule");

        let missing = KernelSymbols::from_path("/nonexistent/kallsyms");
        assert!(matches!(missing, Err(ProfilerError::KallsymsUnavailable(_))));
    }
}
