//! # Kernel Symbol Resolution
//!
//! Stacks captured by the kprobe are raw kernel return addresses such as
//! `0xffffffff81c3e2a5`. Rendering turns each one into a function name through
//! the [`ResolveSymbol`] seam.
//!
//! ## Kernel Symbols
//!
//! The production resolver, [`KernelSymbols`], reads `/proc/kallsyms` once at
//! startup:
//!
//! ```text
//! ffffffff81c3e190 T schedule
//! ffffffff81c3e240 t finish_task_switch.isra.0
//! ffffffffc0a01000 t ext4_file_read_iter	[ext4]
//! ```
//!
//! Only text symbols (`t`, `T`, `w`, `W`) are kept, sorted by address. An
//! address resolves to the closest symbol at or below it. Rust-for-Linux
//! symbols (`_R...`) are demangled with `rustc-demangle`.
//!
//! ## Fallback
//!
//! Resolution never fails. An address with no symbol renders as its literal
//! `0x...` value, so a frame is never dropped from the output.
//!
//! ## `kptr_restrict`
//!
//! Without privileges the kernel prints every address in kallsyms as zero.
//! The names are still listed (hook discovery works) but no address can be
//! matched, so every frame falls back to its literal value.
//! [`KernelSymbols::addresses_hidden`] reports this so the session can warn.

pub mod kallsyms;

pub use kallsyms::{KernelSymbols, KALLSYMS_PATH};

/// Address → human-readable name
pub trait ResolveSymbol {
    /// Best-effort symbol for `addr`; falls back to [`address_literal`]
    fn resolve(&self, addr: u64) -> String;
}

/// Literal form of an address that has no symbol
#[must_use]
pub fn address_literal(addr: u64) -> String {
    format!("0x{addr:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_literal() {
        assert_eq!(address_literal(0xffff_ffff_8100_0000), "0xffffffff81000000");
        assert_eq!(address_literal(0), "0x0");
    }
}
