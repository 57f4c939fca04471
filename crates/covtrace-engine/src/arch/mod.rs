//! Machine-specific breakpoint strategies.
//!
//! A strategy is selected once per session from the target binary's ELF
//! machine type, and encapsulates everything the engine must know about the
//! machine: how to read the faulting program counter, how to splice a trap
//! encoding into an aligned memory word, and how to repair registers and
//! memory once the trap fired.
//!
//! Only strategies for tracees the host can actually run are compiled in.

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "x86_64")]
mod x86;

use crate::sys::Registers;

/// ELF machine type of 32-bit x86 binaries.
pub const EM_386: u16 = 3;
/// ELF machine type of 64-bit x86 binaries.
pub const EM_X86_64: u16 = 62;
/// ELF machine type of 64-bit ARM binaries.
pub const EM_AARCH64: u16 = 183;

/// Machine-specific strategy for installing and removing software
/// breakpoints.
///
/// Memory is always exchanged with the tracee at machine-word granularity;
/// `addr` arguments identify the patched location *inside* its aligned word.
pub trait Machine: Send + Sync {
    /// Address of the breakpoint that produced the given trap-time register
    /// snapshot.
    fn trap_addr(&self, regs: &Registers) -> u64;

    /// Word to install at `addr`, given the aligned word currently there.
    fn patched_word(&self, addr: u64, current: u64) -> u64;

    /// Fixes up a trap-time register snapshot so that resuming re-executes
    /// the original instruction instead of whatever follows the trap
    /// encoding.
    fn adjust_after_trap(&self, regs: &mut Registers);

    /// Word restoring the original instruction at `addr`.
    ///
    /// `current` is the word presently installed, still carrying the trap
    /// encoding. The default is a flat restore of the captured original
    /// word; machines patching a sub-word slot override this to merge only
    /// the covered bits back.
    fn restore_word(&self, _addr: u64, original: u64, _current: u64) -> u64 {
        original
    }
}

/// Returns the breakpoint strategy for the given ELF machine type, or `None`
/// if the machine is unsupported on this host.
pub fn for_machine(e_machine: u16) -> Option<&'static dyn Machine> {
    match e_machine {
        #[cfg(target_arch = "x86_64")]
        EM_386 | EM_X86_64 => Some(&x86::X86),
        #[cfg(target_arch = "aarch64")]
        EM_AARCH64 => Some(&aarch64::Aarch64),
        _ => None,
    }
}
