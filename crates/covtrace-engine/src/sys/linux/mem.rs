use nix::libc;
use nix::sys::ptrace;
use nix::unistd::Pid;

/// Width of the machine word moved by the tracing memory primitives.
pub const WORD_SIZE: u64 = size_of::<libc::c_long>() as u64;

/// Aligns `addr` down to the machine word covering it.
pub const fn word_aligned(addr: u64) -> u64 {
    addr & !(WORD_SIZE - 1)
}

/// Reads the aligned machine word covering `addr` from the tracee.
pub fn peek_word(pid: Pid, addr: u64) -> crate::sys::Result<u64> {
    let data = ptrace::read(pid, word_aligned(addr) as *mut _).inspect_err(
        |e| tracing::error!(error = %e, addr = format_args!("{addr:#x}"), "ptrace(PTRACE_PEEK_DATA)"),
    )?;

    Ok(data as u64)
}

/// Writes the aligned machine word covering `addr` into the tracee.
///
/// Target text segments are usually mapped read-only, so writes go through
/// the dedicated word-granular ptrace primitive rather than the tracee's
/// `/proc/<pid>/mem`.
pub fn poke_word(pid: Pid, addr: u64, word: u64) -> crate::sys::Result<()> {
    ptrace::write(pid, word_aligned(addr) as *mut _, word as i64).inspect_err(
        |e| tracing::error!(error = %e, addr = format_args!("{addr:#x}"), "ptrace(PTRACE_POKE_DATA)"),
    )?;

    Ok(())
}
