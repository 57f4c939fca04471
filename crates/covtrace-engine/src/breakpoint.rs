use nix::unistd::Pid;

use crate::arch::Machine;
use crate::sys::Registers;
use crate::sys::mem::{peek_word, poke_word};
use crate::sys::regs::set_registers;
use crate::table::{CoverageTable, TrackedAddress};

/// Installs and removes the software breakpoints of one session.
pub(crate) struct Breakpoints {
    arch: &'static dyn Machine,
}

impl Breakpoints {
    pub fn new(arch: &'static dyn Machine) -> Self {
        Self { arch }
    }

    /// Address of the breakpoint behind a trap-time register snapshot.
    pub fn trap_addr(&self, regs: &Registers) -> u64 {
        self.arch.trap_addr(regs)
    }

    /// Patches a trap encoding over every tracked address of `table`.
    ///
    /// Originals are captured for the whole table before the first patch is
    /// written. Neighboring addresses can share an aligned word, and a
    /// capture performed after a sibling's patch would record the trap
    /// encoding as the original instruction.
    #[tracing::instrument(skip_all, fields(pid = pid.as_raw(), count = table.len()))]
    pub fn install_all(&self, pid: Pid, table: &mut CoverageTable) -> crate::sys::Result<()> {
        for entry in table.iter_mut() {
            let word = peek_word(pid, entry.addr())?;
            entry.capture_original(word);
        }

        for entry in table.iter_mut() {
            let addr = entry.addr();
            let current = peek_word(pid, addr)?;

            poke_word(pid, addr, self.arch.patched_word(addr, current))?;
            entry.set_patched(true);

            tracing::trace!(addr = format_args!("{addr:#x}"), "breakpoint installed");
        }

        Ok(())
    }

    /// Removes a breakpoint the tracee just trapped on, and records the hit.
    ///
    /// The register fixup is written back while the trap encoding is still
    /// in place, then the original instruction is merged back into memory.
    /// May run more than once per entry: a descendant that inherited the
    /// patched text at fork time traps on its own copy, and the repair
    /// targets that process. Hit and patched state are latched.
    pub fn clear_on_trap(
        &self,
        pid: Pid,
        mut regs: Registers,
        entry: &mut TrackedAddress,
    ) -> crate::sys::Result<()> {
        self.arch.adjust_after_trap(&mut regs);
        set_registers(pid, &regs)?;

        self.restore(pid, entry)?;
        entry.mark_hit();

        tracing::trace!(
            addr = format_args!("{:#x}", entry.addr()),
            "breakpoint hit"
        );

        Ok(())
    }

    /// Removes every still-installed breakpoint that never fired.
    ///
    /// Called right before detaching, so the tracee keeps running on its
    /// original instructions. Entries stay unhit.
    #[tracing::instrument(skip_all, fields(pid = pid.as_raw()))]
    pub fn clear_unhit(&self, pid: Pid, table: &mut CoverageTable) -> crate::sys::Result<()> {
        for entry in table.iter_mut() {
            if entry.is_patched() && !entry.is_hit() {
                self.restore(pid, entry)?;
            }
        }

        Ok(())
    }

    fn restore(&self, pid: Pid, entry: &mut TrackedAddress) -> crate::sys::Result<()> {
        let addr = entry.addr();

        // Patched entries always carry a captured original.
        let Some(original) = entry.original_word() else {
            return Ok(());
        };

        let current = peek_word(pid, addr)?;
        poke_word(pid, addr, self.arch.restore_word(addr, original, current))?;
        entry.set_patched(false);

        Ok(())
    }
}
