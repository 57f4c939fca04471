use super::Machine;
use crate::sys::Registers;
use crate::sys::mem::WORD_SIZE;

/// INT3, the single-byte trap encoding.
const TRAP_OPCODE: u64 = 0xcc;

/// Breakpoint strategy for `EM_386`/`EM_X86_64` tracees.
///
/// INT3 traps with the program counter already advanced past the patched
/// byte, so both the trap address and the resume fixup rewind the counter
/// by one.
pub(super) struct X86;

impl Machine for X86 {
    fn trap_addr(&self, regs: &Registers) -> u64 {
        regs.instr_addr().wrapping_sub(1)
    }

    fn patched_word(&self, addr: u64, current: u64) -> u64 {
        let shift = (addr % WORD_SIZE) * 8;

        (current & !(0xff << shift)) | (TRAP_OPCODE << shift)
    }

    fn adjust_after_trap(&self, regs: &mut Registers) {
        regs.set_instr_addr(regs.instr_addr().wrapping_sub(1));
    }
}
