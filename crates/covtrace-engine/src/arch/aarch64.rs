use super::Machine;
use crate::sys::Registers;
use crate::sys::mem::WORD_SIZE;

/// BRK #0, the trap encoding.
const TRAP_OPCODE: u64 = 0xd420_0000;

/// Mask of one 4-byte instruction slot.
const SLOT_MASK: u64 = 0xffff_ffff;

/// Breakpoint strategy for `EM_AARCH64` tracees.
///
/// BRK traps with the program counter still at the patched instruction, so
/// no counter fixup is needed. Instructions occupy a 4-byte slot inside the
/// 8-byte tracing word; restores merge only the covered slot back so that a
/// sibling patch in the other slot survives.
pub(super) struct Aarch64;

impl Machine for Aarch64 {
    fn trap_addr(&self, regs: &Registers) -> u64 {
        regs.instr_addr()
    }

    fn patched_word(&self, addr: u64, current: u64) -> u64 {
        let shift = (addr % WORD_SIZE) * 8;

        (current & !(SLOT_MASK << shift)) | (TRAP_OPCODE << shift)
    }

    fn adjust_after_trap(&self, _regs: &mut Registers) {}

    fn restore_word(&self, addr: u64, original: u64, current: u64) -> u64 {
        let mask = SLOT_MASK << ((addr % WORD_SIZE) * 8);

        (current & !mask) | (original & mask)
    }
}
