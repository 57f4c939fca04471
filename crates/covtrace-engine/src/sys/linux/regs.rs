use std::ffi::c_void;
use std::mem;

use nix::errno::Errno;
use nix::libc;
use nix::sys::ptrace::regset::NT_PRSTATUS;
use nix::sys::ptrace::{self, RegisterSet};
use nix::unistd::Pid;

/// Captures the general-purpose register set of a stopped tracee.
pub fn get_registers(pid: Pid) -> crate::sys::Result<Registers> {
    let mut data = mem::MaybeUninit::<libc::user_regs_struct>::uninit();

    let mut iov = libc::iovec {
        iov_base: data.as_mut_ptr().cast(),
        iov_len: mem::size_of::<libc::user_regs_struct>(),
    };

    unsafe {
        Errno::result(libc::ptrace(
            ptrace::Request::PTRACE_GETREGSET as u32,
            pid.as_raw(),
            NT_PRSTATUS::VALUE as i32,
            &mut iov as *mut libc::iovec,
        ))
        .map(|_| 0)?
    };

    // The kernel reports the regset size it filled in, which tells 64-bit
    // tracees apart from 32-bit (compat) ones.
    let regs = if iov.iov_len == mem::size_of::<libc::user_regs_struct>() {
        let data = unsafe { data.assume_init() };
        Registers::B64(Registers64(data))
    } else {
        let data = unsafe { *data.as_ptr().cast::<user_regs_32>() };
        Registers::B32(Registers32(data))
    };

    Ok(regs)
}

/// Writes a register snapshot back into a stopped tracee.
pub fn set_registers(pid: Pid, regs: &Registers) -> crate::sys::Result<()> {
    match regs {
        Registers::B32(regs) => set_registers_raw(pid, &regs.0),
        Registers::B64(regs) => set_registers_raw(pid, &regs.0),
    }
}

fn set_registers_raw<T>(pid: Pid, regs: &T) -> crate::sys::Result<()> {
    let mut iov = libc::iovec {
        iov_base: regs as *const T as *mut c_void,
        iov_len: mem::size_of::<T>(),
    };

    unsafe {
        Errno::result(libc::ptrace(
            ptrace::Request::PTRACE_SETREGSET as u32,
            pid.as_raw(),
            NT_PRSTATUS::VALUE as i32,
            &mut iov as *mut libc::iovec,
        ))
        .map(|_| 0)?
    };

    Ok(())
}

/// Register snapshot of a stopped tracee.
///
/// Tracees running a 32-bit image on a 64-bit host report the compat regset
/// layout, hence the two variants.
pub enum Registers {
    /// 32-bit (compat) register layout.
    B32(Registers32),
    /// Native 64-bit register layout.
    B64(Registers64),
}

impl Registers {
    /// Address of the next instruction the tracee will execute.
    pub fn instr_addr(&self) -> u64 {
        match self {
            Self::B32(regs) => {
                #[cfg(target_arch = "x86_64")]
                {
                    regs.0.eip as u64
                }
                #[cfg(target_arch = "aarch64")]
                {
                    regs.0.arm_pc as u64
                }
            }
            Self::B64(regs) => {
                #[cfg(target_arch = "x86_64")]
                {
                    regs.0.rip
                }
                #[cfg(target_arch = "aarch64")]
                {
                    regs.0.pc
                }
            }
        }
    }

    /// Rewrites the address of the next instruction the tracee will execute.
    pub fn set_instr_addr(&mut self, addr: u64) {
        match self {
            Self::B32(regs) => {
                #[cfg(target_arch = "x86_64")]
                {
                    regs.0.eip = addr as u32;
                }
                #[cfg(target_arch = "aarch64")]
                {
                    regs.0.arm_pc = addr as u32;
                }
            }
            Self::B64(regs) => {
                #[cfg(target_arch = "x86_64")]
                {
                    regs.0.rip = addr;
                }
                #[cfg(target_arch = "aarch64")]
                {
                    regs.0.pc = addr;
                }
            }
        }
    }
}

/// 32-bit (compat) register snapshot.
pub struct Registers32(user_regs_32);

/// Native 64-bit register snapshot.
pub struct Registers64(libc::user_regs_struct);

#[cfg(target_arch = "x86_64")]
#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Clone, Copy)]
struct user_regs_32 {
    ebx: u32,
    ecx: u32,
    edx: u32,
    esi: u32,
    edi: u32,
    ebp: u32,
    eax: u32,
    ds: u32,
    es: u32,
    fs: u32,
    gs: u32,
    orig_eax: u32,
    eip: u32,
    cs: u32,
    eflags: u32,
    esp: u32,
    ss: u32,
}

#[cfg(target_arch = "aarch64")]
#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Clone, Copy)]
struct user_regs_32 {
    arm_r0: u32,
    arm_r1: u32,
    arm_r2: u32,
    arm_r3: u32,
    arm_r4: u32,
    arm_r5: u32,
    arm_r6: u32,
    arm_r7: u32,
    arm_r8: u32,
    arm_r9: u32,
    arm_r10: u32,
    arm_fp: u32,
    arm_ip: u32,
    arm_sp: u32,
    arm_lr: u32,
    arm_pc: u32,
    arm_cpsr: u32,
    arm_orig_r0: u32,
}
