mod error;
pub mod mem;
pub mod regs;

use std::io;
use std::os::unix::process::CommandExt;

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{AccessFlags, Pid};

pub use self::error::{Error, Result};
pub use self::regs::Registers;

/// Spawns the target executable as a traced child.
///
/// The child requests to be traced right before replacing its image with the
/// target executable, so the parent observes the post-`execve` trap stop.
/// The child is left in that stop, with descendant tracing enabled.
pub fn spawn_tracee(command: &crate::Command) -> crate::Result<Pid> {
    let path = &command.program;

    // Missing or non-executable targets fail before any fork happens.
    nix::unistd::access(path.as_path(), AccessFlags::X_OK).map_err(|e| crate::Error::Launch {
        path: path.clone(),
        source: io::Error::from_raw_os_error(e as i32),
    })?;

    let mut command = command.to_std();

    // On Linux, if a `pre_exec` closure is specified, `rust-std` will
    // spawn the process with `fork`+`exec`, otherwise `posix_spawn` is used.
    unsafe {
        command.pre_exec(|| ptrace::traceme().map_err(|e| io::Error::from_raw_os_error(e as i32)))
    };

    // An exec failure inside the child surfaces as a spawn error here.
    let child = command.spawn().map_err(|e| crate::Error::Launch {
        path: path.clone(),
        source: e,
    })?;

    let pid = Pid::from_raw(child.id() as i32);

    wait_for_initial_stop(pid)?;

    Ok(pid)
}

fn wait_for_initial_stop(pid: Pid) -> Result<()> {
    let status = waitpid(pid, None)?;

    if !matches!(status, WaitStatus::Stopped(_, Signal::SIGTRAP)) {
        return Err(Error::BadChildWait(status));
    }

    set_trace_options(pid)
}

/// Attaches to an already-running process, leaving it stopped.
pub fn attach_tracee(pid: i32) -> crate::Result<Pid> {
    let tracee = Pid::from_raw(pid);

    ptrace::attach(tracee).map_err(|source| crate::Error::Attach { pid, source })?;

    // The attach stop must be observed before trace options can be set.
    let status = waitpid(tracee, None).map_err(Error::from)?;
    if !matches!(status, WaitStatus::Stopped(..)) {
        return Err(Error::BadChildWait(status).into());
    }

    set_trace_options(tracee)?;

    Ok(tracee)
}

/// Enables tracing of descendants created by `fork`/`clone`.
fn set_trace_options(pid: Pid) -> Result<()> {
    ptrace::setoptions(
        pid,
        ptrace::Options::PTRACE_O_TRACECLONE | ptrace::Options::PTRACE_O_TRACEFORK,
    )?;

    Ok(())
}

/// Resumes a stopped tracee, delivering `signal` to it if given.
pub fn resume_tracee(pid: Pid, signal: Option<Signal>) -> Result<()> {
    ptrace::cont(pid, signal)?;

    Ok(())
}

/// Detaches from a stopped tracee, letting it run untraced.
pub fn detach_tracee(pid: Pid) -> Result<()> {
    ptrace::detach(pid, None)?;

    Ok(())
}

/// Blocks until any member of the traced family changes status.
///
/// Returns `None` once no traced process remains. `__WNOTHREAD` keeps
/// concurrent sessions driven from other threads of this process out of
/// each other's way.
pub fn wait_any() -> Result<Option<WaitStatus>> {
    match waitpid(
        None,
        Some(WaitPidFlag::__WALL | WaitPidFlag::__WNOTHREAD),
    ) {
        Ok(status) => Ok(Some(status)),
        Err(Errno::ECHILD) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
