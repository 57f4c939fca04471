use std::collections::HashSet;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use crate::breakpoint::Breakpoints;
use crate::sys;
use crate::table::CoverageTable;

/// Lifecycle state of a tracing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The tracee family is stopped or running under trace.
    Stopped,
    /// The root tracee terminated (or the whole family disappeared).
    Exited,
    /// The event loop aborted on a tracing error. Hits recorded before the
    /// failure remain valid.
    Failed,
}

/// How the root tracee terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal termination with the given exit code.
    Code(i32),
    /// Termination by the given signal.
    Signal(Signal),
}

/// One coverage-tracing session over a target process and its descendants.
///
/// A session is driven through at most one of each step, in order:
/// [`launch`](Self::launch) or [`attach`](Self::attach), then
/// [`install`](Self::install), then [`run`](Self::run) (launch-based) or
/// [`detach`](Self::detach) (attach-based).
pub struct Session {
    breakpoints: Breakpoints,
    root: Pid,
    active: Pid,
    tracees: HashSet<Pid>,
    phase: Phase,
    exit_status: Option<ExitStatus>,
    kill_on_drop: bool,
    detached: bool,
}

impl Session {
    /// Launches the given command as the root tracee, stopped at its entry
    /// point.
    ///
    /// `e_machine` is the ELF machine type of the target executable, as
    /// reported by the caller's binary parser. An unsupported machine type
    /// fails before any process is spawned.
    #[tracing::instrument(skip_all, fields(path = %command.program.display()))]
    pub fn launch(e_machine: u16, command: &crate::Command) -> crate::Result<Self> {
        let arch = crate::arch::for_machine(e_machine)
            .ok_or(crate::Error::UnsupportedMachine(e_machine))?;

        let root = sys::spawn_tracee(command)?;

        tracing::info!(tracee_pid = root.as_raw(), "tracee spawned");

        Ok(Self {
            breakpoints: Breakpoints::new(arch),
            root,
            active: root,
            tracees: HashSet::from([root]),
            phase: Phase::Stopped,
            exit_status: None,
            kill_on_drop: true,
            detached: false,
        })
    }

    /// Attaches to an already-running process, leaving it stopped.
    ///
    /// As with [`launch`](Self::launch), an unsupported `e_machine` fails
    /// before the process is touched.
    #[tracing::instrument(skip_all, fields(pid))]
    pub fn attach(e_machine: u16, pid: i32) -> crate::Result<Self> {
        let arch = crate::arch::for_machine(e_machine)
            .ok_or(crate::Error::UnsupportedMachine(e_machine))?;

        let root = sys::attach_tracee(pid)?;

        tracing::info!(tracee_pid = pid, "tracee attached");

        Ok(Self {
            breakpoints: Breakpoints::new(arch),
            root,
            active: root,
            tracees: HashSet::from([root]),
            phase: Phase::Stopped,
            exit_status: None,
            kill_on_drop: false,
            detached: false,
        })
    }

    /// Installs a breakpoint at every address of `table`.
    ///
    /// The tracee must still be in its initial stop.
    pub fn install(&mut self, table: &mut CoverageTable) -> crate::Result<()> {
        self.breakpoints.install_all(self.root, table)?;

        Ok(())
    }

    /// Runs the tracee family to completion, recording hits into `table`.
    ///
    /// Returns once the root tracee terminated (its status is then available
    /// through [`exit_status`](Self::exit_status)) or no traced process
    /// remains.
    #[tracing::instrument(skip_all, fields(tracee_pid = self.root.as_raw()))]
    pub fn run(&mut self, table: &mut CoverageTable) -> crate::Result<()> {
        match self.event_loop(table) {
            Ok(()) => {
                self.phase = Phase::Exited;
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    fn event_loop(&mut self, table: &mut CoverageTable) -> crate::Result<()> {
        let mut resume = Some((self.active, None));

        loop {
            if let Some((pid, signal)) = resume.take() {
                sys::resume_tracee(pid, signal)?;
            }

            let Some(status) = sys::wait_any()? else {
                // The whole family is gone.
                return Ok(());
            };

            match status {
                WaitStatus::Stopped(pid, Signal::SIGTRAP) => {
                    self.active = pid;
                    self.tracees.insert(pid);
                    self.handle_trap(pid, table)?;
                    resume = Some((pid, None));
                }
                // A fork/clone descendant announces itself with a SIGSTOP
                // stop before any other event; that stop is a trace
                // artifact and is not forwarded. A SIGSTOP reaching an
                // already-known tracee is a real signal and is forwarded
                // like any other.
                WaitStatus::Stopped(pid, Signal::SIGSTOP) => {
                    self.active = pid;

                    if self.tracees.insert(pid) {
                        resume = Some((pid, None));
                    } else {
                        tracing::debug!(pid = pid.as_raw(), "forwarding SIGSTOP");
                        resume = Some((pid, Some(Signal::SIGSTOP)));
                    }
                }
                WaitStatus::Stopped(pid, signal) => {
                    self.active = pid;
                    self.tracees.insert(pid);
                    tracing::debug!(pid = pid.as_raw(), signal = %signal, "forwarding signal");
                    resume = Some((pid, Some(signal)));
                }
                // Descendant-creation notification on the parent; the new
                // tracee reports its own stop separately.
                WaitStatus::PtraceEvent(pid, _, _) => {
                    self.active = pid;
                    self.tracees.insert(pid);
                    resume = Some((pid, None));
                }
                WaitStatus::Exited(pid, code) => {
                    if pid == self.root {
                        self.exit_status = Some(ExitStatus::Code(code));
                        tracing::info!(code, "root tracee exited");
                        return Ok(());
                    }

                    self.tracees.remove(&pid);
                    tracing::debug!(pid = pid.as_raw(), code, "descendant exited");
                }
                WaitStatus::Signaled(pid, signal, _) => {
                    if pid == self.root {
                        self.exit_status = Some(ExitStatus::Signal(signal));
                        tracing::info!(signal = %signal, "root tracee killed");
                        return Ok(());
                    }

                    self.tracees.remove(&pid);
                    tracing::debug!(pid = pid.as_raw(), signal = %signal, "descendant killed");
                }
                other => return Err(sys::Error::UnexpectedStatus(other).into()),
            }
        }
    }

    fn handle_trap(&mut self, pid: Pid, table: &mut CoverageTable) -> crate::Result<()> {
        let regs = sys::regs::get_registers(pid)?;
        let addr = self.breakpoints.trap_addr(&regs);

        match table.get_mut(addr) {
            // A descendant can trap on text it inherited while the entry
            // was still patched in its parent; the repair targets whichever
            // process trapped, and hit state stays latched.
            Some(entry) => self.breakpoints.clear_on_trap(pid, regs, entry)?,
            // Not one of ours (e.g. the post-exec trap of a descendant).
            None => tracing::trace!(
                pid = pid.as_raw(),
                addr = format_args!("{addr:#x}"),
                "spurious trap"
            ),
        }

        Ok(())
    }

    /// Removes every breakpoint that never fired and releases the tracee,
    /// leaving its memory byte-identical to pre-instrumentation.
    ///
    /// The tracee must be stopped; this is the normal way to end an
    /// attach-based session.
    #[tracing::instrument(skip_all, fields(tracee_pid = self.active.as_raw()))]
    pub fn detach(&mut self, table: &mut CoverageTable) -> crate::Result<()> {
        self.breakpoints.clear_unhit(self.active, table)?;

        sys::detach_tracee(self.active)?;
        self.detached = true;

        tracing::info!("tracee detached");

        Ok(())
    }

    /// Reads the aligned machine word covering `addr` from the root tracee.
    ///
    /// The tracee must be stopped. Exposed for diagnostics.
    pub fn read_word(&self, addr: u64) -> crate::Result<u64> {
        let word = sys::mem::peek_word(self.root, addr)?;

        Ok(word)
    }

    /// Process ID of the root tracee.
    pub fn root_id(&self) -> i32 {
        self.root.as_raw()
    }

    /// Current lifecycle state of the session.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// How the root tracee terminated, if [`run`](Self::run) observed it.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // A launched tracee must not outlive its abandoned session.
        if self.kill_on_drop && !self.detached && self.phase == Phase::Stopped {
            match nix::sys::signal::kill(self.root, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => {
                    tracing::error!(tracee_pid = self.root.as_raw(), error = %e, "kill on drop")
                }
            }
        }
    }
}
