//! Process-tracing and software-breakpoint engine for binary code coverage.
//!
//! Given a set of runtime addresses of interest, this crate launches (or
//! attaches to) a target process, patches a trap instruction at each address,
//! runs the target to completion while recording which addresses actually
//! execute, and leaves the target's memory byte-identical on exit.
//!
//! The crate deliberately stops at the tracing boundary:
//! - The address set is supplied by the caller (typically a debug-info
//!   resolver); no binary or DWARF parsing happens here.
//! - The target's ELF machine type is supplied by the caller's binary parser
//!   and selects the [architecture adapter](crate::arch) for the session.
//! - Hit state is left in the [`CoverageTable`] for a downstream reporter.
//!
//! # Example
//!
//! ```no_run
//! use covtrace_engine::{Command, CoverageTable, Session};
//!
//! fn main() -> covtrace_engine::Result<()> {
//!     // Supplied by external collaborators (debug-info resolver and
//!     // binary parser).
//!     let mut table = CoverageTable::new();
//!     table.insert(0x40_1000);
//!     table.insert(0x40_1040);
//!
//!     let command = Command::new("/usr/bin/ls").arg("/");
//!
//!     let mut session = Session::launch(covtrace_engine::arch::EM_X86_64, &command)?;
//!     session.install(&mut table)?;
//!     session.run(&mut table)?;
//!
//!     for entry in table.iter() {
//!         println!("{:#x} executed: {}", entry.addr(), entry.is_hit());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Supported Platforms
//!
//! Linux only. Tracees of the `x86_64`/`i386` families are supported on
//! `x86_64` hosts, `aarch64` tracees on `aarch64` hosts.

pub mod arch;

mod breakpoint;
mod command;
mod error;
mod session;
mod sys;
mod table;

pub use self::command::{Command, CommandEnv};
pub use self::error::{Error, Result};
pub use self::session::{ExitStatus, Phase, Session};
pub use self::sys::Registers;
pub use self::table::{CoverageTable, TrackedAddress};
