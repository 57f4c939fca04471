use std::path::PathBuf;

/// Error type of this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No architecture adapter matches the target's machine type.
    ///
    /// Raised before any process is spawned, attached or written to.
    #[error("machine type {0:#x} is not supported")]
    UnsupportedMachine(u16),

    /// The target executable could not be launched.
    #[error("cannot launch {}: {source}", path.display())]
    Launch {
        /// Path of the executable that failed to launch.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The target process could not be attached to.
    #[error("cannot attach to process {pid}: {source}")]
    Attach {
        /// Process ID of the attach target.
        pid: i32,
        /// Underlying OS error.
        source: nix::errno::Errno,
    },

    /// Internal tracing error.
    #[error(transparent)]
    TraceInternal(#[from] crate::sys::Error),
}

/// Result type of this crate.
pub type Result<T> = core::result::Result<T, Error>;
