use nix::sys::wait::WaitStatus;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The launched or attached tracee never reported its initial stop.
    #[error("bad child wait status: {0:?}")]
    BadChildWait(WaitStatus),

    /// The event loop observed a wait status it cannot classify.
    #[error("unrecognized wait status: {0:?}")]
    UnexpectedStatus(WaitStatus),

    #[error("os error: {0}")]
    Os(#[from] nix::Error),
}

/// Result type of the OS layer.
pub type Result<T> = core::result::Result<T, Error>;
