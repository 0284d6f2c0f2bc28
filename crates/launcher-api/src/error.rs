use crate::remote::RemoteError;

/// Failure of a launcher operation.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The waiting thread was interrupted before the process exited.
    #[error("interrupted while waiting for process")]
    Interrupted,

    #[error("command vector is empty")]
    EmptyCommand,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl LaunchError {
    /// True when the executable could not be found at spawn time.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}
