use thiserror::Error;

/// Fatal conditions hit before the first frame leaves the host.
#[derive(Error, Debug)]
pub(crate) enum StartupError {
    #[error("This program must be run as root.")]
    NotPrivileged,

    #[error("Interface '{name}' not found (available: {})", available.join(", "))]
    InterfaceNotFound { name: String, available: Vec<String> },

    #[error("Socket creation failed: {0}")]
    Channel(#[from] std::io::Error),

    #[error("Unhandled channel type")]
    UnsupportedChannel,
}
