//! Error types for the update pipeline.
//!
//! Every failure the transfer, poller, or cancel protocol can produce is a
//! variant here, so callers can tell a user abort from a device-reported
//! failure from a dead polling channel.

use thiserror::Error;

/// Errors that can occur while driving a device update
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("{0}")]
    Validation(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to read update package: {0}")]
    Io(#[from] std::io::Error),

    #[error("update cancelled")]
    Cancelled,

    #[error("unexpected device response: {0}")]
    Protocol(String),

    #[error("timed out waiting for installation progress")]
    PollTimeout,

    #[error("{0}")]
    ServerFailure(String),
}

impl UpdateError {
    /// Whether this error came from the operator aborting, as opposed to
    /// something going wrong.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UpdateError::Cancelled)
    }
}
