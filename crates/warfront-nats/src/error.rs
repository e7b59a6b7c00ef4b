//! Errors raised while setting up the NATS publisher.
//!
//! Publishing itself never fails from the caller's point of view; delivery
//! errors are logged by the background task.

/// Errors that can occur in the NATS adapter.
#[derive(Debug, thiserror::Error)]
pub enum NatsError {
    /// The connection to the NATS server could not be established.
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Server URL.
        url: String,
        /// Underlying client error.
        reason: String,
    },

    /// Buffered messages could not be flushed.
    #[error("failed to flush: {0}")]
    Flush(String),

    /// The subject prefix is not a valid NATS subject fragment.
    #[error("invalid subject prefix: {0:?}")]
    InvalidPrefix(String),
}
