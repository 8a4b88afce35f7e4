// ABOUTME: Runtime connection error types with SNAFU pattern.
// ABOUTME: Distinguishes failing to reach the engine socket from the engine not answering.

use snafu::Snafu;

/// Failure to obtain a usable connection to the container engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("cannot connect to the container engine: {source}"))]
    Connect { source: bollard::errors::Error },

    #[snafu(display("container engine did not answer ping: {source}"))]
    Ping { source: bollard::errors::Error },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Socket missing or unusable.
    ConnectionFailed,
    /// Socket reachable but the daemon is unhealthy.
    Unresponsive,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Connect { .. } => RuntimeErrorKind::ConnectionFailed,
            RuntimeError::Ping { .. } => RuntimeErrorKind::Unresponsive,
        }
    }
}
