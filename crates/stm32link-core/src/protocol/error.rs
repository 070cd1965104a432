//! Link errors

use thiserror::Error;

/// Errors returned by link operations
///
/// Transient read failures never appear here; the background reader logs
/// and retries them.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Write error: {0}")]
    WriteError(String),

    #[error("No device found on any port/baud combination")]
    NoDeviceFound,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Unsupported baud rate: {0}")]
    InvalidBaudRate(u32),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}
