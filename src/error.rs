//! Error types for telemetry decoding and flight-log parsing.
//!
//! All errors implement the `std::error::Error` trait and carry enough
//! structured context to tell a malformed datagram apart from a broken
//! socket or a bad upload.
//!
//! ## Error Categories
//!
//! - **Frame Errors**: MAVLink datagrams too short to carry a header
//! - **Memory Errors**: Field reads past the end of a payload
//! - **Socket Errors**: UDP bind and receive failures
//! - **Log Errors**: ULog files that are invalid, corrupted or rejected
//! - **Configuration Errors**: Bad config files or environment values
//!
//! ## Containment
//!
//! Errors raised while decoding a single datagram are returned to the hub,
//! which logs and discards them. Nothing on the decode path is fatal:
//!
//! ```rust
//! use flightdeck::TelemetryError;
//!
//! let error = TelemetryError::truncated_frame(0xFD, 4, 10);
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```
//!
//! ## Helper Constructors
//!
//! ```rust
//! use flightdeck::TelemetryError;
//!
//! let socket_error = TelemetryError::socket_error(
//!     "bind 0.0.0.0:14550",
//!     std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
//! );
//! let memory_error = TelemetryError::memory_access_error(28);
//! let parse_error = TelemetryError::parse_error("ULog format", "missing ':' separator");
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Truncated frame: sync byte {sync:#04x} needs {required} header bytes, got {actual}")]
    TruncatedFrame { sync: u8, actual: usize, required: usize },

    #[error("Memory access violation at offset {offset:#x}")]
    Memory {
        offset: usize,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Socket operation failed: {operation}")]
    Socket {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("not a valid ULog file: {details}")]
    InvalidLog { details: String },

    #[error("ULog file is corrupted: {details}")]
    Corrupted { details: String },

    #[error("Unsupported file '{file_name}': expected a {expected} file")]
    UnsupportedFile { file_name: String, expected: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Socket { .. } => true,
            TelemetryError::File { .. } => true,
            TelemetryError::TruncatedFrame { .. } => false,
            TelemetryError::Memory { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::InvalidLog { .. } => false,
            TelemetryError::Corrupted { .. } => false,
            TelemetryError::UnsupportedFile { .. } => false,
            TelemetryError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::TruncatedFrame { .. } => vec![
                "Check that the sender emits one MAVLink frame per datagram",
                "Verify nothing else is writing to the telemetry port",
            ],
            TelemetryError::Memory { .. } => vec![
                "Check the declared payload length against the datagram size",
                "Verify the sender's MAVLink dialect matches the decoder table",
            ],
            TelemetryError::Socket { .. } => vec![
                "Ensure no other process is bound to the UDP port",
                "Check the bind address exists on this host",
                "Restart the service after freeing the port",
            ],
            TelemetryError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            TelemetryError::Parse { .. } => vec![
                "Check data format compatibility",
                "Verify source data integrity",
            ],
            TelemetryError::InvalidLog { .. } => vec![
                "Ensure you are uploading a PX4 ULOG (.ulg) file",
                "Re-export the log from the flight controller",
            ],
            TelemetryError::Corrupted { .. } => vec![
                "Download the log again from the vehicle",
                "Check the file was not truncated during transfer",
            ],
            TelemetryError::UnsupportedFile { .. } => vec![
                "Rename or convert the file to the expected extension",
                "Check the correct file was selected",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Check environment variable values",
            ],
        }
    }

    /// Helper constructor for datagrams shorter than their header.
    pub fn truncated_frame(sync: u8, actual: usize, required: usize) -> Self {
        TelemetryError::TruncatedFrame { sync, actual, required }
    }

    /// Helper constructor for memory access errors.
    pub fn memory_access_error(offset: usize) -> Self {
        TelemetryError::Memory { offset, source: None }
    }

    /// Helper constructor for socket errors with the failing operation.
    pub fn socket_error(operation: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Socket { operation: operation.into(), source }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for files that are not ULog at all.
    pub fn invalid_log(details: impl Into<String>) -> Self {
        TelemetryError::InvalidLog { details: details.into() }
    }

    /// Helper constructor for ULog files that are damaged.
    pub fn corrupted(details: impl Into<String>) -> Self {
        TelemetryError::Corrupted { details: details.into() }
    }

    /// Helper constructor for rejected uploads.
    pub fn unsupported_file(file_name: impl Into<String>, expected: impl Into<String>) -> Self {
        TelemetryError::UnsupportedFile { file_name: file_name.into(), expected: expected.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        TelemetryError::Config { reason: reason.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
