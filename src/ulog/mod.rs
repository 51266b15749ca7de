//! PX4 ULog flight-log parsing (cross-platform)
//!
//! [`UlogReader`] walks a `.ulg` file message by message; [`LogSummary`]
//! folds that walk into the per-message tables the upload endpoint returns,
//! including an estimated sampling frequency for every message.
//!
//! ```rust
//! use flightdeck::ulog;
//!
//! assert!(ulog::check_file_name("flight_42.ulg").is_ok());
//! assert!(ulog::check_file_name("flight_42.bin").is_err());
//! ```

pub mod format;
pub mod reader;
pub mod summary;

pub use format::{FieldValue, FileHeader, FormatDef};
pub use reader::{DataRecord, LogMessage, LoggedString, Subscription, UlogReader};
pub use summary::{DEFAULT_MAX_SAMPLES_PER_MESSAGE, LogSummary, MessageSummary, estimate_frequency};

use crate::{Result, TelemetryError};

/// Required upload file extension
pub const ULOG_EXTENSION: &str = ".ulg";

/// Reject file names that do not end in `.ulg`
pub fn check_file_name(file_name: &str) -> Result<()> {
    if file_name.ends_with(ULOG_EXTENSION) {
        Ok(())
    } else {
        Err(TelemetryError::unsupported_file(file_name, ULOG_EXTENSION))
    }
}
