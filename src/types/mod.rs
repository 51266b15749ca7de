//! Core types for telemetry data representation.
//!
//! This module provides the foundational data structures shared by the
//! MAVLink decoder, the hub and the streaming layer.
//!
//! ## Architecture
//!
//! - [`FieldType`] enumerates the little-endian numeric encodings found in
//!   MAVLink payloads, with size information
//! - [`WireValue`] provides bounds-checked typed reads from raw bytes
//! - [`TelemetrySample`] is the immutable `(topic, timestampMs, value)`
//!   record published to subscribers
//!
//! ## Usage Example
//!
//! ```rust
//! use flightdeck::types::{FieldType, WireValue};
//!
//! let data = [0x00, 0xA0, 0x8C, 0x45]; // 4500.0 as little-endian f32
//! let raw = f32::read_le(&data, 0).unwrap();
//! assert!((raw - 4500.0).abs() < 1.0);
//!
//! let widened = FieldType::Float32.read(&data, 0).unwrap();
//! assert_eq!(widened, 4500.0);
//!
//! // Reads never run past the buffer
//! assert!(FieldType::UInt16.read(&data, 3).is_err());
//! ```

mod field_type;
mod sample;
mod wire_value;

pub use field_type::FieldType;
pub use sample::{SamplePoint, TelemetrySample};
pub use wire_value::WireValue;
