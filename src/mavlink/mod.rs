//! MAVLink datagram decoding.
//!
//! Decoding runs in two stages:
//! - [`frame::detect`] classifies a datagram as v1, v2 or unrecognized and
//!   slices out the payload
//! - [`decoder::decode`] looks the message id up in the static
//!   [`catalogue`] and extracts its fields at fixed offsets
//!
//! Both stages are pure byte manipulation with no I/O.
//!
//! ```rust
//! use flightdeck::mavlink::decode_datagram;
//!
//! // MAVLink v1 MISSION_CURRENT (#42) with seq = 7
//! let mut datagram = vec![0xFE, 22, 0, 1, 1, 42];
//! let mut payload = vec![0u8; 22];
//! payload[4..6].copy_from_slice(&7u16.to_le_bytes());
//! datagram.extend(payload);
//!
//! let fields = decode_datagram(&datagram).unwrap();
//! assert_eq!(fields[0].topic, "mission.current");
//! assert_eq!(fields[0].value, 7.0);
//! ```

pub mod catalogue;
pub mod decoder;
pub mod frame;

pub use catalogue::{ChannelBlock, FieldLayout, FieldSpec, MessageLayout};
pub use decoder::{DecodedField, decode, decode_datagram};
pub use frame::{Detection, MAVLINK_V1_STX, MAVLINK_V2_STX, ProtocolFrame, ProtocolVersion, detect};
