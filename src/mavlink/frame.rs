//! MAVLink frame detection and header extraction
//!
//! Classifies a datagram by its first byte and slices out the common header
//! fields. No sequence, CRC or signature checks are made: the decoder trusts
//! the frame structure and relies on per-message length guards instead.
//!
//! ```text
//! v1: [0xFE][len][seq][sysid][compid][msgid][payload...]
//! v2: [0xFD][len][incompat][compat][seq][sysid][compid][id_lo][id_mid][id_hi][payload...]
//! ```

use serde::{Deserialize, Serialize};

use crate::{Result, TelemetryError};

/// Start-of-frame marker for MAVLink v1
pub const MAVLINK_V1_STX: u8 = 0xFE;
/// Start-of-frame marker for MAVLink v2
pub const MAVLINK_V2_STX: u8 = 0xFD;

const V1_HEADER_LEN: usize = 6;
const V2_HEADER_LEN: usize = 10;

/// MAVLink wire protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    /// Header length in bytes, i.e. where the payload begins
    pub const fn header_len(&self) -> usize {
        match self {
            ProtocolVersion::V1 => V1_HEADER_LEN,
            ProtocolVersion::V2 => V2_HEADER_LEN,
        }
    }

    /// Sync byte that introduces a frame of this version
    pub const fn stx(&self) -> u8 {
        match self {
            ProtocolVersion::V1 => MAVLINK_V1_STX,
            ProtocolVersion::V2 => MAVLINK_V2_STX,
        }
    }
}

/// Header view over a received datagram.
///
/// Transient: scoped to a single decode call and never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolFrame {
    /// Wire version the frame was sent with
    pub version: ProtocolVersion,
    /// Payload length as declared in the header
    pub payload_length: usize,
    /// Message id (8-bit in v1, 24-bit in v2)
    pub message_id: u32,
    /// Byte offset of the payload within the datagram
    pub payload_offset: usize,
}

impl ProtocolFrame {
    /// Payload bytes actually present in `datagram`.
    ///
    /// Capped at both the declared length and the end of the datagram, so a
    /// frame that over-declares its length yields a shorter slice instead of
    /// reading out of bounds.
    pub fn payload<'a>(&self, datagram: &'a [u8]) -> &'a [u8] {
        let start = self.payload_offset.min(datagram.len());
        let end = self.payload_offset.saturating_add(self.payload_length).min(datagram.len());
        &datagram[start..end]
    }
}

/// Result of classifying a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// A v1 or v2 frame with its header fields
    Frame(ProtocolFrame),
    /// First byte is not a MAVLink sync marker
    Unrecognized,
}

/// Classify a datagram and extract its header.
///
/// Unknown sync bytes (including empty datagrams) are expected noise on a
/// shared port and come back as [`Detection::Unrecognized`]. A valid sync
/// byte followed by fewer header bytes than the version requires is an
/// error.
pub fn detect(datagram: &[u8]) -> Result<Detection> {
    let version = match datagram.first() {
        Some(&MAVLINK_V1_STX) => ProtocolVersion::V1,
        Some(&MAVLINK_V2_STX) => ProtocolVersion::V2,
        _ => return Ok(Detection::Unrecognized),
    };

    let header_len = version.header_len();
    if datagram.len() < header_len {
        return Err(TelemetryError::truncated_frame(version.stx(), datagram.len(), header_len));
    }

    let payload_length = datagram[1] as usize;
    let message_id = match version {
        ProtocolVersion::V1 => datagram[5] as u32,
        ProtocolVersion::V2 => {
            u32::from(datagram[7]) | (u32::from(datagram[8]) << 8) | (u32::from(datagram[9]) << 16)
        }
    };

    Ok(Detection::Frame(ProtocolFrame {
        version,
        payload_length,
        message_id,
        payload_offset: header_len,
    }))
}
