//! Static catalogue of supported MAVLink message layouts
//!
//! Each entry maps a message id to a topic group, a minimum payload length
//! and the fields to extract. Offsets are relative to the payload start and
//! are identical for v1 and v2 frames.
//!
//! Scaled fields are divided by their `scale` after extraction, e.g.
//! `SYS_STATUS.voltage_battery` is millivolts on the wire and published in
//! volts.

use serde::Serialize;

use crate::types::FieldType;

/// One scalar field at a fixed payload offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Field name, the part of the topic after the group
    pub name: &'static str,
    /// Byte offset from the payload start
    pub offset: usize,
    /// Wire encoding
    pub field_type: FieldType,
    /// Divisor applied to the raw value (1.0 for unscaled fields)
    pub scale: f64,
}

/// A run of identically typed channels at a uniform stride
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelBlock {
    /// Prepended to the 1-based channel number (`ch` gives `rc.ch1`)
    pub prefix: &'static str,
    /// Offset of the first channel
    pub base_offset: usize,
    /// Distance between consecutive channels in bytes
    pub stride: usize,
    /// Number of channels
    pub count: usize,
    /// Wire encoding of every channel
    pub field_type: FieldType,
}

/// Field extraction plan for a message
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FieldLayout {
    /// Named fields in publish order
    Fields(&'static [FieldSpec]),
    /// Indexed channels in ascending order
    Channels(ChannelBlock),
}

/// Decode layout for one message id
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MessageLayout {
    /// MAVLink message id
    pub id: u32,
    /// MAVLink message name
    pub name: &'static str,
    /// Topic group prefix
    pub group: &'static str,
    /// Payloads declaring fewer bytes are skipped entirely
    pub min_len: usize,
    /// Fields to extract
    pub layout: FieldLayout,
}

impl MessageLayout {
    /// Number of samples one message of this type produces
    pub fn field_count(&self) -> usize {
        match self.layout {
            FieldLayout::Fields(fields) => fields.len(),
            FieldLayout::Channels(block) => block.count,
        }
    }

    /// Topic names this message publishes, in order
    pub fn topics(&self) -> Vec<String> {
        match self.layout {
            FieldLayout::Fields(fields) => {
                fields.iter().map(|field| format!("{}.{}", self.group, field.name)).collect()
            }
            FieldLayout::Channels(block) => (1..=block.count)
                .map(|channel| format!("{}.{}{}", self.group, block.prefix, channel))
                .collect(),
        }
    }
}

const fn raw(name: &'static str, offset: usize, field_type: FieldType) -> FieldSpec {
    FieldSpec { name, offset, field_type, scale: 1.0 }
}

const fn scaled(name: &'static str, offset: usize, field_type: FieldType, scale: f64) -> FieldSpec {
    FieldSpec { name, offset, field_type, scale }
}

use FieldType::{Float32, Int8, Int16, Int32, UInt8, UInt16, UInt32};

const SYS_STATUS: &[FieldSpec] = &[
    scaled("voltage", 14, UInt16, 1000.0),
    scaled("current", 16, Int16, 100.0),
    raw("remaining", 28, Int8),
];

const GPS_RAW_INT: &[FieldSpec] = &[
    scaled("lat", 4, Int32, 1e7),
    scaled("lon", 8, Int32, 1e7),
    scaled("alt", 12, UInt32, 1000.0),
    scaled("hdop", 20, UInt16, 100.0),
    scaled("vdop", 22, UInt16, 100.0),
    // Overlaps the high byte of vdop; kept for compatibility with existing dashboards
    raw("satellites", 23, UInt8),
];

const ATTITUDE: &[FieldSpec] = &[
    raw("roll", 4, Float32),
    raw("pitch", 8, Float32),
    raw("yaw", 12, Float32),
    raw("rollspeed", 16, Float32),
    raw("pitchspeed", 20, Float32),
    raw("yawspeed", 24, Float32),
];

const LOCAL_POSITION_NED: &[FieldSpec] = &[
    raw("x", 4, Float32),
    raw("y", 8, Float32),
    raw("z", 12, Float32),
    raw("vx", 16, Float32),
    raw("vy", 20, Float32),
    raw("vz", 24, Float32),
];

const GLOBAL_POSITION_INT: &[FieldSpec] = &[
    scaled("lat", 4, Int32, 1e7),
    scaled("lon", 8, Int32, 1e7),
    scaled("alt", 12, Int32, 1000.0),
    scaled("relative_alt", 16, Int32, 1000.0),
    scaled("vx", 20, Int16, 100.0),
    scaled("vy", 22, Int16, 100.0),
    scaled("vz", 24, Int16, 100.0),
    scaled("hdg", 26, UInt16, 100.0),
];

const MISSION_CURRENT: &[FieldSpec] = &[raw("current", 4, UInt16)];

const VFR_HUD: &[FieldSpec] = &[
    raw("airspeed", 4, Float32),
    raw("groundspeed", 8, Float32),
    raw("heading", 12, UInt16),
];

const POSITION_TARGET_LOCAL_NED: &[FieldSpec] =
    &[raw("x", 4, Float32), raw("y", 8, Float32), raw("z", 12, Float32)];

const POSITION_TARGET_GLOBAL_INT: &[FieldSpec] = &[
    scaled("lat", 4, Int32, 1e7),
    scaled("lon", 8, Int32, 1e7),
    raw("alt", 12, Float32),
];

const HIGH_LATENCY: &[FieldSpec] = &[
    raw("custom_mode", 4, UInt16),
    scaled("lat", 6, Int32, 1e7),
    scaled("lon", 10, Int32, 1e7),
    raw("alt", 14, Int16),
    raw("target_alt", 16, Int16),
    raw("target_distance", 18, UInt16),
    raw("wp_num", 20, UInt8),
    raw("failure_flags", 21, UInt8),
];

const BATTERY_STATUS: &[FieldSpec] = &[
    raw("consumed", 4, Int32),
    raw("energy", 8, Int32),
    raw("temperature", 12, Int16),
    scaled("current", 14, Int16, 100.0),
    raw("remaining", 16, Int8),
];

const RC_CHANNELS: ChannelBlock =
    ChannelBlock { prefix: "ch", base_offset: 4, stride: 2, count: 8, field_type: UInt16 };

const SERVO_OUTPUTS: ChannelBlock =
    ChannelBlock { prefix: "", base_offset: 4, stride: 2, count: 8, field_type: UInt16 };

/// Every supported message, ordered by message id
pub static CATALOGUE: &[MessageLayout] = &[
    MessageLayout {
        id: 1,
        name: "SYS_STATUS",
        group: "battery",
        min_len: 31,
        layout: FieldLayout::Fields(SYS_STATUS),
    },
    MessageLayout {
        id: 24,
        name: "GPS_RAW_INT",
        group: "gps_raw",
        min_len: 44,
        layout: FieldLayout::Fields(GPS_RAW_INT),
    },
    MessageLayout {
        id: 30,
        name: "ATTITUDE",
        group: "attitude",
        min_len: 28,
        layout: FieldLayout::Fields(ATTITUDE),
    },
    MessageLayout {
        id: 32,
        name: "LOCAL_POSITION_NED",
        group: "local_position",
        min_len: 28,
        layout: FieldLayout::Fields(LOCAL_POSITION_NED),
    },
    MessageLayout {
        id: 33,
        name: "GLOBAL_POSITION_INT",
        group: "gps",
        min_len: 28,
        layout: FieldLayout::Fields(GLOBAL_POSITION_INT),
    },
    MessageLayout {
        id: 35,
        name: "RC_CHANNELS_RAW",
        group: "rc",
        min_len: 36,
        layout: FieldLayout::Channels(RC_CHANNELS),
    },
    MessageLayout {
        id: 36,
        name: "SERVO_OUTPUT_RAW",
        group: "servo",
        min_len: 22,
        layout: FieldLayout::Channels(SERVO_OUTPUTS),
    },
    MessageLayout {
        id: 42,
        name: "MISSION_CURRENT",
        group: "mission",
        min_len: 22,
        layout: FieldLayout::Fields(MISSION_CURRENT),
    },
    MessageLayout {
        id: 74,
        name: "VFR_HUD",
        group: "vfr",
        min_len: 14,
        layout: FieldLayout::Fields(VFR_HUD),
    },
    MessageLayout {
        id: 85,
        name: "POSITION_TARGET_LOCAL_NED",
        group: "target_local",
        min_len: 18,
        layout: FieldLayout::Fields(POSITION_TARGET_LOCAL_NED),
    },
    MessageLayout {
        id: 87,
        name: "POSITION_TARGET_GLOBAL_INT",
        group: "target",
        min_len: 14,
        layout: FieldLayout::Fields(POSITION_TARGET_GLOBAL_INT),
    },
    MessageLayout {
        id: 105,
        name: "HIGH_LATENCY",
        group: "high_latency",
        min_len: 22,
        layout: FieldLayout::Fields(HIGH_LATENCY),
    },
    MessageLayout {
        id: 147,
        name: "BATTERY_STATUS",
        group: "battery_status",
        min_len: 36,
        layout: FieldLayout::Fields(BATTERY_STATUS),
    },
];

/// Look up the layout for a message id.
pub fn lookup(message_id: u32) -> Option<&'static MessageLayout> {
    CATALOGUE.iter().find(|layout| layout.id == message_id)
}

/// Every supported message, in ascending id order.
pub fn all() -> &'static [MessageLayout] {
    CATALOGUE
}
