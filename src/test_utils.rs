//! Test utilities for building synthetic telemetry
//!
//! This module provides MAVLink frame builders, an in-memory datagram
//! source and a ULog file builder, shared by unit tests and benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use std::net::SocketAddr;
use tokio::sync::mpsc;

use crate::Result;
use crate::mavlink::{MAVLINK_V1_STX, MAVLINK_V2_STX};
use crate::source::DatagramSource;
use crate::ulog::format::ULOG_MAGIC;

/// Encode a MAVLink v1 frame around `payload`.
///
/// Sequence, system and component ids are fixed; the two checksum bytes
/// are zero since the decoder never validates them.
pub fn encode_v1(message_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(6 + payload.len() + 2);
    frame.extend_from_slice(&[MAVLINK_V1_STX, payload.len() as u8, 0, 1, 1, message_id]);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&[0, 0]);
    frame
}

/// Encode a MAVLink v2 frame around `payload` with a 24-bit message id.
pub fn encode_v2(message_id: u32, payload: &[u8]) -> Vec<u8> {
    let id = message_id.to_le_bytes();
    let mut frame = Vec::with_capacity(10 + payload.len() + 2);
    frame.extend_from_slice(&[MAVLINK_V2_STX, payload.len() as u8, 0, 0, 0, 1, 1, id[0], id[1], id[2]]);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&[0, 0]);
    frame
}

/// SYS_STATUS payload with the battery fields set.
///
/// `voltage_mv` in millivolts, `current_ca` in centiamperes, `remaining`
/// in percent.
pub fn sys_status_payload(voltage_mv: u16, current_ca: i16, remaining: i8) -> Vec<u8> {
    let mut payload = vec![0u8; 31];
    payload[14..16].copy_from_slice(&voltage_mv.to_le_bytes());
    payload[16..18].copy_from_slice(&current_ca.to_le_bytes());
    payload[28] = remaining as u8;
    payload
}

/// RC_CHANNELS_RAW payload with the given eight channel values
pub fn rc_channels_payload(channels: [u16; 8]) -> Vec<u8> {
    let mut payload = vec![0u8; 36];
    for (i, value) in channels.iter().enumerate() {
        let offset = 4 + i * 2;
        payload[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
    payload
}

/// Datagram source fed from an in-memory channel.
///
/// The source ends when every sender is dropped.
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ChannelSource {
    pub fn new() -> (mpsc::UnboundedSender<Vec<u8>>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }
}

#[async_trait::async_trait]
impl DatagramSource for ChannelSource {
    async fn next_datagram(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.receiver.recv().await {
            Some(datagram) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok(Some(len))
            }
            None => Ok(None),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Builder for synthetic ULog files.
///
/// Messages are written in call order, so definitions must come before the
/// first subscription to land in the definitions section.
#[derive(Debug, Clone)]
pub struct UlogBuilder {
    start_us: u64,
    messages: Vec<u8>,
}

impl UlogBuilder {
    pub fn new(start_us: u64) -> Self {
        Self { start_us, messages: Vec::new() }
    }

    /// Append a raw message
    pub fn message(mut self, message_type: u8, body: &[u8]) -> Self {
        self.messages.extend_from_slice(&(body.len() as u16).to_le_bytes());
        self.messages.push(message_type);
        self.messages.extend_from_slice(body);
        self
    }

    pub fn flag_bits(self, compat: [u8; 8], incompat: [u8; 8]) -> Self {
        let mut body = Vec::with_capacity(40);
        body.extend_from_slice(&compat);
        body.extend_from_slice(&incompat);
        body.extend_from_slice(&[0u8; 24]);
        self.message(b'B', &body)
    }

    /// Format definition, e.g. `name:uint64_t timestamp;float x;`
    pub fn format(self, definition: &str) -> Self {
        self.message(b'F', definition.as_bytes())
    }

    /// Info message; `key` is `type name`
    pub fn info(self, key: &str, value: &[u8]) -> Self {
        let body = keyed(key, value);
        self.message(b'I', &body)
    }

    /// Parameter message; `key` is `type name`
    pub fn parameter(self, key: &str, value: &[u8]) -> Self {
        let body = keyed(key, value);
        self.message(b'P', &body)
    }

    pub fn subscribe(self, msg_id: u16, multi_id: u8, format_name: &str) -> Self {
        let mut body = vec![multi_id];
        body.extend_from_slice(&msg_id.to_le_bytes());
        body.extend_from_slice(format_name.as_bytes());
        self.message(b'A', &body)
    }

    pub fn data(self, msg_id: u16, payload: &[u8]) -> Self {
        let mut body = msg_id.to_le_bytes().to_vec();
        body.extend_from_slice(payload);
        self.message(b'D', &body)
    }

    /// Logged string; `level` is the ASCII digit PX4 writes, e.g. `b'6'`
    pub fn logging(self, level: u8, timestamp_us: u64, text: &str) -> Self {
        let mut body = vec![level];
        body.extend_from_slice(&timestamp_us.to_le_bytes());
        body.extend_from_slice(text.as_bytes());
        self.message(b'L', &body)
    }

    pub fn tagged_logging(self, level: u8, tag: u16, timestamp_us: u64, text: &str) -> Self {
        let mut body = vec![level];
        body.extend_from_slice(&tag.to_le_bytes());
        body.extend_from_slice(&timestamp_us.to_le_bytes());
        body.extend_from_slice(text.as_bytes());
        self.message(b'C', &body)
    }

    pub fn dropout(self, duration_ms: u16) -> Self {
        self.message(b'O', &duration_ms.to_le_bytes())
    }

    pub fn build(self) -> Vec<u8> {
        let mut file = Vec::with_capacity(16 + self.messages.len());
        file.extend_from_slice(&ULOG_MAGIC);
        file.push(1);
        file.extend_from_slice(&self.start_us.to_le_bytes());
        file.extend_from_slice(&self.messages);
        file
    }
}

fn keyed(key: &str, value: &[u8]) -> Vec<u8> {
    let mut body = vec![key.len() as u8];
    body.extend_from_slice(key.as_bytes());
    body.extend_from_slice(value);
    body
}

/// A ULog file with one attitude topic sampled `samples` times at 50 Hz
pub fn attitude_ulog(samples: u64) -> Vec<u8> {
    let mut builder = UlogBuilder::new(0)
        .format("vehicle_attitude:uint64_t timestamp;float[4] q;float rollspeed;uint8_t[4] _padding0;")
        .info("char[10] sys_name", b"PX4\0\0\0\0\0\0\0")
        .subscribe(0, 0, "vehicle_attitude");

    for i in 0..samples {
        let mut payload = (i * 20_000).to_le_bytes().to_vec();
        for v in [1.0f32, 0.0, 0.0, 0.0, 0.25] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        builder = builder.data(0, &payload);
    }
    builder.build()
}
