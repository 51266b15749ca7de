//! Shared helpers for integration tests

#![allow(dead_code)]

use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// MAVLink v1 frame with zeroed checksum bytes
pub fn encode_v1(message_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0xFE, payload.len() as u8, 0, 1, 1, message_id];
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&[0, 0]);
    frame
}

/// ATTITUDE (#30) payload carrying the six given floats
pub fn attitude_payload(values: [f32; 6]) -> Vec<u8> {
    let mut payload = vec![0u8; 28];
    for (i, value) in values.iter().enumerate() {
        let offset = 4 + i * 4;
        payload[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
    payload
}

/// MISSION_CURRENT (#42) payload with the given sequence number
pub fn mission_payload(seq: u16) -> Vec<u8> {
    let mut payload = vec![0u8; 22];
    payload[4..6].copy_from_slice(&seq.to_le_bytes());
    payload
}

/// Minimal ULog file: one `sensor_baro` topic sampled every 10 ms
pub fn baro_ulog(samples: u64) -> Vec<u8> {
    let mut messages = Vec::new();
    push_message(&mut messages, b'F', b"sensor_baro:uint64_t timestamp;float pressure;float temperature;");
    push_message(&mut messages, b'A', b"\x00\x03\x00sensor_baro");

    for i in 0..samples {
        let mut body = 3u16.to_le_bytes().to_vec();
        body.extend_from_slice(&(1_000_000 + i * 10_000).to_le_bytes());
        body.extend_from_slice(&1013.25f32.to_le_bytes());
        body.extend_from_slice(&21.5f32.to_le_bytes());
        push_message(&mut messages, b'D', &body);
    }

    let mut file = vec![0x55, 0x4C, 0x6F, 0x67, 0x01, 0x12, 0x35, 0x01];
    file.extend_from_slice(&0u64.to_le_bytes());
    file.extend_from_slice(&messages);
    file
}

fn push_message(out: &mut Vec<u8>, message_type: u8, body: &[u8]) {
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.push(message_type);
    out.extend_from_slice(body);
}
