//! Generic table-driven payload decoder

use tracing::trace;

use super::catalogue::{self, FieldLayout, MessageLayout};
use super::frame::{self, Detection, ProtocolVersion};
use crate::Result;

/// A named scalar extracted from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    /// Dotted topic, `<group>.<field>`
    pub topic: String,
    /// Value after scaling
    pub value: f64,
}

/// Decode a payload for a known message id.
///
/// Returns:
/// - `Ok(None)` - unknown message id, or `payload_len` below the message's
///   minimum length (nothing is emitted for either)
/// - `Ok(Some(fields))` - every field of the message, in table order
/// - `Err(e)` - a field lies beyond the bytes actually present in `payload`
///
/// Decoding is all-or-nothing: a failed read discards the whole message.
/// The field table does not depend on `version`.
pub fn decode(
    version: ProtocolVersion,
    message_id: u32,
    payload: &[u8],
    payload_len: usize,
) -> Result<Option<Vec<DecodedField>>> {
    let Some(layout) = catalogue::lookup(message_id) else {
        trace!(?version, message_id, "Unknown message id");
        return Ok(None);
    };

    if payload_len < layout.min_len {
        trace!(
            ?version,
            message = layout.name,
            payload_len,
            min_len = layout.min_len,
            "Payload shorter than minimum, skipping"
        );
        return Ok(None);
    }

    decode_layout(layout, payload).map(Some)
}

/// Extract every field of `layout` from `payload`.
pub fn decode_layout(layout: &MessageLayout, payload: &[u8]) -> Result<Vec<DecodedField>> {
    match layout.layout {
        FieldLayout::Fields(fields) => fields
            .iter()
            .map(|field| {
                let raw = field.field_type.read(payload, field.offset)?;
                Ok(DecodedField {
                    topic: format!("{}.{}", layout.group, field.name),
                    value: raw / field.scale,
                })
            })
            .collect(),
        FieldLayout::Channels(block) => (0..block.count)
            .map(|index| {
                let raw = block.field_type.read(payload, block.base_offset + index * block.stride)?;
                Ok(DecodedField {
                    topic: format!("{}.{}{}", layout.group, block.prefix, index + 1),
                    value: raw,
                })
            })
            .collect(),
    }
}

/// Run frame detection and payload decoding over a whole datagram.
///
/// Unrecognized datagrams, unknown ids and undersized payloads all yield an
/// empty vector; only structural failures are errors.
pub fn decode_datagram(datagram: &[u8]) -> Result<Vec<DecodedField>> {
    let frame = match frame::detect(datagram)? {
        Detection::Frame(frame) => frame,
        Detection::Unrecognized => return Ok(Vec::new()),
    };

    let payload = frame.payload(datagram);
    let fields = decode(frame.version, frame.message_id, payload, frame.payload_length)?;
    Ok(fields.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{encode_v1, encode_v2, sys_status_payload};
    use proptest::prelude::*;

    fn attitude_payload(values: [f32; 6]) -> Vec<u8> {
        let mut payload = vec![0u8; 28];
        for (i, value) in values.iter().enumerate() {
            let offset = 4 + i * 4;
            payload[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
        payload
    }

    proptest! {
        #[test]
        fn prop_v1_attitude_decodes_six_floats(values in prop::array::uniform6(-10.0f32..10.0)) {
            let datagram = encode_v1(30, &attitude_payload(values));
            let fields = decode_datagram(&datagram).unwrap();

            let topics: Vec<&str> = fields.iter().map(|f| f.topic.as_str()).collect();
            prop_assert_eq!(topics, vec![
                "attitude.roll", "attitude.pitch", "attitude.yaw",
                "attitude.rollspeed", "attitude.pitchspeed", "attitude.yawspeed",
            ]);
            for (field, value) in fields.iter().zip(values.iter()) {
                prop_assert_eq!(field.value, f64::from(*value));
            }
        }

        #[test]
        fn prop_undersized_payloads_emit_nothing(
            layout_index in 0..catalogue::CATALOGUE.len(),
            fill in any::<u8>(),
        ) {
            let layout = &catalogue::CATALOGUE[layout_index];
            for len in 0..layout.min_len {
                let payload = vec![fill; len];
                let decoded = decode(ProtocolVersion::V2, layout.id, &payload, len);
                prop_assert!(matches!(decoded, Ok(None)));
            }
        }

        #[test]
        fn prop_arbitrary_datagrams_never_panic(datagram in prop::collection::vec(any::<u8>(), 0..300)) {
            let _ = decode_datagram(&datagram);
        }
    }

    #[test]
    fn v2_sys_status_scales_battery_fields() {
        let datagram = encode_v2(1, &sys_status_payload(12_600, 250, 75));
        let fields = decode_datagram(&datagram).unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].topic, "battery.voltage");
        assert!((fields[0].value - 12.6).abs() < 1e-9);
        assert_eq!(fields[1].topic, "battery.current");
        assert!((fields[1].value - 2.5).abs() < 1e-9);
        assert_eq!(fields[2].topic, "battery.remaining");
        assert_eq!(fields[2].value, 75.0);
    }

    #[test]
    fn rc_channels_decode_in_ascending_order() {
        let mut payload = vec![0u8; 36];
        for k in 1..=8u16 {
            let offset = 4 + (k as usize - 1) * 2;
            payload[offset..offset + 2].copy_from_slice(&(1000 + k * 100).to_le_bytes());
        }

        let fields = decode_datagram(&encode_v1(35, &payload)).unwrap();
        assert_eq!(fields.len(), 8);
        for (index, field) in fields.iter().enumerate() {
            let k = index + 1;
            assert_eq!(field.topic, format!("rc.ch{k}"));
            assert_eq!(field.value, (1000 + k * 100) as f64);
        }
    }

    #[test]
    fn v1_and_v2_decode_identically() {
        let payload = sys_status_payload(11_100, -120, 42);
        let v1 = decode_datagram(&encode_v1(1, &payload)).unwrap();
        let v2 = decode_datagram(&encode_v2(1, &payload)).unwrap();
        assert_eq!(v1, v2);
    }

    #[test]
    fn negative_scaled_values_keep_sign() {
        let mut payload = vec![0u8; 28];
        payload[4..8].copy_from_slice(&(-337_000_000i32).to_le_bytes());
        payload[20..22].copy_from_slice(&(-150i16).to_le_bytes());

        let fields = decode_datagram(&encode_v2(33, &payload)).unwrap();
        let lat = fields.iter().find(|f| f.topic == "gps.lat").unwrap();
        let vx = fields.iter().find(|f| f.topic == "gps.vx").unwrap();
        assert!((lat.value + 33.7).abs() < 1e-9);
        assert!((vx.value + 1.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_message_id_is_silently_ignored() {
        let datagram = encode_v2(0x00_0F_42, &[0u8; 40]);
        assert!(decode_datagram(&datagram).unwrap().is_empty());
    }

    #[test]
    fn over_declared_length_is_an_error_not_a_partial_decode() {
        // Header claims 28 bytes of ATTITUDE payload but only 10 arrive
        let mut datagram = encode_v1(30, &[0u8; 28]);
        datagram.truncate(6 + 10);
        assert!(decode_datagram(&datagram).is_err());
    }

    #[test]
    fn field_past_declared_length_discards_whole_message() {
        // POSITION_TARGET_GLOBAL_INT accepts 14 bytes but alt needs 16
        let payload = vec![0x11u8; 14];
        let datagram = encode_v2(87, &payload);
        let err = decode_datagram(&datagram).unwrap_err();
        assert!(matches!(err, crate::TelemetryError::Memory { offset: 12, .. }));
    }

    #[test]
    fn unrecognized_datagram_yields_no_fields() {
        assert!(decode_datagram(&[0x42]).unwrap().is_empty());
    }

    /// Zeroed payload with little-endian values written at fixed offsets
    struct Payload(Vec<u8>);

    impl Payload {
        fn new(len: usize) -> Self {
            Self(vec![0; len])
        }

        fn put(mut self, offset: usize, bytes: &[u8]) -> Self {
            self.0[offset..offset + bytes.len()].copy_from_slice(bytes);
            self
        }
    }

    fn assert_decoded(fields: &[DecodedField], expected: &[(&str, f64)]) {
        let topics: Vec<&str> = fields.iter().map(|f| f.topic.as_str()).collect();
        let expected_topics: Vec<&str> = expected.iter().map(|(topic, _)| *topic).collect();
        assert_eq!(topics, expected_topics);
        for (field, (topic, value)) in fields.iter().zip(expected) {
            assert!((field.value - value).abs() < 1e-9, "{topic}: got {}, expected {value}", field.value);
        }
    }

    #[test]
    fn gps_raw_int_reads_satellites_from_high_vdop_byte() {
        let payload = Payload::new(44)
            .put(4, &473_977_420i32.to_le_bytes())
            .put(8, &85_455_940i32.to_le_bytes())
            .put(12, &488_000u32.to_le_bytes())
            .put(20, &121u16.to_le_bytes())
            .put(22, &0x0203u16.to_le_bytes());

        let fields = decode_datagram(&encode_v1(24, &payload.0)).unwrap();
        assert_decoded(
            &fields,
            &[
                ("gps_raw.lat", 47.397742),
                ("gps_raw.lon", 8.545594),
                ("gps_raw.alt", 488.0),
                ("gps_raw.hdop", 1.21),
                ("gps_raw.vdop", 5.15),
                ("gps_raw.satellites", 2.0),
            ],
        );
    }

    #[test]
    fn local_position_ned_decodes_position_and_velocity() {
        let values = [1.5f32, -2.25, -10.0, 0.5, 0.25, -0.125];
        let mut payload = Payload::new(28);
        for (i, value) in values.iter().enumerate() {
            payload = payload.put(4 + i * 4, &value.to_le_bytes());
        }

        let fields = decode_datagram(&encode_v2(32, &payload.0)).unwrap();
        assert_decoded(
            &fields,
            &[
                ("local_position.x", 1.5),
                ("local_position.y", -2.25),
                ("local_position.z", -10.0),
                ("local_position.vx", 0.5),
                ("local_position.vy", 0.25),
                ("local_position.vz", -0.125),
            ],
        );
    }

    #[test]
    fn global_position_int_scales_every_field() {
        let payload = Payload::new(28)
            .put(4, &473_977_420i32.to_le_bytes())
            .put(8, &85_455_940i32.to_le_bytes())
            .put(12, &488_123i32.to_le_bytes())
            .put(16, &12_345i32.to_le_bytes())
            .put(20, &(-150i16).to_le_bytes())
            .put(22, &250i16.to_le_bytes())
            .put(24, &10i16.to_le_bytes())
            .put(26, &27_050u16.to_le_bytes());

        let fields = decode_datagram(&encode_v1(33, &payload.0)).unwrap();
        assert_decoded(
            &fields,
            &[
                ("gps.lat", 47.397742),
                ("gps.lon", 8.545594),
                ("gps.alt", 488.123),
                ("gps.relative_alt", 12.345),
                ("gps.vx", -1.5),
                ("gps.vy", 2.5),
                ("gps.vz", 0.1),
                ("gps.hdg", 270.5),
            ],
        );
    }

    #[test]
    fn servo_outputs_are_numbered_from_one() {
        let mut payload = Payload::new(22);
        for i in 0..8u16 {
            payload = payload.put(4 + usize::from(i) * 2, &(1100 + i * 50).to_le_bytes());
        }

        let fields = decode_datagram(&encode_v2(36, &payload.0)).unwrap();
        assert_decoded(
            &fields,
            &[
                ("servo.1", 1100.0),
                ("servo.2", 1150.0),
                ("servo.3", 1200.0),
                ("servo.4", 1250.0),
                ("servo.5", 1300.0),
                ("servo.6", 1350.0),
                ("servo.7", 1400.0),
                ("servo.8", 1450.0),
            ],
        );
    }

    #[test]
    fn vfr_hud_decodes_speeds_and_heading() {
        let payload = Payload::new(20)
            .put(4, &12.5f32.to_le_bytes())
            .put(8, &14.75f32.to_le_bytes())
            .put(12, &275u16.to_le_bytes());

        let fields = decode_datagram(&encode_v1(74, &payload.0)).unwrap();
        assert_decoded(
            &fields,
            &[("vfr.airspeed", 12.5), ("vfr.groundspeed", 14.75), ("vfr.heading", 275.0)],
        );
    }

    #[test]
    fn position_target_local_ned_decodes_xyz() {
        let payload = Payload::new(18)
            .put(4, &10.5f32.to_le_bytes())
            .put(8, &(-3.0f32).to_le_bytes())
            .put(12, &(-20.0f32).to_le_bytes());

        let fields = decode_datagram(&encode_v2(85, &payload.0)).unwrap();
        assert_decoded(
            &fields,
            &[("target_local.x", 10.5), ("target_local.y", -3.0), ("target_local.z", -20.0)],
        );
    }

    #[test]
    fn position_target_global_int_scales_lat_lon() {
        let payload = Payload::new(16)
            .put(4, &(-337_000_000i32).to_le_bytes())
            .put(8, &1_512_000_000i32.to_le_bytes())
            .put(12, &120.5f32.to_le_bytes());

        let fields = decode_datagram(&encode_v2(87, &payload.0)).unwrap();
        assert_decoded(
            &fields,
            &[("target.lat", -33.7), ("target.lon", 151.2), ("target.alt", 120.5)],
        );
    }

    #[test]
    fn high_latency_uses_packed_offsets() {
        let payload = Payload::new(22)
            .put(4, &3u16.to_le_bytes())
            .put(6, &473_977_420i32.to_le_bytes())
            .put(10, &(-1_223_000_000i32).to_le_bytes())
            .put(14, &(-15i16).to_le_bytes())
            .put(16, &120i16.to_le_bytes())
            .put(18, &5000u16.to_le_bytes())
            .put(20, &[7, 0x81]);

        let fields = decode_datagram(&encode_v1(105, &payload.0)).unwrap();
        assert_decoded(
            &fields,
            &[
                ("high_latency.custom_mode", 3.0),
                ("high_latency.lat", 47.397742),
                ("high_latency.lon", -122.3),
                ("high_latency.alt", -15.0),
                ("high_latency.target_alt", 120.0),
                ("high_latency.target_distance", 5000.0),
                ("high_latency.wp_num", 7.0),
                ("high_latency.failure_flags", 129.0),
            ],
        );
    }

    #[test]
    fn battery_status_scales_current_and_signs_remaining() {
        let payload = Payload::new(36)
            .put(4, &1250i32.to_le_bytes())
            .put(8, &4200i32.to_le_bytes())
            .put(12, &2350i16.to_le_bytes())
            .put(14, &(-1520i16).to_le_bytes())
            .put(16, &(-1i8).to_le_bytes());

        let fields = decode_datagram(&encode_v2(147, &payload.0)).unwrap();
        assert_decoded(
            &fields,
            &[
                ("battery_status.consumed", 1250.0),
                ("battery_status.energy", 4200.0),
                ("battery_status.temperature", 2350.0),
                ("battery_status.current", -15.2),
                ("battery_status.remaining", -1.0),
            ],
        );
    }
}
