//! Per-message summary of a ULog file, as served to the log viewer

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;

use super::format::{FieldValue, Formats, fields_to_json};
use super::reader::{DataRecord, LogMessage, LoggedString, UlogReader};
use crate::Result;

/// Default cap on stored rows per message
pub const DEFAULT_MAX_SAMPLES_PER_MESSAGE: usize = 5000;

/// Duration assumed when a file carries no usable time range
const FALLBACK_DURATION_SECS: f64 = 300.0;

/// Descriptions of common uORB field names
const FIELD_DESCRIPTIONS: &[(&str, &str)] = &[
    ("timestamp", "Timestamp in microseconds"),
    ("timestamp_sample", "Timestamp of the sensor sample"),
    ("x", "X position in meters"),
    ("y", "Y position in meters"),
    ("z", "Z position in meters"),
    ("vx", "X velocity in m/s"),
    ("vy", "Y velocity in m/s"),
    ("vz", "Z velocity in m/s"),
    ("ax", "X acceleration in m/s²"),
    ("ay", "Y acceleration in m/s²"),
    ("az", "Z acceleration in m/s²"),
    ("gyro_rad", "Angular velocity in rad/s"),
    ("accelerometer_m_s2", "Acceleration in m/s²"),
    ("magnetometer_ga", "Magnetic field in Gauss"),
    ("baro_alt_meter", "Barometric altitude in meters"),
    ("baro_temp_celcius", "Barometric temperature in Celsius"),
    ("voltage_v", "Battery voltage in volts"),
    ("current_a", "Battery current in amperes"),
    ("remaining", "Remaining capacity percentage"),
    ("temperature", "Temperature in Celsius"),
    ("lat", "Latitude in degrees"),
    ("lon", "Longitude in degrees"),
    ("alt", "Altitude in meters"),
    ("heading", "Heading in radians"),
    ("q", "Quaternion representing vehicle attitude"),
    ("roll", "Roll angle in radians"),
    ("pitch", "Pitch angle in radians"),
    ("yaw", "Yaw angle in radians"),
    ("groundspeed", "Ground speed in m/s"),
    ("airspeed", "Airspeed in m/s"),
    ("throttle", "Throttle position (0-1)"),
    ("flaps", "Flap position"),
    ("gear", "Landing gear position"),
    ("mode", "Flight mode"),
    ("nav_state", "Navigation state"),
    ("arming_state", "Arming state"),
    ("failsafe", "Failsafe state"),
    ("gps_fix", "GPS fix type"),
    ("satellites_used", "Number of satellites used"),
    ("hdop", "Horizontal dilution of precision"),
    ("vdop", "Vertical dilution of precision"),
    ("eph", "Estimated horizontal position error"),
    ("epv", "Estimated vertical position error"),
];

/// Human-readable description of a field
pub fn describe_field(name: &str, type_name: &str) -> String {
    FIELD_DESCRIPTIONS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, description)| description.to_string())
        .unwrap_or_else(|| format!("{name} field ({type_name})"))
}

/// Estimated sampling rate in Hz, rounded to the nearest integer.
///
/// Uses the message's own first and last timestamps when they differ,
/// otherwise the file's global time range, otherwise 300 seconds.
pub fn estimate_frequency(
    count: u64,
    first_us: Option<u64>,
    last_us: Option<u64>,
    global_range_us: Option<(u64, u64)>,
) -> u64 {
    if count == 0 {
        return 0;
    }

    let duration_secs = match (first_us, last_us) {
        (Some(first), Some(last)) if last > first => (last - first) as f64 / 1e6,
        _ => global_range_us
            .map(|(start, end)| end.saturating_sub(start) as f64 / 1e6)
            .filter(|d| *d > 0.0)
            .unwrap_or(FALLBACK_DURATION_SECS),
    };

    (count as f64 / duration_secs).round() as u64
}

/// Start and end of the logged data, microseconds as strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryHeader {
    pub magic: String,
    pub version: String,
    /// First timestamp in the log, or `"0"`
    pub timestamp: String,
    /// Data records plus logged strings
    pub message_count: u64,
    pub time_range: Option<TimeRange>,
    pub info: Map<String, Value>,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub fields: Vec<FieldSummary>,
    /// Decoded rows, capped per message
    pub data: Vec<Value>,
    pub message_count: u64,
    pub frequency: u64,
    pub last_update: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_timestamp_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_timestamp_us: Option<u64>,
}

/// Summary of a whole ULog file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    pub header: SummaryHeader,
    pub messages: BTreeMap<String, MessageSummary>,
    /// Logged strings, capped like message rows
    pub log_messages: Vec<LoggedString>,
    pub file_size: u64,
    /// Number of distinct messages
    pub message_count: usize,
}

impl LogSummary {
    /// Parse and summarise an in-memory ULog file
    pub fn from_bytes(data: impl Into<Vec<u8>>, max_samples_per_message: usize) -> Result<Self> {
        let reader = UlogReader::from_bytes(data)?;
        Self::from_reader(reader, max_samples_per_message)
    }

    /// Drain a reader into a summary
    pub fn from_reader(mut reader: UlogReader, max_samples_per_message: usize) -> Result<Self> {
        let mut builder = SummaryBuilder::new(max_samples_per_message);
        while let Some(message) = reader.read_next_message()? {
            builder.push(message, reader.formats());
        }
        let summary = builder.finish(&reader);

        info!(
            file_size = summary.file_size,
            messages = summary.message_count,
            records = summary.header.message_count,
            truncated = reader.is_truncated(),
            "Parsed ULog file"
        );
        Ok(summary)
    }
}

struct SummaryBuilder {
    max_samples: usize,
    messages: BTreeMap<String, MessageSummary>,
    logs: Vec<LoggedString>,
    record_count: u64,
    range: Option<(u64, u64)>,
}

impl SummaryBuilder {
    fn new(max_samples: usize) -> Self {
        Self { max_samples, messages: BTreeMap::new(), logs: Vec::new(), record_count: 0, range: None }
    }

    fn observe_timestamp(&mut self, timestamp_us: u64) {
        self.range = Some(match self.range {
            Some((start, end)) => (start.min(timestamp_us), end.max(timestamp_us)),
            None => (timestamp_us, timestamp_us),
        });
    }

    fn push(&mut self, message: LogMessage, formats: &Formats) {
        match message {
            LogMessage::Data(record) => self.push_record(record, formats),
            LogMessage::Logged(log) => {
                self.record_count += 1;
                self.observe_timestamp(log.timestamp_us);
                if self.logs.len() < self.max_samples {
                    self.logs.push(log);
                }
            }
            LogMessage::Parameter { .. } | LogMessage::Dropout { .. } => {}
        }
    }

    fn push_record(&mut self, record: DataRecord, formats: &Formats) {
        self.record_count += 1;
        let timestamp_us = record.timestamp_us();
        if let Some(ts) = timestamp_us {
            self.observe_timestamp(ts);
        }

        let summary = self.messages.entry(record.name.clone()).or_insert_with(|| MessageSummary {
            fields: formats
                .get(&record.name)
                .map(|format| {
                    format
                        .visible_fields()
                        .map(|field| FieldSummary {
                            name: field.name.clone(),
                            type_name: field.type_name.clone(),
                            description: describe_field(&field.name, &field.type_name),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            data: Vec::new(),
            message_count: 0,
            frequency: 0,
            last_update: chrono::Utc::now().to_rfc3339(),
            first_timestamp_us: None,
            last_timestamp_us: None,
        });

        summary.message_count += 1;
        if let Some(ts) = timestamp_us {
            summary.first_timestamp_us.get_or_insert(ts);
            summary.last_timestamp_us = Some(ts);
        }

        if summary.data.len() < self.max_samples {
            let mut row = Map::new();
            if let Some(ts) = timestamp_us {
                row.insert("timestampUs".into(), Value::from(ts));
                row.insert("timestampMs".into(), Value::from(ts as f64 / 1000.0));
            }
            row.extend(fields_to_json(&record.fields));
            summary.data.push(Value::Object(row));
        }
    }

    fn finish(mut self, reader: &UlogReader) -> LogSummary {
        let range = self.range;
        for summary in self.messages.values_mut() {
            summary.frequency = estimate_frequency(
                summary.message_count,
                summary.first_timestamp_us,
                summary.last_timestamp_us,
                range,
            );
        }

        let header = SummaryHeader {
            magic: "ULog".to_string(),
            version: reader.header().version.to_string(),
            timestamp: range.map(|(start, _)| start.to_string()).unwrap_or_else(|| "0".to_string()),
            message_count: self.record_count,
            time_range: range.map(|(start, end)| TimeRange {
                start: start.to_string(),
                end: end.to_string(),
            }),
            info: to_json_map(reader.info()),
            parameters: to_json_map(reader.parameters()),
        };

        LogSummary {
            header,
            message_count: self.messages.len(),
            messages: self.messages,
            log_messages: self.logs,
            file_size: reader.file_size() as u64,
        }
    }
}

fn to_json_map(values: &BTreeMap<String, FieldValue>) -> Map<String, Value> {
    values.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::UlogBuilder;
    use proptest::prelude::*;

    fn position_log(timestamps: impl IntoIterator<Item = u64>) -> Vec<u8> {
        let mut builder = UlogBuilder::new(0)
            .format("vehicle_local_position:uint64_t timestamp;float x;float y;uint8_t[4] _padding0;")
            .info("char[4] sys_name", b"PX4\0")
            .subscribe(1, 0, "vehicle_local_position");
        for ts in timestamps {
            let mut payload = ts.to_le_bytes().to_vec();
            payload.extend_from_slice(&1.5f32.to_le_bytes());
            payload.extend_from_slice(&(-2.0f32).to_le_bytes());
            builder = builder.data(1, &payload);
        }
        builder.build()
    }

    #[test]
    fn frequency_of_501_samples_over_ten_seconds_is_50hz() {
        let timestamps = (0..=500).map(|i| i * 20_000);
        let summary = LogSummary::from_bytes(position_log(timestamps), 5000).unwrap();

        let message = &summary.messages["vehicle_local_position"];
        assert_eq!(message.message_count, 501);
        assert_eq!(message.frequency, 50);
        assert_eq!(message.first_timestamp_us, Some(0));
        assert_eq!(message.last_timestamp_us, Some(10_000_000));
    }

    #[test]
    fn frequency_falls_back_to_global_range_then_default() {
        assert_eq!(estimate_frequency(10, Some(5), Some(5), Some((0, 2_000_000))), 5);
        assert_eq!(estimate_frequency(600, None, None, None), 2);
        assert_eq!(estimate_frequency(600, Some(1), Some(1), Some((7, 7))), 2);
        assert_eq!(estimate_frequency(0, None, None, None), 0);
    }

    proptest! {
        #[test]
        fn prop_frequency_matches_span(count in 2u64..10_000, span_ms in 1u64..1_000_000) {
            let span_us = span_ms * 1000;
            let expected = (count as f64 / (span_us as f64 / 1e6)).round() as u64;
            prop_assert_eq!(estimate_frequency(count, Some(0), Some(span_us), None), expected);
        }
    }

    #[test]
    fn rows_are_capped_but_counted() {
        let summary = LogSummary::from_bytes(position_log(0..10), 4).unwrap();
        let message = &summary.messages["vehicle_local_position"];
        assert_eq!(message.data.len(), 4);
        assert_eq!(message.message_count, 10);
    }

    #[test]
    fn summary_json_shape() {
        let summary = LogSummary::from_bytes(position_log([1_000, 3_000]), 5000).unwrap();
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["messageCount"], 1);
        assert_eq!(json["header"]["messageCount"], 2);
        assert_eq!(json["header"]["timestamp"], "1000");
        assert_eq!(json["header"]["timeRange"], serde_json::json!({ "start": "1000", "end": "3000" }));
        assert_eq!(json["header"]["info"]["sys_name"], "PX4");

        let message = &json["messages"]["vehicle_local_position"];
        let row = &message["data"][0];
        assert_eq!(row["timestampUs"], 1000);
        assert_eq!(row["timestampMs"], 1.0);
        // 64-bit values are stringified
        assert_eq!(row["timestamp"], "1000");
        assert_eq!(row["x"], 1.5);
        assert!(row.get("_padding0").is_none());

        let fields = message["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(
            fields[0],
            serde_json::json!({
                "name": "timestamp",
                "type": "uint64_t",
                "description": "Timestamp in microseconds"
            })
        );
        assert_eq!(fields[2]["description"], "Y position in meters");
    }

    #[test]
    fn empty_log_has_no_time_range() {
        let data = UlogBuilder::new(0).format("a:uint8_t x;").build();
        let summary = LogSummary::from_bytes(data, 10).unwrap();
        assert!(summary.header.time_range.is_none());
        assert_eq!(summary.header.timestamp, "0");
        assert_eq!(summary.message_count, 0);
    }

    #[test]
    fn hostile_array_lengths_skip_the_record() {
        for format in [
            "evil:uint8_t[18446744073709551615] x;",
            "evil:uint8_t[4000000000000] x;",
            "evil:uint8_t[18446744073709551615] _padding0;uint8_t[2] _padding1;uint8_t x;",
        ] {
            let data = UlogBuilder::new(0)
                .format(format)
                .subscribe(0, 0, "evil")
                .data(0, &[1, 2, 3, 4])
                .build();

            let mut reader = UlogReader::from_bytes(data.clone()).unwrap();
            assert!(reader.read_next_message().unwrap().is_none());
            assert_eq!(reader.skipped(), 1, "{format}");

            let summary = LogSummary::from_bytes(data, 10).unwrap();
            assert!(summary.messages.is_empty());
        }
    }

    #[test]
    fn logged_strings_are_collected() {
        let data = UlogBuilder::new(0).logging(b'4', 2_500, "Low battery").build();
        let summary = LogSummary::from_bytes(data, 10).unwrap();
        assert_eq!(summary.log_messages.len(), 1);
        assert_eq!(summary.log_messages[0].level, "WARNING");
        assert_eq!(summary.header.time_range, Some(TimeRange { start: "2500".into(), end: "2500".into() }));
    }

    #[test]
    fn unknown_fields_get_generic_descriptions() {
        assert_eq!(describe_field("flow_quality", "uint8_t"), "flow_quality field (uint8_t)");
        assert_eq!(describe_field("lat", "double"), "Latitude in degrees");
    }
}
