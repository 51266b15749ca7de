//! Published telemetry samples

use serde::{Deserialize, Serialize};

/// One decoded scalar, timestamped at receipt.
///
/// This is the unit that flows from the hub to every subscriber. It
/// serializes as `{ "topic": ..., "data": { "timestampMs": ..., "value": ... } }`,
/// the shape streaming clients consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Dotted topic name, e.g. `attitude.roll` or `rc.ch3`
    pub topic: String,

    /// Receipt time and value
    pub data: SamplePoint,
}

/// Time/value pair carried by a [`TelemetrySample`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePoint {
    /// Wall-clock receipt time in milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    /// Decoded value after scaling
    pub value: f64,
}

impl TelemetrySample {
    /// Create a new sample
    pub fn new(topic: impl Into<String>, timestamp_ms: i64, value: f64) -> Self {
        Self { topic: topic.into(), data: SamplePoint { timestamp_ms, value } }
    }

    /// Receipt time in milliseconds
    pub fn timestamp_ms(&self) -> i64 {
        self.data.timestamp_ms
    }

    /// Sample value
    pub fn value(&self) -> f64 {
        self.data.value
    }
}
