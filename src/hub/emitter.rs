//! Decode-and-publish pipeline shared by the hub and its receive loop

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::mavlink::{self, Detection};
use crate::types::{SamplePoint, TelemetrySample};

/// Counters describing what the pipeline has seen
#[derive(Debug, Default)]
pub struct HubStats {
    datagrams: AtomicU64,
    unrecognized: AtomicU64,
    decode_failures: AtomicU64,
    samples: AtomicU64,
}

/// Point-in-time copy of [`HubStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Datagrams handed to the pipeline
    pub datagrams_received: u64,
    /// Datagrams without a MAVLink sync byte
    pub unrecognized: u64,
    /// Datagrams discarded because decoding failed
    pub decode_failures: u64,
    /// Samples published
    pub samples_emitted: u64,
}

impl HubStats {
    /// Copy the current counter values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_received: self.datagrams.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            samples_emitted: self.samples.load(Ordering::Relaxed),
        }
    }
}

/// Turns datagrams into samples and publishes them on the broadcast channel
#[derive(Debug)]
pub struct SampleEmitter {
    sender: broadcast::Sender<TelemetrySample>,
    stats: HubStats,
}

impl SampleEmitter {
    /// Create an emitter whose channel buffers up to `capacity` samples per
    /// subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, stats: HubStats::default() }
    }

    /// Decode one datagram and publish every field it carries.
    ///
    /// Returns the number of samples emitted. Failures are contained here:
    /// they are counted and logged, and the next datagram is unaffected.
    pub fn ingest(&self, datagram: &[u8], received_at_ms: i64) -> usize {
        self.stats.datagrams.fetch_add(1, Ordering::Relaxed);

        let frame = match mavlink::detect(datagram) {
            Ok(Detection::Frame(frame)) => frame,
            Ok(Detection::Unrecognized) => {
                self.stats.unrecognized.fetch_add(1, Ordering::Relaxed);
                return 0;
            }
            Err(e) => {
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                debug!("Dropping datagram: {}", e);
                return 0;
            }
        };

        let payload = frame.payload(datagram);
        match mavlink::decode(frame.version, frame.message_id, payload, frame.payload_length) {
            Ok(Some(fields)) => {
                let count = fields.len();
                for field in fields {
                    self.emit_topic(
                        field.topic,
                        SamplePoint { timestamp_ms: received_at_ms, value: field.value },
                    );
                }
                trace!(message_id = frame.message_id, count, "Frame decoded");
                count
            }
            Ok(None) => 0,
            Err(e) => {
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                debug!(message_id = frame.message_id, "Dropping frame: {}", e);
                0
            }
        }
    }

    /// Publish a sample under `topic`.
    ///
    /// Having no subscribers is not an error; the sample is simply dropped.
    pub fn emit_topic(&self, topic: impl Into<String>, point: SamplePoint) {
        self.stats.samples.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(TelemetrySample { topic: topic.into(), data: point });
    }

    /// Register a new receiver; it sees only samples published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetrySample> {
        self.sender.subscribe()
    }

    /// Number of live receivers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Pipeline counters
    pub fn stats(&self) -> &HubStats {
        &self.stats
    }
}
