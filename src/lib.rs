//! MAVLink UDP telemetry decoding with broadcast fan-out, plus PX4 ULog
//! flight-log summaries.
//!
//! Flightdeck receives MAVLink v1/v2 datagrams on a UDP socket, decodes a
//! fixed catalogue of messages into `(topic, timestampMs, value)` samples and
//! broadcasts them to any number of independent subscribers.
//!
//! # Features
//!
//! - **Table-driven decoding**: 13 common MAVLink messages, one generic decoder
//! - **Fault isolation**: a malformed datagram never affects the next one
//! - **Fan-out**: every subscriber gets its own copy of every sample
//! - **ULog summaries**: per-message tables and sampling frequencies
//! - **HTTP surface**: server-sent events, upload endpoint and health check
//!
//! ## Example
//!
//! ```rust,no_run
//! use flightdeck::TelemetryHub;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> flightdeck::Result<()> {
//!     let hub = TelemetryHub::new(1024);
//!     hub.start("0.0.0.0", 14550).await?;
//!
//!     let mut samples = hub.subscribe();
//!     while let Some(sample) = samples.next().await {
//!         println!("{} = {}", sample.topic, sample.value());
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decode pipeline
pub mod driver;
pub mod hub;
pub mod mavlink;
pub mod source;
pub mod sources;
pub mod stream;

// Flight logs
pub mod ulog;

// Service surface
pub mod config;
pub mod server;

// Core exports
pub use error::*;
pub use types::*;

pub use hub::{HubState, StatsSnapshot, TelemetryHub};
pub use source::DatagramSource;
pub use sources::UdpSource;
pub use stream::SampleStream;
pub use ulog::{LogSummary, UlogReader};
