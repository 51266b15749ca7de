//! Driver spawns and manages the datagram receive loop

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::hub::SampleEmitter;
use crate::source::DatagramSource;
use crate::sources::MAX_DATAGRAM_SIZE;

/// Driver spawns and manages the receive loop
///
/// The spawned task owns the source and hands each datagram to the emitter
/// before reading the next one, so decode-and-publish never overlaps and
/// samples leave in receive order.
pub struct Driver;

impl Driver {
    /// Spawn the receive loop for the given source
    pub fn spawn<S>(
        source: S,
        emitter: Arc<SampleEmitter>,
        cancel: CancellationToken,
    ) -> JoinHandle<()>
    where
        S: DatagramSource,
    {
        tokio::spawn(async move {
            Self::receive_task(source, emitter, cancel).await;
        })
    }

    /// Receive loop - reads datagrams until cancelled or the source ends
    async fn receive_task<S>(mut source: S, emitter: Arc<SampleEmitter>, cancel: CancellationToken)
    where
        S: DatagramSource,
    {
        info!(local_addr = ?source.local_addr(), "Receive loop started");
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut datagram_count = 0u64;
        let mut error_streak = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Receive loop cancelled");
                    break;
                }
                result = source.next_datagram(&mut buf) => result,
            };

            match result {
                Ok(Some(len)) => {
                    datagram_count += 1;
                    error_streak = 0;
                    let received_at_ms = chrono::Utc::now().timestamp_millis();
                    emitter.ingest(&buf[..len], received_at_ms);
                }
                Ok(None) => {
                    info!("Datagram source ended after {} datagrams", datagram_count);
                    break;
                }
                Err(e) => {
                    // Receive errors never stop the hub
                    error_streak = error_streak.saturating_add(1);
                    error!("Receive error (streak {}): {}", error_streak, e);

                    // Back off on repeated failures: 50ms, 100ms, 200ms, ... capped at 1.6s
                    let backoff = Duration::from_millis(50 * (1 << error_streak.min(5)));
                    debug!("Backing off for {:?}", backoff);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!("Receive loop ended (processed {} datagrams)", datagram_count);
    }
}
