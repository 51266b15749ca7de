//! Per-subscriber sample stream

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::types::TelemetrySample;

pin_project! {
    /// Stream of every sample published after the subscription was created.
    ///
    /// A subscriber that falls more than the channel capacity behind skips the
    /// oldest samples and keeps going; the skip is logged and counted. The
    /// stream ends once the hub that feeds it is gone.
    pub struct SampleStream {
        #[pin]
        inner: BroadcastStream<TelemetrySample>,
        skipped: u64,
    }
}

impl SampleStream {
    /// Wrap a broadcast receiver
    pub fn new(receiver: broadcast::Receiver<TelemetrySample>) -> Self {
        Self { inner: BroadcastStream::new(receiver), skipped: 0 }
    }

    /// Samples this subscriber missed by lagging
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Stream for SampleStream {
    type Item = TelemetrySample;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(sample)) => return Poll::Ready(Some(sample)),
                Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                    *this.skipped += n;
                    warn!("Subscriber lagged, skipped {} samples", n);
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
