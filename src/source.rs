//! Datagram source trait

use std::net::SocketAddr;

use crate::Result;

/// Trait for sources of raw telemetry datagrams
///
/// Sources abstract over where datagrams come from (a UDP socket in
/// production, an in-memory channel in tests). The hub's receive loop owns
/// the source and pulls one datagram at a time, so decoding never overlaps.
#[async_trait::async_trait]
pub trait DatagramSource: Send + 'static {
    /// Receive the next datagram into `buf`
    ///
    /// Returns:
    /// - `Ok(Some(len))` - a datagram of `len` bytes was written to `buf`
    /// - `Ok(None)` - the source is exhausted (normal termination)
    /// - `Err(e)` - a receive error; the caller logs it and keeps reading
    async fn next_datagram(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Address the source is bound to, if it has one
    fn local_addr(&self) -> Option<SocketAddr>;
}
