//! UDP datagram source

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{info, trace};

use crate::source::DatagramSource;
use crate::{Result, TelemetryError};

/// Default MAVLink ground-station port
pub const DEFAULT_UDP_PORT: u16 = 14550;

/// Default bind host (all interfaces)
pub const DEFAULT_UDP_HOST: &str = "0.0.0.0";

/// Largest datagram the source will accept
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Source that reads datagrams from a bound UDP socket
pub struct UdpSource {
    socket: UdpSocket,
    local_addr: SocketAddr,
    last_peer: Option<SocketAddr>,
}

impl UdpSource {
    /// Bind a UDP socket on `host:port`.
    ///
    /// Port 0 binds an ephemeral port; use [`DatagramSource::local_addr`] to
    /// find out which.
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((host, port))
            .await
            .map_err(|e| TelemetryError::socket_error(format!("bind {host}:{port}"), e))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| TelemetryError::socket_error("query local address", e))?;

        info!(%local_addr, "UDP telemetry socket bound");

        Ok(Self { socket, local_addr, last_peer: None })
    }

    /// Address of the most recent sender
    pub fn last_peer(&self) -> Option<SocketAddr> {
        self.last_peer
    }
}

#[async_trait::async_trait]
impl DatagramSource for UdpSource {
    async fn next_datagram(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let (len, peer) = self
            .socket
            .recv_from(buf)
            .await
            .map_err(|e| TelemetryError::socket_error("recv_from", e))?;

        if self.last_peer != Some(peer) {
            info!(%peer, "Receiving telemetry from new peer");
            self.last_peer = Some(peer);
        }

        trace!(%peer, len, "Datagram received");
        Ok(Some(len))
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }
}
