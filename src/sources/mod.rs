//! Datagram source implementations

pub mod udp;

pub use udp::{DEFAULT_UDP_HOST, DEFAULT_UDP_PORT, MAX_DATAGRAM_SIZE, UdpSource};
