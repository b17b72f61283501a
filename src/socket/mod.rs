pub mod icmp;

use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

/// Datagram socket the TTL sweep probes through.
///
/// One socket is used for the whole sweep: the TTL is changed before each
/// probe and replies for every TTL arrive on it.
#[async_trait]
pub trait ProbeSocket: Send + Sync {
    /// Sets the TTL of subsequent outbound probes.
    fn set_ttl(&self, ttl: u32) -> io::Result<()>;

    async fn send_to(&self, buf: &[u8], dst_ip: Ipv4Addr) -> io::Result<usize>;

    /// Waits for the next inbound datagram.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)>;
}
