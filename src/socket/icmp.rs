use super::ProbeSocket;
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};
use tokio::net::UdpSocket;

#[derive(Debug, Clone)]
pub struct IcmpConfig {
    pub bind: Option<SocketAddr>,
    pub ttl: Option<u32>,
}

impl IcmpConfig {
    pub fn new() -> Self {
        Self {
            bind: None,
            ttl: None,
        }
    }
}

impl Default for IcmpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw ICMPv4 socket driven by the tokio reactor.
///
/// Reads return the full IPv4 datagram, header included. Opening it
/// requires root or `CAP_NET_RAW`.
#[derive(Debug)]
pub struct AsyncIcmpSocket {
    inner: UdpSocket,
}

impl AsyncIcmpSocket {
    /// Must be called from within a tokio runtime.
    pub fn new(config: &IcmpConfig) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
        socket.set_nonblocking(true)?;

        if let Some(ttl) = config.ttl {
            socket.set_ttl(ttl)?;
        }
        if let Some(bind) = config.bind {
            socket.bind(&bind.into())?;
        }

        let std_socket: StdUdpSocket = socket.into();
        Ok(Self {
            inner: UdpSocket::from_std(std_socket)?,
        })
    }
}

#[async_trait]
impl ProbeSocket for AsyncIcmpSocket {
    fn set_ttl(&self, ttl: u32) -> io::Result<()> {
        self.inner.set_ttl(ttl)
    }

    async fn send_to(&self, buf: &[u8], dst_ip: Ipv4Addr) -> io::Result<usize> {
        self.inner
            .send_to(buf, SocketAddr::new(IpAddr::V4(dst_ip), 0))
            .await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
        let (len, addr) = self.inner.recv_from(buf).await?;
        Ok((len, addr.ip()))
    }
}
