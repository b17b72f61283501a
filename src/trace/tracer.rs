use super::TraceResult;
use crate::error::TraceError;
use crate::lookup::{HttpLookup, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_LOOKUP_URL};
use crate::sink::{EventSink, HopEvent};
use crate::socket::icmp::{AsyncIcmpSocket, IcmpConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default number of TTLs probed.
pub const DEFAULT_MAX_HOP: u8 = 31;
/// Default per-probe receive timeout.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Configuration and execution context for traceroute.
#[derive(Clone, Debug)]
pub struct Tracer {
    /// Source IP address the ICMP socket binds to, unbound when unspecified.
    pub src_ip: Ipv4Addr,
    /// Destination IP address.
    pub dst_ip: Ipv4Addr,
    /// Highest TTL probed. Default is `31`.
    pub max_hop: u8,
    /// Timeout for receiving each probe response.
    pub receive_timeout: Duration,
    /// Base URL of the IP information service.
    pub lookup_url: String,
    /// Timeout for a single lookup request.
    pub lookup_timeout: Duration,
    /// Broadcast sender for hop events.
    pub progress_tx: broadcast::Sender<HopEvent>,
    /// Stops the sweep and the pending lookups when cancelled.
    pub cancel: CancellationToken,
}

impl Tracer {
    /// Creates a new `Tracer` for the destination address.
    ///
    /// The socket is left unbound so the kernel picks the source address
    /// per route. Use [`Tracer::set_src_ip`] to pin it.
    pub fn new(dst_ip: Ipv4Addr) -> Tracer {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Tracer {
            src_ip: Ipv4Addr::UNSPECIFIED,
            dst_ip,
            max_hop: DEFAULT_MAX_HOP,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            progress_tx,
            cancel: CancellationToken::new(),
        }
    }
    /// Runs traceroute synchronously.
    pub fn trace(&self) -> Result<TraceResult, TraceError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(TraceError::Runtime)?;
        runtime.block_on(self.trace_async())
    }
    /// Runs traceroute asynchronously, publishing events on the progress channel.
    pub async fn trace_async(&self) -> Result<TraceResult, TraceError> {
        let sink: Arc<dyn EventSink> = Arc::new(self.progress_tx.clone());
        self.trace_with_sink(sink).await
    }
    /// Runs traceroute asynchronously, publishing events to `sink`.
    pub async fn trace_with_sink(
        &self,
        sink: Arc<dyn EventSink>,
    ) -> Result<TraceResult, TraceError> {
        super::probe::validate(self)?;
        let mut cfg = IcmpConfig::new();
        cfg.bind = self.bind_addr();
        cfg.ttl = Some(1);
        let socket = AsyncIcmpSocket::new(&cfg).map_err(TraceError::SocketCreation)?;
        let lookup = HttpLookup::new(&self.lookup_url, self.lookup_timeout)
            .map_err(TraceError::LookupClient)?;
        super::probe::trace_route(self, &socket, Arc::new(lookup), sink).await
    }
    /// Local address for the probe socket, if one was pinned.
    pub fn bind_addr(&self) -> Option<SocketAddr> {
        if self.src_ip.is_unspecified() {
            None
        } else {
            Some(SocketAddr::new(IpAddr::V4(self.src_ip), 0))
        }
    }
    /// Sets the source IP address.
    pub fn set_src_ip(&mut self, src_ip: Ipv4Addr) {
        self.src_ip = src_ip;
    }
    /// Returns the source IP address.
    pub fn get_src_ip(&self) -> Ipv4Addr {
        self.src_ip
    }
    /// Sets the destination IP address.
    pub fn set_dst_ip(&mut self, dst_ip: Ipv4Addr) {
        self.dst_ip = dst_ip;
    }
    /// Returns the destination IP address.
    pub fn get_dst_ip(&self) -> Ipv4Addr {
        self.dst_ip
    }
    /// Sets the highest TTL probed.
    pub fn set_max_hop(&mut self, max_hop: u8) {
        self.max_hop = max_hop;
    }
    /// Returns the highest TTL probed.
    pub fn get_max_hop(&self) -> u8 {
        self.max_hop
    }
    /// Sets the per-probe receive timeout.
    pub fn set_receive_timeout(&mut self, receive_timeout: Duration) {
        self.receive_timeout = receive_timeout;
    }
    /// Returns the per-probe receive timeout.
    pub fn get_receive_timeout(&self) -> Duration {
        self.receive_timeout
    }
    /// Sets the base URL of the IP information service.
    pub fn set_lookup_url(&mut self, lookup_url: &str) {
        self.lookup_url = lookup_url.to_string();
    }
    /// Returns the base URL of the IP information service.
    pub fn get_lookup_url(&self) -> &str {
        &self.lookup_url
    }
    /// Sets the timeout for a single lookup request.
    pub fn set_lookup_timeout(&mut self, lookup_timeout: Duration) {
        self.lookup_timeout = lookup_timeout;
    }
    /// Returns the timeout for a single lookup request.
    pub fn get_lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }
    /// Returns a receiver for hop events.
    pub fn get_progress_receiver(&self) -> broadcast::Receiver<HopEvent> {
        self.progress_tx.subscribe()
    }
    /// Returns a handle that stops a running trace when cancelled.
    pub fn get_cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// First IPv4 address of the default interface.
///
/// Only a hint for callers that want to pin the source with
/// [`Tracer::set_src_ip`]; routes through other interfaces need a different one.
pub fn default_src_ip() -> Option<Ipv4Addr> {
    match default_net::get_default_interface() {
        Ok(interface) => interface.ipv4.first().map(|net| net.addr),
        Err(e) => {
            debug!(error = %e, "no default interface");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tracer = Tracer::new(Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(tracer.get_max_hop(), 31);
        assert_eq!(tracer.get_receive_timeout(), Duration::from_millis(1000));
        assert_eq!(tracer.get_lookup_url(), "https://api.ipee.info/v1/info");
        assert!(!tracer.cancel.is_cancelled());
        assert_eq!(tracer.get_src_ip(), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_socket_unbound_unless_source_pinned() {
        let mut tracer = Tracer::new(Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(tracer.bind_addr(), None);

        tracer.set_src_ip(Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(
            tracer.bind_addr(),
            Some("192.168.1.10:0".parse::<SocketAddr>().unwrap())
        );

        tracer.set_src_ip(Ipv4Addr::UNSPECIFIED);
        assert_eq!(tracer.bind_addr(), None);
    }

    #[test]
    fn test_default_src_ip_is_only_a_hint() {
        let tracer = Tracer::new(Ipv4Addr::new(1, 1, 1, 1));
        if let Some(src_ip) = default_src_ip() {
            assert!(!src_ip.is_unspecified());
        }
        assert_eq!(tracer.bind_addr(), None);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let tracer = Tracer::new(Ipv4Addr::new(1, 1, 1, 1));
        tracer.get_cancel_token().cancel();
        assert!(tracer.cancel.is_cancelled());
    }

    #[test]
    fn test_invalid_settings_fail_before_opening_socket() {
        let mut tracer = Tracer::new(Ipv4Addr::new(1, 1, 1, 1));
        tracer.set_max_hop(0);
        assert!(matches!(tracer.trace(), Err(TraceError::InvalidMaxHops(0))));

        tracer.set_max_hop(5);
        tracer.set_receive_timeout(Duration::ZERO);
        assert!(matches!(tracer.trace(), Err(TraceError::InvalidTimeout)));
    }
}
