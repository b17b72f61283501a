use std::net::IpAddr;
use thiserror::Error;

/// Errors that abort a whole trace.
///
/// Per-hop timeouts and failed lookups are not errors; they surface as
/// `"timeout"` hops and missing enrichment respectively.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("invalid destination address: {0}")]
    InvalidDestination(String),

    #[error("unsupported destination {0}: only IPv4 is supported")]
    UnsupportedDestination(IpAddr),

    #[error("max hops must be between 1 and 255, got {0}")]
    InvalidMaxHops(u32),

    #[error("timeout must be positive")]
    InvalidTimeout,

    #[error("failed to create ICMP socket: {0}")]
    SocketCreation(#[source] std::io::Error),

    #[error("failed to set TTL to {ttl}: {source}")]
    SetTtl {
        ttl: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build ICMP echo request")]
    PacketBuild,

    #[error("failed to send probe with TTL {ttl}: {source}")]
    Send {
        ttl: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create lookup client: {0}")]
    LookupClient(#[source] crate::lookup::LookupError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failing_ttl() {
        let err = TraceError::SetTtl {
            ttl: 7,
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("failed to set TTL to 7"));
        assert_eq!(
            TraceError::InvalidMaxHops(0).to_string(),
            "max hops must be between 1 and 255, got 0"
        );
    }
}
