use crate::lookup::EnrichmentInfo;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Address reported for a hop that did not answer before its deadline.
pub const TIMEOUT_ADDRESS: &str = "timeout";

/// A single point on the path to the destination.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hop {
    /// TTL the hop was observed at, starting from 1
    pub number: u8,
    /// Responder address, `None` when the probe timed out
    #[serde(rename = "address", serialize_with = "serialize_address")]
    pub ip_addr: Option<IpAddr>,
    /// Round-trip time, `None` when the probe timed out
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_rtt"
    )]
    pub rtt: Option<Duration>,
    /// Responder lies in a non-globally-routable range
    pub is_private: bool,
    /// Lookup metadata, attached after the hop is first reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentInfo>,
}

impl Hop {
    /// Hop for a probe that got no answer.
    pub fn timeout(number: u8) -> Hop {
        Hop {
            number,
            ip_addr: None,
            rtt: None,
            is_private: false,
            enrichment: None,
        }
    }

    /// Hop for a probe answered by `ip_addr` after `rtt`.
    pub fn reply(number: u8, ip_addr: IpAddr, rtt: Duration) -> Hop {
        Hop {
            number,
            ip_addr: Some(ip_addr),
            rtt: Some(rtt),
            is_private: is_private(&ip_addr),
            enrichment: None,
        }
    }

    /// Textual address, or `"timeout"`.
    pub fn address(&self) -> String {
        match self.ip_addr {
            Some(ip_addr) => ip_addr.to_string(),
            None => TIMEOUT_ADDRESS.to_string(),
        }
    }

    /// Public responders get a metadata lookup; timeouts and private ones don't.
    pub fn is_enrichable(&self) -> bool {
        self.ip_addr.is_some() && !self.is_private
    }

    /// Round-trip time in fractional milliseconds.
    pub fn rtt_millis(&self) -> Option<f64> {
        self.rtt.map(duration_millis)
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>2} {}", self.number, self.address())?;
        if let Some(ms) = self.rtt_millis() {
            write!(f, " {:.3} ms", ms)?;
        }
        if let Some(info) = &self.enrichment {
            write!(
                f,
                " {} {}",
                info.country.as_deref().unwrap_or("-"),
                info.as_name.as_deref().unwrap_or("-")
            )?;
        }
        Ok(())
    }
}

/// Returns true if `ip_addr` is not globally routable.
///
/// Covers RFC 1918, loopback, link-local, shared address space
/// (100.64.0.0/10), documentation, broadcast and unspecified addresses.
pub fn is_private(ip_addr: &IpAddr) -> bool {
    match ip_addr {
        IpAddr::V4(ipv4_addr) => is_private_v4(ipv4_addr),
        IpAddr::V6(ipv6_addr) => {
            ipv6_addr.is_loopback()
                || ipv6_addr.is_unspecified()
                // fc00::/7 unique local, fe80::/10 link-local
                || (ipv6_addr.segments()[0] & 0xfe00) == 0xfc00
                || (ipv6_addr.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

fn is_private_v4(ipv4_addr: &Ipv4Addr) -> bool {
    let octets = ipv4_addr.octets();
    ipv4_addr.is_private()
        || ipv4_addr.is_loopback()
        || ipv4_addr.is_link_local()
        || ipv4_addr.is_unspecified()
        || ipv4_addr.is_broadcast()
        || ipv4_addr.is_documentation()
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
}

fn duration_millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

fn serialize_address<S: Serializer>(ip_addr: &Option<IpAddr>, s: S) -> Result<S::Ok, S::Error> {
    match ip_addr {
        Some(ip_addr) => s.collect_str(ip_addr),
        None => s.serialize_str(TIMEOUT_ADDRESS),
    }
}

fn serialize_rtt<S: Serializer>(rtt: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match rtt {
        Some(rtt) => s.serialize_f64(duration_millis(*rtt)),
        None => s.serialize_none(),
    }
}
