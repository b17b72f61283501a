mod icmpv4;

use pnet_packet::icmp::echo_reply::EchoReplyPacket;
use pnet_packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet_packet::icmp::{IcmpPacket, IcmpTypes};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::Packet;
use std::net::Ipv4Addr;

const IPV4_HEADER_LEN: usize = 20;
const ICMPV4_HEADER_SIZE: usize = 8;

/// Largest datagram read from the ICMP socket.
pub const RECV_BUF_SIZE: usize = 1024;

/// Builds an ICMPv4 echo request with no payload.
pub fn build_icmpv4_echo_packet(identifier: u16, sequence_number: u16) -> Option<Vec<u8>> {
    let mut buf = vec![0; ICMPV4_HEADER_SIZE];
    let mut icmp_packet = MutableEchoRequestPacket::new(&mut buf[..])?;
    icmpv4::build_echo_request(&mut icmp_packet, identifier, sequence_number);
    Some(icmp_packet.packet().to_vec())
}

/// ICMP message that answers one of our probes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyKind {
    /// The destination itself answered.
    EchoReply,
    /// A router on the path dropped the probe on TTL expiry.
    TimeExceeded,
    DestinationUnreachable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IcmpReply {
    pub source: Ipv4Addr,
    pub kind: ReplyKind,
    /// Sequence number of the probe being answered
    pub sequence_number: u16,
}

/// Parses a datagram read from a raw ICMPv4 socket (IPv4 header included).
///
/// Returns `None` unless the datagram answers an echo request carrying
/// `identifier`. Echo replies are matched directly, error messages through
/// the original request they quote.
pub fn parse_reply(buf: &[u8], identifier: u16) -> Option<IcmpReply> {
    let ip_packet = Ipv4Packet::new(buf)?;
    if ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    // Slice by IHL rather than total length; BSD kernels rewrite ip_len.
    let header_len = ip_packet.get_header_length() as usize * 4;
    if header_len < IPV4_HEADER_LEN {
        return None;
    }
    let icmp_buf = buf.get(header_len..)?;
    let icmp_packet = IcmpPacket::new(icmp_buf)?;

    let (kind, echo) = match icmp_packet.get_icmp_type() {
        IcmpTypes::EchoReply => {
            let echo = EchoReplyPacket::new(icmp_buf)?;
            (
                ReplyKind::EchoReply,
                (echo.get_identifier(), echo.get_sequence_number()),
            )
        }
        IcmpTypes::TimeExceeded => (ReplyKind::TimeExceeded, quoted_echo(icmp_buf)?),
        IcmpTypes::DestinationUnreachable => {
            (ReplyKind::DestinationUnreachable, quoted_echo(icmp_buf)?)
        }
        _ => return None,
    };
    let (reply_identifier, sequence_number) = echo;
    if reply_identifier != identifier {
        return None;
    }

    Some(IcmpReply {
        source: ip_packet.get_source(),
        kind,
        sequence_number,
    })
}

/// Identifier and sequence number of the echo request quoted inside an
/// ICMP error message.
fn quoted_echo(icmp_buf: &[u8]) -> Option<(u16, u16)> {
    let inner = icmp_buf.get(ICMPV4_HEADER_SIZE..)?;
    let inner_ip = Ipv4Packet::new(inner)?;
    if inner_ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let inner_header_len = inner_ip.get_header_length() as usize * 4;
    let quoted = EchoRequestPacket::new(inner.get(inner_header_len..)?)?;
    if quoted.get_icmp_type() != IcmpTypes::EchoRequest {
        return None;
    }
    Some((quoted.get_identifier(), quoted.get_sequence_number()))
}
