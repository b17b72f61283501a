use pnet_packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet_packet::icmp::{IcmpCode, IcmpTypes};
use pnet_packet::Packet;

pub fn build_echo_request(
    icmp_packet: &mut MutableEchoRequestPacket,
    identifier: u16,
    sequence_number: u16,
) {
    icmp_packet.set_icmp_type(IcmpTypes::EchoRequest);
    icmp_packet.set_icmp_code(IcmpCode::new(0));
    icmp_packet.set_identifier(identifier);
    icmp_packet.set_sequence_number(sequence_number);
    icmp_packet.set_checksum(0);
    let icmp_checksum = pnet_packet::util::checksum(icmp_packet.packet(), 1);
    icmp_packet.set_checksum(icmp_checksum);
}
