//! Frame builders shared by unit tests.

use std::net::{IpAddr, Ipv4Addr};

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{self, MutableIpv4Packet};
use pnet::packet::ipv6::MutableIpv6Packet;
use pnet::packet::udp::{self, MutableUdpPacket};
use pnet::packet::vlan::MutableVlanPacket;
use pnet::util::MacAddr;

use super::envelope::{
    ETHERNET_HEADER_SIZE, IPV4_HEADER_SIZE, IPV6_HEADER_SIZE, UDP_HEADER_SIZE, VLAN_HEADER_SIZE,
};
use super::filter::MDNS_PORT;

#[derive(Debug, Clone)]
pub struct FrameParams {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub vlan: Option<u16>,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub response: bool,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            src_mac: MacAddr::new(0xff, 0xaa, 0xfa, 0xaa, 0xff, 0xaa),
            dst_mac: MacAddr::new(0x01, 0x00, 0x5e, 0x00, 0x00, 0xfb),
            vlan: Some(30),
            src_ip: Ipv4Addr::new(192, 168, 20, 7).into(),
            dst_ip: Ipv4Addr::new(224, 0, 0, 251).into(),
            response: false,
        }
    }
}

/// Serialized mDNS message: a PTR question, or an A answer when `response`.
pub fn dns_payload(response: bool) -> Vec<u8> {
    let mut message = Message::new();
    message.set_id(0).set_op_code(OpCode::Query);

    if response {
        message
            .set_message_type(MessageType::Response)
            .set_authoritative(true);
        let name = Name::from_ascii("Living-Room.local.").unwrap();
        message.add_answer(Record::from_rdata(
            name,
            120,
            RData::A(A(Ipv4Addr::new(192, 168, 10, 5))),
        ));
    } else {
        message.set_message_type(MessageType::Query);
        let name = Name::from_ascii("_googlecast._tcp.local.").unwrap();
        message.add_query(Query::query(name, RecordType::PTR));
    }

    message.to_bytes().unwrap()
}

/// Build Ethernet [+ 802.1Q] + IP + UDP(5353 -> 5353) around `payload`,
/// with valid IPv4 and UDP checksums.
pub fn build_frame(params: &FrameParams, payload: &[u8]) -> Vec<u8> {
    let (ip_ethertype, ip_header_size) = match params.src_ip {
        IpAddr::V4(_) => (EtherTypes::Ipv4, IPV4_HEADER_SIZE),
        IpAddr::V6(_) => (EtherTypes::Ipv6, IPV6_HEADER_SIZE),
    };
    let link_size = ETHERNET_HEADER_SIZE + params.vlan.map_or(0, |_| VLAN_HEADER_SIZE);
    let udp_size = UDP_HEADER_SIZE + payload.len();
    let ip_start = link_size;
    let udp_start = ip_start + ip_header_size;
    let mut buffer = vec![0u8; udp_start + udp_size];

    {
        let mut ethernet = MutableEthernetPacket::new(&mut buffer).unwrap();
        ethernet.set_destination(params.dst_mac);
        ethernet.set_source(params.src_mac);
        ethernet.set_ethertype(match params.vlan {
            Some(_) => EtherTypes::Vlan,
            None => ip_ethertype,
        });
    }

    if let Some(vlan) = params.vlan {
        let mut tag = MutableVlanPacket::new(&mut buffer[ETHERNET_HEADER_SIZE..]).unwrap();
        tag.set_vlan_identifier(vlan);
        tag.set_ethertype(ip_ethertype);
    }

    {
        let mut udp = MutableUdpPacket::new(&mut buffer[udp_start..]).unwrap();
        udp.set_source(MDNS_PORT);
        udp.set_destination(MDNS_PORT);
        udp.set_length(udp_size as u16);
        udp.set_payload(payload);
        let checksum = match (params.src_ip, params.dst_ip) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => udp::ipv4_checksum(&udp.to_immutable(), &src, &dst),
            (IpAddr::V6(src), IpAddr::V6(dst)) => udp::ipv6_checksum(&udp.to_immutable(), &src, &dst),
            _ => panic!("mixed address families"),
        };
        udp.set_checksum(checksum);
    }

    match (params.src_ip, params.dst_ip) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => {
            let mut ip = MutableIpv4Packet::new(&mut buffer[ip_start..udp_start]).unwrap();
            ip.set_version(4);
            ip.set_header_length(5);
            ip.set_total_length((IPV4_HEADER_SIZE + udp_size) as u16);
            ip.set_ttl(255);
            ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
            ip.set_source(src);
            ip.set_destination(dst);
            let checksum = ipv4::checksum(&ip.to_immutable());
            ip.set_checksum(checksum);
        }
        (IpAddr::V6(src), IpAddr::V6(dst)) => {
            let mut ip = MutableIpv6Packet::new(&mut buffer[ip_start..udp_start]).unwrap();
            ip.set_version(6);
            ip.set_payload_length(udp_size as u16);
            ip.set_next_header(IpNextHeaderProtocols::Udp);
            ip.set_hop_limit(255);
            ip.set_source(src);
            ip.set_destination(dst);
        }
        _ => panic!("mixed address families"),
    }

    buffer
}

/// A complete mDNS frame described by `params`.
pub fn mdns_frame(params: &FrameParams) -> Vec<u8> {
    build_frame(params, &dns_payload(params.response))
}
