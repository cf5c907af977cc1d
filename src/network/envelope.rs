//! Lazily decoded view of a captured frame.
//!
//! An [`Envelope`] owns the raw bytes of one frame and decodes its layers
//! (Ethernet, 802.1Q, IPv4/IPv6, UDP, DNS) on first access. Every
//! decoded layer is cached as an offset into the frame rather than a copy of
//! its fields, so rewriting a field in place never leaves a stale value
//! behind. Absent or malformed layers read as `None`; decoding never fails.

use std::cell::OnceCell;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use hickory_proto::op::{Message, MessageType};
use hickory_proto::serialize::binary::BinDecodable;
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::{self, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::udp::{self, MutableUdpPacket, UdpPacket};
use pnet::packet::vlan::{MutableVlanPacket, VlanPacket};
use pnet::util::MacAddr;

use crate::error::RewriteError;

/// Ethernet header size in bytes.
pub const ETHERNET_HEADER_SIZE: usize = 14;
/// 802.1Q tag size in bytes.
pub const VLAN_HEADER_SIZE: usize = 4;
/// IPv4 header size in bytes (without options).
pub const IPV4_HEADER_SIZE: usize = 20;
/// IPv6 header size in bytes.
pub const IPV6_HEADER_SIZE: usize = 40;
/// UDP header size in bytes.
pub const UDP_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Link {
    /// Offset of the outermost 802.1Q tag.
    vlan: Option<usize>,
    /// Ethertype after the last tag.
    ethertype: EtherType,
    /// Offset of the network header.
    payload: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpVersion {
    V4,
    V6,
}

#[derive(Debug, Clone, Copy)]
struct Network {
    version: IpVersion,
    header: usize,
    payload: usize,
    end: usize,
    protocol: IpNextHeaderProtocol,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: usize,
    end: usize,
}

/// One captured frame and its lazily decoded layers.
#[derive(Debug)]
pub struct Envelope {
    frame: Vec<u8>,
    link: OnceCell<Option<Link>>,
    network: OnceCell<Option<Network>>,
    udp: OnceCell<Option<Segment>>,
    dns: OnceCell<Option<bool>>,
}

impl Envelope {
    /// Wrap a raw frame. Nothing is decoded until a field is requested.
    pub fn new(frame: Vec<u8>) -> Self {
        Self {
            frame,
            link: OnceCell::new(),
            network: OnceCell::new(),
            udp: OnceCell::new(),
            dns: OnceCell::new(),
        }
    }

    pub fn source_mac(&self) -> Option<MacAddr> {
        EthernetPacket::new(&self.frame).map(|eth| eth.get_source())
    }

    pub fn dest_mac(&self) -> Option<MacAddr> {
        EthernetPacket::new(&self.frame).map(|eth| eth.get_destination())
    }

    /// VLAN identifier of the outermost 802.1Q tag.
    pub fn vlan_tag(&self) -> Option<u16> {
        let offset = self.link()?.vlan?;
        VlanPacket::new(&self.frame[offset..]).map(|tag| tag.get_vlan_identifier())
    }

    pub fn is_ipv6(&self) -> bool {
        self.network()
            .is_some_and(|network| network.version == IpVersion::V6)
    }

    pub fn source_ip(&self) -> Option<IpAddr> {
        self.addresses().map(|(source, _)| source)
    }

    pub fn dest_ip(&self) -> Option<IpAddr> {
        self.addresses().map(|(_, destination)| destination)
    }

    /// UDP source and destination ports.
    pub fn udp_ports(&self) -> Option<(u16, u16)> {
        let segment = self.udp()?;
        let udp = UdpPacket::new(&self.frame[segment.start..segment.end])?;
        Some((udp.get_source(), udp.get_destination()))
    }

    /// UDP payload, excluding any link-layer padding.
    pub fn transport_payload(&self) -> Option<&[u8]> {
        let segment = self.udp()?;
        self.frame.get(segment.start + UDP_HEADER_SIZE..segment.end)
    }

    /// `Some(true)` for a DNS query, `Some(false)` for a response, `None` when
    /// the UDP payload is not a well-formed DNS message.
    pub fn is_query(&self) -> Option<bool> {
        *self.dns.get_or_init(|| {
            let message = Message::from_bytes(self.transport_payload()?).ok()?;
            Some(message.message_type() == MessageType::Query)
        })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.frame
    }

    pub fn set_source_mac(&mut self, mac: MacAddr) -> Result<(), RewriteError> {
        MutableEthernetPacket::new(&mut self.frame)
            .ok_or(RewriteError::MissingEthernet)?
            .set_source(mac);
        Ok(())
    }

    pub fn set_dest_mac(&mut self, mac: MacAddr) -> Result<(), RewriteError> {
        MutableEthernetPacket::new(&mut self.frame)
            .ok_or(RewriteError::MissingEthernet)?
            .set_destination(mac);
        Ok(())
    }

    /// Rewrite the identifier of the outermost tag, keeping its priority bits.
    pub fn set_vlan_tag(&mut self, vlan: u16) -> Result<(), RewriteError> {
        let offset = self
            .link()
            .and_then(|link| link.vlan)
            .ok_or(RewriteError::MissingVlan)?;
        MutableVlanPacket::new(&mut self.frame[offset..])
            .ok_or(RewriteError::MissingVlan)?
            .set_vlan_identifier(vlan);
        Ok(())
    }

    /// Overwrite the IPv4 source address and refresh the header checksum.
    ///
    /// The UDP checksum still covers the old address afterwards; call
    /// [`Envelope::recompute_udp_checksum`] once all address changes are done.
    pub fn set_source_ipv4(&mut self, address: Ipv4Addr) -> Result<(), RewriteError> {
        let network = self
            .network()
            .filter(|network| network.version == IpVersion::V4)
            .ok_or(RewriteError::MissingIpv4)?;
        let mut ip = MutableIpv4Packet::new(&mut self.frame[network.header..network.payload])
            .ok_or(RewriteError::MissingIpv4)?;
        ip.set_source(address);
        let checksum = ipv4::checksum(&ip.to_immutable());
        ip.set_checksum(checksum);
        Ok(())
    }

    /// Recompute the UDP checksum over the current network pseudo-header.
    pub fn recompute_udp_checksum(&mut self) -> Result<(), RewriteError> {
        let segment = self.udp().ok_or(RewriteError::MissingUdp)?;
        let (source, destination) = self.addresses().ok_or(RewriteError::MissingUdp)?;

        let checksum = {
            let udp = UdpPacket::new(&self.frame[segment.start..segment.end])
                .ok_or(RewriteError::MissingUdp)?;
            match (source, destination) {
                (IpAddr::V4(source), IpAddr::V4(destination)) => {
                    udp::ipv4_checksum(&udp, &source, &destination)
                }
                (IpAddr::V6(source), IpAddr::V6(destination)) => {
                    udp::ipv6_checksum(&udp, &source, &destination)
                }
                _ => return Err(RewriteError::MissingUdp),
            }
        };

        // Zero means "no checksum" on the wire.
        let checksum = if checksum == 0 { 0xffff } else { checksum };
        MutableUdpPacket::new(&mut self.frame[segment.start..segment.end])
            .ok_or(RewriteError::MissingUdp)?
            .set_checksum(checksum);
        Ok(())
    }

    fn link(&self) -> Option<Link> {
        *self.link.get_or_init(|| decode_link(&self.frame))
    }

    fn network(&self) -> Option<Network> {
        *self
            .network
            .get_or_init(|| self.link().and_then(|link| decode_network(&self.frame, link)))
    }

    fn udp(&self) -> Option<Segment> {
        *self
            .udp
            .get_or_init(|| self.network().and_then(|net| decode_udp(&self.frame, net)))
    }

    fn addresses(&self) -> Option<(IpAddr, IpAddr)> {
        let network = self.network()?;
        let header = &self.frame[network.header..];
        match network.version {
            IpVersion::V4 => Ipv4Packet::new(header)
                .map(|ip| (ip.get_source().into(), ip.get_destination().into())),
            IpVersion::V6 => Ipv6Packet::new(header)
                .map(|ip| (ip.get_source().into(), ip.get_destination().into())),
        }
    }
}

fn is_tag(ethertype: EtherType) -> bool {
    ethertype == EtherTypes::Vlan || ethertype == EtherTypes::PBridge || ethertype == EtherTypes::QinQ
}

fn decode_link(frame: &[u8]) -> Option<Link> {
    let ethernet = EthernetPacket::new(frame)?;
    let mut ethertype = ethernet.get_ethertype();
    let mut offset = ETHERNET_HEADER_SIZE;
    let mut vlan = None;

    while is_tag(ethertype) {
        let Some(tag) = VlanPacket::new(&frame[offset..]) else {
            // Truncated tag: nothing past it can be trusted.
            return Some(Link {
                vlan,
                ethertype: EtherType(0),
                payload: offset,
            });
        };
        vlan.get_or_insert(offset);
        ethertype = tag.get_ethertype();
        offset += VLAN_HEADER_SIZE;
    }

    Some(Link {
        vlan,
        ethertype,
        payload: offset,
    })
}

fn decode_network(frame: &[u8], link: Link) -> Option<Network> {
    let bytes = frame.get(link.payload..)?;
    let start = link.payload;

    if link.ethertype == EtherTypes::Ipv4 {
        let ip = Ipv4Packet::new(bytes)?;
        let header_len = usize::from(ip.get_header_length()) * 4;
        let total_len = usize::from(ip.get_total_length());
        if ip.get_version() != 4
            || header_len < IPV4_HEADER_SIZE
            || total_len < header_len
            || header_len > bytes.len()
        {
            return None;
        }
        Some(Network {
            version: IpVersion::V4,
            header: start,
            payload: start + header_len,
            end: start + total_len.min(bytes.len()),
            protocol: ip.get_next_level_protocol(),
        })
    } else if link.ethertype == EtherTypes::Ipv6 {
        let ip = Ipv6Packet::new(bytes)?;
        if ip.get_version() != 6 {
            return None;
        }
        let total_len = IPV6_HEADER_SIZE + usize::from(ip.get_payload_length());
        Some(Network {
            version: IpVersion::V6,
            header: start,
            payload: start + IPV6_HEADER_SIZE,
            end: start + total_len.min(bytes.len()),
            protocol: ip.get_next_header(),
        })
    } else {
        None
    }
}

fn decode_udp(frame: &[u8], network: Network) -> Option<Segment> {
    if network.protocol != IpNextHeaderProtocols::Udp {
        return None;
    }
    let segment = frame.get(network.payload..network.end)?;
    let udp = UdpPacket::new(segment)?;
    let length = usize::from(udp.get_length());
    if length < UDP_HEADER_SIZE {
        return None;
    }
    Some(Segment {
        start: network.payload,
        end: network.payload + length.min(segment.len()),
    })
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame ({} bytes)", self.frame.len())?;

        match (self.source_mac(), self.dest_mac()) {
            (Some(source), Some(destination)) => {
                write!(f, "\n  Ethernet {source} -> {destination}")?;
            }
            _ => return write!(f, "\n  Ethernet: truncated"),
        }

        if let Some(vlan) = self.vlan_tag() {
            write!(f, "\n  802.1Q vlan={vlan}")?;
        }

        if let Some((source, destination)) = self.addresses() {
            let version = if self.is_ipv6() { "IPv6" } else { "IPv4" };
            write!(f, "\n  {version} {source} -> {destination}")?;
        }

        if let (Some((source, destination)), Some(payload)) =
            (self.udp_ports(), self.transport_payload())
        {
            write!(
                f,
                "\n  UDP {source} -> {destination} ({} payload bytes)",
                payload.len()
            )?;
        }

        match self.is_query() {
            Some(true) => write!(f, "\n  DNS query"),
            Some(false) => write!(f, "\n  DNS response"),
            None => write!(f, "\n  no DNS layer"),
        }
    }
}
