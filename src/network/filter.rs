//! Capture filter expression.

use pnet::util::MacAddr;

/// IPv4 mDNS multicast group.
pub const MDNS_IPV4_GROUP: &str = "224.0.0.251";
/// IPv6 link-local mDNS multicast group.
pub const MDNS_IPV6_GROUP: &str = "ff02::fb";
/// mDNS UDP port.
pub const MDNS_PORT: u16 = 5353;

/// BPF expression selecting tagged mDNS traffic not sent by the bridge itself.
///
/// The `vlan` keyword shifts the offsets of every primitive after it past the
/// tag, so the ordering below matters: the source MAC check must come first.
pub fn capture_filter(bridge_mac: MacAddr) -> String {
    format!(
        "not ether src {bridge_mac} and vlan and dst net ({MDNS_IPV4_GROUP} or {MDNS_IPV6_GROUP}) and udp dst port {MDNS_PORT}"
    )
}
