//! Outbound frame rewriting.

use std::net::Ipv4Addr;

use pnet::util::MacAddr;

use super::Envelope;
use crate::error::RewriteError;

/// Header values to write into a relayed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rewrite {
    pub dest_mac: MacAddr,
    pub vlan_tag: u16,
    /// New IPv4 source address. Only relayed queries carry one.
    pub spoof_source: Option<Ipv4Addr>,
}

/// Turns a decoded frame into the bytes the relay puts back on the wire.
///
/// Every outbound frame carries the bridge's own hardware address as its
/// source, which is what keeps the capture filter from reading it back in.
#[derive(Debug, Clone, Copy)]
pub struct PacketRewriter {
    bridge_mac: MacAddr,
}

impl PacketRewriter {
    pub fn new(bridge_mac: MacAddr) -> Self {
        Self { bridge_mac }
    }

    /// Apply `rewrite` to the envelope's frame and return the wire bytes.
    ///
    /// Checksums are only recomputed when the source address changes; all
    /// other rewritten fields sit outside the IP/UDP checksum coverage.
    pub fn rewrite(
        &self,
        mut envelope: Envelope,
        rewrite: &Rewrite,
    ) -> Result<Vec<u8>, RewriteError> {
        envelope.set_source_mac(self.bridge_mac)?;
        envelope.set_dest_mac(rewrite.dest_mac)?;
        envelope.set_vlan_tag(rewrite.vlan_tag)?;

        if let Some(source) = rewrite.spoof_source {
            envelope.set_source_ipv4(source)?;
            envelope.recompute_udp_checksum()?;
        }

        Ok(envelope.into_bytes())
    }
}
