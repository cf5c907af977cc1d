//! Forwarding decisions.
//!
//! Queries travel from a client to its mapped target device, responses from a
//! target device back to its mapped client. Only the query path rewrites the
//! source address: target devices drop discovery queries from outside their
//! own subnet, clients accept responses from anywhere.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use pnet::util::MacAddr;

use crate::mapping::MappingStore;
use crate::network::{Envelope, Rewrite};

/// Why a frame was not relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// IPv6 traffic is not relayed.
    Ipv6,
    /// The UDP payload is not a well-formed DNS message.
    NotDns,
    /// Frame too short to carry a source address.
    NoSourceMac,
    /// Query from a client without a mapping.
    UnknownClient(MacAddr),
    /// Response from a device without a mapping.
    UnknownTarget(MacAddr),
}

impl DropReason {
    /// Short label used for metrics and structured logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipv6 => "ipv6",
            Self::NotDns => "not_dns",
            Self::NoSourceMac => "no_source_mac",
            Self::UnknownClient(_) => "unknown_client",
            Self::UnknownTarget(_) => "unknown_target",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownClient(mac) => write!(f, "no mapping for client {mac}"),
            Self::UnknownTarget(mac) => write!(f, "no mapping for device {mac}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Outcome of looking at one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Forward(Rewrite),
    Drop(DropReason),
}

/// Direction-aware lookup of where a frame should go.
#[derive(Debug, Clone)]
pub struct ForwardingEngine {
    mappings: Arc<MappingStore>,
    target_vlan: u16,
    client_vlan: u16,
    spoof_source_ip: Ipv4Addr,
}

impl ForwardingEngine {
    pub fn new(
        mappings: Arc<MappingStore>,
        target_vlan: u16,
        client_vlan: u16,
        spoof_source_ip: Ipv4Addr,
    ) -> Self {
        Self {
            mappings,
            target_vlan,
            client_vlan,
            spoof_source_ip,
        }
    }

    pub fn decide(&self, envelope: &Envelope) -> Decision {
        if envelope.is_ipv6() {
            return Decision::Drop(DropReason::Ipv6);
        }
        let Some(is_query) = envelope.is_query() else {
            return Decision::Drop(DropReason::NotDns);
        };
        let Some(source) = envelope.source_mac() else {
            return Decision::Drop(DropReason::NoSourceMac);
        };

        if is_query {
            match self.mappings.target_for(&source) {
                Some(target) => Decision::Forward(Rewrite {
                    dest_mac: target,
                    vlan_tag: self.target_vlan,
                    spoof_source: Some(self.spoof_source_ip),
                }),
                None => Decision::Drop(DropReason::UnknownClient(source)),
            }
        } else {
            match self.mappings.client_for(&source) {
                Some(client) => Decision::Forward(Rewrite {
                    dest_mac: client,
                    vlan_tag: self.client_vlan,
                    spoof_source: None,
                }),
                None => Decision::Drop(DropReason::UnknownTarget(source)),
            }
        }
    }
}
