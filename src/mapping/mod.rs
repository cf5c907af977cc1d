//! Client/device mapping tables.
//!
//! The relay only forwards between pairs it has been told about: a client's
//! queries go to exactly one target device, and that device's responses go
//! back to exactly that client. The pairs come from a states file loaded once
//! at startup (see [`loader`]) and are never modified afterwards.

pub mod loader;
pub mod mac;

use std::collections::HashMap;

use pnet::util::MacAddr;

pub use loader::{MappingRecord, load_mappings};
pub use mac::{MacParseError, parse_mac};

/// A validated (target device, client) hardware address pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingEntry {
    pub target_mac: MacAddr,
    pub client_mac: MacAddr,
}

/// Immutable lookup tables in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingStore {
    client_to_target: HashMap<MacAddr, MacAddr>,
    target_to_client: HashMap<MacAddr, MacAddr>,
}

impl MappingStore {
    /// Build the store from already-validated entries.
    ///
    /// A later entry for an address that is already mapped replaces the
    /// earlier one in that direction.
    pub fn from_entries(entries: impl IntoIterator<Item = MappingEntry>) -> Self {
        let mut store = Self::default();
        for entry in entries {
            if let Some(previous) = store
                .client_to_target
                .insert(entry.client_mac, entry.target_mac)
                && previous != entry.target_mac
            {
                tracing::warn!(
                    client = %entry.client_mac,
                    previous = %previous,
                    device = %entry.target_mac,
                    "client mapped more than once, keeping the last mapping"
                );
            }
            if let Some(previous) = store
                .target_to_client
                .insert(entry.target_mac, entry.client_mac)
                && previous != entry.client_mac
            {
                tracing::warn!(
                    device = %entry.target_mac,
                    previous = %previous,
                    client = %entry.client_mac,
                    "device mapped more than once, keeping the last mapping"
                );
            }
        }
        store
    }

    /// Target device a client's queries should be relayed to.
    pub fn target_for(&self, client: &MacAddr) -> Option<MacAddr> {
        self.client_to_target.get(client).copied()
    }

    /// Client a target device's responses should be relayed to.
    pub fn client_for(&self, target: &MacAddr) -> Option<MacAddr> {
        self.target_to_client.get(target).copied()
    }

    /// Number of clients with a mapping.
    pub fn len(&self) -> usize {
        self.client_to_target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.client_to_target.is_empty()
    }

    /// Iterate over `(client, target)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (MacAddr, MacAddr)> + '_ {
        self.client_to_target
            .iter()
            .map(|(client, target)| (*client, *target))
    }
}
