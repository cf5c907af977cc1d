//! States file loader.
//!
//! The states file is a JSON array of records pairing a target device with a
//! client. Records are validated one by one: a bad record is skipped with a
//! warning, it never fails the whole load.

use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use super::{MappingEntry, MappingStore, parse_mac};
use crate::error::MappingError;

/// One record of the states file, as written on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingRecord {
    #[serde(default, alias = "cc_mac")]
    pub target_mac: Option<String>,

    #[serde(default)]
    pub client_mac: Option<String>,

    #[serde(default, alias = "cc_ip")]
    pub target_ip: Option<String>,

    #[serde(default)]
    pub client_ip: Option<String>,
}

/// Why a record was left out of the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {value:?}")]
    Invalid { field: &'static str, value: String },
}

impl MappingRecord {
    /// Validate the record and turn it into a mapping entry.
    ///
    /// Both hardware addresses are required. IP addresses are optional and
    /// unused for forwarding, but a record carrying a malformed one is rejected.
    pub fn validate(&self) -> Result<MappingEntry, RecordError> {
        let target_mac = required_mac("target_mac", self.target_mac.as_deref())?;
        let client_mac = required_mac("client_mac", self.client_mac.as_deref())?;
        optional_ip("target_ip", self.target_ip.as_deref())?;
        optional_ip("client_ip", self.client_ip.as_deref())?;

        Ok(MappingEntry {
            target_mac,
            client_mac,
        })
    }
}

fn required_mac(
    field: &'static str,
    value: Option<&str>,
) -> Result<pnet::util::MacAddr, RecordError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(RecordError::Missing(field))?;
    parse_mac(value).map_err(|_| RecordError::Invalid {
        field,
        value: value.to_string(),
    })
}

fn optional_ip(field: &'static str, value: Option<&str>) -> Result<(), RecordError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse::<IpAddr>()
            .map(|_| ())
            .map_err(|_| RecordError::Invalid {
                field,
                value: value.to_string(),
            }),
        None => Ok(()),
    }
}

impl MappingStore {
    /// Build a store from raw records, skipping (and logging) invalid ones.
    pub fn from_records(records: &[MappingRecord]) -> Self {
        let entries = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match record.validate() {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(index, error = %err, "skipping mapping record");
                    None
                }
            })
            .collect::<Vec<_>>();

        Self::from_entries(entries)
    }

    /// Parse a states file's JSON content.
    pub fn parse(content: &str) -> Result<Self, MappingError> {
        let records: Vec<MappingRecord> = serde_json::from_str(content)?;
        Ok(Self::from_records(&records))
    }
}

/// Load the states file at `path` into an immutable store.
pub fn load_mappings(path: &Path) -> Result<MappingStore, MappingError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MappingError::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => MappingError::PermissionDenied(path.to_path_buf()),
        _ => MappingError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let store = MappingStore::parse(&content)?;
    info!(path = %path.display(), mappings = store.len(), "mappings loaded");
    Ok(store)
}
