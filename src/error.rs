//! Error types for the mDNS relay.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for relay operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("interface cannot be empty")]
    EmptyInterface,

    #[error("{field} must be between 1 and 4094, got {value}")]
    VlanOutOfRange { field: &'static str, value: u16 },

    #[error("channel_capacity must be greater than 0")]
    ZeroChannelCapacity,
}

/// Errors raised while loading the client/device mapping file.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("permission denied: {0:?}")]
    PermissionDenied(PathBuf),

    #[error("I/O error reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed mapping file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Network-related errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("network interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("interface {0} has no hardware address")]
    NoHardwareAddress(String),

    #[error("failed to open capture on {interface}: {reason}")]
    CaptureOpen { interface: String, reason: String },

    #[error("capture filter rejected: {0}")]
    FilterRejected(String),

    #[error("capture ended")]
    CaptureEnded,

    #[error("capture read failed: {0}")]
    ReadFailed(String),

    #[error("failed to send packet: {0}")]
    SendFailed(String),
}

/// Errors raised when a frame lacks a layer required by a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("frame has no Ethernet header")]
    MissingEthernet,

    #[error("frame has no 802.1Q tag")]
    MissingVlan,

    #[error("frame has no IPv4 header")]
    MissingIpv4,

    #[error("frame has no UDP header")]
    MissingUdp,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
