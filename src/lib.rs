//! mdns-relay - relays mDNS discovery between isolated VLANs.
//!
//! The relay captures tagged mDNS traffic on a bridge interface, and forwards
//! a client's discovery queries to the one target device it is mapped to (and
//! that device's responses back to that client only), rewriting the VLAN tag
//! and hardware addresses on the way. Queries additionally get a source
//! address from the device's subnet, since such devices ignore off-subnet
//! queries.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`]: Configuration loading and validation
//! - [`mapping`]: Client/device pairs loaded from the states file
//! - [`network`]: Frame capture, lazy layer decoding and rewriting
//! - [`forward`]: Per-frame forwarding decisions
//! - [`relay`]: Decode task and forwarding loop
//! - [`metrics`]: Optional Prometheus exporter
//! - [`error`]: Error types
//!
//! # Testing
//!
//! Capture and injection sit behind traits, so the pipeline can be exercised
//! without a network interface:
//!
//! ```rust
//! use std::sync::Arc;
//! use mdns_relay::forward::{Decision, DropReason, ForwardingEngine};
//! use mdns_relay::mapping::MappingStore;
//! use mdns_relay::network::Envelope;
//!
//! let store = MappingStore::parse(
//!     r#"[{"target_mac": "aa:bb:cc:dd:ee:ff", "client_mac": "00:11:22:33:44:55"}]"#,
//! ).unwrap();
//! let engine = ForwardingEngine::new(Arc::new(store), 10, 20, "192.168.10.100".parse().unwrap());
//!
//! // A runt frame carries no DNS layer and is never relayed
//! let decision = engine.decide(&Envelope::new(vec![0u8; 8]));
//! assert_eq!(decision, Decision::Drop(DropReason::NotDns));
//! ```

pub mod config;
pub mod error;
pub mod forward;
pub mod mapping;
pub mod metrics;
pub mod network;
pub mod relay;

pub use config::Config;
pub use error::{Error, Result};
