//! Network-related modules for frame capture, decoding and rewriting.

mod capture;
mod envelope;
mod filter;
mod rewrite;

#[cfg(test)]
pub(crate) mod fixtures;

pub use capture::{
    PacketCapture, PacketSender, PcapCapture, PcapSender, bridge_identity, find_interface,
};
pub use envelope::Envelope;
pub use filter::capture_filter;
pub use rewrite::{PacketRewriter, Rewrite};

#[cfg(test)]
pub(crate) use capture::tests::{MockCapture, MockSender};
