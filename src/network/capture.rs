//! Packet capture abstraction.
//!
//! Provides a trait-based abstraction over packet capture to enable:
//! - Testing without real network interfaces
//! - Different capture backends

use pcap::{Active, Capture};
use pnet::datalink::{self, NetworkInterface};
use pnet::util::MacAddr;
use tracing::debug;

use crate::error::{NetworkError, Result};

/// Largest frame the capture hands over.
const SNAPLEN: i32 = 65_535;
/// Read timeout, so the reader notices a shutdown request while idle.
const READ_TIMEOUT_MS: i32 = 1_000;

/// Trait for packet capture implementations.
pub trait PacketCapture: Send {
    /// Receive the next frame.
    ///
    /// Returns `Ok(None)` when the read timed out without traffic and
    /// `Err(NetworkError::CaptureEnded)` once the capture has no more frames.
    fn next_packet(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Trait for packet sending implementations.
pub trait PacketSender: Send {
    /// Put a frame on the wire as-is.
    fn send(&mut self, packet: &[u8]) -> Result<()>;
}

/// Find a network interface by name.
pub fn find_interface(name: &str) -> Result<NetworkInterface> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| NetworkError::InterfaceNotFound(name.to_string()).into())
}

/// Hardware address of the bridge interface.
///
/// Frames carrying this source address were injected by the relay itself.
pub fn bridge_identity(interface: &NetworkInterface) -> Result<MacAddr> {
    interface
        .mac
        .filter(|mac| *mac != MacAddr::zero())
        .ok_or_else(|| NetworkError::NoHardwareAddress(interface.name.clone()).into())
}

fn open_live(interface: &str) -> Result<Capture<Active>> {
    let open_error = |e: pcap::Error| NetworkError::CaptureOpen {
        interface: interface.to_string(),
        reason: e.to_string(),
    };

    let capture = Capture::from_device(interface)
        .map_err(open_error)?
        .promisc(true)
        .snaplen(SNAPLEN)
        .timeout(READ_TIMEOUT_MS)
        .immediate_mode(true)
        .open()
        .map_err(open_error)?;
    Ok(capture)
}

/// Production packet capture using libpcap.
pub struct PcapCapture {
    capture: Capture<Active>,
}

impl PcapCapture {
    /// Open a capture and an injection handle on the interface.
    ///
    /// Only the capture handle gets `filter`; the injection handle never reads.
    pub fn new(interface: &str, filter: &str) -> Result<(Self, PcapSender)> {
        let mut capture = open_live(interface)?;
        capture
            .filter(filter, true)
            .map_err(|e| NetworkError::FilterRejected(format!("{filter:?}: {e}")))?;
        debug!(interface, filter, "capture filter applied");

        let sender = PcapSender {
            capture: open_live(interface)?,
        };
        Ok((Self { capture }, sender))
    }
}

impl PacketCapture for PcapCapture {
    fn next_packet(&mut self) -> Result<Option<Vec<u8>>> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(Some(packet.data.to_vec())),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(pcap::Error::NoMorePackets) => Err(NetworkError::CaptureEnded.into()),
            Err(e) => Err(NetworkError::ReadFailed(e.to_string()).into()),
        }
    }
}

/// Production packet sender using libpcap injection.
pub struct PcapSender {
    capture: Capture<Active>,
}

impl PacketSender for PcapSender {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        self.capture
            .sendpacket(packet)
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
        Ok(())
    }
}
