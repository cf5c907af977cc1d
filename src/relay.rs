//! Relay orchestration.
//!
//! A blocking reader task wraps each captured frame in an [`Envelope`] and
//! pushes it onto a bounded queue; a single forwarding loop takes envelopes
//! off the queue in arrival order, decides, rewrites and injects them. The
//! reader blocks when the queue is full, so frames are never dropped between
//! the two. All writes to the wire happen from the forwarding loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, NetworkError, Result};
use crate::forward::{Decision, DropReason, ForwardingEngine};
use crate::metrics::record_frame;
use crate::network::{Envelope, PacketCapture, PacketRewriter, PacketSender};

/// Counters kept by the forwarding loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RelayStats {
    pub received: u64,
    pub forwarded_queries: u64,
    pub forwarded_responses: u64,
    pub dropped_ipv6: u64,
    pub dropped_not_dns: u64,
    pub dropped_no_source: u64,
    pub dropped_unknown_client: u64,
    pub dropped_unknown_target: u64,
    pub rewrite_failures: u64,
    pub send_failures: u64,
}

impl RelayStats {
    pub fn forwarded(&self) -> u64 {
        self.forwarded_queries + self.forwarded_responses
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_ipv6
            + self.dropped_not_dns
            + self.dropped_no_source
            + self.dropped_unknown_client
            + self.dropped_unknown_target
    }

    fn record_drop(&mut self, reason: DropReason) {
        let counter = match reason {
            DropReason::Ipv6 => &mut self.dropped_ipv6,
            DropReason::NotDns => &mut self.dropped_not_dns,
            DropReason::NoSourceMac => &mut self.dropped_no_source,
            DropReason::UnknownClient(_) => &mut self.dropped_unknown_client,
            DropReason::UnknownTarget(_) => &mut self.dropped_unknown_target,
        };
        *counter += 1;
    }
}

/// Read frames until shutdown, end of capture or the forwarding loop is gone.
///
/// Must run on a blocking thread: a full queue parks the caller. Returns the
/// number of frames queued. Read errors other than end-of-stream are returned
/// to the caller.
pub fn run_decoder<C>(
    mut capture: C,
    envelope_tx: mpsc::Sender<Envelope>,
    running: Arc<AtomicBool>,
) -> Result<u64>
where
    C: PacketCapture,
{
    let mut queued = 0;

    while running.load(Ordering::SeqCst) {
        let frame = match capture.next_packet() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(Error::Network(NetworkError::CaptureEnded)) => {
                info!("capture ended");
                break;
            }
            Err(err) => return Err(err),
        };

        if envelope_tx.blocking_send(Envelope::new(frame)).is_err() {
            debug!("forwarding loop stopped, decoder exiting");
            break;
        }
        queued += 1;
    }

    Ok(queued)
}

/// The forwarding loop's state: decision engine, rewriter and wire sender.
pub struct Relay<S> {
    engine: ForwardingEngine,
    rewriter: PacketRewriter,
    sender: S,
    dump: bool,
    stats: RelayStats,
}

impl<S> Relay<S>
where
    S: PacketSender,
{
    pub fn new(engine: ForwardingEngine, rewriter: PacketRewriter, sender: S) -> Self {
        Self {
            engine,
            rewriter,
            sender,
            dump: false,
            stats: RelayStats::default(),
        }
    }

    /// Log every envelope's decoded layers before deciding on it.
    pub fn with_dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Decide on, rewrite and send one envelope.
    pub fn handle(&mut self, envelope: Envelope) {
        self.stats.received += 1;
        if self.dump {
            debug!("{envelope}");
        }

        let rewrite = match self.engine.decide(&envelope) {
            Decision::Forward(rewrite) => rewrite,
            Decision::Drop(reason) => {
                debug!(src = ?envelope.source_mac(), vlan = ?envelope.vlan_tag(), %reason, "dropping frame");
                self.stats.record_drop(reason);
                record_frame(reason.as_str());
                return;
            }
        };

        let is_query = envelope.is_query() == Some(true);
        let src = envelope.source_mac();
        let bytes = match self.rewriter.rewrite(envelope, &rewrite) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(src = ?src, error = %err, "cannot rewrite frame");
                self.stats.rewrite_failures += 1;
                record_frame("rewrite_failed");
                return;
            }
        };

        if let Err(err) = self.sender.send(&bytes) {
            warn!(error = %err, "failed to inject frame");
            self.stats.send_failures += 1;
            record_frame("send_failed");
            return;
        }

        debug!(
            src = ?src,
            dst = %rewrite.dest_mac,
            vlan = rewrite.vlan_tag,
            query = is_query,
            "relayed frame"
        );
        if is_query {
            self.stats.forwarded_queries += 1;
            record_frame("forwarded_query");
        } else {
            self.stats.forwarded_responses += 1;
            record_frame("forwarded_response");
        }
    }

    /// Process envelopes in arrival order until every sender is dropped.
    pub async fn run(mut self, mut envelope_rx: mpsc::Receiver<Envelope>) -> RelayStats {
        while let Some(envelope) = envelope_rx.recv().await {
            self.handle(envelope);
        }
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingEntry, MappingStore};
    use crate::network::fixtures::{FrameParams, build_frame, mdns_frame};
    use crate::network::{MockCapture, MockSender};
    use pnet::util::MacAddr;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const BRIDGE: MacAddr = MacAddr(0x02, 0x42, 0xac, 0x11, 0x00, 0x02);
    const TARGET: MacAddr = MacAddr(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff);
    const CLIENT: MacAddr = MacAddr(0x00, 0x11, 0x22, 0x33, 0x44, 0x55);
    const CLIENT_2: MacAddr = MacAddr(0x00, 0x11, 0x22, 0x33, 0x44, 0x66);
    const TARGET_2: MacAddr = MacAddr(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02);
    const SPOOF: Ipv4Addr = Ipv4Addr::new(192, 168, 10, 100);

    fn relay<S: PacketSender>(sender: S) -> Relay<S> {
        let store = MappingStore::from_entries([
            MappingEntry {
                target_mac: TARGET,
                client_mac: CLIENT,
            },
            MappingEntry {
                target_mac: TARGET_2,
                client_mac: CLIENT_2,
            },
        ]);
        let engine = ForwardingEngine::new(Arc::new(store), 10, 20, SPOOF);
        Relay::new(engine, PacketRewriter::new(BRIDGE), sender)
    }

    fn frame(src_mac: MacAddr, response: bool) -> Vec<u8> {
        mdns_frame(&FrameParams {
            src_mac,
            response,
            ..FrameParams::default()
        })
    }

    async fn run_pipeline(capture: MockCapture, sender: MockSender) -> (u64, RelayStats) {
        let (tx, rx) = mpsc::channel(4);
        let running = Arc::new(AtomicBool::new(true));
        let decoder = tokio::task::spawn_blocking(move || run_decoder(capture, tx, running));
        let stats = relay(sender).run(rx).await;
        let queued = decoder.await.unwrap().unwrap();
        (queued, stats)
    }

    #[tokio::test]
    async fn test_pipeline_forwards_mapped_traffic_only() {
        let capture = MockCapture::new(vec![
            frame(CLIENT, false),
            frame(TARGET, true),
            frame(MacAddr(0, 0, 0, 0, 0, 0x99), false),
            mdns_frame(&FrameParams {
                src_mac: CLIENT,
                src_ip: Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1).into(),
                dst_ip: Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb).into(),
                ..FrameParams::default()
            }),
            build_frame(
                &FrameParams {
                    src_mac: CLIENT,
                    ..FrameParams::default()
                },
                b"junk",
            ),
        ]);
        let sender = MockSender::new();

        let (queued, stats) = run_pipeline(capture, sender.clone()).await;

        assert_eq!(queued, 5);
        assert_eq!(stats.received, 5);
        assert_eq!(stats.forwarded_queries, 1);
        assert_eq!(stats.forwarded_responses, 1);
        assert_eq!(stats.dropped_unknown_client, 1);
        assert_eq!(stats.dropped_ipv6, 1);
        assert_eq!(stats.dropped_not_dns, 1);
        assert_eq!(stats.dropped(), 3);
        assert_eq!(sender.sent_count(), 2);

        let sent = sender.sent_packets.lock().unwrap().clone();
        let query = Envelope::new(sent[0].clone());
        assert_eq!(query.source_mac(), Some(BRIDGE));
        assert_eq!(query.dest_mac(), Some(TARGET));
        assert_eq!(query.vlan_tag(), Some(10));
        assert_eq!(query.source_ip(), Some(SPOOF.into()));

        let response = Envelope::new(sent[1].clone());
        assert_eq!(response.source_mac(), Some(BRIDGE));
        assert_eq!(response.dest_mac(), Some(CLIENT));
        assert_eq!(response.vlan_tag(), Some(20));
        assert_eq!(
            response.source_ip(),
            Some(Ipv4Addr::new(192, 168, 20, 7).into())
        );
    }

    #[tokio::test]
    async fn test_pipeline_preserves_arrival_order() {
        let frames = (0..20)
            .map(|i| frame(if i % 2 == 0 { CLIENT } else { CLIENT_2 }, false))
            .collect();
        let sender = MockSender::new();

        let (_, stats) = run_pipeline(MockCapture::new(frames), sender.clone()).await;

        assert_eq!(stats.forwarded_queries, 20);
        let sent = sender.sent_packets.lock().unwrap().clone();
        for (i, bytes) in sent.into_iter().enumerate() {
            let expected = if i % 2 == 0 { TARGET } else { TARGET_2 };
            assert_eq!(Envelope::new(bytes).dest_mac(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_decoder_skips_read_timeouts() {
        let capture = MockCapture::with_timeouts(vec![
            None,
            Some(frame(CLIENT, false)),
            None,
            None,
            Some(frame(TARGET, true)),
        ]);
        let sender = MockSender::new();

        let (queued, stats) = run_pipeline(capture, sender.clone()).await;

        assert_eq!(queued, 2);
        assert_eq!(stats.forwarded(), 2);
    }

    #[tokio::test]
    async fn test_decoder_honors_running_flag() {
        let (tx, mut rx) = mpsc::channel(4);
        let running = Arc::new(AtomicBool::new(false));
        let capture = MockCapture::new(vec![frame(CLIENT, false)]);

        let queued = tokio::task::spawn_blocking(move || run_decoder(capture, tx, running))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(queued, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_decoder_exits_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let running = Arc::new(AtomicBool::new(true));
        let capture = MockCapture::new(vec![frame(CLIENT, false), frame(CLIENT, false)]);

        let queued = tokio::task::spawn_blocking(move || run_decoder(capture, tx, running))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(queued, 0);
    }

    #[test]
    fn test_send_failure_is_counted_not_fatal() {
        let mut relay = relay(MockSender::failing());

        relay.handle(Envelope::new(frame(CLIENT, false)));
        relay.handle(Envelope::new(frame(TARGET, true)));

        assert_eq!(relay.stats().send_failures, 2);
        assert_eq!(relay.stats().forwarded(), 0);
    }

    #[test]
    fn test_untagged_frame_is_a_rewrite_failure() {
        let sender = MockSender::new();
        let mut relay = relay(sender.clone()).with_dump(true);

        relay.handle(Envelope::new(mdns_frame(&FrameParams {
            src_mac: CLIENT,
            vlan: None,
            ..FrameParams::default()
        })));

        assert_eq!(relay.stats().rewrite_failures, 1);
        assert_eq!(sender.sent_count(), 0);
    }
}
